//! Output synthesis
//!
//! Merges the workers' outputs into one consolidated plan. Accepts any number
//! of outputs, including none, and composes the plan locally when the model is
//! unavailable.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::orchestrator::agent::AgentOutput;
use crate::providers::{fallback, ChatTurn, ModelInvoker, Synthesizer};

/// Model-backed implementation of the `Synthesizer` contract
pub struct PlanSynthesizer {
    invoker: Arc<dyn ModelInvoker>,
    model: String,
    timeout: Duration,
}

impl PlanSynthesizer {
    pub fn new(invoker: Arc<dyn ModelInvoker>, model: String, timeout: Duration) -> Self {
        Self { invoker, model, timeout }
    }

    fn build_prompt(task: &str, outputs: &[AgentOutput]) -> String {
        let lines = outputs
            .iter()
            .map(|output| format!("- {} ({}): {}", output.role, output.model, output.output))
            .collect::<Vec<_>>()
            .join("\n");

        [
            format!("Task: {}", task),
            format!("Agent outputs:\n{}", lines),
            "Combine into a cohesive plan with: Summary, Key Insights, Proposed Approach, Risks, Next Steps."
                .to_string(),
        ]
        .join("\n\n")
    }
}

#[async_trait]
impl Synthesizer for PlanSynthesizer {
    async fn synthesize(&self, task: &str, outputs: &[AgentOutput]) -> Result<String> {
        let turns = vec![
            ChatTurn::system("Synthesize multi-agent outputs into a single plan."),
            ChatTurn::user(Self::build_prompt(task, outputs)),
        ];

        match tokio::time::timeout(self.timeout, self.invoker.invoke(&self.model, &turns)).await {
            Ok(Ok(reply)) if !reply.output.trim().is_empty() => Ok(reply.output),
            Ok(Ok(_)) => {
                warn!("Synthesis came back empty, composing offline");
                Ok(fallback::synthesis(task, outputs))
            }
            Ok(Err(err)) => {
                warn!("Synthesis call failed: {}", err);
                Ok(fallback::synthesis(task, outputs))
            }
            Err(_) => {
                warn!("Synthesis call timed out");
                Ok(fallback::synthesis(task, outputs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::CapturingInvoker;
    use crate::providers::OfflineInvoker;

    fn output(role: &str, text: &str) -> AgentOutput {
        AgentOutput {
            agent_id: format!("{}-id", role),
            role: role.to_string(),
            task: "t".to_string(),
            model: "demo".to_string(),
            output: text.to_string(),
            search_results: Vec::new(),
        }
    }

    fn synthesizer(invoker: Arc<dyn ModelInvoker>) -> PlanSynthesizer {
        PlanSynthesizer::new(invoker, "synth-model".to_string(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_synthesize_returns_model_output() {
        let invoker = Arc::new(CapturingInvoker::new("the merged plan"));
        let text = synthesizer(invoker.clone())
            .synthesize("big task", &[output("analyst", "finding one")])
            .await
            .unwrap();
        assert_eq!(text, "the merged plan");

        let requests = invoker.requests();
        assert_eq!(requests[0].0, "synth-model");
        assert!(requests[0].1[1].content.contains("big task"));
        assert!(requests[0].1[1].content.contains("analyst"));
        assert!(requests[0].1[1].content.contains("finding one"));
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_on_failure() {
        let text = synthesizer(Arc::new(OfflineInvoker))
            .synthesize("big task", &[output("analyst", "finding one")])
            .await
            .unwrap();
        assert!(!text.is_empty());
        assert!(text.contains("finding one"));
    }

    #[tokio::test]
    async fn test_synthesize_accepts_zero_outputs() {
        let text = synthesizer(Arc::new(OfflineInvoker))
            .synthesize("big task", &[])
            .await
            .unwrap();
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_on_blank_output() {
        let invoker = Arc::new(CapturingInvoker::new("   "));
        let text = synthesizer(invoker)
            .synthesize("big task", &[])
            .await
            .unwrap();
        assert!(!text.trim().is_empty());
    }
}
