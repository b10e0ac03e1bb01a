//! Offline stand-in for the hosted model provider
//!
//! Used when no provider credentials are configured. Every call fails, which
//! pushes callers onto their local fallback content and keeps the demo fully
//! runnable without network access.

use anyhow::Result;
use async_trait::async_trait;

use super::{ChatTurn, ModelInvoker, ModelReply};

/// Always-failing invoker for unconfigured or demo environments
pub struct OfflineInvoker;

#[async_trait]
impl ModelInvoker for OfflineInvoker {
    async fn invoke(&self, _model: &str, _turns: &[ChatTurn]) -> Result<ModelReply> {
        anyhow::bail!("model provider offline: no API credentials configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_invoker_always_fails() {
        let invoker = OfflineInvoker;
        let result = invoker.invoke("gpt-4o", &[ChatTurn::user("hello")]).await;
        assert!(result.is_err());
    }
}
