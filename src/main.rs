//! Emergence demo runner
//!
//! Plans a task, fans it out to a role-tagged agent team, and prints the
//! synthesized plan together with the final agent states.

use anyhow::Result;
use clap::Parser;

use emergence::config::Config;
use emergence::engine::run_emergence;

#[derive(Parser)]
#[command(name = "emergence")]
#[command(about = "Fan a task out to a role-tagged agent team and synthesize one plan", long_about = None)]
#[command(version)]
struct Cli {
    /// Task to run the emergence for
    #[arg(trailing_var_arg = true)]
    task: Vec<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "EMERGENCE_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Override the configured worker cap
    #[arg(long)]
    max_workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (WARN level by default, use RUST_LOG=info for more)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    if let Some(max_workers) = cli.max_workers {
        config.limits.max_workers = max_workers;
    }

    let task = if cli.task.is_empty() {
        "Design a mobile app for mental health".to_string()
    } else {
        cli.task.join(" ")
    };

    println!("Starting emergence for task: {}", task);
    let outcome = run_emergence(&task, &config).await?;

    println!("\n=== Emergence Result ===");
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    println!("\n=== Agent States ===");
    println!("{}", serde_json::to_string_pretty(&outcome.snapshot.agents)?);

    Ok(())
}
