mod bootstrap;
mod claims;
mod config;
mod dispatch;
mod error;
mod ledger;
mod oracle;
mod scheduler;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ExecutorConfig;
use crate::scheduler::RunMode;

/// Executor node: reconciles pending execution claims from the event
/// ledger and dispatches every claim the eligibility oracle approves.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Run a single reconciliation cycle and exit instead of polling.
    #[arg(long)]
    once: bool,
}

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,executor_node=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    info!("\u{1F680} Starting Execution-Claim Executor Node");

    // Load configuration
    dotenv::dotenv().ok();
    let config = ExecutorConfig::from_env()?;

    let scheduler = bootstrap::initialize_scheduler(&config)?;

    let mode = if cli.once {
        RunMode::OneShot
    } else {
        RunMode::Daemon
    };

    scheduler.run(mode).await?;

    Ok(())
}
