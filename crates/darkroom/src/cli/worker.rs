//! The `darkroom worker` command.

use clap::Args;
use darkroom_core::Config;
use tokio::sync::watch;

use super::{open, print_json};

/// Arguments for the `worker` command.
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Attempts before a task is abandoned (0 retries forever)
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

pub async fn execute(args: WorkerArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(max_attempts) = args.max_attempts {
        config.worker.max_attempts = max_attempts;
    }
    let darkroom = open(config)?;

    let pending = darkroom.queue().pending().await?;
    tracing::info!("{} undelivered work items", pending);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, finishing current task");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would stop the worker.
                tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let stats = darkroom.worker().run(shutdown_rx).await;
    print_json(&stats)
}
