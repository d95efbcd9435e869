//! Darkroom CLI - upload images and run transformations through a durable queue.
//!
//! Requests and processing are decoupled: `enqueue` persists a task and
//! publishes it, a separate `worker` process consumes the queue and writes the
//! result next to the original.
//!
//! # Usage
//!
//! ```bash
//! # Store an original and queue a thumbnail for it
//! darkroom upload cat.jpg --queue thumbnail
//!
//! # Run the worker until Ctrl-C
//! darkroom worker
//!
//! # Check on a task, then fetch the output
//! darkroom status 1
//! darkroom get <image-id> --processed thumbnail -o cat_thumb.jpg
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use darkroom_core::Config;

mod cli;
mod logging;

/// Darkroom - asynchronous resize, thumbnail and watermark jobs.
#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the platform default
    #[arg(short, long, global = true, env = "DARKROOM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Store an original image
    Upload(cli::upload::UploadArgs),

    /// Fetch an original or one of its processed variants
    Get(cli::image::GetArgs),

    /// Delete an image, its variants and its tasks
    Delete(cli::image::DeleteArgs),

    /// Request a transformation of an uploaded image
    Enqueue(cli::task::EnqueueArgs),

    /// Show a task's current status
    Status(cli::task::StatusArgs),

    /// Consume the work queue until interrupted
    Worker(cli::worker::WorkerArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(cli::expand_path);

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match &config_path {
        Some(path) => Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => match Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. \
                     Check your config file with `darkroom config path`."
                );
                Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Darkroom v{}", darkroom_core::VERSION);

    match cli.command {
        Commands::Upload(args) => cli::upload::execute(args, config).await,
        Commands::Get(args) => cli::image::get(args, config).await,
        Commands::Delete(args) => cli::image::delete(args, config).await,
        Commands::Enqueue(args) => cli::task::enqueue(args, config).await,
        Commands::Status(args) => cli::task::status(args, config).await,
        Commands::Worker(args) => cli::worker::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, config_path).await,
    }
}
