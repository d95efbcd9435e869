//! The `darkroom get` and `darkroom delete` commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use darkroom_core::{Config, ImageId, TaskType};
use serde_json::json;

use super::{expand_path, open, print_json};

/// Arguments for the `get` command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Image ID returned by `upload`
    pub id: ImageId,

    /// Fetch the output of this transformation instead of the original
    #[arg(short, long, value_name = "ACTION")]
    pub processed: Option<TaskType>,

    /// Write the image here (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the image record and blob key instead of the bytes
    #[arg(long)]
    pub info: bool,
}

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Image ID returned by `upload`
    pub id: ImageId,
}

pub async fn get(args: GetArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = open(config)?;
    let images = darkroom.images();

    if args.info {
        let image = images.get(args.id).await?;
        let blob = images.image_path(args.id, args.processed).await?;
        return print_json(&json!({ "image": image, "blob": blob }));
    }

    let mut stream = images.open(args.id, args.processed).await?;
    match args.output {
        Some(output) => {
            let output = expand_path(&output);
            let mut file = tokio::fs::File::create(&output)
                .await
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let written = tokio::io::copy(&mut stream, &mut file).await?;
            tracing::info!("Wrote {} bytes to {}", written, output.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await?;
            tokio::io::AsyncWriteExt::flush(&mut stdout).await?;
        }
    }
    Ok(())
}

pub async fn delete(args: DeleteArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = open(config)?;
    darkroom.images().delete(args.id).await?;
    print_json(&json!({ "deleted": args.id }))
}
