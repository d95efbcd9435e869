//! The `darkroom enqueue` and `darkroom status` commands.

use clap::Args;
use darkroom_core::{Config, ImageId, TaskId};

use super::{open, print_json};

/// Arguments for the `enqueue` command.
#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// Image ID returned by `upload`
    pub image_id: ImageId,

    /// Transformation to run: resize, thumbnail or watermark
    pub action: String,
}

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Task ID returned by `enqueue`
    pub task_id: TaskId,
}

pub async fn enqueue(args: EnqueueArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = open(config)?;
    let task = darkroom
        .orchestrator()
        .enqueue_named(args.image_id, &args.action)
        .await?;
    print_json(&task)
}

pub async fn status(args: StatusArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = open(config)?;
    let task = darkroom.orchestrator().get_task(args.task_id).await?;
    print_json(&task)
}
