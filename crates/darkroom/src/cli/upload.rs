//! The `darkroom upload` command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use darkroom_core::{Config, EnqueuedTask, Image, TaskType};
use serde::Serialize;

use super::{expand_path, open, print_json};

/// Arguments for the `upload` command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Image file to upload
    pub file: PathBuf,

    /// Stored extension (defaults to the file's own, e.g. ".jpg")
    #[arg(long)]
    pub ext: Option<String>,

    /// Queue a transformation right after the upload (repeatable)
    #[arg(short = 'q', long = "queue", value_name = "ACTION")]
    pub actions: Vec<TaskType>,
}

#[derive(Serialize)]
struct UploadOutput {
    image: Image,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tasks: Vec<EnqueuedTask>,
}

pub async fn execute(args: UploadArgs, config: Config) -> anyhow::Result<()> {
    let path = expand_path(&args.file);
    let ext = match args.ext {
        Some(ext) if ext.starts_with('.') => ext,
        Some(ext) => format!(".{ext}"),
        None => file_extension(&path)
            .with_context(|| format!("{} has no extension; pass --ext", path.display()))?,
    };
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let darkroom = open(config)?;
    let image = darkroom.images().upload(&bytes, &ext).await?;

    let orchestrator = darkroom.orchestrator();
    let mut tasks = Vec::with_capacity(args.actions.len());
    for action in args.actions {
        tasks.push(orchestrator.enqueue_task(image.id, action).await?);
    }

    print_json(&UploadOutput { image, tasks })
}

fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension(Path::new("a/cat.JPG")), Some(".JPG".into()));
        assert_eq!(file_extension(Path::new("a/archive.tar.gz")), Some(".gz".into()));
        assert_eq!(file_extension(Path::new("README")), None);
    }
}
