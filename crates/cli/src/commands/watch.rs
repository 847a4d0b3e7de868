use anyhow::{bail, Context};
use metamagic_ocr::spawn_intake_watcher;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::extract::extract_document;
use super::{EngineArgs, LayoutArgs};
use crate::output;

/// Extract every document created in `dir` until interrupted, printing one
/// JSON object per document on stdout.
pub async fn run(dir: PathBuf, layout: LayoutArgs, engine: EngineArgs) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let layout = layout.load()?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(&dir, tx)
        .with_context(|| format!("watching {}", dir.display()))?;
    tracing::info!(dir = %dir.display(), fields = layout.fields.len(), "watching for documents");

    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(path) = next else { break };
                tracing::info!("Processing document: {}", path.display());
                match extract_document(&path, &layout, &engine, true).await {
                    Ok(results) => println!("{}", output::json::render_line(&path, &results)?),
                    Err(e) => tracing::error!("Failed to process {}: {e:#}", path.display()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping watcher");
                break;
            }
        }
    }
    Ok(())
}
