use anyhow::Context;
use metamagic_core::Layout;
use metamagic_ocr::{ExtractionResult, MetadataExtractor, PageRasterizer};
use std::path::{Path, PathBuf};

use super::{EngineArgs, LayoutArgs};
use crate::output;

pub struct Options {
    pub output: String,
    pub out: Option<PathBuf>,
    pub diagnostics: Option<PathBuf>,
    pub concurrent: bool,
}

pub async fn run(
    input_file: PathBuf,
    layout: LayoutArgs,
    engine: EngineArgs,
    opts: Options,
) -> anyhow::Result<()> {
    let mut layout = layout.load()?;
    if opts.diagnostics.is_some() {
        layout.extraction.diagnostics_dir = opts.diagnostics.clone();
    }

    let results = extract_document(&input_file, &layout, &engine, opts.concurrent).await?;

    match opts.out {
        Some(path) => {
            // Files always get JSON.
            let json = output::json::render(&input_file, &results)?;
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            let found: usize = results.iter().map(ExtractionResult::found_count).sum();
            eprintln!(
                "Extracted {found} of {} field(s) over {} page(s), written to {}",
                layout.fields.len() * results.len(),
                results.len(),
                path.display()
            );
        }
        None => match opts.output.as_str() {
            "json" => println!("{}", output::json::render(&input_file, &results)?),
            _ => output::table::print(&results),
        },
    }
    Ok(())
}

/// Rasterize and extract one document. Shared with the folder watcher.
pub async fn extract_document(
    input_file: &Path,
    layout: &Layout,
    engine: &EngineArgs,
    concurrent: bool,
) -> anyhow::Result<Vec<ExtractionResult>> {
    let extractor = MetadataExtractor::new(engine.recognizer()).with_settings(layout.extraction.clone());

    let rasterizer = engine.rasterizer();
    let path = input_file.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(&path))
        .await?
        .with_context(|| format!("reading {}", input_file.display()))?;
    tracing::info!(path = %input_file.display(), pages = pages.len(), "document loaded");

    if concurrent {
        return Ok(extractor.extract_document_concurrent(pages, &layout.fields).await);
    }
    let fields = layout.fields.clone();
    let results = tokio::task::spawn_blocking(move || extractor.extract_document(&pages, &fields)).await?;
    Ok(results)
}
