use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use metamagic_core::{ExtractionSettings, FieldSpec, FieldSpecMap, ValidationError};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

use crate::diagnostics::{CropSink, DirectorySink, NoopSink};
use crate::field::{FieldExtractor, RetryController, RetryOutcome, RetryPolicy};
use crate::postprocess::PostProcessor;
use crate::raster::{self, PageRasterizer, RasterError};
use crate::recognizer::OcrBackend;
use crate::types::{ExtractionResult, FieldError, FieldOutcome, FieldResult, NotFoundReason};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Rasterization failed: {0}")]
    Raster(#[from] RasterError),
}

/// Runs a field layout over page images.
///
/// Each field goes through crop → OCR → label match, growing its region on a
/// miss, then through the field's post-processing. Fields never share state,
/// so a failure in one is recorded against it and the rest of the page is
/// still read.
pub struct MetadataExtractor<R: OcrBackend> {
    recognizer: Arc<R>,
    sink: Arc<dyn CropSink>,
    settings: ExtractionSettings,
    reference_year: Option<i32>,
}

impl<R: OcrBackend> Clone for MetadataExtractor<R> {
    fn clone(&self) -> Self {
        Self {
            recognizer: Arc::clone(&self.recognizer),
            sink: Arc::clone(&self.sink),
            settings: self.settings.clone(),
            reference_year: self.reference_year,
        }
    }
}

impl<R: OcrBackend + 'static> MetadataExtractor<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            sink: Arc::new(NoopSink),
            settings: ExtractionSettings::default(),
            reference_year: None,
        }
    }

    /// Also installs a [`DirectorySink`] when `diagnostics_dir` is set.
    pub fn with_settings(mut self, settings: ExtractionSettings) -> Self {
        if let Some(dir) = &settings.diagnostics_dir {
            self.sink = Arc::new(DirectorySink::new(dir.clone()));
        }
        self.settings = settings;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn CropSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Year given to dates read without one. Defaults to the current year.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Structural checks on a request. Every problem is reported, not just the first.
    pub fn validate_request(
        image: Option<&DynamicImage>,
        meta_data: Option<&Value>,
    ) -> Result<FieldSpecMap, Vec<ValidationError>> {
        let mut errors = Vec::new();
        match image {
            None => errors.push(ValidationError::general("image is required")),
            Some(img) if img.width() == 0 || img.height() == 0 => errors.push(
                ValidationError::general(format!("image is empty ({}x{})", img.width(), img.height())),
            ),
            Some(_) => {}
        }
        let fields = FieldSpecMap::from_value(meta_data).map_err(|e| errors.extend(e));
        match fields {
            Ok(fields) if errors.is_empty() => Ok(fields),
            _ => Err(errors),
        }
    }

    /// Validate the raw request, then extract every field from `image`.
    pub fn extract_meta(
        &self,
        image: Option<&DynamicImage>,
        meta_data: Option<&Value>,
    ) -> Result<ExtractionResult, Vec<ValidationError>> {
        let fields = Self::validate_request(image, meta_data)?;
        match image {
            Some(image) => Ok(self.extract_page(image, &fields)),
            None => Err(vec![ValidationError::general("image is required")]),
        }
    }

    /// Fields run one after another, in declaration order.
    pub fn extract_page(&self, image: &DynamicImage, fields: &FieldSpecMap) -> ExtractionResult {
        let fields = fields
            .iter()
            .map(|(id, spec)| FieldResult {
                id: id.to_string(),
                outcome: self.extract_field(image, id, spec),
            })
            .collect();
        ExtractionResult { fields }
    }

    pub fn extract_field(&self, image: &DynamicImage, id: &str, spec: &FieldSpec) -> FieldOutcome {
        let policy = RetryPolicy {
            max_attempts: self.settings.max_attempts,
            growth_factor: self.settings.growth_factor,
            deadline: self.settings.field_timeout().map(|t| Instant::now() + t),
        };
        let extractor = FieldExtractor::new(&*self.recognizer, &*self.sink);
        let outcome = RetryController::new(policy).run(
            &extractor,
            image,
            id,
            spec.bbox,
            &spec.key,
            spec.optional_key_match,
        );

        match outcome {
            Ok(RetryOutcome::Found { text, attempts, region }) => {
                match PostProcessor::for_field(spec, self.reference_year).apply(text) {
                    Ok(value) => FieldOutcome::Found { value, attempts, region },
                    Err(e) => {
                        tracing::warn!(field = id, error = %e, "post-processing failed");
                        FieldOutcome::Failed { error: e.into() }
                    }
                }
            }
            Ok(RetryOutcome::NotFound(reason)) => FieldOutcome::NotFound { reason },
            Err(e) => {
                tracing::warn!(field = id, error = %e, "OCR failed");
                FieldOutcome::Failed { error: FieldError::Ocr(e.to_string()) }
            }
        }
    }

    /// Fields run on the blocking pool, at most `workers` at a time.
    /// Output order matches declaration order whatever order fields finish in.
    ///
    /// A worker permit is held until the field's OCR work returns, so the
    /// limit counts running OCR calls. `field_timeout_ms` is enforced by the
    /// retry loop between attempts; a running OCR call is never abandoned.
    pub async fn extract_page_concurrent(
        &self,
        image: Arc<DynamicImage>,
        fields: &FieldSpecMap,
    ) -> ExtractionResult {
        let semaphore = Arc::new(Semaphore::new(self.worker_count()));

        let handles: Vec<_> = fields
            .iter()
            .map(|(id, spec)| {
                let this = self.clone();
                let image = Arc::clone(&image);
                let semaphore = Arc::clone(&semaphore);
                let (id, spec) = (id.to_string(), spec.clone());
                tokio::spawn(async move {
                    let permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return Err(FieldError::Worker(e.to_string())),
                    };
                    tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        this.extract_field(&image, &id, &spec)
                    })
                    .await
                    .map_err(|e| FieldError::Worker(e.to_string()))
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in fields.ids().zip(handles) {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(error)) => FieldOutcome::Failed { error },
                Err(e) => FieldOutcome::Failed { error: FieldError::Worker(e.to_string()) },
            };
            if matches!(outcome, FieldOutcome::NotFound { reason: NotFoundReason::TimedOut }) {
                tracing::debug!(field = id, "field timed out");
            }
            results.push(FieldResult { id: id.to_string(), outcome });
        }
        ExtractionResult { fields: results }
    }

    /// One result per page, in page order.
    pub fn extract_document(&self, pages: &[DynamicImage], fields: &FieldSpecMap) -> Vec<ExtractionResult> {
        pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let result = self.extract_page(page, fields);
                tracing::info!(page = i + 1, found = result.found_count(), total = fields.len(), "page extracted");
                result
            })
            .collect()
    }

    pub async fn extract_document_concurrent(
        &self,
        pages: Vec<DynamicImage>,
        fields: &FieldSpecMap,
    ) -> Vec<ExtractionResult> {
        let mut results = Vec::with_capacity(pages.len());
        for (i, page) in pages.into_iter().enumerate() {
            let result = self.extract_page_concurrent(Arc::new(page), fields).await;
            tracing::info!(page = i + 1, found = result.found_count(), total = fields.len(), "page extracted");
            results.push(result);
        }
        results
    }

    /// Rasterize a document on disk and extract every page.
    pub fn extract_file(
        &self,
        rasterizer: &dyn PageRasterizer,
        path: &Path,
        fields: &FieldSpecMap,
    ) -> Result<Vec<ExtractionResult>, PipelineError> {
        let pages = rasterizer.rasterize(path)?;
        tracing::info!(path = %path.display(), pages = pages.len(), "document rasterized");
        Ok(self.extract_document(&pages, fields))
    }

    fn worker_count(&self) -> usize {
        self.settings
            .workers
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1)
    }
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends new documents to `tx`.
/// Files that are neither PDFs nor readable images are ignored.
/// Returns the watcher; it must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths.into_iter().filter(|p| raster::is_supported(p)) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("intake queue full or closed, dropping document");
                    }
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
