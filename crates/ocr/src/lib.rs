pub mod dates;
pub mod diagnostics;
pub mod field;
pub mod hash;
pub mod matcher;
pub mod pipeline;
pub mod postprocess;
pub mod raster;
pub mod recognizer;
pub mod types;

pub use dates::{parse_fuzzy, DateFormatError, DateNormalizer};
pub use diagnostics::{CropSink, DirectorySink, NoopSink};
pub use field::{FieldExtractor, RetryController, RetryOutcome, RetryPolicy};
pub use matcher::{KeyMatch, TextMatcher};
pub use pipeline::{spawn_intake_watcher, MetadataExtractor, PipelineError};
pub use postprocess::PostProcessor;
pub use raster::{DocumentRasterizer, ImageFileRasterizer, PageRasterizer, PdftoppmRasterizer, RasterError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, TesseractCli};
pub use types::{ExtractionResult, FieldError, FieldOutcome, FieldResult, NotFoundReason};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
