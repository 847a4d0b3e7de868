use image::DynamicImage;
use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::raster;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image encode error: {0}")]
    ImageEncode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available: install tesseract-ocr or build with `tesseract` feature")]
    NotAvailable,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstraction over an OCR backend.
/// Implementations receive one cropped page region and return the recognized
/// text. They know nothing about field labels, dates or allow-lists.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, region: &DynamicImage) -> Result<String, OcrError>;
}

/// Closures are backends too; tests use them to answer per crop geometry.
impl<F> OcrBackend for F
where
    F: Fn(&DynamicImage) -> Result<String, OcrError> + Send + Sync,
{
    fn recognize(&self, region: &DynamicImage) -> Result<String, OcrError> {
        self(region)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string for every region.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _region: &DynamicImage) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract executable ──────────────────────────────────────────────────────

/// Pipes each region as PNG through the `tesseract` command-line tool.
pub struct TesseractCli {
    lang: String,
    program: String,
}

impl TesseractCli {
    pub fn new(lang: &str) -> Self {
        Self { lang: lang.to_string(), program: "tesseract".to_string() }
    }

    /// Use a specific executable instead of `tesseract` from `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, region: &DynamicImage) -> Result<String, OcrError> {
        let png = raster::encode_png(region).map_err(|e| OcrError::ImageEncode(e.to_string()))?;

        let mut child = match Command::new(&self.program)
            .args(["stdin", "stdout", "-l", &self.lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(OcrError::NotAvailable),
            Err(e) => return Err(OcrError::Io(e)),
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png)?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!("tesseract failed: {}", stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Tesseract library backend (optional, gated behind `tesseract` feature) ────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::raster;
    use image::DynamicImage;
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, region: &DynamicImage) -> Result<String, OcrError> {
            let png =
                raster::encode_png(region).map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
