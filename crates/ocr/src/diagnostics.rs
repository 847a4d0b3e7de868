//! Optional side channel that keeps every crop handed to OCR, for tuning
//! field layouts by eye.

use image::DynamicImage;
use metamagic_core::BoundingBox;
use std::path::PathBuf;

use crate::hash;
use crate::raster;

pub trait CropSink: Send + Sync {
    fn record(&self, field: &str, attempt: u32, region: &BoundingBox, crop: &DynamicImage);
}

/// Discards everything. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl CropSink for NoopSink {
    fn record(&self, _field: &str, _attempt: u32, _region: &BoundingBox, _crop: &DynamicImage) {}
}

/// Writes each crop as PNG under `<dir>/<field>/`, named by attempt and
/// content hash so identical crops land on the same file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write(&self, field: &str, attempt: u32, crop: &DynamicImage) -> Result<PathBuf, String> {
        let png = raster::encode_png(crop).map_err(|e| e.to_string())?;
        let hash_hex = hash::to_hex(&hash::sha256_bytes(&png));
        let dest = hash::crop_path(&self.dir, field, attempt, &hash_hex);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&dest, png).map_err(|e| e.to_string())?;
        Ok(dest)
    }
}

impl CropSink for DirectorySink {
    fn record(&self, field: &str, attempt: u32, region: &BoundingBox, crop: &DynamicImage) {
        // A failed dump must never fail the extraction.
        match self.write(field, attempt, crop) {
            Ok(path) => tracing::trace!(field, attempt, %region, path = %path.display(), "crop saved"),
            Err(e) => tracing::warn!(field, attempt, "could not save crop: {e}"),
        }
    }
}
