use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::charset::AllowedChars;
use crate::geometry::{BoundingBox, DEFAULT_GROWTH_FACTOR};
use crate::spec::{FieldSpec, FieldSpecMap, ValidationError};

/// Growth attempts made after the first read when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported layout file extension: '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),
    #[error("Layout is invalid:\n{}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n")
}

/// Run-wide knobs for the retry loop and the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionSettings {
    /// Growth attempts after the first read before a field is given up on.
    pub max_attempts: u32,
    /// Linear growth per attempt; compounds across attempts.
    pub growth_factor: f64,
    /// Per-field wall-clock budget. Unset means no limit.
    pub field_timeout_ms: Option<u64>,
    /// Concurrent fields; unset means one per CPU core.
    pub workers: Option<usize>,
    /// Where to keep every crop handed to OCR. Unset disables crop dumps.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            field_timeout_ms: None,
            workers: None,
            diagnostics_dir: None,
        }
    }
}

impl ExtractionSettings {
    pub fn field_timeout(&self) -> Option<Duration> {
        self.field_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(self.growth_factor.is_finite() && self.growth_factor > 0.0) {
            errors.push(ValidationError::general(format!(
                "extraction.growth_factor must be a positive number, got {}",
                self.growth_factor
            )));
        }
        if self.workers == Some(0) {
            errors.push(ValidationError::general("extraction.workers must be at least 1"));
        }
        if self.field_timeout_ms == Some(0) {
            errors.push(ValidationError::general("extraction.field_timeout_ms must be at least 1"));
        }
        errors
    }
}

/// A field layout plus the settings it should be run with, as authored in a
/// `.toml` or `.json` file:
///
/// ```toml
/// [extraction]
/// max_attempts = 5
///
/// [fields.po_number]
/// bbox = [0.36, 0.10, 0.65, 0.12]
/// key = "Order Number"
/// allowed_chars = "0-9A-Za-z"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub extraction: ExtractionSettings,
    pub fields: FieldSpecMap,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutDocument {
    #[serde(default)]
    extraction: ExtractionSettings,
    fields: Option<serde_json::Value>,
}

impl Layout {
    pub fn new(fields: FieldSpecMap) -> Self {
        Self { extraction: ExtractionSettings::default(), fields }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let doc: LayoutDocument = toml::from_str(content)?;
        Self::from_document(doc)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let doc: LayoutDocument = serde_json::from_str(content)?;
        Self::from_document(doc)
    }

    /// Load a layout file, picking the parser from its extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }

    fn from_document(doc: LayoutDocument) -> Result<Self, ConfigError> {
        let mut errors = doc.extraction.validate();
        let fields = match FieldSpecMap::from_value(doc.fields.as_ref()) {
            Ok(fields) => Some(fields),
            Err(mut errs) => {
                errors.append(&mut errs);
                None
            }
        };
        match fields {
            Some(fields) if errors.is_empty() => Ok(Self { extraction: doc.extraction, fields }),
            _ => Err(ConfigError::Invalid(errors)),
        }
    }

    /// The purchase-order layout the tool was first built around.
    pub fn purchase_order() -> Self {
        let fields = FieldSpecMap::new()
            .with_field(
                "delivery_date",
                FieldSpec::new(preset_bbox(0.35, 0.13, 0.64, 0.15), "Date of delivery")
                    .with_date_format("%d-%b-%y"),
            )
            .with_field(
                "delivery_address",
                FieldSpec::new(preset_bbox(0.34, 0.17, 0.67, 0.25), "Delivery address")
                    .with_optional_key_match(true),
            )
            .with_field(
                "po_number",
                FieldSpec::new(preset_bbox(0.36, 0.10, 0.65, 0.12), "Order Number")
                    .with_allowed_chars(
                        AllowedChars::parse("0-9A-Za-z").expect("preset allow-list is valid"),
                    ),
            );
        Self::new(fields)
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "purchase-order" | "po" => Some(Self::purchase_order()),
            _ => None,
        }
    }
}

fn preset_bbox(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> BoundingBox {
    BoundingBox::new(x_min, y_min, x_max, y_max).expect("preset bbox is valid")
}
