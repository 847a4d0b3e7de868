use metamagic_core::BoundingBox;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::dates::DateFormatError;

/// A field-level failure. It is recorded against that field only; the rest of
/// the page is still extracted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    #[error("date format error: {0}")]
    Date(#[from] DateFormatError),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("worker failed: {0}")]
    Worker(String),
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotFoundReason {
    /// Every growth attempt came back without a usable value.
    Exhausted { attempts: u32 },
    /// The field ran past its time budget.
    TimedOut,
}

/// Terminal state of one field on one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// A value was recognized. It may still be blank after post-processing
    /// (e.g. the allow-list removed every character).
    Found {
        value: String,
        /// Growth attempts it took; 0 means the configured region was enough.
        attempts: u32,
        /// The region the value was read from.
        region: BoundingBox,
    },
    NotFound {
        #[serde(flatten)]
        reason: NotFoundReason,
    },
    Failed { error: FieldError },
}

impl FieldOutcome {
    pub fn value(&self) -> Option<&str> {
        match self {
            FieldOutcome::Found { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldOutcome::Found { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldResult {
    pub id: String,
    pub outcome: FieldOutcome,
}

/// Per-field outcomes for one page, in layout order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub fields: Vec<FieldResult>,
}

impl ExtractionResult {
    pub fn get(&self, id: &str) -> Option<&FieldOutcome> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.outcome)
    }

    /// Found value for `id`, if any.
    pub fn value(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(FieldOutcome::value)
    }

    pub fn found_count(&self) -> usize {
        self.fields.iter().filter(|f| f.outcome.is_found()).count()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.id.as_str())
    }

    /// Identifier → value, with an empty string for anything not found.
    pub fn to_flat_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|f| {
                let value = f.outcome.value().unwrap_or_default().to_string();
                (f.id.clone(), serde_json::Value::String(value))
            })
            .collect()
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for f in &self.fields {
            map.serialize_entry(&f.id, &f.outcome)?;
        }
        map.end()
    }
}
