use std::time::Instant;

use image::DynamicImage;
use metamagic_core::{BoundingBox, DEFAULT_GROWTH_FACTOR, DEFAULT_MAX_ATTEMPTS};

use crate::diagnostics::CropSink;
use crate::matcher::{KeyMatch, TextMatcher};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::NotFoundReason;

/// One attempt at reading a field: crop, recognize, check the label.
pub struct FieldExtractor<'a> {
    recognizer: &'a dyn OcrBackend,
    sink: &'a dyn CropSink,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(recognizer: &'a dyn OcrBackend, sink: &'a dyn CropSink) -> Self {
        Self { recognizer, sink }
    }

    pub fn extract(
        &self,
        image: &DynamicImage,
        field: &str,
        attempt: u32,
        bbox: &BoundingBox,
        key: &str,
        optional_key_match: bool,
    ) -> Result<KeyMatch, OcrError> {
        let rect = bbox.to_pixels(image.width(), image.height());
        let crop = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
        self.sink.record(field, attempt, bbox, &crop);

        let raw = self.recognizer.recognize(&crop)?;
        Ok(TextMatcher::classify(raw.trim(), key, optional_key_match))
    }
}

/// Growth limits for one field.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Growth attempts allowed after the first read.
    pub max_attempts: u32,
    /// Fraction added per axis on each retry; zero, negative or non-finite
    /// values retry the same region.
    pub growth_factor: f64,
    /// Checked between attempts; an attempt already running is not interrupted.
    pub deadline: Option<Instant>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Found { text: String, attempts: u32, region: BoundingBox },
    NotFound(NotFoundReason),
}

/// Re-runs a [`FieldExtractor`] on an ever larger region until it yields text.
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn run(
        &self,
        extractor: &FieldExtractor<'_>,
        image: &DynamicImage,
        field: &str,
        bbox: BoundingBox,
        key: &str,
        optional_key_match: bool,
    ) -> Result<RetryOutcome, OcrError> {
        let mut attempt = 0;
        let mut region = bbox;
        loop {
            let matched = extractor.extract(image, field, attempt, &region, key, optional_key_match)?;
            if matched.is_label_only() {
                tracing::debug!(field, attempt, %region, "label without value");
            }
            let text = matched.into_text();
            if !text.is_empty() {
                tracing::debug!(field, attempt, %region, "field found");
                return Ok(RetryOutcome::Found { text, attempts: attempt, region });
            }

            if attempt >= self.policy.max_attempts {
                tracing::debug!(field, attempts = attempt, "growth attempts exhausted");
                return Ok(RetryOutcome::NotFound(NotFoundReason::Exhausted { attempts: attempt }));
            }
            if self.policy.deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::debug!(field, attempts = attempt, "field timed out");
                return Ok(RetryOutcome::NotFound(NotFoundReason::TimedOut));
            }

            let grown = region.grow(self.policy.growth_factor);
            tracing::trace!(field, attempt = attempt + 1, from = %region, to = %grown, "growing region");
            attempt += 1;
            region = grown;
        }
    }
}
