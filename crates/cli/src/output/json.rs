use metamagic_ocr::ExtractionResult;
use serde_json::{json, Value};
use std::path::Path;

fn document(path: &Path, results: &[ExtractionResult]) -> Value {
    json!({
        "document": path.display().to_string(),
        "pages": results,
    })
}

pub fn render(path: &Path, results: &[ExtractionResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&document(path, results))
}

/// Single-line form for streaming output.
pub fn render_line(path: &Path, results: &[ExtractionResult]) -> serde_json::Result<String> {
    serde_json::to_string(&document(path, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metamagic_core::BoundingBox;
    use metamagic_ocr::{FieldOutcome, FieldResult, NotFoundReason};

    #[test]
    fn pages_keep_field_order_and_status() {
        let page = ExtractionResult {
            fields: vec![
                FieldResult {
                    id: "po_number".into(),
                    outcome: FieldOutcome::Found {
                        value: "PO99X".into(),
                        attempts: 1,
                        region: BoundingBox::new(0.1, 0.1, 0.2, 0.2).unwrap(),
                    },
                },
                FieldResult {
                    id: "delivery_date".into(),
                    outcome: FieldOutcome::NotFound { reason: NotFoundReason::TimedOut },
                },
            ],
        };
        let line = render_line(Path::new("po.pdf"), &[page]).unwrap();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["document"], "po.pdf");
        assert_eq!(v["pages"][0]["po_number"]["value"], "PO99X");
        assert_eq!(v["pages"][0]["delivery_date"]["reason"], "timed_out");
        assert!(!line.contains('\n'));
    }
}
