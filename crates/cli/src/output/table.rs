use metamagic_ocr::{ExtractionResult, FieldOutcome, NotFoundReason};

pub fn print(results: &[ExtractionResult]) {
    print!("{}", format(results));
}

pub fn format(results: &[ExtractionResult]) -> String {
    let mut out = String::new();
    let multi_page = results.len() > 1;

    for (i, page) in results.iter().enumerate() {
        if multi_page {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("--- Page {} ---\n\n", i + 1));
        }

        let width = page.ids().map(str::len).max().unwrap_or(0);
        for field in &page.fields {
            out.push_str(&format!("  {:<width$}  {}\n", field.id, describe(&field.outcome)));
        }
        out.push_str(&format!("\n  {} of {} field(s) found\n", page.found_count(), page.fields.len()));
    }
    out
}

fn describe(outcome: &FieldOutcome) -> String {
    match outcome {
        FieldOutcome::Found { value, attempts: 0, .. } => format!("{:?}", value.trim()),
        FieldOutcome::Found { value, attempts, .. } => {
            format!("{:?}  (after {attempts} growth attempt(s))", value.trim())
        }
        FieldOutcome::NotFound { reason: NotFoundReason::Exhausted { attempts } } => {
            format!("-  (not found after {attempts} growth attempt(s))")
        }
        FieldOutcome::NotFound { reason: NotFoundReason::TimedOut } => "-  (timed out)".to_string(),
        FieldOutcome::Failed { error } => format!("!  {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metamagic_core::BoundingBox;
    use metamagic_ocr::{FieldError, FieldResult};

    fn page() -> ExtractionResult {
        ExtractionResult {
            fields: vec![
                FieldResult {
                    id: "po_number".into(),
                    outcome: FieldOutcome::Found {
                        value: "PO99X".into(),
                        attempts: 0,
                        region: BoundingBox::new(0.1, 0.1, 0.2, 0.2).unwrap(),
                    },
                },
                FieldResult {
                    id: "date".into(),
                    outcome: FieldOutcome::Failed { error: FieldError::Ocr("crashed".into()) },
                },
            ],
        }
    }

    #[test]
    fn single_page_has_no_header() {
        let text = format(&[page()]);
        assert!(!text.contains("Page"));
        assert!(text.contains("  po_number  \"PO99X\"\n"));
        assert!(text.contains("  date       !  OCR failed: crashed\n"));
        assert!(text.contains("1 of 2 field(s) found"));
    }

    #[test]
    fn pages_are_numbered() {
        let text = format(&[page(), page()]);
        assert!(text.contains("--- Page 1 ---"));
        assert!(text.contains("--- Page 2 ---"));
    }
}
