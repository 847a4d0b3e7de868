//! End-to-end runs of the field pipeline against synthetic pages and
//! geometry-aware fake OCR engines.

use std::sync::{Arc, Mutex};

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use metamagic_core::{BoundingBox, Layout};
use metamagic_ocr::{
    CropSink, ExtractionResult, FieldError, FieldOutcome, MetadataExtractor, NotFoundReason, OcrError,
};
use serde_json::json;

fn page() -> DynamicImage {
    let img: GrayImage = ImageBuffer::from_fn(1000, 1000, |_, _| Luma([255u8]));
    DynamicImage::ImageLuma8(img)
}

fn backend<F>(f: F) -> F
where
    F: Fn(&DynamicImage) -> Result<String, OcrError> + Send + Sync,
{
    f
}

#[test]
fn po_number_label_stripped_and_filtered() {
    let meta = json!({
        "po_number": {
            "bbox": [0.36, 0.10, 0.65, 0.12],
            "key": "Order Number",
            "allowed_chars": "0-9A-Za-z"
        }
    });
    // Only the configured crop (290x20 px) carries the field.
    let extractor = MetadataExtractor::new(backend(|crop: &DynamicImage| {
        Ok(if (crop.width(), crop.height()) == (290, 20) {
            "Order Number: PO-99X".to_string()
        } else {
            String::new()
        })
    }));

    let result = extractor.extract_meta(Some(&page()), Some(&meta)).unwrap();
    assert_eq!(serde_json::Value::Object(result.to_flat_map()), json!({ "po_number": "PO99X" }));
    assert!(matches!(result.get("po_number"), Some(FieldOutcome::Found { attempts: 0, .. })));
}

#[test]
fn missing_meta_data_yields_errors_and_no_result() {
    let extractor = MetadataExtractor::new(backend(|_: &DynamicImage| Ok("anything".to_string())));
    let errors = extractor.extract_meta(Some(&page()), None).unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn structural_problems_are_all_reported() {
    let meta = json!({
        "a": { "bbox": [0.1, 0.1, 0.2], "key": "A" },
        "b": { "bbox": [0.1, 0.1, 0.2, 0.2] },
        "c": "not a mapping"
    });
    let extractor = MetadataExtractor::new(backend(|_: &DynamicImage| Ok(String::new())));
    let errors = extractor.extract_meta(None, Some(&meta)).unwrap_err();
    let fields: Vec<_> = errors.iter().filter_map(|e| e.field.as_deref()).collect();
    assert!(fields.contains(&"a"));
    assert!(fields.contains(&"b"));
    assert!(fields.contains(&"c"));
    assert!(errors.iter().any(|e| e.field.is_none() && e.message.contains("image")));
}

#[test]
fn one_bad_date_does_not_blank_the_page() {
    let layout = Layout::purchase_order();
    let extractor = MetadataExtractor::new(backend(|_: &DynamicImage| {
        Ok("Order Number 4711\nDate of delivery: ASAP\nDelivery address 1 Main St".to_string())
    }));

    let result = extractor.extract_page(&page(), &layout.fields);
    assert!(matches!(
        result.get("delivery_date"),
        Some(FieldOutcome::Failed { error: FieldError::Date(_) })
    ));
    assert_eq!(result.value("po_number"), Some("4711DateofdeliveryASAPDeliveryaddress1MainSt"));
    assert!(result.value("delivery_address").is_some());
    assert_eq!(result.to_flat_map()["delivery_date"], "");
}

#[test]
fn field_found_only_after_growth() {
    // The value sits just right of the configured region; it appears once the
    // crop has grown past 330 px.
    let layout = Layout::purchase_order();
    let extractor = MetadataExtractor::new(backend(|crop: &DynamicImage| {
        Ok(if crop.width() > 330 { "Order Number A1".to_string() } else { "Order Number".to_string() })
    }));

    let result = extractor.extract_page(&page(), &layout.fields);
    match result.get("po_number") {
        Some(FieldOutcome::Found { value, attempts, region }) => {
            assert_eq!(value, "A1");
            assert!(*attempts > 0);
            let configured = BoundingBox::new(0.36, 0.10, 0.65, 0.12).unwrap();
            assert!(region.contains(&configured));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn exhausted_field_is_distinct_from_blank_value() {
    let meta = json!({
        "total": { "bbox": [0.1, 0.1, 0.3, 0.2], "key": "Total", "allowed_chars": "0-9" },
        "ref": { "bbox": [0.1, 0.3, 0.3, 0.4], "key": "Ref" }
    });
    let extractor = MetadataExtractor::new(backend(|crop: &DynamicImage| {
        Ok(if crop.height() >= 100 && crop.height() < 110 { "Total: n/a".to_string() } else { String::new() })
    }));
    let result = extractor.extract_meta(Some(&page()), Some(&meta)).unwrap();

    // Found, but the allow-list left nothing.
    assert_eq!(result.value("total"), Some(""));
    assert_eq!(
        result.get("ref"),
        Some(&FieldOutcome::NotFound { reason: NotFoundReason::Exhausted { attempts: 5 } })
    );
}

#[derive(Default)]
struct Recording(Mutex<Vec<(String, u32)>>);

impl CropSink for Recording {
    fn record(&self, field: &str, attempt: u32, _region: &BoundingBox, _crop: &DynamicImage) {
        self.0.lock().unwrap().push((field.to_string(), attempt));
    }
}

#[test]
fn every_attempt_reaches_the_crop_sink() {
    let sink = Arc::new(Recording::default());
    let meta = json!({ "ref": { "bbox": [0.1, 0.3, 0.3, 0.4], "key": "Ref" } });
    let extractor = MetadataExtractor::new(backend(|_: &DynamicImage| Ok(String::new())))
        .with_sink(sink.clone());
    extractor.extract_meta(Some(&page()), Some(&meta)).unwrap();

    let seen = sink.0.lock().unwrap();
    let attempts: Vec<u32> = seen.iter().map(|(_, a)| *a).collect();
    assert_eq!(attempts, vec![0, 1, 2, 3, 4, 5]);
    assert!(seen.iter().all(|(f, _)| f == "ref"));
}

#[tokio::test]
async fn concurrent_and_sequential_agree() {
    let layout = Layout::purchase_order();
    let extractor = MetadataExtractor::new(backend(|crop: &DynamicImage| {
        Ok(format!("Order Number {} Date of delivery 2024-07-28 Delivery address {}", crop.width(), crop.height()))
    }))
    .with_reference_year(2024);

    let sequential: ExtractionResult = extractor.extract_page(&page(), &layout.fields);
    let concurrent = extractor.extract_page_concurrent(Arc::new(page()), &layout.fields).await;
    assert_eq!(sequential, concurrent);
    assert_eq!(concurrent.value("delivery_date"), Some("28-Jul-24"));
    assert_eq!(
        concurrent.ids().collect::<Vec<_>>(),
        vec!["delivery_date", "delivery_address", "po_number"]
    );
}
