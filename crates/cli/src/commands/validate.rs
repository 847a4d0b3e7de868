use anyhow::bail;
use metamagic_core::{ConfigError, Layout};
use std::path::Path;

/// Regions narrower or shorter than this fraction of the page rarely hold a
/// readable line of text.
const SMALL_REGION: f64 = 0.01;

pub fn run(file: &Path) -> anyhow::Result<()> {
    let layout = match Layout::from_path(file) {
        Ok(layout) => layout,
        Err(ConfigError::Invalid(errors)) => {
            eprintln!("{} is invalid:", file.display());
            for e in &errors {
                eprintln!("  - {e}");
            }
            bail!("{} problem(s) found", errors.len());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Layout {} is valid.", file.display());
    println!("  Fields: {}", layout.fields.ids().collect::<Vec<_>>().join(", "));
    println!(
        "  Growth: up to {} attempt(s) at {:.0}%",
        layout.extraction.max_attempts,
        layout.extraction.growth_factor * 100.0
    );

    let warnings = warnings(&layout);
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }
    Ok(())
}

fn warnings(layout: &Layout) -> Vec<String> {
    let mut warnings = Vec::new();
    if layout.fields.is_empty() {
        warnings.push("layout declares no fields".to_string());
    }
    if layout.extraction.max_attempts == 0 {
        warnings.push("max_attempts is 0: regions are never grown".to_string());
    }
    for (id, spec) in layout.fields.iter() {
        if spec.bbox.width() < SMALL_REGION || spec.bbox.height() < SMALL_REGION {
            warnings.push(format!("field '{id}' has a very small region {}", spec.bbox));
        }
        if spec.key.trim().is_empty() && !spec.optional_key_match {
            warnings.push(format!("field '{id}' has an empty key, so the label check always passes"));
        }
    }
    warnings
}
