use metamagic_core::{AllowedChars, FieldSpec};

use crate::dates::{DateFormatError, DateNormalizer};

/// Clean-up applied to a found value: date re-rendering first, then the
/// character allow-list. Either step is skipped when the field does not ask
/// for it.
#[derive(Debug, Clone, Default)]
pub struct PostProcessor {
    date: Option<DateNormalizer>,
    allowed: Option<AllowedChars>,
}

impl PostProcessor {
    pub fn for_field(spec: &FieldSpec, reference_year: Option<i32>) -> Self {
        let date = spec.date_format.as_ref().map(|fmt| {
            let normalizer = DateNormalizer::new(fmt.as_str()).day_first(spec.day_first);
            match reference_year {
                Some(year) => normalizer.reference_year(year),
                None => normalizer,
            }
        });
        Self { date, allowed: spec.allowed_chars.clone() }
    }

    pub fn is_noop(&self) -> bool {
        self.date.is_none() && self.allowed.is_none()
    }

    pub fn apply(&self, text: String) -> Result<String, DateFormatError> {
        let text = match &self.date {
            Some(normalizer) => normalizer.normalize(&text)?,
            None => text,
        };
        Ok(match &self.allowed {
            Some(allowed) => allowed.filter(&text),
            None => text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metamagic_core::BoundingBox;

    fn spec() -> FieldSpec {
        FieldSpec::new(BoundingBox::new(0.1, 0.1, 0.2, 0.2).unwrap(), "Key")
    }

    #[test]
    fn plain_field_passes_value_through_untouched() {
        let p = PostProcessor::for_field(&spec(), None);
        assert!(p.is_noop());
        assert_eq!(p.apply(" 12345".into()).unwrap(), " 12345");
    }

    #[test]
    fn allow_list_only() {
        let s = spec().with_allowed_chars(AllowedChars::parse("0-9A-Za-z").unwrap());
        let p = PostProcessor::for_field(&s, None);
        assert_eq!(p.apply(": PO-99X".into()).unwrap(), "PO99X");
    }

    #[test]
    fn date_then_allow_list() {
        let s = spec()
            .with_date_format("%d-%b-%y")
            .with_allowed_chars(AllowedChars::parse("0-9").unwrap());
        let p = PostProcessor::for_field(&s, Some(2024));
        assert_eq!(p.apply(" Jan 5, 2024".into()).unwrap(), "0524");
    }

    #[test]
    fn day_first_and_reference_year_reach_the_normalizer() {
        let s = spec().with_date_format("%Y-%m-%d").with_day_first(true);
        let p = PostProcessor::for_field(&s, Some(2031));
        assert_eq!(p.apply("03/04/2024".into()).unwrap(), "2024-04-03");
        assert_eq!(p.apply("on 9 May".into()).unwrap(), "2031-05-09");
    }

    #[test]
    fn date_failure_propagates() {
        let p = PostProcessor::for_field(&spec().with_date_format("%d-%b-%y"), None);
        assert!(matches!(p.apply("no date here".into()), Err(DateFormatError::NoDate(_))));
    }
}
