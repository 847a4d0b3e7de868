//! Label policy applied to recognized text.

/// What the label check found in a piece of recognized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMatch {
    /// Label not required; text returned as recognized.
    Skipped(String),
    /// Label found and removed; holds the rest of the text.
    Stripped(String),
    Missing,
}

impl KeyMatch {
    /// The text handed on to the retry loop. Empty means "try a bigger region".
    pub fn into_text(self) -> String {
        match self {
            KeyMatch::Skipped(text) | KeyMatch::Stripped(text) => text,
            KeyMatch::Missing => String::new(),
        }
    }

    /// Label was present but nothing else was recognized next to it.
    pub fn is_label_only(&self) -> bool {
        matches!(self, KeyMatch::Stripped(rest) if rest.is_empty())
    }
}

pub struct TextMatcher;

impl TextMatcher {
    /// Classify `raw_text` against the field's label.
    ///
    /// Only the first occurrence of `key` is removed and the remainder is not
    /// trimmed again.
    pub fn classify(raw_text: &str, key: &str, optional_key_match: bool) -> KeyMatch {
        if optional_key_match {
            return KeyMatch::Skipped(raw_text.to_string());
        }
        match raw_text.find(key) {
            Some(start) => {
                let mut rest = String::with_capacity(raw_text.len() - key.len());
                rest.push_str(&raw_text[..start]);
                rest.push_str(&raw_text[start + key.len()..]);
                KeyMatch::Stripped(rest)
            }
            None => KeyMatch::Missing,
        }
    }

    pub fn apply(raw_text: &str, key: &str, optional_key_match: bool) -> String {
        Self::classify(raw_text, key, optional_key_match).into_text()
    }
}
