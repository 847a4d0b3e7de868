use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::charset::AllowedChars;
use crate::geometry::BoundingBox;

/// One problem found while checking a field layout or an extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Field identifier the problem belongs to, if any.
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn general(message: impl Into<String>) -> Self {
        Self { field: None, message: message.into() }
    }

    pub fn for_field(field: &str, message: impl Into<String>) -> Self {
        Self { field: Some(field.to_string()), message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// How to find and clean up a single field on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Region expected to contain the label and its value.
    pub bbox: BoundingBox,
    /// Literal label printed next to the value, e.g. `"Order Number"`.
    pub key: String,
    /// strftime-style pattern the value is re-rendered with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    /// When set, the label does not have to be recognized and is not stripped.
    pub optional_key_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_chars: Option<AllowedChars>,
    /// Read `03/04/2024` as 3 April instead of March 4.
    pub day_first: bool,
}

impl FieldSpec {
    pub fn new(bbox: BoundingBox, key: impl Into<String>) -> Self {
        Self {
            bbox,
            key: key.into(),
            date_format: None,
            optional_key_match: false,
            allowed_chars: None,
            day_first: false,
        }
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn with_optional_key_match(mut self, optional: bool) -> Self {
        self.optional_key_match = optional;
        self
    }

    pub fn with_allowed_chars(mut self, allowed: AllowedChars) -> Self {
        self.allowed_chars = Some(allowed);
        self
    }

    pub fn with_day_first(mut self, day_first: bool) -> Self {
        self.day_first = day_first;
        self
    }
}

/// Field identifier → spec, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSpecMap {
    fields: Vec<(String, FieldSpec)>,
}

impl Serialize for FieldSpecMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (id, spec) in &self.fields {
            map.serialize_entry(id, spec)?;
        }
        map.end()
    }
}

const KNOWN_MEMBERS: [&str; 6] =
    ["bbox", "key", "date_format", "optional_key_match", "allowed_chars", "day_first"];

impl FieldSpecMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any earlier spec with the same identifier in place.
    pub fn insert(&mut self, id: impl Into<String>, spec: FieldSpec) {
        let id = id.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = spec,
            None => self.fields.push((id, spec)),
        }
    }

    pub fn with_field(mut self, id: impl Into<String>, spec: FieldSpec) -> Self {
        self.insert(id, spec);
        self
    }

    pub fn get(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(f, _)| f == id).map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(id, spec)| (id.as_str(), spec))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a layout from an untyped document (parsed JSON or TOML),
    /// collecting every structural problem instead of stopping at the first.
    pub fn from_value(meta_data: Option<&Value>) -> Result<Self, Vec<ValidationError>> {
        let Some(Value::Object(entries)) = meta_data else {
            return Err(vec![ValidationError::general("meta_data must be a mapping")]);
        };

        let mut errors = Vec::new();
        let mut map = FieldSpecMap::new();
        for (id, entry) in entries {
            match parse_entry(id, entry) {
                Ok(spec) => map.insert(id.as_str(), spec),
                Err(mut errs) => errors.append(&mut errs),
            }
        }

        if errors.is_empty() {
            Ok(map)
        } else {
            Err(errors)
        }
    }
}

fn parse_entry(id: &str, entry: &Value) -> Result<FieldSpec, Vec<ValidationError>> {
    let Value::Object(members) = entry else {
        return Err(vec![ValidationError::for_field(id, "value must be a mapping")]);
    };

    let mut errors = Vec::new();
    for name in members.keys() {
        if !KNOWN_MEMBERS.contains(&name.as_str()) {
            errors.push(ValidationError::for_field(id, format!("unknown member '{name}'")));
        }
    }

    let bbox = parse_bbox(members.get("bbox"))
        .map_err(|msg| errors.push(ValidationError::for_field(id, msg)));

    let key = match members.get("key") {
        Some(Value::String(k)) => Some(k.clone()),
        _ => {
            errors.push(ValidationError::for_field(id, "'key' must be a string"));
            None
        }
    };

    let date_format = optional_str(members, "date_format")
        .and_then(|fmt| match fmt {
            Some(f) => validate_date_format(f).map(|_| Some(f.to_string())),
            None => Ok(None),
        })
        .map_err(|msg| errors.push(ValidationError::for_field(id, msg)))
        .ok()
        .flatten();

    let allowed_chars = optional_str(members, "allowed_chars")
        .and_then(|frag| match frag {
            Some(f) => AllowedChars::parse(f)
                .map(Some)
                .map_err(|e| format!("'allowed_chars' is invalid: {e}")),
            None => Ok(None),
        })
        .map_err(|msg| errors.push(ValidationError::for_field(id, msg)))
        .ok()
        .flatten();

    let optional_key_match = optional_bool(members, "optional_key_match")
        .map_err(|msg| errors.push(ValidationError::for_field(id, msg)))
        .unwrap_or(false);
    let day_first = optional_bool(members, "day_first")
        .map_err(|msg| errors.push(ValidationError::for_field(id, msg)))
        .unwrap_or(false);

    match (bbox, key) {
        (Ok(bbox), Some(key)) if errors.is_empty() => Ok(FieldSpec {
            bbox,
            key,
            date_format,
            optional_key_match,
            allowed_chars,
            day_first,
        }),
        _ => Err(errors),
    }
}

fn parse_bbox(value: Option<&Value>) -> Result<BoundingBox, String> {
    const SHAPE: &str = "'bbox' must be a list of four numbers";
    let Some(Value::Array(items)) = value else {
        return Err(SHAPE.to_string());
    };
    if items.len() != 4 {
        return Err(SHAPE.to_string());
    }
    let mut coords = [0.0f64; 4];
    for (slot, item) in coords.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(|| SHAPE.to_string())?;
    }
    BoundingBox::try_from(coords).map_err(|e| format!("'bbox' is invalid: {e}"))
}

/// A missing, null or empty string member counts as unset.
fn optional_str<'a>(members: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>, String> {
    match members.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(format!("'{name}' must be a string")),
    }
}

fn optional_bool(members: &Map<String, Value>, name: &str) -> Result<bool, String> {
    match members.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("'{name}' must be a boolean")),
    }
}

/// Reject strftime patterns chrono cannot render for a plain calendar date.
///
/// Parsing alone is not enough: `%z` or `%Z` parse fine but need an offset
/// that a date read from a document never has, so a sample date is rendered too.
pub fn validate_date_format(format: &str) -> Result<(), String> {
    let items = StrftimeItems::new(format);
    if items.clone().any(|item| matches!(item, Item::Error)) {
        return Err(format!("'date_format' \"{format}\" is not a valid strftime pattern"));
    }
    let sample = NaiveDate::from_ymd_opt(2024, 1, 5)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| "sample date is invalid".to_string())?;
    let mut rendered = String::new();
    fmt::write(&mut rendered, format_args!("{}", sample.format_with_items(items)))
        .map_err(|_| format!("'date_format' \"{format}\" cannot be rendered from a calendar date"))?;
    Ok(())
}
