//! Applicant data records

use crate::schema::{FormSchema, InputKind};
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::collections::HashMap;

/// A single input value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Encoded image bytes (JPEG or PNG)
    Image(Vec<u8>),
    /// Several uploaded images; only the first is drawn
    ImageList(Vec<Vec<u8>>),
}

impl FieldValue {
    /// Empty strings and empty uploads count as no value
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Image(bytes) => bytes.is_empty(),
            Self::ImageList(list) => list.iter().all(|b| b.is_empty()),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_) | Self::ImageList(_))
    }

    /// First non-empty image payload
    pub fn first_image(&self) -> Option<&[u8]> {
        match self {
            Self::Image(bytes) if !bytes.is_empty() => Some(bytes.as_slice()),
            Self::ImageList(list) => list.iter().find(|b| !b.is_empty()).map(Vec::as_slice),
            _ => None,
        }
    }

    /// String drawn for text fields; integral numbers print without a fraction
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Image(_) | Self::ImageList(_) => String::new(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Field id -> value for one fill request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRecord {
    values: HashMap<String, FieldValue>,
}

impl DataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, id: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: &str, value: impl Into<FieldValue>) {
        self.values.insert(id.to_string(), value.into());
    }

    /// Non-empty value for `id`
    pub fn value(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id).filter(|v| !v.is_empty())
    }

    /// Raw value for `id`, empty or not
    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a JSON object of field values
    ///
    /// `data:image/...;base64,` strings (alone or in arrays) become image
    /// payloads; `null` and nested objects are dropped.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let mut record = Self::new();
        let Some(object) = value.as_object() else {
            log::warn!("data record is not a JSON object, ignoring it");
            return record;
        };

        for (id, raw) in object {
            match convert(id, raw) {
                Some(value) => {
                    record.values.insert(id.clone(), value);
                }
                None => log::debug!("dropping value of field {id}"),
            }
        }
        record
    }

    /// Coerce loosely-typed input using the schema's input kinds
    ///
    /// Numeric strings in `number` fields become numbers; "true"/"false" in
    /// `checkbox` fields become booleans. Other values are kept as given.
    pub fn coerce(&mut self, schema: &FormSchema) {
        for spec in &schema.fields {
            let Some(FieldValue::Text(text)) = self.values.get(&spec.id) else {
                continue;
            };
            let coerced = match spec.kind {
                InputKind::Number => text.trim().parse::<f64>().ok().map(FieldValue::Number),
                InputKind::Checkbox => match text.as_str() {
                    "true" => Some(FieldValue::Bool(true)),
                    "false" => Some(FieldValue::Bool(false)),
                    _ => None,
                },
                _ => None,
            };
            if let Some(value) = coerced {
                self.values.insert(spec.id.clone(), value);
            }
        }
    }
}

fn convert(id: &str, raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) if is_data_url(s) => match decode_data_url(s) {
            Some(bytes) => Some(FieldValue::Image(bytes)),
            None => {
                log::warn!("field {id}: image data URL is not valid base64");
                None
            }
        },
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Array(items) if items.iter().all(|v| v.as_str().is_some_and(is_data_url)) => {
            let images = items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(decode_data_url)
                .collect();
            Some(FieldValue::ImageList(images))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| convert(id, v))
                .map(|v| v.display())
                .filter(|s| !s.is_empty())
                .collect();
            Some(FieldValue::Text(parts.join(", ")))
        }
        Value::Object(_) => None,
    }
}

fn is_data_url(s: &str) -> bool {
    s.starts_with("data:image/") && s.contains(";base64,")
}

fn decode_data_url(s: &str) -> Option<Vec<u8>> {
    let (_, payload) = s.split_once(";base64,")?;
    STANDARD.decode(payload.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Number(42.0).display(), "42");
        assert_eq!(FieldValue::Number(-3.0).display(), "-3");
        assert_eq!(FieldValue::Number(2.5).display(), "2.5");
        assert_eq!(FieldValue::Bool(true).display(), "true");
        assert_eq!(FieldValue::from("محمد").display(), "محمد");
        assert_eq!(FieldValue::Image(vec![1]).display(), "");
    }

    #[test]
    fn test_is_empty() {
        assert!(FieldValue::from("").is_empty());
        assert!(FieldValue::ImageList(vec![]).is_empty());
        assert!(FieldValue::Image(vec![]).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Number(0.0).is_empty());
    }

    #[test]
    fn test_first_image() {
        let list = FieldValue::ImageList(vec![vec![], vec![1, 2], vec![3]]);
        assert_eq!(list.first_image(), Some(&[1u8, 2][..]));
        assert_eq!(FieldValue::from("x").first_image(), None);
    }

    #[test]
    fn test_value_skips_empty() {
        let record = DataRecord::new().with("a", "").with("b", "x");
        assert!(record.value("a").is_none());
        assert!(record.get("a").is_some());
        assert_eq!(record.value("b"), Some(&FieldValue::from("x")));
        assert!(record.value("c").is_none());
    }

    #[test]
    fn test_from_json() {
        let png = STANDARD.encode([0x89, b'P', b'N', b'G']);
        let json = format!(
            r#"{{
                "firstName": "محمد",
                "age": 31,
                "agree": true,
                "middleName": null,
                "address": {{"city": "Beirut"}},
                "chamsiyePic": "data:image/png;base64,{png}",
                "uploads": ["data:image/jpeg;base64,{png}"],
                "tags": ["a", 2]
            }}"#
        );
        let record = DataRecord::from_json(&json).unwrap();

        assert_eq!(record.len(), 6);
        assert_eq!(record.value("firstName"), Some(&FieldValue::from("محمد")));
        assert_eq!(record.value("age"), Some(&FieldValue::Number(31.0)));
        assert_eq!(record.value("agree"), Some(&FieldValue::Bool(true)));
        assert!(record.get("middleName").is_none());
        assert!(record.get("address").is_none());
        assert_eq!(
            record.value("chamsiyePic"),
            Some(&FieldValue::Image(vec![0x89, b'P', b'N', b'G']))
        );
        assert!(record.value("uploads").unwrap().is_image());
        assert_eq!(record.value("tags"), Some(&FieldValue::from("a, 2")));
    }

    #[test]
    fn test_from_json_bad_data_url_dropped() {
        let record =
            DataRecord::from_json(r#"{"photo": "data:image/png;base64,@@@"}"#).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_from_json_not_object() {
        assert!(DataRecord::from_json("[1, 2]").unwrap().is_empty());
        assert!(DataRecord::from_json("{").is_err());
    }

    #[test]
    fn test_coerce_with_schema() {
        let schema = FormSchema::from_json(
            r#"{"title": "t", "fields": [
                {"id": "age", "label": "", "type": "number"},
                {"id": "agree", "label": "", "type": "checkbox"},
                {"id": "male", "label": "", "type": "checkbox"},
                {"id": "phone", "label": "", "type": "tel"}
            ]}"#,
        )
        .unwrap();
        let mut record = DataRecord::new()
            .with("age", " 31 ")
            .with("agree", "true")
            .with("male", "ذكر")
            .with("phone", "0123");
        record.coerce(&schema);

        assert_eq!(record.value("age"), Some(&FieldValue::Number(31.0)));
        assert_eq!(record.value("agree"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.value("male"), Some(&FieldValue::from("ذكر")));
        assert_eq!(record.value("phone"), Some(&FieldValue::from("0123")));
    }
}
