//! Field mapping types (`mapping.json`)

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a mapped field is drawn
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Shaped text; dropdown selections are drawn as their option text
    #[default]
    #[serde(alias = "select", alias = "dropdown")]
    Text,
    /// Checkbox mark
    #[serde(alias = "checkbox")]
    Mark,
    /// Photo
    Image,
    /// Anything else; never drawn
    #[serde(other)]
    Unknown,
}

/// Where one field is drawn
///
/// Coordinates are page units with the origin at the bottom-left corner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub field_id: String,

    pub x: f64,

    pub y: f64,

    /// 0-based page index; the live widget's page, else page 0, when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(default, rename = "type")]
    pub kind: FieldKind,
}

/// One element of the `fields` array
#[derive(Debug, Clone, PartialEq)]
pub enum MappingEntry {
    Field(FieldMapping),
    /// Entry that does not describe a field; only this entry is lost
    Malformed {
        field_id: Option<String>,
        reason: String,
    },
}

impl MappingEntry {
    fn from_value(value: Value) -> Self {
        let field_id = value
            .get("fieldId")
            .and_then(Value::as_str)
            .map(str::to_string);
        match serde_json::from_value(value) {
            Ok(field) => Self::Field(field),
            Err(e) => Self::Malformed {
                field_id,
                reason: e.to_string(),
            },
        }
    }

    pub fn field_id(&self) -> Option<&str> {
        match self {
            Self::Field(field) => Some(&field.field_id),
            Self::Malformed { field_id, .. } => field_id.as_deref(),
        }
    }
}

#[derive(Deserialize)]
struct RawMapping {
    #[serde(default)]
    fields: Vec<Value>,
}

impl From<RawMapping> for PdfMapping {
    fn from(raw: RawMapping) -> Self {
        Self {
            fields: raw.fields.into_iter().map(MappingEntry::from_value).collect(),
        }
    }
}

/// Root of `mapping.json`
///
/// Entries are converted one by one so a bad entry never hides the others.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(from = "RawMapping")]
pub struct PdfMapping {
    pub fields: Vec<MappingEntry>,
}

impl PdfMapping {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First well-formed entry for `field_id`
    pub fn get(&self, field_id: &str) -> Option<&FieldMapping> {
        self.fields.iter().find_map(|entry| match entry {
            MappingEntry::Field(field) if field.field_id == field_id => Some(field),
            _ => None,
        })
    }
}
