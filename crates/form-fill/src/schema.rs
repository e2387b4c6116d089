//! Form schema types (`schema.json`)
//!
//! The schema drives the data-entry UI. The fill engine never reads it, but
//! hosts use it to coerce raw input and to name the produced file.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Input widget kind of a schema field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Number,
    Date,
    Select,
    Checkbox,
    Tel,
    File,
}

/// One field of the data-entry form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormFieldSpec {
    pub id: String,
    pub label: String,

    #[serde(rename = "type")]
    pub kind: InputKind,

    #[serde(default)]
    pub required: bool,

    /// Allowed values for `select` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Root of `schema.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub title: String,

    /// Used as the first part of the output filename
    #[serde(default)]
    pub form_type: Option<String>,

    pub fields: Vec<FormFieldSpec>,
}

impl FormSchema {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn field(&self, id: &str) -> Option<&FormFieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Ids of required fields
    pub fn required_ids(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.id.as_str())
    }
}
