//! Fill tunables

use crate::record::FieldValue;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Options controlling how fields are drawn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FillOptions {
    /// Text size when the mapping gives none
    pub default_font_size: f32,
    /// Size of the checkbox mark glyph
    pub mark_font_size: f32,
    /// Glyph drawn for checked boxes
    pub mark_glyph: String,
    /// Added to a live widget's lower edge so text sits on the printed line
    pub baseline_offset: f64,
    /// String values that check a box (compared case-sensitively)
    pub affirmative_tokens: Vec<String>,
    /// Field ids containing one of these (case-insensitive) are photos
    pub image_keywords: Vec<String>,
    /// Bake the interactive form layer before drawing
    pub flatten_form: bool,
    /// Name the embedded font is registered under
    pub font_name: String,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            default_font_size: 10.0,
            mark_font_size: 12.0,
            mark_glyph: "X".to_string(),
            baseline_offset: 2.0,
            // "ذكر" ("male") checks a template's gender box
            affirmative_tokens: ["true", "on", "yes", "ذكر"].map(String::from).to_vec(),
            image_keywords: ["photo", "pic"].map(String::from).to_vec(),
            flatten_form: true,
            font_name: "arabic".to_string(),
        }
    }
}

impl FillOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `value` checks a box
    pub fn is_affirmative(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Bool(b) => *b,
            FieldValue::Text(s) => self.affirmative_tokens.iter().any(|t| t == s),
            _ => false,
        }
    }

    /// Whether `field_id` names a photo field
    pub fn is_image_field(&self, field_id: &str) -> bool {
        let id = field_id.to_lowercase();
        self.image_keywords
            .iter()
            .any(|k| !k.is_empty() && id.contains(&k.to_lowercase()))
    }
}
