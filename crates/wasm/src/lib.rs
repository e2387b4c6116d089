//! WASM bindings for exam form filling
//!
//! This crate provides JavaScript-friendly API for:
//! - Filling a template PDF with applicant data
//! - Naming the filled file for download
//! - Listing a template's interactive fields (for authoring mappings)
//! - Shaping Arabic text for preview
//!
//! # Example (JavaScript)
//!
//! ```javascript
//! import init, { FormFiller } from 'examform-wasm';
//!
//! await init();
//!
//! const [pdf, font, mapping] = await Promise.all([
//!   fetch('/pdfs/car-public/source.pdf').then(r => r.arrayBuffer()),
//!   fetch('/fonts/Amiri-Regular.ttf').then(r => r.arrayBuffer()),
//!   fetch('/pdfs/car-public/mapping.json').then(r => r.ok ? r.arrayBuffer() : null),
//! ]);
//!
//! const filler = new FormFiller();
//! const filled = filler.fill(
//!   new Uint8Array(pdf),
//!   new Uint8Array(font),
//!   mapping && new Uint8Array(mapping),
//!   { firstName: 'محمد', photo: 'data:image/jpeg;base64,...' },
//!   'car-public',
//! );
//! download(filled.bytes, filled.filename);
//! ```

use chrono::NaiveDate;
use form_fill::{DataRecord, FillEngine, FillError, FillOptions};
use pdf_core::PdfDocument;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Fatal fill failures surface as an `Error` carrying the localized message;
/// the underlying cause is attached as `detail`
fn fill_error(err: FillError) -> JsValue {
    let error = js_sys::Error::new(err.localized_message());
    let _ = js_sys::Reflect::set(&error, &"detail".into(), &err.to_string().into());
    error.into()
}

fn today() -> Option<NaiveDate> {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(
        now.get_full_year() as i32,
        now.get_month() + 1,
        now.get_date(),
    )
}

/// Result of a successful fill
#[wasm_bindgen]
pub struct FilledPdf {
    bytes: Vec<u8>,
    filename: String,
    drawn: usize,
    skipped: Vec<String>,
}

#[wasm_bindgen]
impl FilledPdf {
    /// PDF bytes (Uint8Array)
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Suggested download name
    #[wasm_bindgen(getter)]
    pub fn filename(&self) -> String {
        self.filename.clone()
    }

    /// Number of fields drawn
    #[wasm_bindgen(getter)]
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// `"<fieldId>: <reason>"` for every field that was not drawn
    #[wasm_bindgen(getter)]
    pub fn skipped(&self) -> Vec<JsValue> {
        self.skipped.iter().map(|s| JsValue::from_str(s)).collect()
    }
}

/// Form filling engine
#[wasm_bindgen]
pub struct FormFiller {
    engine: FillEngine,
}

#[wasm_bindgen]
impl FormFiller {
    /// Create a filler with default options
    #[wasm_bindgen(constructor)]
    pub fn new() -> FormFiller {
        FormFiller {
            engine: FillEngine::new(FillOptions::default()),
        }
    }

    /// Create a filler from options JSON
    ///
    /// @param json - e.g. `{"affirmativeTokens": ["true", "on"], "defaultFontSize": 11}`
    #[wasm_bindgen(js_name = withOptions)]
    pub fn with_options(json: &str) -> Result<FormFiller, JsValue> {
        let options =
            FillOptions::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(FormFiller {
            engine: FillEngine::new(options),
        })
    }

    /// Fill a template
    ///
    /// @param source - Template PDF bytes
    /// @param font - Arabic-capable TTF bytes
    /// @param mapping - `mapping.json` bytes, or null to return the template unfilled
    /// @param data - Object of field values; images as `data:image/...;base64,` strings
    /// @param templateId - Template id, used in the filename
    /// @param formType - Schema form type for the filename (optional)
    /// @param date - `YYYY-MM-DD` for the filename (optional, defaults to today)
    /// @returns FilledPdf
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        &self,
        source: &[u8],
        font: &[u8],
        mapping: Option<Vec<u8>>,
        data: JsValue,
        template_id: &str,
        form_type: Option<String>,
        date: Option<String>,
    ) -> Result<FilledPdf, JsValue> {
        let data = record_from_js(data)?;
        let filled = self
            .engine
            .fill(source, font, mapping.as_deref(), &data)
            .map_err(fill_error)?;

        let date = match date {
            Some(date) => NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| JsValue::from_str(&format!("Invalid date {date:?}: {e}")))?,
            None => today().ok_or_else(|| JsValue::from_str("Invalid system date"))?,
        };
        let filename =
            form_fill::suggested_filename(form_type.as_deref(), template_id, date, &data);

        Ok(FilledPdf {
            bytes: filled.bytes,
            filename,
            drawn: filled.report.drawn,
            skipped: filled
                .report
                .skipped
                .iter()
                .map(|(id, reason)| format!("{id}: {reason}"))
                .collect(),
        })
    }
}

impl Default for FormFiller {
    fn default() -> Self {
        Self::new()
    }
}

fn record_from_js(data: JsValue) -> Result<DataRecord, JsValue> {
    if data.is_null() || data.is_undefined() {
        return Ok(DataRecord::new());
    }
    let value: serde_json::Value = serde_wasm_bindgen::from_value(data)?;
    Ok(DataRecord::from_value(&value))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldInfo {
    name: String,
    field_type: String,
    /// 0-based, matching mapping files
    page: Option<usize>,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// List the interactive fields of a PDF
///
/// @param source - PDF bytes
/// @returns Array of `{ name, fieldType, page, x, y, width, height }`, one per visible widget
#[wasm_bindgen(js_name = listFields)]
pub fn list_fields(source: &[u8]) -> Result<JsValue, JsValue> {
    let doc =
        PdfDocument::open_from_bytes(source).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let fields: Vec<FieldInfo> = doc
        .form_fields()
        .iter()
        .flat_map(|field| {
            field
                .widgets
                .iter()
                .filter(|w| w.is_visible())
                .map(move |w| FieldInfo {
                    name: field.name.clone(),
                    field_type: format!("{:?}", field.field_type),
                    page: w.page.map(|p| p - 1),
                    x: w.rect.x,
                    y: w.rect.y,
                    width: w.rect.width,
                    height: w.rect.height,
                })
        })
        .collect();

    Ok(serde_wasm_bindgen::to_value(&fields)?)
}

/// Shape Arabic text into visual order
///
/// @param text - Logical-order text
/// @returns Shaped text (unchanged when it has no Arabic)
#[wasm_bindgen(js_name = shapeArabic)]
pub fn shape_arabic(text: &str) -> String {
    arabic_text::shape(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_shape_arabic() {
        assert_eq!(shape_arabic("Ahmad 12"), "Ahmad 12");
        assert_eq!(shape_arabic("باب"), "\u{FE8F}\u{FE8E}\u{FE91}");
    }

    #[wasm_bindgen_test]
    fn test_today_is_valid() {
        assert!(today().is_some());
    }
}
