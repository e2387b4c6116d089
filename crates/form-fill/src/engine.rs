//! Fill engine

use crate::mapping::{MappingEntry, PdfMapping};
use crate::options::FillOptions;
use crate::record::DataRecord;
use crate::resolver::Resolver;
use crate::store::TemplateStore;
use crate::writer::{Drawn, FieldSkip, FieldWriter};
use crate::{FillError, Result};
use arabic_text::ArabicShaper;
use pdf_core::PdfDocument;
use std::collections::HashSet;

/// Pipeline stages, logged as the engine moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStage {
    Loading,
    FontReady,
    MappingResolved,
    /// No usable mapping; the template is returned unfilled
    Empty,
    Filling,
    Serialized,
    Done,
    Failed,
}

/// Whether a mapping drove the fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingState {
    Resolved { entries: usize },
    Empty,
}

/// Per-field outcome summary of one fill
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    /// Fields that put something on a page
    pub drawn: usize,
    /// Fields that were not drawn, with the reason
    pub skipped: Vec<(String, FieldSkip)>,
    pub mapping: MappingState,
}

/// Filled PDF bytes and what happened on the way
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}

/// Turns template bytes and applicant data into a filled PDF
///
/// Each call owns its document; an engine can serve concurrent fills.
pub struct FillEngine {
    options: FillOptions,
    shaper: ArabicShaper,
}

impl Default for FillEngine {
    fn default() -> Self {
        Self::new(FillOptions::default())
    }
}

impl FillEngine {
    pub fn new(options: FillOptions) -> Self {
        Self {
            options,
            shaper: ArabicShaper::default(),
        }
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Fetch template, font and mapping from `store`, then fill
    ///
    /// A missing or unreadable mapping yields the unfilled template.
    pub fn fill_from_store(
        &self,
        store: &dyn TemplateStore,
        template_id: &str,
        data: &DataRecord,
    ) -> Result<FilledDocument> {
        let source = store
            .source(template_id)
            .map_err(|e| self.failed(FillError::Source(format!("{template_id}: {e}"))))?;
        let font = store
            .font()
            .map_err(|e| self.failed(FillError::Font(e.to_string())))?;
        let mapping = match store.mapping(template_id) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("no mapping for template {template_id}: {e}");
                None
            }
        };
        self.fill(&source, &font, mapping.as_deref(), data)
    }

    /// Fill `source` with `data`
    ///
    /// `mapping` holds the raw `mapping.json` bytes. Only an unreadable
    /// source, an unusable font or a serialization failure is an error;
    /// problems with single fields are reported in [`FillReport::skipped`].
    pub fn fill(
        &self,
        source: &[u8],
        font: &[u8],
        mapping: Option<&[u8]>,
        data: &DataRecord,
    ) -> Result<FilledDocument> {
        log::debug!("fill stage: {:?}", FillStage::Loading);
        let mut doc = PdfDocument::open_from_bytes(source)
            .map_err(|e| self.failed(FillError::Source(e.to_string())))?;

        if font.is_empty() {
            return Err(self.failed(FillError::Font("font file is empty".to_string())));
        }
        doc.add_font(&self.options.font_name, font)
            .map_err(|e| self.failed(FillError::Font(e.to_string())))?;
        log::debug!("fill stage: {:?}", FillStage::FontReady);

        let mapping = mapping.and_then(|bytes| match PdfMapping::from_slice(bytes) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                log::warn!("mapping unreadable, leaving template unfilled: {e}");
                None
            }
        });

        let report = match mapping.filter(|m| !m.is_empty()) {
            Some(mapping) => {
                log::debug!("fill stage: {:?}", FillStage::MappingResolved);
                self.fill_fields(&mut doc, &mapping, data)
            }
            None => {
                log::debug!("fill stage: {:?}", FillStage::Empty);
                FillReport {
                    drawn: 0,
                    skipped: Vec::new(),
                    mapping: MappingState::Empty,
                }
            }
        };

        let bytes = doc
            .to_bytes()
            .map_err(|e| self.failed(FillError::Serialize(e.to_string())))?;
        log::debug!("fill stage: {:?}", FillStage::Serialized);

        log::info!(
            "filled {} field(s), skipped {}, {} bytes",
            report.drawn,
            report.skipped.len(),
            bytes.len()
        );
        log::debug!("fill stage: {:?}", FillStage::Done);
        Ok(FilledDocument { bytes, report })
    }

    fn fill_fields(
        &self,
        doc: &mut PdfDocument,
        mapping: &PdfMapping,
        data: &DataRecord,
    ) -> FillReport {
        // Widget geometry must be read before flattening removes it
        let resolver = Resolver::new(
            &doc.form_fields(),
            doc.page_count(),
            self.options.baseline_offset,
        );

        log::debug!("fill stage: {:?}", FillStage::Filling);
        if self.options.flatten_form {
            if let Err(e) = doc.flatten_form() {
                log::warn!("could not flatten form layer: {e}");
            }
        }

        let mut report = FillReport {
            drawn: 0,
            skipped: Vec::new(),
            mapping: MappingState::Resolved {
                entries: mapping.fields.len(),
            },
        };
        let mut visited = HashSet::new();
        let mut writer = FieldWriter::new(doc, &self.options, &self.shaper);

        for (index, entry) in mapping.fields.iter().enumerate() {
            let field = match entry {
                MappingEntry::Field(field) => field,
                MappingEntry::Malformed { field_id, reason } => {
                    let id = field_id
                        .clone()
                        .unwrap_or_else(|| format!("fields[{index}]"));
                    log::warn!("field {id} skipped: malformed mapping entry: {reason}");
                    report
                        .skipped
                        .push((id, FieldSkip::Malformed(reason.clone())));
                    continue;
                }
            };
            let id = field.field_id.as_str();
            let Some(value) = data.value(id) else {
                continue;
            };

            let outcome = if visited.insert(id) {
                resolver
                    .resolve_entry(field)
                    .and_then(|placement| writer.write(id, &placement, value))
            } else {
                Err(FieldSkip::Duplicate)
            };

            match outcome {
                Ok(Drawn::Nothing) => {}
                Ok(drawn) => {
                    log::debug!("field {id}: drew {drawn:?}");
                    report.drawn += 1;
                }
                Err(skip) => {
                    log::warn!("field {id} skipped: {skip}");
                    report.skipped.push((id.to_string(), skip));
                }
            }
        }
        report
    }

    fn failed(&self, err: FillError) -> FillError {
        log::debug!("fill stage: {:?}", FillStage::Failed);
        log::error!("fill failed: {err}");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_core::fixtures::{self, FixtureField};
    use pretty_assertions::assert_eq;

    fn page_content(bytes: &[u8], page: u32) -> String {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    fn fill(source: &[u8], mapping: Option<&str>, data: &DataRecord) -> Result<FilledDocument> {
        FillEngine::default().fill(
            source,
            &fixtures::minimal_ttf(),
            mapping.map(str::as_bytes),
            data,
        )
    }

    #[test]
    fn test_unreadable_source_is_fatal() {
        let err = fill(b"%PDF-garbage", None, &DataRecord::new()).unwrap_err();
        assert!(matches!(err, FillError::Source(_)));
    }

    #[test]
    fn test_bad_font_is_fatal() {
        let engine = FillEngine::default();
        let source = fixtures::minimal_pdf(1);
        let data = DataRecord::new();

        let err = engine.fill(&source, b"", None, &data).unwrap_err();
        assert!(matches!(err, FillError::Font(_)));
        let err = engine.fill(&source, b"not a font", None, &data).unwrap_err();
        assert!(matches!(err, FillError::Font(_)));
    }

    #[test]
    fn test_missing_or_invalid_mapping_leaves_template_unfilled() {
        let source = fixtures::pdf_with_fields(
            1,
            &[FixtureField::text("firstName", 0, [100.0, 700.0, 250.0, 720.0])],
        );
        let data = DataRecord::new().with("firstName", "Ahmad");

        for mapping in [None, Some("not json"), Some(r#"{"fields": []}"#)] {
            let filled = fill(&source, mapping, &data).unwrap();
            assert_eq!(filled.report.mapping, MappingState::Empty);
            assert_eq!(filled.report.drawn, 0);

            // The form layer survives when nothing is filled
            let doc = PdfDocument::open_from_bytes(&filled.bytes).unwrap();
            assert_eq!(doc.form_fields().len(), 1);
        }
    }

    #[test]
    fn test_fields_without_values_are_not_drawn() {
        let source = fixtures::minimal_pdf(1);
        let mapping = r#"{"fields": [{"fieldId": "age", "x": 50, "y": 650, "page": 0}]}"#;
        let filled = fill(&source, Some(mapping), &DataRecord::new().with("age", "")).unwrap();

        assert_eq!(filled.report.drawn, 0);
        assert!(filled.report.skipped.is_empty());
        assert!(!page_content(&filled.bytes, 1).contains("Tj"));
    }

    #[test]
    fn test_bad_fields_do_not_stop_the_fill() {
        let source = fixtures::minimal_pdf(1);
        let mapping = r#"{"fields": [
            {"fieldId": "photo", "x": 10, "y": 10, "width": 50, "height": 50},
            {"fieldId": "far", "x": 10, "y": 10, "page": 4},
            {"fieldId": "sig", "x": 10, "y": 10, "type": "signature"},
            {"fieldId": "firstName", "x": 100, "y": 700, "page": 0, "fontSize": 14},
            {"fieldId": "firstName", "x": 300, "y": 300}
        ]}"#;
        let data = DataRecord::new()
            .with("photo", "not an upload")
            .with("far", "x")
            .with("sig", "x")
            .with("firstName", "Ahmad");

        let filled = fill(&source, Some(mapping), &data).unwrap();
        let skipped: Vec<(&str, &FieldSkip)> = filled
            .report
            .skipped
            .iter()
            .map(|(id, skip)| (id.as_str(), skip))
            .collect();

        assert_eq!(filled.report.drawn, 1);
        assert_eq!(
            skipped,
            vec![
                ("photo", &FieldSkip::NotAnImage),
                (
                    "far",
                    &FieldSkip::PageOutOfRange {
                        page: 4,
                        page_count: 1
                    }
                ),
                ("sig", &FieldSkip::UnknownKind),
                ("firstName", &FieldSkip::Duplicate),
            ]
        );

        let content = page_content(&filled.bytes, 1);
        assert!(content.contains("100 700 Td"));
        assert!(!content.contains("300 300 Td"));
    }

    #[test]
    fn test_malformed_entries_only_lose_themselves() {
        let source = fixtures::minimal_pdf(1);
        let mapping = r#"{"fields": [
            {"fieldId": "a", "x": 10, "y": 10, "page": -1},
            {"fieldId": "b", "x": 20, "y": 20, "page": 0},
            {"fieldId": "c", "x": "left", "y": 30},
            {"fieldId": "d", "y": 40},
            {"x": 50, "y": 50},
            {"fieldId": "e", "x": 60, "y": 60, "type": 3}
        ]}"#;
        let data = DataRecord::new()
            .with("a", "x")
            .with("b", "y")
            .with("c", "z")
            .with("d", "w")
            .with("e", "v");

        let filled = fill(&source, Some(mapping), &data).unwrap();
        assert_eq!(filled.report.mapping, MappingState::Resolved { entries: 6 });
        assert_eq!(filled.report.drawn, 1);
        assert!(page_content(&filled.bytes, 1).contains("20 20 Td"));

        let skipped = &filled.report.skipped;
        assert_eq!(
            skipped[0],
            (
                "a".to_string(),
                FieldSkip::PageOutOfRange {
                    page: -1,
                    page_count: 1
                }
            )
        );
        let malformed: Vec<&str> = skipped[1..]
            .iter()
            .filter(|(_, skip)| matches!(skip, FieldSkip::Malformed(_)))
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(malformed, vec!["c", "d", "fields[4]", "e"]);
        assert_eq!(skipped.len(), 5);
    }

    #[test]
    fn test_flatten_disabled_keeps_form_layer() {
        let source = fixtures::pdf_with_fields(
            1,
            &[FixtureField::text("firstName", 0, [100.0, 700.0, 250.0, 720.0])],
        );
        let options = FillOptions {
            flatten_form: false,
            ..FillOptions::default()
        };
        let mapping = r#"{"fields": [{"fieldId": "firstName", "x": 0, "y": 0}]}"#;
        let data = DataRecord::new().with("firstName", "Ahmad");

        let filled = FillEngine::new(options)
            .fill(&source, &fixtures::minimal_ttf(), Some(mapping.as_bytes()), &data)
            .unwrap();
        let doc = PdfDocument::open_from_bytes(&filled.bytes).unwrap();
        assert_eq!(doc.form_fields().len(), 1);
        assert!(page_content(&filled.bytes, 1).contains("100 702 Td"));
    }
}
