//! Field writing

use crate::mapping::FieldKind;
use crate::options::FillOptions;
use crate::record::FieldValue;
use crate::resolver::ResolvedPlacement;
use arabic_text::ArabicShaper;
use pdf_core::{Align, Color, PdfDocument, PdfError};
use thiserror::Error;

/// Why a field was not drawn
///
/// None of these abort a fill; they are logged and reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldSkip {
    #[error("no mapping entry")]
    NotMapped,

    #[error("already filled by an earlier mapping entry")]
    Duplicate,

    #[error("mapping entry is malformed: {0}")]
    Malformed(String),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: i64, page_count: usize },

    #[error("unknown field kind")]
    UnknownKind,

    #[error("value is not an image")]
    NotAnImage,

    #[error("placement has zero width or height")]
    ZeroSize,

    #[error("image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("drawing failed: {0}")]
    Draw(String),
}

impl From<PdfError> for FieldSkip {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::ImageError(msg) => FieldSkip::ImageDecode(msg),
            other => FieldSkip::Draw(other.to_string()),
        }
    }
}

/// What a successful write put on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drawn {
    Text,
    Mark,
    Image,
    /// Unchecked box; nothing to draw
    Nothing,
}

/// Draws typed values at resolved placements
pub struct FieldWriter<'a> {
    doc: &'a mut PdfDocument,
    options: &'a FillOptions,
    shaper: &'a ArabicShaper,
}

impl<'a> FieldWriter<'a> {
    /// The document must already have `options.font_name` registered
    pub fn new(
        doc: &'a mut PdfDocument,
        options: &'a FillOptions,
        shaper: &'a ArabicShaper,
    ) -> Self {
        Self {
            doc,
            options,
            shaper,
        }
    }

    /// Photo fields and image values are drawn as images whatever the mapping says
    pub fn effective_kind(
        &self,
        field_id: &str,
        kind: FieldKind,
        value: &FieldValue,
    ) -> FieldKind {
        if self.options.is_image_field(field_id) || value.is_image() {
            FieldKind::Image
        } else {
            kind
        }
    }

    pub fn write(
        &mut self,
        field_id: &str,
        placement: &ResolvedPlacement,
        value: &FieldValue,
    ) -> Result<Drawn, FieldSkip> {
        match self.effective_kind(field_id, placement.kind, value) {
            FieldKind::Text => self.write_text(placement, value),
            FieldKind::Mark => self.write_mark(placement, value),
            FieldKind::Image => self.write_image(placement, value),
            FieldKind::Unknown => Err(FieldSkip::UnknownKind),
        }
    }

    fn write_text(
        &mut self,
        placement: &ResolvedPlacement,
        value: &FieldValue,
    ) -> Result<Drawn, FieldSkip> {
        let text = self.shaper.shape(&value.display());
        let size = placement.font_size.unwrap_or(self.options.default_font_size);

        self.doc.set_font(&self.options.font_name, size)?;
        self.doc.set_text_color(Color::black());
        self.doc.insert_text(
            &text,
            placement.page + 1,
            placement.x,
            placement.y,
            Align::Left,
        )?;
        Ok(Drawn::Text)
    }

    fn write_mark(
        &mut self,
        placement: &ResolvedPlacement,
        value: &FieldValue,
    ) -> Result<Drawn, FieldSkip> {
        if !self.options.is_affirmative(value) {
            return Ok(Drawn::Nothing);
        }

        let x = placement.x + placement.width / 4.0;
        let y = placement.y + placement.height / 4.0;
        self.doc
            .set_font(&self.options.font_name, self.options.mark_font_size)?;
        self.doc.set_text_color(Color::black());
        self.doc.insert_text(
            &self.options.mark_glyph,
            placement.page + 1,
            x,
            y,
            Align::Left,
        )?;
        Ok(Drawn::Mark)
    }

    fn write_image(
        &mut self,
        placement: &ResolvedPlacement,
        value: &FieldValue,
    ) -> Result<Drawn, FieldSkip> {
        let data = value.first_image().ok_or(FieldSkip::NotAnImage)?;
        if placement.width <= 0.0 || placement.height <= 0.0 {
            return Err(FieldSkip::ZeroSize);
        }

        let (x, y) = placement.image_origin();
        self.doc.insert_image(
            data,
            placement.page + 1,
            x,
            y,
            placement.width,
            placement.height,
        )?;
        Ok(Drawn::Image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Geometry;
    use pdf_core::{fixtures, Rect};
    use pretty_assertions::assert_eq;

    struct Fixture {
        doc: PdfDocument,
        options: FillOptions,
        shaper: ArabicShaper,
    }

    impl Fixture {
        fn new() -> Self {
            let options = FillOptions::default();
            let mut doc = PdfDocument::open_from_bytes(&fixtures::minimal_pdf(1)).unwrap();
            doc.add_font(&options.font_name, &fixtures::minimal_ttf()).unwrap();
            Self {
                doc,
                options,
                shaper: ArabicShaper::default(),
            }
        }

        fn write(
            &mut self,
            id: &str,
            placement: &ResolvedPlacement,
            value: FieldValue,
        ) -> Result<Drawn, FieldSkip> {
            FieldWriter::new(&mut self.doc, &self.options, &self.shaper)
                .write(id, placement, &value)
        }

        fn bytes(&mut self) -> Vec<u8> {
            self.doc.to_bytes().unwrap()
        }

        fn content(&mut self) -> String {
            let bytes = self.bytes();
            let doc = lopdf::Document::load_mem(&bytes).unwrap();
            let page_id = doc.get_pages()[&1];
            String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
        }
    }

    fn placement(kind: FieldKind, geometry: Geometry) -> ResolvedPlacement {
        let rect = geometry.rect();
        let y = if geometry.is_live() { rect.y + 2.0 } else { rect.y };
        ResolvedPlacement {
            page: 0,
            x: rect.x,
            y,
            width: rect.width,
            height: rect.height,
            kind,
            font_size: None,
            geometry,
        }
    }

    #[test]
    fn test_text_uses_default_size() {
        let mut f = Fixture::new();
        let p = placement(FieldKind::Text, Geometry::Static(Rect::new(50.0, 650.0, 0.0, 0.0)));
        assert_eq!(f.write("age", &p, FieldValue::Number(31.0)), Ok(Drawn::Text));

        let content = f.content();
        assert!(content.contains(" 10 Tf"));
        assert!(content.contains("50 650 Td"));
        assert!(content.contains("0 0 0 rg"));
    }

    #[test]
    fn test_text_uses_mapping_size() {
        let mut f = Fixture::new();
        let mut p = placement(FieldKind::Text, Geometry::Static(Rect::new(100.0, 700.0, 0.0, 0.0)));
        p.font_size = Some(14.0);
        f.write("firstName", &p, FieldValue::from("باب")).unwrap();

        let bytes = f.bytes();
        // Presentation forms, last letter first
        assert_eq!(fixtures::shown_text(&bytes, 1), vec!["\u{FE8F}\u{FE8E}\u{FE91}"]);
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let content = doc.get_page_content(doc.get_pages()[&1]).unwrap();
        assert!(String::from_utf8_lossy(&content).contains(" 14 Tf"));
    }

    #[test]
    fn test_mark_checked_draws_one_glyph_inset() {
        let mut f = Fixture::new();
        let p = placement(FieldKind::Mark, Geometry::Static(Rect::new(300.0, 500.0, 20.0, 16.0)));
        assert_eq!(f.write("agree", &p, FieldValue::from("on")), Ok(Drawn::Mark));

        let content = f.content();
        assert_eq!(content.matches(" Tj").count(), 1);
        assert!(content.contains(" 12 Tf"));
        assert!(content.contains("305 504 Td"));
    }

    #[test]
    fn test_mark_unchecked_draws_nothing() {
        let mut f = Fixture::new();
        let p = placement(FieldKind::Mark, Geometry::Static(Rect::new(300.0, 500.0, 20.0, 16.0)));
        for value in [FieldValue::from("off"), FieldValue::Bool(false), FieldValue::from("أنثى")] {
            assert_eq!(f.write("agree", &p, value), Ok(Drawn::Nothing));
        }
        assert!(!f.content().contains(" Tj"));
    }

    #[test]
    fn test_image_keyword_overrides_kind() {
        let mut f = Fixture::new();
        let p = placement(FieldKind::Text, Geometry::Static(Rect::new(400.0, 600.0, 90.0, 110.0)));
        let result = f.write("chamsiyePic", &p, FieldValue::Image(fixtures::tiny_png()));
        assert_eq!(result, Ok(Drawn::Image));
        assert!(f.content().contains("90 0 0 110 400 600 cm"));
    }

    #[test]
    fn test_image_on_live_geometry_drops_baseline_offset() {
        let mut f = Fixture::new();
        let p = placement(FieldKind::Image, Geometry::Live(Rect::new(400.0, 600.0, 90.0, 110.0)));
        assert_eq!(p.y, 602.0);
        f.write("photo", &p, FieldValue::ImageList(vec![fixtures::tiny_jpeg()])).unwrap();
        assert!(f.content().contains("90 0 0 110 400 600 cm"));
    }

    #[test]
    fn test_image_failures_are_skips() {
        let mut f = Fixture::new();
        let sized = placement(FieldKind::Image, Geometry::Static(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let zero = placement(FieldKind::Image, Geometry::Static(Rect::new(0.0, 0.0, 0.0, 10.0)));

        assert!(matches!(
            f.write("photo", &sized, FieldValue::Image(b"garbage".to_vec())),
            Err(FieldSkip::ImageDecode(_))
        ));
        assert_eq!(
            f.write("photo", &zero, FieldValue::Image(fixtures::tiny_png())),
            Err(FieldSkip::ZeroSize)
        );
        assert_eq!(
            f.write("photo", &sized, FieldValue::from("me.png")),
            Err(FieldSkip::NotAnImage)
        );
    }

    #[test]
    fn test_unknown_kind() {
        let mut f = Fixture::new();
        let p = placement(FieldKind::Unknown, Geometry::Static(Rect::default()));
        assert_eq!(f.write("sig", &p, FieldValue::from("x")), Err(FieldSkip::UnknownKind));
    }

    #[test]
    fn test_missing_font_is_draw_failure() {
        let mut f = Fixture::new();
        f.options.font_name = "unregistered".to_string();
        let p = placement(FieldKind::Text, Geometry::Static(Rect::default()));
        assert!(matches!(f.write("a", &p, FieldValue::from("x")), Err(FieldSkip::Draw(_))));
    }
}
