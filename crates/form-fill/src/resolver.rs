//! Placement resolution

use crate::mapping::{FieldKind, FieldMapping, PdfMapping};
use crate::writer::FieldSkip;
use pdf_core::{FormField, Rect};
use std::collections::HashMap;

/// Source of a placement's rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Widget rectangle read from the template's form layer
    Live(Rect),
    /// Coordinates from the mapping file
    Static(Rect),
}

impl Geometry {
    /// Prefer the live rectangle when there is one
    pub fn merge(static_rect: Rect, live: Option<Rect>) -> Self {
        match live {
            Some(rect) => Self::Live(rect),
            None => Self::Static(static_rect),
        }
    }

    pub fn rect(&self) -> Rect {
        match self {
            Self::Live(rect) | Self::Static(rect) => *rect,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

/// Effective draw position of one field
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlacement {
    /// 0-based page index
    pub page: usize,
    /// Text origin; `y` includes the baseline offset for live geometry
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub kind: FieldKind,
    pub font_size: Option<f32>,
    pub geometry: Geometry,
}

impl ResolvedPlacement {
    /// Lower-left corner for images, which anchor on their box rather than a baseline
    pub fn image_origin(&self) -> (f64, f64) {
        match self.geometry {
            Geometry::Live(rect) => (rect.x, rect.y),
            Geometry::Static(_) => (self.x, self.y),
        }
    }
}

/// Rectangle and 0-based page of a field's first visible widget
#[derive(Debug, Clone, Copy, PartialEq)]
struct LiveWidget {
    rect: Rect,
    page: Option<usize>,
}

/// Merges mapping entries with the live widget geometry of one template
pub struct Resolver {
    live: HashMap<String, LiveWidget>,
    page_count: usize,
    baseline_offset: f64,
}

impl Resolver {
    /// Index the first visible widget of every field
    pub fn new(fields: &[FormField], page_count: usize, baseline_offset: f64) -> Self {
        let mut live = HashMap::new();
        for field in fields {
            if let Some(widget) = field.first_visible_widget() {
                live.entry(field.name.clone()).or_insert(LiveWidget {
                    rect: widget.rect,
                    page: widget.page.and_then(|p| p.checked_sub(1)),
                });
            }
        }
        Self {
            live,
            page_count,
            baseline_offset,
        }
    }

    pub fn live_rect(&self, field_id: &str) -> Option<Rect> {
        self.live.get(field_id).map(|w| w.rect)
    }

    /// Placement for `field_id`, or why it cannot be drawn
    pub fn resolve(
        &self,
        field_id: &str,
        mapping: &PdfMapping,
    ) -> Result<ResolvedPlacement, FieldSkip> {
        let entry = mapping.get(field_id).ok_or(FieldSkip::NotMapped)?;
        self.resolve_entry(entry)
    }

    /// The mapped page wins over the widget's page; the widget's page
    /// fills in when the entry has none
    pub fn resolve_entry(&self, entry: &FieldMapping) -> Result<ResolvedPlacement, FieldSkip> {
        let live = self.live.get(&entry.field_id);
        let widget_page = live.and_then(|w| w.page);

        let page = match (entry.page, widget_page) {
            (Some(mapped), Some(widget)) => {
                if usize::try_from(mapped).ok() != Some(widget) {
                    log::warn!(
                        "field {}: mapped to page {mapped} but its widget is on page {widget}",
                        entry.field_id
                    );
                }
                mapped
            }
            (Some(mapped), None) => mapped,
            (None, Some(widget)) => widget as i64,
            (None, None) => 0,
        };
        let page = usize::try_from(page)
            .ok()
            .filter(|&p| p < self.page_count)
            .ok_or(FieldSkip::PageOutOfRange {
                page,
                page_count: self.page_count,
            })?;

        let static_rect = Rect::new(
            entry.x,
            entry.y,
            entry.width.unwrap_or(0.0),
            entry.height.unwrap_or(0.0),
        );
        let geometry = Geometry::merge(static_rect, live.map(|w| w.rect));
        let rect = geometry.rect();
        let y = if geometry.is_live() {
            rect.y + self.baseline_offset
        } else {
            rect.y
        };

        Ok(ResolvedPlacement {
            page,
            x: rect.x,
            y,
            width: rect.width,
            height: rect.height,
            kind: entry.kind,
            font_size: entry.font_size,
            geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingEntry;
    use pdf_core::{FieldType, Widget};
    use pretty_assertions::assert_eq;

    fn entry(id: &str, page: Option<i64>) -> FieldMapping {
        FieldMapping {
            field_id: id.to_string(),
            x: 100.0,
            y: 700.0,
            page,
            font_size: Some(14.0),
            width: Some(50.0),
            height: None,
            kind: FieldKind::Text,
        }
    }

    fn live_field(name: &str, rects: &[(Rect, bool)]) -> FormField {
        live_field_on(name, 1, rects)
    }

    /// `page` is 1-based, as read from the document
    fn live_field_on(name: &str, page: usize, rects: &[(Rect, bool)]) -> FormField {
        FormField {
            name: name.to_string(),
            field_type: FieldType::Text,
            widgets: rects
                .iter()
                .map(|&(rect, hidden)| Widget {
                    page: Some(page),
                    rect,
                    hidden,
                })
                .collect(),
        }
    }

    #[test]
    fn test_static_geometry_used_verbatim() {
        let resolver = Resolver::new(&[], 1, 2.0);
        let placement = resolver.resolve_entry(&entry("firstName", Some(0))).unwrap();

        assert_eq!(placement.page, 0);
        assert_eq!((placement.x, placement.y), (100.0, 700.0));
        assert_eq!((placement.width, placement.height), (50.0, 0.0));
        assert_eq!(placement.font_size, Some(14.0));
        assert!(!placement.geometry.is_live());
        assert_eq!(placement.image_origin(), (100.0, 700.0));
    }

    #[test]
    fn test_live_geometry_overrides_mapping() {
        let rect = Rect::new(120.0, 690.0, 150.0, 20.0);
        let fields = [live_field("firstName", &[(rect, false)])];
        let resolver = Resolver::new(&fields, 1, 2.0);

        let mut mapped = entry("firstName", Some(0));
        mapped.kind = FieldKind::Mark;
        let placement = resolver.resolve_entry(&mapped).unwrap();

        assert_eq!(placement.geometry, Geometry::Live(rect));
        assert_eq!((placement.x, placement.y), (120.0, 692.0));
        assert_eq!((placement.width, placement.height), (150.0, 20.0));
        // Kind and font size stay with the mapping
        assert_eq!(placement.kind, FieldKind::Mark);
        assert_eq!(placement.font_size, Some(14.0));
        assert_eq!(placement.image_origin(), (120.0, 690.0));
    }

    #[test]
    fn test_hidden_widgets_are_ignored() {
        let hidden = Rect::new(1.0, 1.0, 1.0, 1.0);
        let visible = Rect::new(5.0, 5.0, 5.0, 5.0);
        let fields = [
            live_field("a", &[(hidden, true)]),
            live_field("b", &[(hidden, true), (visible, false)]),
        ];
        let resolver = Resolver::new(&fields, 1, 2.0);

        assert_eq!(resolver.live_rect("a"), None);
        assert_eq!(resolver.live_rect("b"), Some(visible));
        assert!(!resolver.resolve_entry(&entry("a", None)).unwrap().geometry.is_live());
    }

    #[test]
    fn test_page_defaults_to_zero() {
        let resolver = Resolver::new(&[], 1, 2.0);
        assert_eq!(resolver.resolve_entry(&entry("a", None)).unwrap().page, 0);
    }

    #[test]
    fn test_page_out_of_range() {
        let resolver = Resolver::new(&[], 2, 2.0);
        assert_eq!(
            resolver.resolve_entry(&entry("a", Some(2))),
            Err(FieldSkip::PageOutOfRange {
                page: 2,
                page_count: 2
            })
        );
        assert!(resolver.resolve_entry(&entry("a", Some(1))).is_ok());
    }

    #[test]
    fn test_negative_page_is_out_of_range() {
        let resolver = Resolver::new(&[], 2, 2.0);
        assert_eq!(
            resolver.resolve_entry(&entry("a", Some(-1))),
            Err(FieldSkip::PageOutOfRange {
                page: -1,
                page_count: 2
            })
        );
    }

    #[test]
    fn test_widget_page_used_when_mapping_has_none() {
        let rect = Rect::new(40.0, 300.0, 100.0, 20.0);
        let fields = [live_field_on("notes", 3, &[(rect, false)])];
        let resolver = Resolver::new(&fields, 3, 2.0);

        let placement = resolver.resolve_entry(&entry("notes", None)).unwrap();
        assert_eq!(placement.page, 2);
        assert_eq!(placement.geometry, Geometry::Live(rect));

        // An explicit page still wins
        let placement = resolver.resolve_entry(&entry("notes", Some(0))).unwrap();
        assert_eq!(placement.page, 0);
    }

    #[test]
    fn test_resolve_unmapped_field() {
        let resolver = Resolver::new(&[], 1, 2.0);
        let mapping = PdfMapping {
            fields: vec![MappingEntry::Field(entry("firstName", Some(0)))],
        };
        assert_eq!(resolver.resolve("lastName", &mapping), Err(FieldSkip::NotMapped));
        assert!(resolver.resolve("firstName", &mapping).is_ok());
    }
}
