//! Interactive form (AcroForm) introspection and flattening

use crate::document::PdfDocument;
use crate::{PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Annotation flag: Hidden
const FLAG_HIDDEN: i64 = 1 << 1;
/// Annotation flag: NoView
const FLAG_NO_VIEW: i64 = 1 << 5;
/// Guard against cyclic field trees
const MAX_FIELD_DEPTH: usize = 32;

/// Axis-aligned rectangle in PDF user space (bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from a PDF rectangle array `[x1 y1 x2 y2]` in any corner order
    pub fn from_pdf_array(values: &[Object]) -> Option<Self> {
        if values.len() != 4 {
            return None;
        }
        let mut n = [0.0f64; 4];
        for (slot, value) in n.iter_mut().zip(values) {
            *slot = number(value)?;
        }
        Some(Self {
            x: n[0].min(n[2]),
            y: n[1].min(n[3]),
            width: (n[2] - n[0]).abs(),
            height: (n[3] - n[1]).abs(),
        })
    }
}

/// Interactive field type (`/FT`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Button,
    Choice,
    Signature,
    Unknown,
}

impl FieldType {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"Tx" => Self::Text,
            b"Btn" => Self::Button,
            b"Ch" => Self::Choice,
            b"Sig" => Self::Signature,
            _ => Self::Unknown,
        }
    }
}

/// On-page representation of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    /// Page number (1-indexed) when the widget is attached to a page
    pub page: Option<usize>,
    pub rect: Rect,
    /// Hidden or NoView annotation flag set
    pub hidden: bool,
}

impl Widget {
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }
}

/// A terminal interactive field and its widgets
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    /// Fully-qualified name (partial names joined with '.')
    pub name: String,
    pub field_type: FieldType,
    pub widgets: Vec<Widget>,
}

impl FormField {
    /// First widget without the Hidden/NoView flags
    pub fn first_visible_widget(&self) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.is_visible())
    }
}

impl PdfDocument {
    /// List every terminal field of the document's AcroForm
    ///
    /// Documents without an AcroForm (or with a malformed one) yield an
    /// empty list.
    pub fn form_fields(&self) -> Vec<FormField> {
        let doc = &self.inner;
        let Some(acroform) = catalog(doc).and_then(|c| c.get(b"AcroForm").ok()) else {
            return Vec::new();
        };
        let Some(fields) = resolve(doc, acroform)
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(b"Fields").ok())
            .and_then(|f| resolve(doc, f))
            .and_then(|f| f.as_array().ok())
        else {
            return Vec::new();
        };

        let annot_pages = annotation_pages(doc);
        let mut out = Vec::new();
        for field in fields {
            collect_field(doc, &annot_pages, field, None, None, 0, &mut out);
        }
        out
    }

    /// Look up a field by its fully-qualified name
    pub fn find_field(&self, name: &str) -> Option<FormField> {
        self.form_fields().into_iter().find(|f| f.name == name)
    }

    /// Bake widget appearances into page content and drop the form layer
    ///
    /// Each visible widget with a normal appearance stream is drawn as a form
    /// XObject at its rectangle; every widget annotation is then removed
    /// from its page and the catalog's `/AcroForm` entry is deleted. Content
    /// drawn afterwards composites above the baked appearances.
    ///
    /// Returns the number of appearances baked.
    pub fn flatten_form(&mut self) -> Result<usize> {
        let pages: Vec<(u32, ObjectId)> = self.inner.get_pages().into_iter().collect();
        let mut baked = 0;

        for (page_number, page_id) in pages {
            let page = page_number as usize;
            let annots = match page_annots(&self.inner, page_id) {
                Some(annots) => annots,
                None => continue,
            };

            let mut kept = Vec::with_capacity(annots.len());
            for annot in annots {
                let Some(dict) = resolve(&self.inner, &annot).and_then(|o| o.as_dict().ok())
                else {
                    kept.push(annot);
                    continue;
                };
                if !is_widget(dict) {
                    kept.push(annot);
                    continue;
                }

                let hidden = is_hidden(dict);
                let rect = dict
                    .get(b"Rect")
                    .ok()
                    .and_then(|r| resolve(&self.inner, r))
                    .and_then(|r| r.as_array().ok())
                    .and_then(|r| Rect::from_pdf_array(r));
                let appearance = normal_appearance(&self.inner, dict);

                if let (false, Some(rect), Some(appearance)) = (hidden, rect, appearance) {
                    self.bake_appearance(page, appearance, rect)?;
                    baked += 1;
                }
            }

            let page_dict = self
                .inner
                .get_object_mut(page_id)?
                .as_dict_mut()
                .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;
            if kept.is_empty() {
                page_dict.remove(b"Annots");
            } else {
                page_dict.set("Annots", Object::Array(kept));
            }
        }

        if let Some(catalog_id) = catalog_id(&self.inner) {
            if let Ok(Object::Dictionary(catalog)) = self.inner.get_object_mut(catalog_id) {
                catalog.remove(b"AcroForm");
            }
        }

        log::debug!("flattened form layer, {baked} appearance(s) baked");
        Ok(baked)
    }

    /// Paint one appearance stream into the page at `rect`
    fn bake_appearance(&mut self, page: usize, appearance: ObjectId, rect: Rect) -> Result<()> {
        let bbox = {
            let stream = self
                .inner
                .get_object_mut(appearance)?
                .as_stream_mut()
                .map_err(|_| PdfError::ParseError("Appearance is not a stream".to_string()))?;
            stream.dict.set("Type", Object::Name(b"XObject".to_vec()));
            stream.dict.set("Subtype", Object::Name(b"Form".to_vec()));
            let bbox = stream
                .dict
                .get(b"BBox")
                .ok()
                .and_then(|b| b.as_array().ok())
                .and_then(|b| Rect::from_pdf_array(b))
                .unwrap_or(Rect::new(0.0, 0.0, rect.width, rect.height));
            let matrix = stream
                .dict
                .get(b"Matrix")
                .ok()
                .and_then(|m| m.as_array().ok())
                .and_then(|m| matrix_from_array(m));
            match matrix {
                Some(m) => transform_rect(&bbox, &m),
                None => bbox,
            }
        };

        if bbox.width == 0.0 || bbox.height == 0.0 {
            return Ok(());
        }

        let sx = rect.width / bbox.width;
        let sy = rect.height / bbox.height;
        let tx = rect.x - bbox.x * sx;
        let ty = rect.y - bbox.y * sy;

        let name = self.get_or_create_xobject_ref(page, appearance, "Fm")?;
        let ops = format!("q\n{sx} 0 0 {sy} {tx} {ty} cm\n/{name} Do\nQ\n");
        self.buffer_content(page, ops.as_bytes());
        Ok(())
    }
}

fn collect_field(
    doc: &Document,
    annot_pages: &HashMap<ObjectId, usize>,
    node: &Object,
    parent_name: Option<&str>,
    inherited_type: Option<FieldType>,
    depth: usize,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    let node_id = node.as_reference().ok();
    let Some(dict) = resolve(doc, node).and_then(|o| o.as_dict().ok()) else {
        return;
    };

    let partial = dict.get(b"T").ok().and_then(decode_text_string);
    let name = match (parent_name, partial) {
        (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => String::new(),
    };
    let field_type = dict
        .get(b"FT")
        .ok()
        .and_then(|ft| ft.as_name().ok())
        .map(FieldType::from_name)
        .or(inherited_type)
        .unwrap_or(FieldType::Unknown);

    let kids: Vec<Object> = dict
        .get(b"Kids")
        .ok()
        .and_then(|k| resolve(doc, k))
        .and_then(|k| k.as_array().ok())
        .cloned()
        .unwrap_or_default();

    let mut widgets = Vec::new();
    if dict.has(b"Rect") {
        widgets.extend(widget_from(doc, annot_pages, node_id, dict));
    }

    let mut has_child_fields = false;
    for kid in &kids {
        let kid_id = kid.as_reference().ok();
        let Some(kid_dict) = resolve(doc, kid).and_then(|o| o.as_dict().ok()) else {
            continue;
        };
        if kid_dict.has(b"T") {
            has_child_fields = true;
            collect_field(doc, annot_pages, kid, Some(&name), Some(field_type), depth + 1, out);
        } else {
            widgets.extend(widget_from(doc, annot_pages, kid_id, kid_dict));
        }
    }

    if !has_child_fields || !widgets.is_empty() {
        out.push(FormField {
            name,
            field_type,
            widgets,
        });
    }
}

fn widget_from(
    doc: &Document,
    annot_pages: &HashMap<ObjectId, usize>,
    id: Option<ObjectId>,
    dict: &Dictionary,
) -> Option<Widget> {
    let rect = dict
        .get(b"Rect")
        .ok()
        .and_then(|r| resolve(doc, r))
        .and_then(|r| r.as_array().ok())
        .and_then(|r| Rect::from_pdf_array(r))?;

    let page = id.and_then(|id| annot_pages.get(&id).copied()).or_else(|| {
        let page_ref = dict.get(b"P").ok()?.as_reference().ok()?;
        doc.get_pages()
            .into_iter()
            .find(|(_, pid)| *pid == page_ref)
            .map(|(n, _)| n as usize)
    });

    Some(Widget {
        page,
        rect,
        hidden: is_hidden(dict),
    })
}

/// Map annotation object IDs to the page number that lists them
fn annotation_pages(doc: &Document) -> HashMap<ObjectId, usize> {
    let mut map = HashMap::new();
    for (page_number, page_id) in doc.get_pages() {
        for annot in page_annots(doc, page_id).unwrap_or_default() {
            if let Ok(id) = annot.as_reference() {
                map.insert(id, page_number as usize);
            }
        }
    }
    map
}

fn page_annots(doc: &Document, page_id: ObjectId) -> Option<Vec<Object>> {
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let annots = page.get(b"Annots").ok()?;
    resolve(doc, annots)?.as_array().ok().cloned()
}

fn is_widget(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .ok()
        .and_then(|s| s.as_name().ok())
        .is_some_and(|s| s == b"Widget")
}

fn is_hidden(dict: &Dictionary) -> bool {
    let flags = dict.get(b"F").ok().and_then(|f| f.as_i64().ok()).unwrap_or(0);
    flags & (FLAG_HIDDEN | FLAG_NO_VIEW) != 0
}

/// Normal appearance stream of a widget, honouring `/AS` for state dictionaries
fn normal_appearance(doc: &Document, widget: &Dictionary) -> Option<ObjectId> {
    let ap = resolve(doc, widget.get(b"AP").ok()?)?.as_dict().ok()?;
    let normal = ap.get(b"N").ok()?;
    if let Object::Reference(id) = normal {
        match doc.get_object(*id).ok()? {
            Object::Stream(_) => return Some(*id),
            Object::Dictionary(states) => return appearance_state(widget, states),
            _ => return None,
        }
    }
    match normal {
        Object::Dictionary(states) => appearance_state(widget, states),
        _ => None,
    }
}

fn appearance_state(widget: &Dictionary, states: &Dictionary) -> Option<ObjectId> {
    let state = widget.get(b"AS").ok()?.as_name().ok()?;
    states.get(state).ok()?.as_reference().ok()
}

fn matrix_from_array(values: &[Object]) -> Option<[f64; 6]> {
    if values.len() != 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, value) in m.iter_mut().zip(values) {
        *slot = number(value)?;
    }
    Some(m)
}

/// Bounding box of `rect` after applying matrix `m`
fn transform_rect(rect: &Rect, m: &[f64; 6]) -> Rect {
    let corners = [
        (rect.x, rect.y),
        (rect.x + rect.width, rect.y),
        (rect.x, rect.y + rect.height),
        (rect.x + rect.width, rect.y + rect.height),
    ];
    let points: Vec<(f64, f64)> = corners
        .iter()
        .map(|&(x, y)| (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5]))
        .collect();
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8, or PDFDocEncoding)
pub(crate) fn decode_text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s.to_string()),
        Err(_) => Some(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Follow one level of indirection
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn catalog_id(doc: &Document) -> Option<ObjectId> {
    doc.trailer.get(b"Root").ok()?.as_reference().ok()
}

fn catalog(doc: &Document) -> Option<&Dictionary> {
    doc.get_object(catalog_id(doc)?).ok()?.as_dict().ok()
}
