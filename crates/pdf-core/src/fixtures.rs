//! In-memory PDFs, fonts and images for tests
//!
//! Enabled by the `test-fixtures` feature so dependent crates can build
//! templates without shipping binary files.

use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Create a PDF with `page_count` empty A4 pages
pub fn minimal_pdf(page_count: usize) -> Vec<u8> {
    let (mut doc, pages_id, page_ids) = skeleton(page_count);
    finish(&mut doc, pages_id, &page_ids, None)
}

/// One interactive field placed on a page of a fixture PDF
#[derive(Debug, Clone)]
pub struct FixtureField {
    /// Fully-qualified name; a dotted name creates a parent field node
    pub name: String,
    /// Field type: "Tx", "Btn" or "Ch"
    pub field_type: String,
    /// 0-based page index
    pub page: usize,
    /// Widget rectangles `[x1, y1, x2, y2]`; more than one creates kid widgets
    pub widgets: Vec<[f32; 4]>,
    /// Set the Hidden annotation flag on every widget
    pub hidden: bool,
    /// Give widgets a normal appearance stream
    pub with_appearance: bool,
}

impl FixtureField {
    /// A visible text field with a single widget and an appearance stream
    pub fn text(name: &str, page: usize, rect: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            field_type: "Tx".to_string(),
            page,
            widgets: vec![rect],
            hidden: false,
            with_appearance: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn without_appearance(mut self) -> Self {
        self.with_appearance = false;
        self
    }
}

/// Create a PDF with `page_count` pages and an AcroForm holding `fields`
pub fn pdf_with_fields(page_count: usize, fields: &[FixtureField]) -> Vec<u8> {
    let (mut doc, pages_id, page_ids) = skeleton(page_count);

    let mut field_refs = Vec::new();
    let mut page_annots: Vec<Vec<Object>> = vec![Vec::new(); page_count];

    for field in fields {
        let page_id = page_ids[field.page];
        let (parent_name, leaf_name) = match field.name.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, field.name.as_str()),
        };

        let widget_dict = |rect: &[f32; 4], doc: &mut Document| {
            let mut widget = dictionary! {
                "Type" => Object::Name(b"Annot".to_vec()),
                "Subtype" => Object::Name(b"Widget".to_vec()),
                "Rect" => Object::Array(rect.iter().map(|v| Object::Real(*v)).collect()),
                "P" => Object::Reference(page_id),
                "F" => Object::Integer(if field.hidden { 2 } else { 4 }),
            };
            if field.with_appearance {
                let appearance = appearance_stream(rect[2] - rect[0], rect[3] - rect[1]);
                let ap_id = doc.add_object(appearance);
                widget.set("AP", dictionary! { "N" => Object::Reference(ap_id) });
            }
            widget
        };

        let field_id = if field.widgets.len() == 1 {
            let mut dict = widget_dict(&field.widgets[0], &mut doc);
            dict.set("FT", Object::Name(field.field_type.clone().into_bytes()));
            dict.set("T", Object::string_literal(leaf_name));
            let id = doc.add_object(dict);
            page_annots[field.page].push(Object::Reference(id));
            id
        } else {
            let field_id = doc.new_object_id();
            let mut kids = Vec::new();
            for rect in &field.widgets {
                let mut dict = widget_dict(rect, &mut doc);
                dict.set("Parent", Object::Reference(field_id));
                let kid_id = doc.add_object(dict);
                page_annots[field.page].push(Object::Reference(kid_id));
                kids.push(Object::Reference(kid_id));
            }
            doc.objects.insert(
                field_id,
                Object::Dictionary(dictionary! {
                    "FT" => Object::Name(field.field_type.clone().into_bytes()),
                    "T" => Object::string_literal(leaf_name),
                    "Kids" => Object::Array(kids),
                }),
            );
            field_id
        };

        match parent_name {
            Some(parent) => {
                let parent_id = doc.add_object(dictionary! {
                    "T" => Object::string_literal(parent),
                    "Kids" => Object::Array(vec![Object::Reference(field_id)]),
                });
                if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(field_id) {
                    dict.set("Parent", Object::Reference(parent_id));
                }
                field_refs.push(Object::Reference(parent_id));
            }
            None => field_refs.push(Object::Reference(field_id)),
        }
    }

    for (page_id, annots) in page_ids.iter().zip(page_annots) {
        if annots.is_empty() {
            continue;
        }
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*page_id) {
            dict.set("Annots", Object::Array(annots));
        }
    }

    let acroform = doc.add_object(dictionary! {
        "Fields" => Object::Array(field_refs),
    });
    finish(&mut doc, pages_id, &page_ids, Some(acroform))
}

fn appearance_stream(width: f32, height: f32) -> Stream {
    let content = format!("0.9 0.9 1 rg 0 0 {width} {height} re f\n");
    Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Form".to_vec()),
            "BBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ]),
        },
        content.into_bytes(),
    )
}

fn skeleton(page_count: usize) -> (Document, ObjectId, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::with_capacity(page_count);
    for _ in 0..page_count {
        let contents_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(595.28),
                Object::Real(841.89),
            ]),
            "Resources" => Dictionary::new(),
            "Contents" => Object::Reference(contents_id),
        });
        page_ids.push(page_id);
    }

    (doc, pages_id, page_ids)
}

fn finish(
    doc: &mut Document,
    pages_id: ObjectId,
    page_ids: &[ObjectId],
    acroform: Option<ObjectId>,
) -> Vec<u8> {
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Count" => Object::Integer(page_ids.len() as i64),
            "Kids" => Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        }),
    );

    let mut catalog = dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    };
    if let Some(acroform_id) = acroform {
        catalog.set("AcroForm", Object::Reference(acroform_id));
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .expect("fixture PDF serializes");
    buffer
}

/// Character ranges covered by [`minimal_ttf`]: ASCII, Arabic, and both
/// Arabic presentation form blocks.
const GLYPH_RANGES: [(u32, u32); 4] = [
    (0x0020, 0x007E),
    (0x0600, 0x06FF),
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
];

/// Build a TrueType font that `ttf-parser` accepts
///
/// Only `cmap`, `head`, `hhea`, `hmtx` and `maxp` are present. Every glyph
/// advances 500 units on a 1000 unit em and has no outline.
pub fn minimal_ttf() -> Vec<u8> {
    let mut groups = Vec::new();
    let mut next_gid = 1u32;
    for (start, end) in GLYPH_RANGES {
        groups.push((start, end, next_gid));
        next_gid += end - start + 1;
    }
    let num_glyphs = next_gid as u16;

    let mut cmap = Vec::new();
    push_u16(&mut cmap, 0);
    push_u16(&mut cmap, 1);
    push_u16(&mut cmap, 3);
    push_u16(&mut cmap, 10);
    push_u32(&mut cmap, 12);
    push_u16(&mut cmap, 12);
    push_u16(&mut cmap, 0);
    push_u32(&mut cmap, 16 + 12 * groups.len() as u32);
    push_u32(&mut cmap, 0);
    push_u32(&mut cmap, groups.len() as u32);
    for (start, end, gid) in &groups {
        push_u32(&mut cmap, *start);
        push_u32(&mut cmap, *end);
        push_u32(&mut cmap, *gid);
    }

    let mut head = Vec::new();
    push_u32(&mut head, 0x0001_0000);
    push_u32(&mut head, 0x0001_0000);
    push_u32(&mut head, 0);
    push_u32(&mut head, 0x5F0F_3CF5);
    push_u16(&mut head, 0);
    push_u16(&mut head, 1000);
    head.extend_from_slice(&[0u8; 16]);
    for v in [0i16, -200, 500, 800] {
        push_u16(&mut head, v as u16);
    }
    push_u16(&mut head, 0);
    push_u16(&mut head, 8);
    push_u16(&mut head, 2);
    push_u16(&mut head, 0);
    push_u16(&mut head, 0);

    let mut hhea = Vec::new();
    push_u32(&mut hhea, 0x0001_0000);
    for v in [800i16, -200, 0] {
        push_u16(&mut hhea, v as u16);
    }
    push_u16(&mut hhea, 500);
    for v in [0i16, 0, 500, 1, 0, 0, 0, 0, 0, 0, 0] {
        push_u16(&mut hhea, v as u16);
    }
    push_u16(&mut hhea, 1);

    let mut hmtx = Vec::new();
    push_u16(&mut hmtx, 500);
    push_u16(&mut hmtx, 0);
    hmtx.resize(hmtx.len() + 2 * (num_glyphs as usize - 1), 0);

    let mut maxp = Vec::new();
    push_u32(&mut maxp, 0x0000_5000);
    push_u16(&mut maxp, num_glyphs);

    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];

    let mut font = Vec::new();
    push_u32(&mut font, 0x0001_0000);
    push_u16(&mut font, tables.len() as u16);
    push_u16(&mut font, 64);
    push_u16(&mut font, 2);
    push_u16(&mut font, 16);

    let mut offset = 12 + 16 * tables.len() as u32;
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        push_u32(&mut font, 0);
        push_u32(&mut font, offset);
        push_u32(&mut font, data.len() as u32);

        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() as u32 + body.len() as u32;
    }
    font.extend_from_slice(&body);
    font
}

/// A solid-color 4x4 PNG
pub fn tiny_png() -> Vec<u8> {
    encode(::image::ImageFormat::Png)
}

/// A solid-color 4x4 JPEG
pub fn tiny_jpeg() -> Vec<u8> {
    encode(::image::ImageFormat::Jpeg)
}

fn encode(format: ::image::ImageFormat) -> Vec<u8> {
    let pixels = ::image::RgbImage::from_pixel(4, 4, ::image::Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    ::image::DynamicImage::ImageRgb8(pixels)
        .write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .expect("fixture image encodes");
    bytes
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Text shown by each `Tj` on `page` (1-based), in drawing order
///
/// Two-byte codes are mapped back to Unicode through the `bfchar` entries
/// of every ToUnicode CMap in the document; unmapped codes become U+FFFD.
pub fn shown_text(pdf: &[u8], page: u32) -> Vec<String> {
    let doc = Document::load_mem(pdf).expect("fixture PDF loads");

    let mut to_unicode: HashMap<u16, String> = HashMap::new();
    for object in doc.objects.values() {
        let Object::Stream(stream) = object else {
            continue;
        };
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let cmap = String::from_utf8_lossy(&data);
        let Some(start) = cmap.find("beginbfchar") else {
            continue;
        };
        for line in cmap[start..].lines().skip(1) {
            let hex = |token: &str| token.strip_prefix('<')?.strip_suffix('>').map(str::to_string);
            let mut parts = line.split_whitespace().map(hex);
            let (Some(Some(code)), Some(Some(text))) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(code) = u16::from_str_radix(&code, 16) else {
                continue;
            };
            let units: Vec<u16> = (0..text.len())
                .step_by(4)
                .filter_map(|i| text.get(i..i + 4))
                .filter_map(|unit| u16::from_str_radix(unit, 16).ok())
                .collect();
            to_unicode.insert(code, String::from_utf16_lossy(&units));
        }
    }

    let page_id = doc.get_pages()[&page];
    let content = doc.get_page_content(page_id).expect("page content reads");
    let content = Content::decode(&content).expect("page content parses");
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(bytes),
            _ => None,
        })
        .map(|bytes| {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]);
                    to_unicode
                        .get(&code)
                        .cloned()
                        .unwrap_or_else(|| '\u{FFFD}'.to_string())
                })
                .collect()
        })
        .collect()
}
