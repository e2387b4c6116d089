//! PDF Document wrapper

use crate::image::{generate_image_operators, ImageXObject};
use crate::text::{generate_text_operators, TextRenderContext};
use crate::{Align, FontData, PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Safety limit when walking the page tree for inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 16;

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create color from 8-bit channels
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// PDF Document wrapper providing high-level operations
///
/// Page numbers are 1-indexed and coordinates are PDF user space (origin at
/// the bottom-left corner). Drawing operators are buffered per page and
/// written once in [`PdfDocument::to_bytes`], in the order they were issued.
pub struct PdfDocument {
    pub(crate) inner: Document,
    /// Registered fonts (font name -> data)
    fonts: HashMap<String, FontData>,
    current_font: Option<String>,
    current_font_size: f32,
    current_text_color: Color,
    /// Page font resources (page number -> font name -> resource name)
    page_font_resources: HashMap<usize, HashMap<String, String>>,
    /// Embedded images (data hash -> PDF object ID)
    embedded_images: HashMap<u64, ObjectId>,
    /// Page XObject resources (page number -> object ID -> resource name)
    page_xobject_resources: HashMap<usize, HashMap<ObjectId, String>>,
    next_resource: u32,
    /// Buffered content operators per page
    page_content_buffer: HashMap<usize, Vec<u8>>,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    fn from_document(inner: Document) -> Self {
        Self {
            inner,
            fonts: HashMap::new(),
            current_font: None,
            current_font_size: 12.0,
            current_text_color: Color::default(),
            page_font_resources: HashMap::new(),
            embedded_images: HashMap::new(),
            page_xobject_resources: HashMap::new(),
            next_resource: 1,
            page_content_buffer: HashMap::new(),
        }
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Register a TrueType font under `name`
    pub fn add_font(&mut self, name: &str, ttf_data: &[u8]) -> Result<()> {
        if self.fonts.contains_key(name) {
            return Err(PdfError::FontAlreadyExists(name.to_string()));
        }
        let font = FontData::from_ttf(name, ttf_data)?;
        self.fonts.insert(name.to_string(), font);
        Ok(())
    }

    /// Select the font and size used by subsequent [`insert_text`](Self::insert_text) calls
    pub fn set_font(&mut self, name: &str, size: f32) -> Result<()> {
        if !self.fonts.contains_key(name) {
            return Err(PdfError::FontNotFound(name.to_string()));
        }
        self.current_font = Some(name.to_string());
        self.current_font_size = size;
        Ok(())
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.current_text_color = color;
    }

    /// Draw `text` with its baseline starting at (`x`, `y`)
    ///
    /// Characters are emitted left to right in the order given; callers
    /// drawing right-to-left scripts must pass text already in visual order.
    /// Characters without a glyph in the font are drawn as `.notdef`.
    pub fn insert_text(
        &mut self,
        text: &str,
        page: usize,
        x: f64,
        y: f64,
        align: Align,
    ) -> Result<()> {
        self.page_id(page)?;
        if text.is_empty() {
            return Ok(());
        }

        let font_name = self
            .current_font
            .clone()
            .ok_or_else(|| PdfError::FontNotFound("no font selected".to_string()))?;
        let font_size = self.current_font_size;

        let (text_hex, text_width) = {
            let font = self
                .fonts
                .get_mut(&font_name)
                .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))?;
            font.add_chars(text);
            (
                font.encode_text_hex(text),
                font.text_width_points(text, font_size) as f64,
            )
        };

        let resource_name = self.get_or_create_font_ref(&font_name, page)?;
        let ctx = TextRenderContext {
            font_name: resource_name,
            font_size,
            text_width,
            color: self.current_text_color,
        };
        let ops = generate_text_operators(&text_hex, x, y, align, &ctx);
        self.buffer_content(page, &ops);
        Ok(())
    }

    /// Width of `text` in points with the current font and size
    pub fn text_width(&self, text: &str) -> Result<f64> {
        let font_name = self
            .current_font
            .as_ref()
            .ok_or_else(|| PdfError::FontNotFound("no font selected".to_string()))?;
        let font = self
            .fonts
            .get(font_name)
            .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))?;
        Ok(font.text_width_points(text, self.current_font_size) as f64)
    }

    /// Draw a JPEG or PNG image stretched into the box with lower-left corner (`x`, `y`)
    pub fn insert_image(
        &mut self,
        data: &[u8],
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        self.page_id(page)?;
        let object_id = self.get_or_create_image_object(data)?;
        let resource_name = self.get_or_create_xobject_ref(page, object_id, "Im")?;
        let ops = generate_image_operators(&resource_name, x, y, width, height);
        self.buffer_content(page, &ops);
        Ok(())
    }

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize the document
    ///
    /// Embeds the fonts used so far, attaches them to page resources and
    /// appends all buffered page content.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.embed_fonts()?;
        self.flush_content_buffers()?;

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(buffer)
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    pub(crate) fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        u32::try_from(page)
            .ok()
            .and_then(|p| pages.get(&p).copied())
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Embed every font that has drawn characters and wire page resources
    fn embed_fonts(&mut self) -> Result<()> {
        let mut embedded: HashMap<String, ObjectId> = HashMap::new();
        let mut names: Vec<&String> = self
            .fonts
            .iter()
            .filter(|(_, font)| !font.used_chars.is_empty())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        let names: Vec<String> = names.into_iter().cloned().collect();

        for name in names {
            let id = self.embed_font_object(&name)?;
            embedded.insert(name, id);
        }

        let page_fonts: Vec<(usize, HashMap<String, String>)> =
            self.page_font_resources.drain().collect();
        for (page, fonts) in page_fonts {
            for (font_name, resource_name) in fonts {
                let font_id = *embedded
                    .get(&font_name)
                    .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))?;
                self.set_page_resource(page, b"Font", &resource_name, font_id)?;
            }
        }

        for font in self.fonts.values_mut() {
            font.reset_usage();
        }
        Ok(())
    }

    fn embed_font_object(&mut self, font_name: &str) -> Result<ObjectId> {
        let objects = self
            .fonts
            .get(font_name)
            .ok_or_else(|| PdfError::FontNotFound(font_name.to_string()))?
            .to_pdf_objects();

        let font_file_id = self.inner.add_object(objects.font_file_stream);

        let mut font_descriptor = objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let font_descriptor_id = self.inner.add_object(font_descriptor);

        let mut cid_font = objects.cid_font;
        cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
        if let Some(map) = objects.cid_to_gid_map {
            let map_id = self.inner.add_object(map);
            cid_font.set("CIDToGIDMap", Object::Reference(map_id));
        }
        let cid_font_id = self.inner.add_object(cid_font);

        let tounicode_id = self.inner.add_object(objects.tounicode_stream);

        let mut type0_font = objects.type0_font;
        type0_font.set("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)]));
        type0_font.set("ToUnicode", Object::Reference(tounicode_id));

        Ok(self.inner.add_object(type0_font))
    }

    /// Resource name of `font_name` on `page`, allocated on first use
    ///
    /// The font itself is attached to the page at save time, once every
    /// character it must cover is known.
    fn get_or_create_font_ref(&mut self, font_name: &str, page: usize) -> Result<String> {
        if let Some(name) = self
            .page_font_resources
            .get(&page)
            .and_then(|fonts| fonts.get(font_name))
        {
            return Ok(name.clone());
        }

        let name = self.unique_resource_name(page, b"Font", "F")?;
        self.page_font_resources
            .entry(page)
            .or_default()
            .insert(font_name.to_string(), name.clone());
        Ok(name)
    }

    /// Embed an image once per distinct payload
    fn get_or_create_image_object(&mut self, data: &[u8]) -> Result<ObjectId> {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        let data_hash = hasher.finish();

        if let Some(id) = self.embedded_images.get(&data_hash) {
            return Ok(*id);
        }

        let xobject = ImageXObject::decode(data)?;
        if xobject.width == 0 || xobject.height == 0 {
            return Err(PdfError::ImageError("Image has no pixels".to_string()));
        }
        let id = self.inner.add_object(xobject.to_pdf_stream());
        self.embedded_images.insert(data_hash, id);
        Ok(id)
    }

    /// Resource name of XObject `object_id` on `page`, registering it if needed
    pub(crate) fn get_or_create_xobject_ref(
        &mut self,
        page: usize,
        object_id: ObjectId,
        prefix: &str,
    ) -> Result<String> {
        if let Some(name) = self
            .page_xobject_resources
            .get(&page)
            .and_then(|xobjects| xobjects.get(&object_id))
        {
            return Ok(name.clone());
        }

        let name = self.unique_resource_name(page, b"XObject", prefix)?;
        self.set_page_resource(page, b"XObject", &name, object_id)?;
        self.page_xobject_resources
            .entry(page)
            .or_default()
            .insert(object_id, name.clone());
        Ok(name)
    }

    /// Pick a resource name not already used by the page's own resources
    fn unique_resource_name(
        &mut self,
        page: usize,
        category: &[u8],
        prefix: &str,
    ) -> Result<String> {
        let page_id = self.page_id(page)?;
        let existing = self.resource_category(&self.page_resources(page_id), category);
        let pending: Vec<&String> = self
            .page_font_resources
            .get(&page)
            .map(|fonts| fonts.values().collect())
            .unwrap_or_default();

        loop {
            let name = format!("{prefix}{}", self.next_resource);
            self.next_resource += 1;
            if !existing.has(name.as_bytes()) && !pending.contains(&&name) {
                return Ok(name);
            }
        }
    }

    /// Effective Resources dictionary of a page, following references and inheritance
    fn page_resources(&self, page_id: ObjectId) -> Dictionary {
        let mut current = page_id;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let Some(dict) = self
                .inner
                .get_object(current)
                .ok()
                .and_then(|o| o.as_dict().ok())
            else {
                break;
            };
            if let Ok(resources) = dict.get(b"Resources") {
                return self.resolve_dict(resources);
            }
            match dict.get(b"Parent").and_then(Object::as_reference) {
                Ok(parent) => current = parent,
                Err(_) => break,
            }
        }
        Dictionary::new()
    }

    fn resource_category(&self, resources: &Dictionary, category: &[u8]) -> Dictionary {
        resources
            .get(category)
            .map(|obj| self.resolve_dict(obj))
            .unwrap_or_default()
    }

    fn resolve_dict(&self, obj: &Object) -> Dictionary {
        match obj {
            Object::Dictionary(dict) => dict.clone(),
            Object::Reference(id) => self
                .inner
                .get_object(*id)
                .ok()
                .and_then(|o| o.as_dict().ok())
                .cloned()
                .unwrap_or_default(),
            _ => Dictionary::new(),
        }
    }

    /// Add `/category /name ref` to a page's Resources
    ///
    /// The page receives a direct Resources dictionary so inherited or shared
    /// resources are never modified for other pages.
    fn set_page_resource(
        &mut self,
        page: usize,
        category: &[u8],
        name: &str,
        object_id: ObjectId,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let mut resources = self.page_resources(page_id);
        let mut entries = self.resource_category(&resources, category);
        entries.set(name.as_bytes(), Object::Reference(object_id));
        resources.set(category, Object::Dictionary(entries));

        let page_dict = self
            .inner
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;
        page_dict.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Buffer content operators for a page (written at save time)
    pub(crate) fn buffer_content(&mut self, page: usize, content: &[u8]) {
        self.page_content_buffer
            .entry(page)
            .or_default()
            .extend_from_slice(content);
    }

    fn flush_content_buffers(&mut self) -> Result<()> {
        let mut buffers: Vec<(usize, Vec<u8>)> = self.page_content_buffer.drain().collect();
        buffers.sort_by_key(|(page, _)| *page);

        for (page, content) in buffers {
            if !content.is_empty() {
                self.append_to_content_stream(page, &content)?;
            }
        }
        Ok(())
    }

    /// Replace a page's contents with its existing content followed by `content`
    ///
    /// The existing content is wrapped in `q`/`Q` so a graphics state it
    /// leaves behind cannot shift the appended operators.
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let existing = self.inner.get_page_content(page_id).unwrap_or_default();

        let mut combined = Vec::with_capacity(existing.len() + content.len() + 8);
        if !existing.is_empty() {
            combined.extend_from_slice(b"q\n");
            combined.extend_from_slice(&existing);
            combined.extend_from_slice(b"\nQ\n");
        }
        combined.extend_from_slice(content);

        let stream_id = self.inner.add_object(Stream::new(Dictionary::new(), combined));
        let page_dict = self
            .inner
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;
        page_dict.set("Contents", Object::Reference(stream_id));
        Ok(())
    }
}
