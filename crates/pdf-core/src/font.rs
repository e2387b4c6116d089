//! TrueType font embedding

use crate::{PdfError, Result};
use lopdf::{Dictionary, Object, Stream};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;
use subsetter::GlyphRemapper;
use ttf_parser::{Face, GlyphId};

/// A TrueType font registered with a document
///
/// The raw TTF bytes are kept and parsed on demand; `ttf_parser::Face`
/// parsing is lazy so this is cheap. Drawn glyphs get CIDs in drawing
/// order, which become glyph IDs of the embedded subset.
#[derive(Debug, Clone)]
pub struct FontData {
    /// Font name/identifier (also used as BaseFont)
    pub name: String,
    /// Raw TTF data
    pub ttf_data: Vec<u8>,
    /// Characters drawn with this font
    pub used_chars: BTreeSet<char>,
    /// Original glyph ID of every CID handed out; CID 0 is .notdef
    cid_to_gid: Vec<u16>,
    gid_to_cid: HashMap<u16, u16>,
}

/// PDF objects generated for font embedding
pub struct FontObjects {
    /// Type0 font dictionary
    pub type0_font: Dictionary,
    /// CIDFont Type2 dictionary
    pub cid_font: Dictionary,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Font file stream (subset TTF, or the whole font when subsetting fails)
    pub font_file_stream: Stream,
    /// CID to original glyph ID table, only when the whole font is embedded
    pub cid_to_gid_map: Option<Stream>,
    /// ToUnicode CMap stream
    pub tounicode_stream: Stream,
}

impl FontData {
    /// Create font data from TTF bytes, failing if the font cannot be parsed
    pub fn from_ttf(name: &str, ttf_data: &[u8]) -> Result<Self> {
        Face::parse(ttf_data, 0).map_err(|e| PdfError::FontParseError(format!("{e:?}")))?;

        Ok(Self::unparsed(name, ttf_data.to_vec()))
    }

    fn unparsed(name: &str, ttf_data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            ttf_data,
            used_chars: BTreeSet::new(),
            cid_to_gid: vec![0],
            gid_to_cid: HashMap::from([(0, 0)]),
        }
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.ttf_data, 0).ok()
    }

    /// Add characters to the used set
    pub fn add_chars(&mut self, text: &str) {
        self.used_chars.extend(text.chars());
    }

    /// Glyph ID for a character (0 = .notdef)
    pub fn glyph_id(&self, c: char) -> u16 {
        self.face()
            .and_then(|face| face.glyph_index(c))
            .map(|id| id.0)
            .unwrap_or(0)
    }

    /// Check if the font has a real glyph for the given character
    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c) != 0
    }

    /// Font units per em (1000 when the font cannot be read)
    pub fn units_per_em(&self) -> u16 {
        self.face().map(|face| face.units_per_em()).unwrap_or(1000)
    }

    fn ascender(&self) -> i16 {
        self.face().map(|face| face.ascender()).unwrap_or(800)
    }

    fn descender(&self) -> i16 {
        self.face().map(|face| face.descender()).unwrap_or(-200)
    }

    /// Width of `text` in points at `font_size`
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let Some(face) = self.face() else {
            return 0.0;
        };
        let units: u32 = text
            .chars()
            .filter_map(|c| face.glyph_index(c))
            .filter_map(|gid| face.glyph_hor_advance(gid))
            .map(u32::from)
            .sum();
        units as f32 / face.units_per_em() as f32 * font_size
    }

    /// CID for `gid`, allocated on first use
    fn cid(&mut self, gid: u16) -> u16 {
        if let Some(&cid) = self.gid_to_cid.get(&gid) {
            return cid;
        }
        // A font has at most u16::MAX glyphs, so CIDs cannot run out
        let cid = self.cid_to_gid.len() as u16;
        self.cid_to_gid.push(gid);
        self.gid_to_cid.insert(gid, cid);
        cid
    }

    /// Number of CIDs handed out, .notdef included
    pub fn cid_count(&self) -> usize {
        self.cid_to_gid.len()
    }

    /// Encode text as a hex string of 2-byte CIDs for `Tj` (Identity-H)
    pub fn encode_text_hex(&mut self, text: &str) -> String {
        let gids: Vec<u16> = match self.face() {
            Some(face) => text
                .chars()
                .map(|c| face.glyph_index(c).map(|id| id.0).unwrap_or(0))
                .collect(),
            None => vec![0; text.chars().count()],
        };
        let mut hex = String::with_capacity(gids.len() * 4 + 2);
        hex.push('<');
        for gid in gids {
            let cid = self.cid(gid);
            let _ = write!(hex, "{cid:04X}");
        }
        hex.push('>');
        hex
    }

    /// Forget drawn characters and CIDs once the font has been embedded
    pub fn reset_usage(&mut self) {
        self.used_chars.clear();
        self.cid_to_gid = vec![0];
        self.gid_to_cid = HashMap::from([(0, 0)]);
    }

    /// TrueType subset holding the drawn glyphs, glyph IDs equal to CIDs
    fn subset(&self) -> Option<Vec<u8>> {
        let mut remapper = GlyphRemapper::new();
        for (cid, &gid) in self.cid_to_gid.iter().enumerate() {
            if usize::from(remapper.remap(gid)) != cid {
                log::warn!("font {}: glyph order not preserved, embedding it whole", self.name);
                return None;
            }
        }
        match subsetter::subset(&self.ttf_data, 0, &remapper) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("font {}: subsetting failed ({e:?}), embedding it whole", self.name);
                None
            }
        }
    }

    /// Big-endian original glyph ID for every CID
    fn cid_to_gid_bytes(&self) -> Vec<u8> {
        self.cid_to_gid
            .iter()
            .flat_map(|gid| gid.to_be_bytes())
            .collect()
    }

    /// Generate all PDF objects needed to embed this font
    ///
    /// Object references between the returned dictionaries are left as
    /// placeholders; the document wires them up when adding the objects.
    pub fn to_pdf_objects(&self) -> FontObjects {
        let base_font = Object::Name(self.name.clone().into_bytes());

        let tounicode_content = self.generate_tounicode_cmap();
        let tounicode_stream = Stream::new(
            Dictionary::from_iter(vec![("Type", Object::Name(b"CMap".to_vec()))]),
            tounicode_content.into_bytes(),
        );

        let (font_program, cid_to_gid_map) = match self.subset() {
            Some(subset) => {
                log::debug!(
                    "font {}: subset to {} glyphs, {} of {} bytes",
                    self.name,
                    self.cid_to_gid.len(),
                    subset.len(),
                    self.ttf_data.len()
                );
                (subset, None)
            }
            None => {
                let map = Stream::new(Dictionary::new(), self.cid_to_gid_bytes());
                (self.ttf_data.clone(), Some(map))
            }
        };
        let font_file_stream = Stream::new(
            Dictionary::from_iter(vec![("Length1", Object::Integer(font_program.len() as i64))]),
            font_program,
        );

        let scale = 1000.0 / self.units_per_em() as f64;
        let ascent = (self.ascender() as f64 * scale).round() as i64;
        let descent = (self.descender() as f64 * scale).round() as i64;

        let font_descriptor = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", base_font.clone()),
            ("Flags", Object::Integer(4)),
            (
                "FontBBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(descent),
                    Object::Integer(1000),
                    Object::Integer(ascent),
                ]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(ascent)),
            ("Descent", Object::Integer(descent)),
            ("CapHeight", Object::Integer(ascent)),
            ("StemV", Object::Integer(80)),
        ]);

        let cid_system_info = Dictionary::from_iter(vec![
            ("Registry", Object::string_literal("Adobe")),
            ("Ordering", Object::string_literal("Identity")),
            ("Supplement", Object::Integer(0)),
        ]);

        let cid_font = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", base_font.clone()),
            ("CIDSystemInfo", Object::Dictionary(cid_system_info)),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
            ("W", Object::Array(self.generate_widths_array())),
            ("DW", Object::Integer(1000)),
        ]);

        let type0_font = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", base_font),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
        ]);

        FontObjects {
            type0_font,
            cid_font,
            font_descriptor,
            font_file_stream,
            cid_to_gid_map,
            tounicode_stream,
        }
    }

    /// `/W` array entries `cid [width]`, widths scaled to 1/1000 em
    fn generate_widths_array(&self) -> Vec<Object> {
        let Some(face) = self.face() else {
            return Vec::new();
        };
        let scale = 1000.0 / face.units_per_em() as f64;

        let mut widths = Vec::with_capacity(self.cid_to_gid.len() * 2);
        for (cid, &gid) in self.cid_to_gid.iter().enumerate().skip(1) {
            let advance = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
            widths.push(Object::Integer(cid as i64));
            widths.push(Object::Array(vec![Object::Integer(
                (advance as f64 * scale).round() as i64,
            )]));
        }
        widths
    }

    /// ToUnicode CMap mapping each drawn CID back to its character
    fn generate_tounicode_cmap(&self) -> String {
        let mut cmap = String::new();
        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");
        cmap.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

        let entries: Vec<(u16, char)> = self
            .used_chars
            .iter()
            .filter_map(|&c| Some((*self.gid_to_cid.get(&self.glyph_id(c))?, c)))
            .collect();
        // bfchar sections are limited to 100 entries
        for chunk in entries.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(cid, c) in chunk {
                let mut utf16 = [0u16; 2];
                let units: String = c
                    .encode_utf16(&mut utf16)
                    .iter()
                    .map(|u| format!("{u:04X}"))
                    .collect();
                let _ = writeln!(cmap, "<{cid:04X}> <{units}>");
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\nend\n");
        cmap
    }
}
