//! Raster images as PDF image XObjects

use crate::{PdfError, Result};
use image::{DynamicImage, ImageDecoder, ImageReader};
use lopdf::{Dictionary, Object, Stream};
use std::io::{Cursor, Write};

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::ImageError(err.to_string())
    }
}

/// Image container recognised by its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Sniff the container format from magic bytes
    pub fn detect(data: &[u8]) -> Option<Self> {
        const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(&PNG_MAGIC) {
            Some(Self::Png)
        } else {
            None
        }
    }
}

/// Image XObject ready for embedding
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    /// "DeviceRGB", "DeviceGray" or "DeviceCMYK"
    pub color_space: &'static str,
    pub bits_per_component: u8,
    /// "DCTDecode" for JPEG passthrough, "FlateDecode" otherwise
    pub filter: &'static str,
    /// Encoded sample data
    pub data: Vec<u8>,
}

impl ImageXObject {
    /// Embed JPEG bytes as-is once they decode cleanly
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        if ImageFormat::detect(data) != Some(ImageFormat::Jpeg) {
            return Err(PdfError::ImageError("Not a JPEG image".to_string()));
        }
        let (width, height, components) = jpeg_frame_info(data)?;
        let color_space = jpeg_color_space(components)?;

        // Truncated or corrupt scans would otherwise reach the page as broken images
        let decoder = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Jpeg)
            .into_decoder()?;
        DynamicImage::from_decoder(decoder)?;

        Ok(Self {
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: "DCTDecode",
            data: data.to_vec(),
        })
    }

    /// Decode PNG bytes into deflated samples
    ///
    /// Transparent pixels are composited over white.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        if ImageFormat::detect(data) != Some(ImageFormat::Png) {
            return Err(PdfError::ImageError("Not a PNG image".to_string()));
        }
        let decoder = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Png)
            .into_decoder()?;
        let (width, height) = decoder.dimensions();
        let color_type = decoder.color_type();
        let decoded = DynamicImage::from_decoder(decoder)?;

        let (samples, color_space) = if color_type.has_color() {
            let rgba = decoded.to_rgba8();
            let mut samples = Vec::with_capacity((width * height * 3) as usize);
            for pixel in rgba.pixels() {
                let [r, g, b, a] = pixel.0;
                samples.extend([r, g, b].map(|c| over_white(c, a)));
            }
            (samples, "DeviceRGB")
        } else {
            let la = decoded.to_luma_alpha8();
            let samples = la.pixels().map(|p| over_white(p.0[0], p.0[1])).collect();
            (samples, "DeviceGray")
        };

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&samples)?;

        Ok(Self {
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: "FlateDecode",
            data: encoder.finish()?,
        })
    }

    /// Dispatch on the sniffed container format
    pub fn decode(data: &[u8]) -> Result<Self> {
        match ImageFormat::detect(data) {
            Some(ImageFormat::Jpeg) => Self::from_jpeg(data),
            Some(ImageFormat::Png) => Self::from_png(data),
            None => Err(PdfError::ImageError("Unrecognised image format".to_string())),
        }
    }

    pub fn to_pdf_stream(&self) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", self.width as i64);
        dict.set("Height", self.height as i64);
        dict.set("ColorSpace", Object::Name(self.color_space.as_bytes().to_vec()));
        dict.set("BitsPerComponent", self.bits_per_component as i64);
        dict.set("Filter", Object::Name(self.filter.as_bytes().to_vec()));

        // Already encoded; keep lopdf from compressing again
        Stream::new(dict, self.data.clone()).with_compression(false)
    }
}

fn jpeg_color_space(components: u8) -> Result<&'static str> {
    match components {
        1 => Ok("DeviceGray"),
        3 => Ok("DeviceRGB"),
        4 => Ok("DeviceCMYK"),
        n => Err(PdfError::ImageError(format!(
            "Unsupported JPEG component count: {n}"
        ))),
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let a = alpha as u16;
    ((channel as u16 * a + 255 * (255 - a)) / 255) as u8
}

/// Width, height and component count from the first SOFn segment
fn jpeg_frame_info(data: &[u8]) -> Result<(u32, u32, u8)> {
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        // SOF0..SOF15 except DHT, JPG and DAC
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Ok((width, height, data[i + 9]));
        }
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        i += 2 + length;
    }
    Err(PdfError::ImageError("JPEG frame header not found".to_string()))
}

/// Operators painting image `name` into the box at (`x`, `y`)
pub fn generate_image_operators(name: &str, x: f64, y: f64, width: f64, height: f64) -> Vec<u8> {
    format!("q\n{width} 0 0 {height} {x} {y} cm\n/{name} Do\nQ\n").into_bytes()
}
