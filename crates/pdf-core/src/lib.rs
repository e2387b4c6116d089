//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Embedding a TrueType font (Type0 / Identity-H)
//! - Inserting text and images at page coordinates (bottom-left origin)
//! - Reading interactive form fields and their widget rectangles
//! - Flattening the interactive form layer into page content
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{PdfDocument, Align};
//!
//! let mut doc = PdfDocument::open_from_bytes(&template_bytes)?;
//! doc.add_font("amiri", &font_bytes)?;
//! doc.set_font("amiri", 12.0)?;
//! doc.insert_text("Hello, World!", 1, 100.0, 700.0, Align::Left)?;
//! let bytes = doc.to_bytes()?;
//! ```

mod document;
mod font;
mod form;
mod image;
mod text;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use document::{Color, PdfDocument};
pub use font::FontData;
pub use form::{FieldType, FormField, Rect, Widget};
pub use image::{ImageFormat, ImageXObject};
pub use text::{generate_text_operators, TextRenderContext};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Font already exists: {0}")]
    FontAlreadyExists(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_default() {
        assert_eq!(Align::default(), Align::Left);
    }

    #[test]
    fn test_error_messages() {
        let err = PdfError::InvalidPage(3, 1);
        assert_eq!(err.to_string(), "Invalid page number: 3 (document has 1 pages)");

        let err = PdfError::FontNotFound("amiri".to_string());
        assert_eq!(err.to_string(), "Font not found: amiri");
    }
}
