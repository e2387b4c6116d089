//! Arabic Text - shaping for left-to-right drawing primitives
//!
//! PDF text operators paint glyphs left to right in the order given and know
//! nothing about Arabic joining. This crate turns logical-order text into
//! what such a primitive must be fed:
//! - contextual reshaping into Arabic presentation forms
//! - bidirectional reordering into visual order
//!
//! Text without Arabic characters passes through untouched, so Latin names
//! and digits are never reordered.
//!
//! # Example
//!
//! ```ignore
//! use arabic_text::shape;
//!
//! let visual = shape("محمد");
//! doc.insert_text(&visual, 1, 100.0, 700.0, Align::Left)?;
//! ```

mod script;
mod shaper;

pub use script::{contains_arabic, is_arabic};
pub use shaper::{shape, ArabicShaper};

use thiserror::Error;

/// Errors raised by the fallible shaping path
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("Reshaping failed: {0}")]
    Reshape(String),

    #[error("Bidi reordering failed: {0}")]
    Reorder(String),
}

/// Result type for shaping operations
pub type Result<T> = std::result::Result<T, ShapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ShapeError::Reshape("boom".to_string());
        assert_eq!(err.to_string(), "Reshaping failed: boom");
    }

    #[test]
    fn test_shape_passthrough() {
        assert_eq!(shape("Ahmad 1990"), "Ahmad 1990");
    }
}
