//! Reshaping and visual reordering

use crate::script::contains_arabic;
use crate::{Result, ShapeError};
use ar_reshaper::{ArabicReshaper, ReshaperConfig};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use unicode_bidi::BidiInfo;
use unicode_bidi_mirroring::get_mirrored;

/// Reusable shaper holding a configured reshaper
pub struct ArabicShaper {
    reshaper: ArabicReshaper,
}

impl Default for ArabicShaper {
    fn default() -> Self {
        Self::new(ReshaperConfig::default())
    }
}

impl ArabicShaper {
    pub fn new(config: ReshaperConfig) -> Self {
        Self {
            reshaper: ArabicReshaper::new(config),
        }
    }

    /// Shape `text` for a left-to-right drawing primitive, never failing
    ///
    /// Returns `text` unchanged when it is empty, has no Arabic characters,
    /// or when shaping fails.
    pub fn shape(&self, text: &str) -> String {
        if !contains_arabic(text) {
            return text.to_string();
        }
        match self.try_shape(text) {
            Ok(shaped) => shaped,
            Err(err) => {
                log::warn!("shaping failed, drawing text unshaped: {err}");
                text.to_string()
            }
        }
    }

    /// Reshape then reorder into visual order
    pub fn try_shape(&self, text: &str) -> Result<String> {
        let reshaped = guarded(|| self.reshaper.reshape(text)).map_err(ShapeError::Reshape)?;
        guarded(|| visual_order(&reshaped)).map_err(ShapeError::Reorder)
    }
}

/// Shape with the default reshaper configuration
pub fn shape(text: &str) -> String {
    if !contains_arabic(text) {
        return text.to_string();
    }
    ArabicShaper::default().shape(text)
}

/// Reorder every paragraph of `text` from logical to visual order
///
/// Right-to-left runs are reversed and their paired punctuation mirrored,
/// so `(` in an Arabic run is drawn as `)`.
fn visual_order(text: &str) -> String {
    let info = BidiInfo::new(text, None);
    let mut ordered = String::with_capacity(text.len());
    for para in &info.paragraphs {
        let (levels, runs) = info.visual_runs(para, para.range.clone());
        for run in runs {
            let chars = &text[run.clone()];
            if levels[run.start].is_rtl() {
                ordered.extend(chars.chars().rev().map(|c| get_mirrored(c).unwrap_or(c)));
            } else {
                ordered.push_str(chars);
            }
        }
    }
    ordered
}

/// Run `f`, turning a panic into its message
fn guarded<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shape_empty() {
        assert_eq!(shape(""), "");
    }

    #[test]
    fn test_shape_non_arabic_unchanged() {
        for text in ["Ahmad", "1990", "Jean-Luc 42", "a/b (c)", "  spaced  "] {
            assert_eq!(shape(text), text);
        }
    }

    #[test]
    fn test_shape_joins_and_reverses() {
        // beh alef beh: initial beh, final alef, isolated beh, drawn right to left
        assert_eq!(shape("باب"), "\u{FE8F}\u{FE8E}\u{FE91}");
    }

    #[test]
    fn test_shape_keeps_digits_left_to_right() {
        assert_eq!(shape("باب 12"), "12 \u{FE8F}\u{FE8E}\u{FE91}");
    }

    #[test]
    fn test_shape_mirrors_brackets_in_arabic_runs() {
        assert_eq!(shape("(باب)"), "(\u{FE8F}\u{FE8E}\u{FE91})");
        assert_eq!(
            shape("محمد (12)"),
            "(12) \u{FEAA}\u{FEE4}\u{FEA4}\u{FEE3}"
        );
    }

    #[test]
    fn test_visual_order_leaves_latin_brackets_alone() {
        assert_eq!(visual_order("a (b) [c]"), "a (b) [c]");
    }

    #[test]
    fn test_shape_output_has_no_logical_letters() {
        let shaped = shape("محمد");
        assert!(!shaped.is_empty());
        assert!(!shaped.chars().any(|c| ('\u{0621}'..='\u{064A}').contains(&c)));
    }

    #[test]
    fn test_shaper_reuse() {
        let shaper = ArabicShaper::default();
        assert_eq!(shaper.shape("باب"), shape("باب"));
        assert_eq!(shaper.try_shape("باب").unwrap(), shape("باب"));
    }

    #[test]
    fn test_visual_order_multiple_paragraphs() {
        let ordered = visual_order("ab\ncd");
        assert_eq!(ordered, "ab\ncd");
    }

    #[test]
    fn test_guarded_catches_panic() {
        let result: std::result::Result<(), String> = guarded(|| panic!("bad input"));
        assert_eq!(result.unwrap_err(), "bad input");

        let formatted: std::result::Result<(), String> = guarded(|| panic!("code {}", 7));
        assert_eq!(formatted.unwrap_err(), "code 7");

        assert_eq!(guarded(|| 5).unwrap(), 5);
    }
}
