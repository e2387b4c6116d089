//! Text drawing operators

use crate::document::Color;
use crate::Align;
use std::fmt::Write;

/// Context for rendering one run of text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text width in points (for alignment)
    pub text_width: f64,
    /// Fill color (RGB)
    pub color: Color,
}

/// Generate PDF operators that draw one run of hex-encoded glyphs
///
/// The run is wrapped in `q`/`Q` so the fill color does not leak into
/// content appended later on the same page. `x`/`y` are in PDF user space
/// (bottom-left origin); `y` is the text baseline.
pub fn generate_text_operators(
    text_hex: &str,
    x: f64,
    y: f64,
    align: Align,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let start_x = match align {
        Align::Left => x,
        Align::Center => x - ctx.text_width / 2.0,
        Align::Right => x - ctx.text_width,
    };

    let mut ops = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(ops, "q");
    let _ = writeln!(ops, "BT");
    let _ = writeln!(ops, "{} {} {} rg", ctx.color.r, ctx.color.g, ctx.color.b);
    let _ = writeln!(ops, "/{} {} Tf", ctx.font_name, ctx.font_size);
    let _ = writeln!(ops, "{start_x} {y} Td");
    let _ = writeln!(ops, "{text_hex} Tj");
    let _ = writeln!(ops, "ET");
    let _ = writeln!(ops, "Q");

    ops.into_bytes()
}
