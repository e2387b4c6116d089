//! Arabic script detection

/// Blocks that need shaping or reordering
const ARABIC_BLOCKS: [(char, char); 5] = [
    ('\u{0600}', '\u{06FF}'), // Arabic
    ('\u{0750}', '\u{077F}'), // Arabic Supplement
    ('\u{08A0}', '\u{08FF}'), // Arabic Extended-A
    ('\u{FB50}', '\u{FDFF}'), // Presentation Forms-A
    ('\u{FE70}', '\u{FEFF}'), // Presentation Forms-B
];

/// Check if a character belongs to an Arabic block
pub fn is_arabic(c: char) -> bool {
    ARABIC_BLOCKS
        .iter()
        .any(|&(start, end)| (start..=end).contains(&c))
}

/// Check if any character of `text` is Arabic
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(is_arabic)
}
