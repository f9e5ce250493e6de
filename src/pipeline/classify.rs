//! Paragraph classification shared by the rewriter and the formatter.
//!
//! Both stages must agree on what a section heading is: the rewriter uses it
//! to track the current section, the formatter to pick heading typography.
//! If the two ever diverged, headings would silently render as body text, so
//! there is exactly one predicate, [`is_heading`], and both stages call it.

use serde::{Deserialize, Serialize};

/// Headings must be strictly shorter than this many characters.
pub const MAX_HEADING_CHARS: usize = 100;

/// Structural role of one input paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphKind {
    /// Empty after trimming. Becomes a blank separator line.
    Blank,
    /// Short all-caps line. Emitted verbatim and starts a new section.
    SectionMarker,
    /// Everything else. Sent to the model for rewriting.
    Body,
}

/// `true` when `text` (after trimming) is a section heading.
///
/// A heading contains at least one cased letter, no lower-case letters, and
/// fewer than [`MAX_HEADING_CHARS`] characters. Digits, punctuation and
/// brackets are ignored for the case test, so `"EXCELENTÍSSIMO ... DE [CIDADE]."`
/// qualifies while `"123"` does not.
pub fn is_heading(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.chars().count() >= MAX_HEADING_CHARS {
        return false;
    }
    let mut has_upper = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_upper = true;
        }
    }
    has_upper
}

/// Classify a raw paragraph.
pub fn classify(paragraph: &str) -> ParagraphKind {
    let trimmed = paragraph.trim();
    if trimmed.is_empty() {
        ParagraphKind::Blank
    } else if is_heading(trimmed) {
        ParagraphKind::SectionMarker
    } else {
        ParagraphKind::Body
    }
}
