//! # Text Segmentation
//!
//! Splits text into measured pieces the inline flow can place one at a time.
//! Each piece ends at a UAX #14 break opportunity, so a line may end after
//! any piece. Trailing whitespace is measured separately: it takes space in
//! the middle of a line but hangs at the end of one.

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::font::{FontContext, FontSpec};

/// How a piece ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAfter {
    /// A line may end after this piece.
    Allowed,
    /// The line must end after this piece (a newline in the source).
    Mandatory,
}

/// A measured, unbreakable piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPiece {
    /// The piece including trailing whitespace, without any newline.
    pub text: String,
    /// Advance of the visible part.
    pub width: f64,
    /// Advance of trailing whitespace.
    pub trailing: f64,
    pub break_after: BreakAfter,
}

impl TextPiece {
    pub fn full_width(&self) -> f64 {
        self.width + self.trailing
    }

    pub fn ends_with_space(&self) -> bool {
        self.trailing > 0.0
    }
}

fn is_newline(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}' | '\u{000B}' | '\u{000C}' | '\u{0085}')
}

/// Measure `text` and split it into pieces at break opportunities.
pub fn segment(
    text: &str,
    font: &FontSpec,
    letter_spacing: f64,
    fonts: &FontContext,
) -> Vec<TextPiece> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (end, opportunity) in linebreaks(text) {
        let raw = &text[start..end];
        start = end;
        let mandatory = opportunity == BreakOpportunity::Mandatory && raw.ends_with(is_newline);
        let body = raw.trim_end_matches(is_newline);
        if body.is_empty() && !mandatory {
            continue;
        }
        pieces.push(measure_piece(
            body,
            font,
            letter_spacing,
            fonts,
            if mandatory {
                BreakAfter::Mandatory
            } else {
                BreakAfter::Allowed
            },
        ));
    }
    pieces
}

fn measure_piece(
    text: &str,
    font: &FontSpec,
    letter_spacing: f64,
    fonts: &FontContext,
    break_after: BreakAfter,
) -> TextPiece {
    let visible = text.trim_end_matches(char::is_whitespace);
    let width = fonts.measure_string(visible, font, letter_spacing);
    let trailing = fonts.measure_string(&text[visible.len()..], font, letter_spacing);
    TextPiece {
        text: text.to_string(),
        width,
        trailing,
        break_after,
    }
}

/// Break a piece that is wider than `max_width` at a character boundary.
///
/// The head always holds at least one character, so repeated splitting
/// makes progress however narrow the space is. Returns `None` when the piece
/// is a single character.
pub fn split_to_fit(
    piece: &TextPiece,
    max_width: f64,
    font: &FontSpec,
    letter_spacing: f64,
    fonts: &FontContext,
) -> Option<(TextPiece, TextPiece)> {
    let mut chars = piece.text.char_indices().peekable();
    let mut used = 0.0;
    let mut split_at = None;
    while let Some((idx, ch)) = chars.next() {
        let advance = fonts.char_width(ch, font) + letter_spacing;
        if idx > 0 && used + advance > max_width {
            split_at = Some(idx);
            break;
        }
        used += advance;
        if chars.peek().is_none() {
            return None;
        }
    }
    let split_at = match split_at {
        Some(idx) => idx,
        None => return None,
    };
    let head = measure_piece(
        &piece.text[..split_at],
        font,
        letter_spacing,
        fonts,
        BreakAfter::Allowed,
    );
    let tail = measure_piece(
        &piece.text[split_at..],
        font,
        letter_spacing,
        fonts,
        piece.break_after,
    );
    Some((head, tail))
}

/// Widest line the text produces when nothing wraps except at newlines.
pub fn max_content_width(
    text: &str,
    font: &FontSpec,
    letter_spacing: f64,
    fonts: &FontContext,
) -> f64 {
    text.split(is_newline)
        .map(|line| fonts.measure_string(line.trim_end(), font, letter_spacing))
        .fold(0.0, f64::max)
}

/// Widest single piece, the narrowest a box holding the text can get
/// without breaking words.
pub fn min_content_width(
    text: &str,
    font: &FontSpec,
    letter_spacing: f64,
    fonts: &FontContext,
) -> f64 {
    segment(text, font, letter_spacing, fonts)
        .iter()
        .map(|p| p.width)
        .fold(0.0, f64::max)
}
