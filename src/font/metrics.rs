//! Built-in metrics for the standard fonts.
//!
//! Advance widths are in 1/1000 em for the printable ASCII range (32..=126).
//! Characters outside the table use the family's average advance.

/// Glyph metrics for one standard font face.
#[derive(Debug)]
pub struct StandardFontMetrics {
    widths: &'static [u16; 95],
    fallback: u16,
    pub ascender: i16,
    pub descender: i16,
    pub x_height: i16,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in font units (1/1000 em).
    pub fn advance(&self, ch: char) -> u16 {
        let code = ch as u32;
        if (32..=126).contains(&code) {
            self.widths[(code - 32) as usize]
        } else if ch == '\u{00A0}' {
            self.widths[0]
        } else {
            self.fallback
        }
    }

    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.advance(ch) as f64 * font_size / 1000.0
    }

    /// Measure a string in points.
    pub fn measure_string(&self, text: &str, font_size: f64, letter_spacing: f64) -> f64 {
        text.chars()
            .map(|ch| self.char_width(ch, font_size) + letter_spacing)
            .sum()
    }
}

#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    // space ! " # $ % & ' ( ) * + , - . /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // : ; < = > ? @
    278, 278, 584, 584, 584, 556, 1015,
    // A-Z
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [ \ ] ^ _ `
    278, 278, 278, 469, 556, 333,
    // a-z
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // { | } ~
    334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

static COURIER_WIDTHS: [u16; 95] = [600; 95];

pub static HELVETICA: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_WIDTHS,
    fallback: 556,
    ascender: 718,
    descender: -207,
    x_height: 523,
};

pub static HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_BOLD_WIDTHS,
    fallback: 611,
    ascender: 718,
    descender: -207,
    x_height: 532,
};

pub static COURIER: StandardFontMetrics = StandardFontMetrics {
    widths: &COURIER_WIDTHS,
    fallback: 600,
    ascender: 629,
    descender: -157,
    x_height: 426,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_width() {
        let w = HELVETICA.char_width(' ', 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn courier_is_monospaced() {
        assert_eq!(COURIER.advance('i'), COURIER.advance('W'));
        let w = COURIER.measure_string("abc", 10.0, 0.0);
        assert!((w - 18.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_chars_use_fallback() {
        assert_eq!(HELVETICA.advance('\u{4E2D}'), 556);
        assert_eq!(HELVETICA.advance('\u{00A0}'), HELVETICA.advance(' '));
    }
}
