//! # Font Metrics
//!
//! The engine does not shape glyphs or embed fonts. It only needs advance
//! widths and vertical metrics, which this module provides for the standard
//! fonts (Helvetica, Courier) and for custom TrueType/OpenType fonts
//! registered with the document.

pub mod metrics;

use std::collections::HashMap;

use base64::Engine as _;
use serde::Serialize;

use crate::error::LayoutError;
use crate::model::FontEntry;
use metrics::StandardFontMetrics;

/// The font a piece of text is set in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub weight: u32,
    pub italic: bool,
}

/// Vertical and reference metrics of a font at a given size, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    /// The em size (the font size itself).
    pub size: f64,
    /// Distance from the baseline to the top of the tallest glyphs.
    pub ascent: f64,
    /// Distance from the baseline to the bottom of the lowest glyphs (positive).
    pub descent: f64,
    /// Line height including leading.
    pub line_height: f64,
    pub ex_height: f64,
    /// Advance of the `0` glyph, used by `ch` units.
    pub zero_width: f64,
}

impl FontMetrics {
    /// Metrics for a size when no font is at hand: Helvetica proportions.
    pub fn fallback(size: f64) -> Self {
        let m = &metrics::HELVETICA;
        FontMetrics {
            size,
            ascent: m.ascender as f64 * size / 1000.0,
            descent: -(m.descender as f64) * size / 1000.0,
            line_height: size * 1.2,
            ex_height: m.x_height as f64 * size / 1000.0,
            zero_width: m.char_width('0', size),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

#[derive(Debug)]
pub enum FontFace {
    Standard(&'static StandardFontMetrics),
    Custom(CustomFontMetrics),
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    pub x_height: i16,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Result<Self, LayoutError> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| LayoutError::Font(format!("unreadable font data: {e}")))?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        // Basic Multilingual Plane only; that covers what documents use.
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        let ascender = face.ascender();
        Ok(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender,
            descender: face.descender(),
            x_height: face.x_height().unwrap_or(ascender / 2),
        })
    }
}

static FALLBACK_FACE: FontFace = FontFace::Standard(&metrics::HELVETICA);

/// Maps family + weight + style to font faces.
pub struct FontRegistry {
    faces: HashMap<FontKey, FontFace>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut faces = HashMap::new();
        let standard = [
            (("Helvetica", 400), &metrics::HELVETICA),
            (("Helvetica", 700), &metrics::HELVETICA_BOLD),
            (("Courier", 400), &metrics::COURIER),
            (("Courier", 700), &metrics::COURIER),
        ];
        for ((family, weight), face) in standard {
            for italic in [false, true] {
                faces.insert(
                    FontKey {
                        family: family.to_string(),
                        weight,
                        italic,
                    },
                    FontFace::Standard(face),
                );
            }
        }
        Self { faces }
    }

    /// Look up a face, falling back to Helvetica if not found.
    pub fn resolve(&self, family: &str, weight: u32, italic: bool) -> &FontFace {
        let snapped_weight = if weight >= 600 { 700 } else { 400 };
        let candidates = [
            (family, weight, italic),
            (family, snapped_weight, italic),
            (family, snapped_weight, false),
            ("Helvetica", snapped_weight, italic),
        ];
        for (family, weight, italic) in candidates {
            let key = FontKey {
                family: family.to_string(),
                weight,
                italic,
            };
            if let Some(face) = self.faces.get(&key) {
                return face;
            }
        }
        &FALLBACK_FACE
    }

    /// Register a custom font from raw TrueType/OpenType data.
    pub fn register(
        &mut self,
        family: &str,
        weight: u32,
        italic: bool,
        data: &[u8],
    ) -> Result<(), LayoutError> {
        let metrics = CustomFontMetrics::from_font_data(data)?;
        self.faces.insert(
            FontKey {
                family: family.to_string(),
                weight,
                italic,
            },
            FontFace::Custom(metrics),
        );
        Ok(())
    }
}

/// Shared font context used by the layout pass. Provides text measurement
/// and vertical metrics.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Decode and register a font entry from a document.
    pub fn register_entry(&mut self, entry: &FontEntry) -> Result<(), LayoutError> {
        let encoded = match entry.src.split_once("base64,") {
            Some((_, data)) if entry.src.starts_with("data:") => data,
            _ => entry.src.as_str(),
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| LayoutError::Font(format!("font '{}': {e}", entry.family)))?;
        self.registry
            .register(&entry.family, entry.weight, entry.italic, &data)
    }

    /// Get the advance width of a single character in points.
    pub fn char_width(&self, ch: char, font: &FontSpec) -> f64 {
        match self.registry.resolve(&font.family, font.weight, font.italic) {
            FontFace::Standard(m) => m.char_width(ch, font.size),
            FontFace::Custom(m) => m.char_width(ch, font.size),
        }
    }

    /// Measure the width of a string in points.
    pub fn measure_string(&self, text: &str, font: &FontSpec, letter_spacing: f64) -> f64 {
        match self.registry.resolve(&font.family, font.weight, font.italic) {
            FontFace::Standard(m) => m.measure_string(text, font.size, letter_spacing),
            FontFace::Custom(m) => text
                .chars()
                .map(|ch| m.char_width(ch, font.size) + letter_spacing)
                .sum(),
        }
    }

    /// Vertical metrics for a font at its size, with the given line height
    /// multiplier.
    pub fn metrics(&self, font: &FontSpec, line_height: f64) -> FontMetrics {
        let size = font.size;
        let (ascender, descender, x_height, units) =
            match self.registry.resolve(&font.family, font.weight, font.italic) {
                FontFace::Standard(m) => (m.ascender, m.descender, m.x_height, 1000.0),
                FontFace::Custom(m) => (m.ascender, m.descender, m.x_height, m.units_per_em as f64),
            };
        FontMetrics {
            size,
            ascent: ascender as f64 * size / units,
            descent: -(descender as f64) * size / units,
            line_height: size * line_height,
            ex_height: x_height as f64 * size / units,
            zero_width: self.char_width('0', font),
        }
    }
}
