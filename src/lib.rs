//! # Quire
//!
//! A page-native layout engine.
//!
//! Quire takes a tree of styled content (text, images, blocks, tables) and
//! turns it into a fully measured layout tree: pages, columns, lines, runs,
//! nested blocks and positioned regions, ready for a renderer to paint.
//!
//! There is no endless canvas that gets sliced into pages afterwards. Every
//! line break, every float, every table row is placed against a page of
//! known size. Content that doesn't fit moves to the next column or page,
//! is clipped, or is dropped, as the overflow action of its container says.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]    Document tree: nodes, page configuration
//!       ↓
//!   [style]    Units and resolved style snapshots
//!       ↓
//!   [layout]   Constraints, inline flow, floats, positioned boxes,
//!              pagination, tables
//!       ↓
//!   LayoutTree (geometry only; painting is someone else's job)
//! ```

pub mod error;
pub mod font;
pub mod layout;
pub mod model;
pub mod style;
pub mod text;

use log::warn;

use error::{Diagnostic, LayoutError};
use font::FontContext;
use layout::tree::LayoutTree;
use layout::LayoutEngine;
use model::Document;

/// Lay out a document.
///
/// Custom fonts are registered first; a font that fails to load is reported
/// on the tree's diagnostics and its family falls back to the standard
/// metrics. Only a structural failure of the pass returns `Err`.
pub fn layout(document: &Document) -> Result<LayoutTree, LayoutError> {
    let mut fonts = FontContext::new();
    let mut problems = Vec::new();
    for entry in &document.fonts {
        if let Err(e) = fonts.register_entry(entry) {
            warn!(target: "quire::font", "font {:?} not registered: {e}", entry.family);
            problems.push(Diagnostic::from_error(&e, None));
        }
    }
    let mut tree = LayoutEngine::new().layout(document, &fonts)?;
    tree.diagnostics.splice(0..0, problems);
    Ok(tree)
}

/// Lay out a document described as JSON.
pub fn layout_json(json: &str) -> Result<LayoutTree, LayoutError> {
    let document: Document = serde_json::from_str(json)?;
    layout(&document)
}
