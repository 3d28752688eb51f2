//! # Document Model
//!
//! The input representation for the layout engine. A document is a tree of
//! nodes, each with a kind, already-cascaded style properties, and children.
//! Front ends (markup parsers, template engines, direct JSON construction)
//! produce this tree; the engine never parses markup itself.
//!
//! Pages are first-class: a `Page` node opens a new page group with its own
//! geometry, and everything else flows *into* pages and columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::style::Style;

/// A complete document ready for layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The root nodes of the document. Either `Page` nodes or content that
    /// flows into pages built from `default_page`.
    pub children: Vec<Node>,

    /// Page configuration used for content outside explicit `Page` nodes
    /// and for continuation pages.
    #[serde(default)]
    pub default_page: PageConfig,

    /// Custom fonts to register before layout.
    #[serde(default)]
    pub fonts: Vec<FontEntry>,

    /// Engine behaviour switches.
    #[serde(default)]
    pub options: LayoutOptions,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            children,
            default_page: PageConfig::default(),
            fonts: Vec::new(),
            options: LayoutOptions::default(),
        }
    }
}

/// A custom font to register with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontEntry {
    /// Font family name (e.g. "Inter").
    pub family: String,
    /// Base64-encoded font data, or a data URI (e.g. "data:font/ttf;base64,...").
    pub src: String,
    /// Font weight (100-900). Defaults to 400.
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub italic: bool,
}

fn default_weight() -> u32 {
    400
}

/// How relatively positioned content that overflows its bounding container
/// is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativeOverflow {
    /// Follow the overflow action of the container that bounds the content:
    /// a page using `NewPage` paginates, an inner fixed-height container
    /// truncates or clips.
    #[default]
    FollowContainer,
    /// Always keep only the lines that fit, even at page level.
    Truncate,
}

/// Engine options carried on the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    pub relative_overflow: RelativeOverflow,
    /// Floor applied when shrinking intrinsically sized content to fit,
    /// unless a node sets its own.
    pub minimum_scale_reduction: f64,
    /// Font size `rem` units resolve against.
    pub root_font_size: f64,
    /// Line height multiplier used when a node does not set one.
    pub default_line_height: f64,
    /// Pixels per inch for images without their own resolution.
    pub image_resolution: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            relative_overflow: RelativeOverflow::FollowContainer,
            minimum_scale_reduction: 0.25,
            root_font_size: 12.0,
            default_line_height: 1.2,
            image_resolution: 96.0,
        }
    }
}

/// What happens to content that does not fit its page or container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowAction {
    /// Move the remainder to the next column or page.
    #[default]
    NewPage,
    /// Keep the content even though it lies outside the visible area.
    Clip,
    /// Drop whatever does not fit.
    Truncate,
}

/// Configuration for a page: size, margins, columns, overflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Page size. Defaults to A4.
    #[serde(default)]
    pub size: PageSize,

    /// Page margins in points (1/72 inch).
    #[serde(default = "default_page_margin")]
    pub margin: Thickness,

    /// Number of content columns on the page.
    #[serde(default = "default_columns")]
    pub columns: u32,

    /// Gutter between columns in points.
    #[serde(default = "default_alley")]
    pub alley: f64,

    /// What to do with content that does not fit the page.
    #[serde(default)]
    pub overflow: OverflowAction,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margin: default_page_margin(),
            columns: 1,
            alley: default_alley(),
            overflow: OverflowAction::NewPage,
        }
    }
}

fn default_page_margin() -> Thickness {
    Thickness::uniform(54.0) // ~0.75 inch
}

fn default_columns() -> u32 {
    1
}

fn default_alley() -> f64 {
    12.0
}

impl PageConfig {
    /// The content area width and height (page minus margins).
    pub fn content_size(&self) -> (f64, f64) {
        let (w, h) = self.size.dimensions();
        (
            (w - self.margin.horizontal()).max(0.0),
            (h - self.margin.vertical()).max(0.0),
        )
    }
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Four edge values (top, right, bottom, left) for margins and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thickness {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Thickness {
    pub const ZERO: Thickness = Thickness {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// A node in the content tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// What kind of node this is.
    pub kind: NodeKind,

    /// Resolved style properties for this node.
    #[serde(default)]
    pub style: Style,

    /// Child nodes.
    #[serde(default)]
    pub children: Vec<Node>,

    /// An optional name, indexed on the finished layout tree.
    #[serde(default)]
    pub id: Option<String>,
}

/// The different kinds of nodes in the content tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    /// A page group. Content inside flows according to its config.
    Page {
        #[serde(default)]
        config: PageConfig,
    },

    /// A generic container, analogous to a `<div>`.
    Block,

    /// Text content. Always inline-level.
    Text {
        #[serde(default)]
        content: String,
        /// Inline styled runs. When non-empty, `content` is ignored.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        runs: Vec<TextRun>,
    },

    /// An image with a known natural pixel size. Decoding happens elsewhere;
    /// the engine only needs dimensions.
    Image {
        #[serde(default)]
        src: String,
        #[serde(rename = "pixelWidth")]
        pixel_width: u32,
        #[serde(rename = "pixelHeight")]
        pixel_height: u32,
        /// Pixels per inch; falls back to the document's image resolution.
        #[serde(default)]
        resolution: Option<f64>,
    },

    /// A table container. Children should be TableRow nodes.
    Table {
        /// Column width definitions. If omitted, columns distribute evenly.
        #[serde(default)]
        columns: Vec<ColumnDef>,
    },

    /// A row inside a Table.
    TableRow {
        /// Header rows repeat at the top of every continuation of the table.
        #[serde(default, rename = "isHeader")]
        is_header: bool,
    },

    /// A cell inside a TableRow.
    TableCell {
        #[serde(default = "default_one", rename = "colSpan")]
        col_span: u32,
        #[serde(default = "default_one", rename = "rowSpan")]
        row_span: u32,
    },

    /// Forces the following content onto a new page.
    PageBreak,

    /// Forces the following content into the next column.
    ColumnBreak,
}

fn default_one() -> u32 {
    1
}

/// An inline styled run within a Text node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    pub content: String,
    #[serde(default)]
    pub style: Style,
}

/// Column definition for tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub width: ColumnWidth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnWidth {
    /// Fraction of available width (0.0-1.0).
    Fraction(f64),
    /// Fixed width in points.
    Fixed(f64),
    /// Share the remaining space with other Auto columns.
    Auto,
}

impl Node {
    fn with_kind(kind: NodeKind, style: Style, children: Vec<Node>) -> Self {
        Self {
            kind,
            style,
            children,
            id: None,
        }
    }

    /// Create a Block node with children.
    pub fn block(style: Style, children: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::Block, style, children)
    }

    /// Create a Text node.
    pub fn text(content: &str, style: Style) -> Self {
        Self::with_kind(
            NodeKind::Text {
                content: content.to_string(),
                runs: vec![],
            },
            style,
            vec![],
        )
    }

    /// Create an Image node from its natural pixel size.
    pub fn image(pixel_width: u32, pixel_height: u32, style: Style) -> Self {
        Self::with_kind(
            NodeKind::Image {
                src: String::new(),
                pixel_width,
                pixel_height,
                resolution: None,
            },
            style,
            vec![],
        )
    }

    /// Create a Page node.
    pub fn page(config: PageConfig, style: Style, children: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::Page { config }, style, children)
    }

    /// Create a Table node.
    pub fn table(columns: Vec<ColumnDef>, style: Style, rows: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::Table { columns }, style, rows)
    }

    /// Create a TableRow node.
    pub fn row(is_header: bool, cells: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::TableRow { is_header }, Style::default(), cells)
    }

    /// Create a TableCell node.
    pub fn cell(col_span: u32, row_span: u32, style: Style, children: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::TableCell { col_span, row_span }, style, children)
    }

    pub fn page_break() -> Self {
        Self::with_kind(NodeKind::PageBreak, Style::default(), vec![])
    }

    pub fn column_break() -> Self {
        Self::with_kind(NodeKind::ColumnBreak, Style::default(), vec![])
    }

    /// Attach a name that can be looked up on the finished layout tree.
    pub fn named(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

// ── Content arena ───────────────────────────────────────────────

/// Index of a node in the content arena. Assigned in document pre-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub usize);

#[derive(Debug)]
pub struct ContentEntry<'a> {
    pub node: &'a Node,
    pub parent: Option<ContentId>,
    pub children: Vec<ContentId>,
}

/// Read-only arena over a document's nodes. Layout refers to content by
/// [`ContentId`] instead of holding references back into the tree.
#[derive(Debug)]
pub struct ContentTree<'a> {
    entries: Vec<ContentEntry<'a>>,
    roots: Vec<ContentId>,
    names: BTreeMap<String, ContentId>,
}

impl<'a> ContentTree<'a> {
    pub fn build(document: &'a Document) -> Self {
        let mut tree = ContentTree {
            entries: Vec::new(),
            roots: Vec::new(),
            names: BTreeMap::new(),
        };
        for node in &document.children {
            let id = tree.insert(node, None);
            tree.roots.push(id);
        }
        tree
    }

    fn insert(&mut self, node: &'a Node, parent: Option<ContentId>) -> ContentId {
        let id = ContentId(self.entries.len());
        self.entries.push(ContentEntry {
            node,
            parent,
            children: Vec::new(),
        });
        if let Some(name) = &node.id {
            self.names.insert(name.clone(), id);
        }
        let children: Vec<ContentId> = node
            .children
            .iter()
            .map(|child| self.insert(child, Some(id)))
            .collect();
        self.entries[id.0].children = children;
        id
    }

    pub fn roots(&self) -> &[ContentId] {
        &self.roots
    }

    pub fn node(&self, id: ContentId) -> &'a Node {
        self.entries[id.0].node
    }

    pub fn children(&self, id: ContentId) -> &[ContentId] {
        &self.entries[id.0].children
    }

    pub fn parent(&self, id: ContentId) -> Option<ContentId> {
        self.entries[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> &BTreeMap<String, ContentId> {
        &self.names
    }
}
