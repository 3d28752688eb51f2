//! # Layout Tree
//!
//! The output of a layout pass. Blocks live in one arena and refer to each
//! other by [`BlockId`]; content nodes are referred to by [`ContentId`]. A
//! side table maps every content node to the blocks arranged for it, so a
//! paragraph split over three pages has three arrangements.
//!
//! All rectangles are in page space: points from the top-left corner of the
//! page the block is on. Run offsets inside a line are relative to the
//! line's left edge.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Diagnostic;
use crate::font::FontSpec;
use crate::model::{ContentId, Thickness};
use crate::style::{FloatMode, PositionMode};

// ── Geometry ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Grow outward by the given edges.
    pub fn outset(&self, edges: &Thickness) -> Rect {
        Rect {
            x: self.x - edges.left,
            y: self.y - edges.top,
            width: self.width + edges.horizontal(),
            height: self.height + edges.vertical(),
        }
    }

    /// Shrink inward by the given edges.
    pub fn inset(&self, edges: &Thickness) -> Rect {
        Rect {
            x: self.x + edges.left,
            y: self.y + edges.top,
            width: (self.width - edges.horizontal()).max(0.0),
            height: (self.height - edges.vertical()).max(0.0),
        }
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        const EPSILON: f64 = 0.001;
        other.x >= self.x - EPSILON
            && other.y >= self.y - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.bottom() <= self.bottom() + EPSILON
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

// ── Arena ──────────────────────────────────────────────────────

/// Index of a block in the layout arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

/// The finished layout of one document.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTree {
    pub pages: Vec<LayoutPage>,
    pub blocks: Vec<LayoutBlock>,
    /// Content node → every block arranged for it, in flow order.
    pub arrangements: BTreeMap<ContentId, Vec<BlockId>>,
    /// Node name → content node.
    pub names: BTreeMap<String, ContentId>,
    /// Conditions the pass recovered from.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPage {
    pub index: usize,
    pub size: Size,
    pub margins: Thickness,
    /// The page's content block; one region per column.
    pub block: BlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    Page,
    Container,
    InlineBlock,
    Image,
    Table,
    TableRow,
    TableCell,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBlock {
    pub id: BlockId,
    /// The content node this block was arranged for.
    pub owner: Option<ContentId>,
    pub kind: BlockKind,
    /// Page the block ended up on.
    pub page: usize,
    /// Content bounds plus padding plus margins.
    pub total_bounds: Rect,
    pub content_bounds: Rect,
    /// Margins applied to this fragment. A split box carries its top margin
    /// on the first fragment and its bottom margin on the last.
    pub margins: Thickness,
    pub padding: Thickness,
    /// One region per column.
    pub regions: Vec<LayoutRegion>,
    pub position: PositionMode,
    pub float: FloatMode,
    /// Collapsed placeholder: kept for index stability, not painted.
    pub excluded_from_output: bool,
}

impl LayoutBlock {
    pub fn new(id: BlockId, owner: Option<ContentId>, kind: BlockKind) -> Self {
        Self {
            id,
            owner,
            kind,
            page: 0,
            total_bounds: Rect::ZERO,
            content_bounds: Rect::ZERO,
            margins: Thickness::ZERO,
            padding: Thickness::ZERO,
            regions: Vec::new(),
            position: PositionMode::Static,
            float: FloatMode::None,
            excluded_from_output: false,
        }
    }

    /// Set the content rectangle and derive the total bounds from it.
    pub fn set_content_bounds(&mut self, content: Rect) {
        self.content_bounds = content;
        self.total_bounds = content.outset(&self.padding).outset(&self.margins);
    }

    /// Content rectangle grown by the padding.
    pub fn padding_box(&self) -> Rect {
        self.content_bounds.outset(&self.padding)
    }

    /// Border-box rectangle (total bounds minus margins).
    pub fn border_box(&self) -> Rect {
        self.total_bounds.inset(&self.margins)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.iter().all(|r| r.items.is_empty() && r.floats.is_empty())
    }
}

/// One column of content inside a block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRegion {
    pub index: usize,
    pub bounds: Rect,
    pub items: Vec<LayoutItem>,
    pub floats: Vec<FloatAddition>,
    /// Out-of-flow and relatively positioned boxes anchored here.
    pub positioned: Vec<PositionedRegion>,
}

impl LayoutRegion {
    pub fn new(index: usize, bounds: Rect) -> Self {
        Self {
            index,
            bounds,
            items: Vec::new(),
            floats: Vec::new(),
            positioned: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LayoutItem {
    Line(LayoutLine),
    Block { block: BlockId },
    /// Flow placeholder of `positioned[index]` in the same region.
    Positioned { index: usize },
}

/// A float box and the width it takes from lines beside it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatAddition {
    pub block: BlockId,
    pub side: FloatMode,
    pub width: f64,
    pub height: f64,
    /// Top of the float relative to the region top.
    pub offset_y: f64,
    /// Left edge of the float relative to the region left.
    pub inset: f64,
    /// The float added to this region before this one.
    pub prev: Option<usize>,
}

/// Where a positioned box's final coordinates came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OffsetSource {
    /// Not placed yet.
    Pending,
    /// Resolved coordinates on both axes.
    Explicit,
    /// Flow position on at least one axis.
    Flow,
    /// Flow position plus a relative shift.
    Relative { dx: f64, dy: f64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedRegion {
    pub block: BlockId,
    pub mode: PositionMode,
    /// Final page-space bounds, or all zero when dropped.
    pub bounds: Rect,
    /// Space held in the flow: zero size for absolute and fixed boxes, the
    /// natural box for relative ones.
    pub placeholder: Rect,
    pub source: OffsetSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutLine {
    /// Line box in page space; `x` is the left edge after float insets and
    /// alignment.
    pub bounds: Rect,
    /// Distance from the line top to the baseline.
    pub baseline_offset: f64,
    /// Distance from the baseline to the line bottom.
    pub baseline_to_bottom: f64,
    /// Width available to the line after floats.
    pub available_width: f64,
    /// Width taken by the content, trailing whitespace excluded.
    pub used_width: f64,
    /// Extra space added at each justified gap.
    pub word_spacing: f64,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Run {
    TextBegin {
        owner: ContentId,
        font: FontSpec,
    },
    Characters {
        text: String,
        x: f64,
        width: f64,
    },
    TextEnd,
    /// Ends a line; `offset` is the distance to the next line's top.
    NewLine {
        offset: f64,
    },
    Spacer {
        x: f64,
        width: f64,
    },
    /// Atomic inline content: an image or an inline block.
    Component {
        owner: ContentId,
        block: BlockId,
        x: f64,
        width: f64,
        height: f64,
        /// Top of the component relative to the line top.
        offset_y: f64,
    },
    /// An inline positioned box. Takes no width; `inset` is the width of the
    /// runs before it, where its flow position lies.
    PositionedRegion {
        index: usize,
        inset: f64,
    },
}

impl LayoutTree {
    pub fn block(&self, id: BlockId) -> &LayoutBlock {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut LayoutBlock {
        &mut self.blocks[id.0]
    }

    pub(crate) fn push_block(&mut self, owner: Option<ContentId>, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(LayoutBlock::new(id, owner, kind));
        id
    }

    /// Every block arranged for a content node, in flow order.
    pub fn arrangements(&self, content: ContentId) -> &[BlockId] {
        self.arrangements
            .get(&content)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first_arrangement(&self, content: ContentId) -> Option<&LayoutBlock> {
        self.arrangements(content).first().map(|id| self.block(*id))
    }

    /// Blocks arranged for the node with the given name.
    pub fn named(&self, name: &str) -> Vec<&LayoutBlock> {
        self.names
            .get(name)
            .map(|content| {
                self.arrangements(*content)
                    .iter()
                    .map(|id| self.block(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct child blocks of a block: flow items, floats, positioned boxes
    /// and inline components.
    pub fn child_blocks(&self, id: BlockId) -> Vec<BlockId> {
        let mut children = Vec::new();
        for region in &self.block(id).regions {
            for item in &region.items {
                match item {
                    LayoutItem::Block { block } => children.push(*block),
                    LayoutItem::Line(line) => {
                        children.extend(line.runs.iter().filter_map(|run| match run {
                            Run::Component { block, .. } => Some(*block),
                            _ => None,
                        }))
                    }
                    LayoutItem::Positioned { .. } => {}
                }
            }
            children.extend(region.floats.iter().map(|f| f.block));
            // A relative float is listed among the floats already.
            for positioned in &region.positioned {
                if !children.contains(&positioned.block) {
                    children.push(positioned.block);
                }
            }
        }
        children
    }

    /// Move a block, its lines and everything nested in it.
    pub fn translate_block(&mut self, id: BlockId, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let block = self.block_mut(id);
        block.total_bounds.translate(dx, dy);
        block.content_bounds.translate(dx, dy);
        self.translate_contents(id, dx, dy);
    }

    /// Move everything inside a block but not the block's own box.
    pub fn translate_contents(&mut self, id: BlockId, dx: f64, dy: f64) {
        let block = self.block_mut(id);
        for region in &mut block.regions {
            region.bounds.translate(dx, dy);
            for item in &mut region.items {
                if let LayoutItem::Line(line) = item {
                    line.bounds.translate(dx, dy);
                }
            }
            for positioned in &mut region.positioned {
                positioned.placeholder.translate(dx, dy);
                if positioned.bounds != Rect::ZERO {
                    positioned.bounds.translate(dx, dy);
                }
            }
        }
        for child in self.child_blocks(id) {
            self.translate_block(child, dx, dy);
        }
    }

    /// Baseline of the last line inside a block, in page space.
    pub fn last_baseline(&self, id: BlockId) -> Option<f64> {
        let block = self.block(id);
        for region in block.regions.iter().rev() {
            for item in region.items.iter().rev() {
                match item {
                    LayoutItem::Line(line) => return Some(line.bounds.y + line.baseline_offset),
                    LayoutItem::Block { block } => {
                        if let Some(baseline) = self.last_baseline(*block) {
                            return Some(baseline);
                        }
                    }
                    LayoutItem::Positioned { .. } => {}
                }
            }
        }
        None
    }

    /// Blocks that a renderer should paint: not excluded, not nested in an
    /// excluded block.
    pub fn visible_blocks(&self, page: usize) -> Vec<BlockId> {
        let mut out = Vec::new();
        if let Some(p) = self.pages.get(page) {
            let mut stack = vec![p.block];
            while let Some(id) = stack.pop() {
                if self.block(id).excluded_from_output {
                    continue;
                }
                out.push(id);
                let mut children = self.child_blocks(id);
                children.reverse();
                stack.extend(children);
            }
        }
        out
    }

    /// Every line in a block's subtree, in flow order.
    pub fn lines(&self, id: BlockId) -> Vec<&LayoutLine> {
        let mut out = Vec::new();
        for region in &self.block(id).regions {
            for item in &region.items {
                match item {
                    LayoutItem::Line(line) => out.push(line),
                    LayoutItem::Block { block } => out.extend(self.lines(*block)),
                    LayoutItem::Positioned { index } => {
                        out.extend(self.lines(region.positioned[*index].block))
                    }
                }
            }
        }
        out
    }
}
