//! # Page-Native Layout Engine
//!
//! The engine never lays content out on an endless canvas and slices it
//! afterwards. Every placement happens against a page of known size:
//!
//! 1. Open a page (or a column of one) with known geometry.
//! 2. For each piece of content ask the paginator whether it fits.
//! 3. If it fits, place it. If it doesn't, move to the next column or page,
//!    clip it, or drop it, depending on the overflow action of the box that
//!    bounds it.
//! 4. Boxes that split leave one fragment per column; fragments that end up
//!    empty stay in the tree flagged `excluded_from_output`.
//!
//! Open boxes are kept on a stack of frames. Each frame knows its fragment
//! in the arena, its columns and its vertical cursor. Content that must be
//! sized before it can be placed (inline blocks, table cells, floats,
//! positioned boxes) is laid out in an *isolated* frame at the page origin
//! and translated into place afterwards. Isolated frames never paginate.
//!
//! Positioned boxes are recorded during the flow and resolved once every
//! other box has its final position.

pub mod constraints;
pub mod floats;
pub mod inline;
pub mod paginate;
pub mod positioned;
pub mod table;
pub mod tree;

use log::{debug, warn};

use crate::error::{Diagnostic, LayoutError};
use crate::font::FontContext;
use crate::model::{
    ContentId, ContentTree, Document, LayoutOptions, NodeKind, OverflowAction, PageConfig,
    Thickness,
};
use crate::style::{Display, PositionMode, StyleContext, StyleSnapshot};
use constraints::{SizeRequest, SizeOutcome};
use floats::FloatManager;
use inline::{LineBuilder, LineEnd};
use paginate::{ColumnGeometry, Fit};
use positioned::{InlinePositioned, PendingPosition};
use tree::{BlockId, BlockKind, LayoutItem, LayoutPage, LayoutRegion, LayoutTree, Rect, Size};

const LOG_TARGET: &str = "quire::layout";

/// The main layout engine.
#[derive(Debug, Default)]
pub struct LayoutEngine;

impl LayoutEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one layout pass over a document.
    ///
    /// Recoverable problems are recorded on the returned tree's
    /// `diagnostics`. Only structural corruption fails the pass, and then no
    /// partial tree is returned.
    pub fn layout(&self, document: &Document, fonts: &FontContext) -> Result<LayoutTree, LayoutError> {
        Pass::new(document, fonts).run()
    }
}

// ── Frames ─────────────────────────────────────────────────────

/// What is needed to open a box.
struct FrameSpec {
    content: Option<ContentId>,
    style: StyleSnapshot,
    kind: BlockKind,
    /// Border-box width.
    width: f64,
    /// Border-box height, when fixed.
    height: Option<f64>,
}

/// An open box: the fragment being filled and the cursor inside it.
struct Frame {
    content: Option<ContentId>,
    style: StyleSnapshot,
    kind: BlockKind,
    /// The fragment currently receiving content.
    block: BlockId,
    /// Content area split into columns.
    columns: ColumnGeometry,
    column: usize,
    /// Border-box top of the current fragment.
    top: f64,
    content_top: f64,
    y: f64,
    /// Lowest cursor position reached in any column of this fragment.
    max_y: f64,
    /// Content height of a fixed-height box.
    fixed_height: Option<f64>,
    /// Bottom edge content may not cross.
    limit: Option<f64>,
    overflow: OverflowAction,
    /// Root of a flow that never paginates.
    isolated: bool,
    column_has_content: bool,
    truncated: bool,
    /// Number of fragments before the current one.
    fragment: usize,
    line: Option<LineBuilder>,
    first_line: bool,
}

impl Frame {
    fn new(spec: FrameSpec, block: BlockId, x: f64, top: f64, isolated: bool) -> Self {
        let padding = spec.style.padding;
        let columns = ColumnGeometry::new(
            x + padding.left,
            (spec.width - padding.horizontal()).max(0.0),
            spec.style.column_count,
            spec.style.alley_width,
        );
        let content_top = top + padding.top;
        let fixed_height = spec.height.map(|h| (h - padding.vertical()).max(0.0));
        Frame {
            content: spec.content,
            overflow: spec.style.overflow.unwrap_or_default(),
            style: spec.style,
            kind: spec.kind,
            block,
            columns,
            column: 0,
            top,
            content_top,
            y: content_top,
            max_y: content_top,
            fixed_height,
            limit: fixed_height.map(|h| content_top + h),
            isolated,
            column_has_content: false,
            truncated: false,
            fragment: 0,
            line: None,
            first_line: true,
        }
    }

    fn column_x(&self) -> f64 {
        self.columns.column_x(self.column)
    }

    fn column_width(&self) -> f64 {
        self.columns.column_width()
    }
}

// ── Pass ───────────────────────────────────────────────────────

/// State of one layout pass. Created per call, consumed by `run`.
struct Pass<'a> {
    content: ContentTree<'a>,
    fonts: &'a FontContext,
    options: &'a LayoutOptions,
    default_page: &'a PageConfig,
    tree: LayoutTree,
    floats: FloatManager,
    frames: Vec<Frame>,
    /// Positioned boxes waiting for final coordinates.
    positioned: Vec<PendingPosition>,
    /// Inline positioned boxes waiting for their line to be placed.
    inline_positioned: Vec<Option<InlinePositioned>>,
    page_config: PageConfig,
    /// Overflow action of each page, by page index.
    page_overflow: Vec<OverflowAction>,
}

impl<'a> Pass<'a> {
    fn new(document: &'a Document, fonts: &'a FontContext) -> Self {
        Self {
            content: ContentTree::build(document),
            fonts,
            options: &document.options,
            default_page: &document.default_page,
            tree: LayoutTree::default(),
            floats: FloatManager::new(),
            frames: Vec::new(),
            positioned: Vec::new(),
            inline_positioned: Vec::new(),
            page_config: document.default_page.clone(),
            page_overflow: Vec::new(),
        }
    }

    fn run(mut self) -> Result<LayoutTree, LayoutError> {
        let roots = self.content.roots().to_vec();
        for root in roots {
            let node = self.content.node(root);
            match &node.kind {
                NodeKind::Page { config } => {
                    self.end_page_group()?;
                    self.begin_page_group(config.clone(), Some(root))?;
                    self.layout_children(root)?;
                    self.end_page_group()?;
                }
                _ => {
                    if self.frames.is_empty() {
                        self.begin_page_group(self.default_page.clone(), None)?;
                    }
                    self.layout_child(root)?;
                }
            }
        }
        self.end_page_group()?;
        if self.tree.pages.is_empty() {
            self.begin_page_group(self.default_page.clone(), None)?;
            self.end_page_group()?;
        }
        self.finish()
    }

    fn finish(mut self) -> Result<LayoutTree, LayoutError> {
        self.assign_pages();
        self.resolve_positioned()?;
        for block in &self.tree.blocks {
            if let Some(owner) = block.owner {
                self.tree
                    .arrangements
                    .entry(owner)
                    .or_default()
                    .push(block.id);
            }
        }
        self.tree.names = self.content.names().clone();
        debug!(
            target: LOG_TARGET,
            "layout finished: {} pages, {} blocks, {} diagnostics",
            self.tree.pages.len(),
            self.tree.blocks.len(),
            self.tree.diagnostics.len()
        );
        Ok(self.tree)
    }

    /// Record the page index on every block reachable from a page.
    fn assign_pages(&mut self) {
        for page in 0..self.tree.pages.len() {
            let mut stack = vec![self.tree.pages[page].block];
            while let Some(id) = stack.pop() {
                self.tree.block_mut(id).page = page;
                stack.extend(self.tree.child_blocks(id));
            }
        }
    }

    // ── Diagnostics & style ────────────────────────────────────

    fn diagnose(&mut self, error: LayoutError, content: Option<ContentId>) {
        warn!(target: LOG_TARGET, "{error}");
        self.tree
            .diagnostics
            .push(Diagnostic::from_error(&error, content));
    }

    fn page_size(&self) -> (f64, f64) {
        self.page_config.size.dimensions()
    }

    fn style_context(&self, container_width: Option<f64>, container_height: Option<f64>) -> StyleContext<'a> {
        StyleContext {
            fonts: self.fonts,
            options: self.options,
            page_size: self.page_size(),
            container_width,
            container_height,
        }
    }

    /// Resolve a node's style inside the innermost open box, or against the
    /// containing block for absolute and fixed boxes.
    fn resolve_style(&mut self, id: ContentId, parent: &StyleSnapshot) -> StyleSnapshot {
        let (width, height) = match self.content.node(id).style.position {
            Some(mode) if mode.is_out_of_flow() && !self.frames.is_empty() => {
                let cb = self.containing_size(self.containing_block(mode));
                (Some(cb.width), Some(cb.height).filter(|h| *h > 0.0))
            }
            _ => match self.frames.last() {
                Some(frame) => (Some(frame.column_width()), frame.fixed_height),
                None => (None, None),
            },
        };
        let ctx = self.style_context(width, height);
        let (snapshot, problems) = self.content.node(id).style.resolve(Some(parent), &ctx);
        for problem in problems {
            self.diagnose(problem, Some(id));
        }
        snapshot
    }

    /// Resolve without reporting; used while measuring.
    fn quiet_style(&self, id: ContentId, parent: &StyleSnapshot, container: Option<f64>) -> StyleSnapshot {
        let ctx = self.style_context(container, None);
        self.content.node(id).style.resolve(Some(parent), &ctx).0
    }

    fn root_style(&self) -> StyleSnapshot {
        StyleSnapshot::root(&self.style_context(None, None))
    }

    fn top_style(&self) -> StyleSnapshot {
        self.frames
            .last()
            .map(|f| f.style.clone())
            .unwrap_or_else(|| self.root_style())
    }

    // ── Page groups ────────────────────────────────────────────

    fn begin_page_group(&mut self, config: PageConfig, owner: Option<ContentId>) -> Result<(), LayoutError> {
        self.page_config = config;
        let root = self.root_style();
        let style = match owner {
            Some(id) => {
                let (w, h) = self.page_config.content_size();
                let ctx = self.style_context(Some(w), Some(h));
                let (snapshot, problems) = self.content.node(id).style.resolve(Some(&root), &ctx);
                for problem in problems {
                    self.diagnose(problem, Some(id));
                }
                snapshot
            }
            None => root,
        };
        let block = self.start_page(owner);
        let config = &self.page_config;
        let (content_width, content_height) = config.content_size();
        let margin = config.margin;
        self.frames.push(Frame {
            content: owner,
            style,
            kind: BlockKind::Page,
            block,
            columns: ColumnGeometry::new(margin.left, content_width, config.columns, config.alley),
            column: 0,
            top: margin.top,
            content_top: margin.top,
            y: margin.top,
            max_y: margin.top,
            fixed_height: Some(content_height),
            limit: Some(margin.top + content_height),
            overflow: config.overflow,
            isolated: false,
            column_has_content: false,
            truncated: false,
            fragment: 0,
            line: None,
            first_line: true,
        });
        self.add_region(0);
        Ok(())
    }

    fn end_page_group(&mut self) -> Result<(), LayoutError> {
        if self.frames.is_empty() {
            return Ok(());
        }
        while self.frames.len() > 1 {
            self.close_frame()?;
        }
        self.close_line(LineEnd::End)?;
        self.finalize_fragment(0, true);
        self.frames.clear();
        self.floats.retire_all();
        Ok(())
    }

    /// Create the block and page record for a new page.
    fn start_page(&mut self, owner: Option<ContentId>) -> BlockId {
        let index = self.tree.pages.len();
        let (width, height) = self.page_size();
        let margin = self.page_config.margin;
        let block = self.tree.push_block(owner, BlockKind::Page);
        let b = self.tree.block_mut(block);
        b.page = index;
        b.margins = margin;
        b.set_content_bounds(Rect::new(
            margin.left,
            margin.top,
            (width - margin.horizontal()).max(0.0),
            (height - margin.vertical()).max(0.0),
        ));
        self.tree.pages.push(LayoutPage {
            index,
            size: Size::new(width, height),
            margins: margin,
            block,
        });
        self.page_overflow.push(self.page_config.overflow);
        debug!(target: LOG_TARGET, "opened page {index} ({width}x{height})");
        block
    }

    // ── Frame management ───────────────────────────────────────

    fn new_block(&mut self, spec: &FrameSpec) -> BlockId {
        let block = self.tree.push_block(spec.content, spec.kind);
        let b = self.tree.block_mut(block);
        b.padding = spec.style.padding;
        b.margins = spec.style.margin;
        b.position = spec.style.position;
        b.float = spec.style.float;
        block
    }

    /// Open a box in the flow of the innermost frame.
    fn open_frame(&mut self, spec: FrameSpec) -> Result<BlockId, LayoutError> {
        let (x, top) = {
            let parent = self.top()?;
            (
                parent.column_x() + spec.style.margin.left,
                parent.y + spec.style.margin.top,
            )
        };
        let block = self.new_block(&spec);
        self.push_item(LayoutItem::Block { block })?;
        self.frames.push(Frame::new(spec, block, x, top, false));
        self.add_region(self.frames.len() - 1);
        Ok(block)
    }

    /// Open a box as the root of an isolated flow at the page origin.
    fn open_isolated(&mut self, spec: FrameSpec) -> BlockId {
        let (x, top) = (spec.style.margin.left, spec.style.margin.top);
        let block = self.new_block(&spec);
        self.floats.push_scope();
        self.frames.push(Frame::new(spec, block, x, top, true));
        self.add_region(self.frames.len() - 1);
        block
    }

    /// Close the innermost box and advance its parent's cursor past it.
    fn close_frame(&mut self) -> Result<BlockId, LayoutError> {
        self.close_line(LineEnd::End)?;
        let index = self.frames.len() - 1;
        self.finalize_fragment(index, true);
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| LayoutError::StructuralInconsistency("no open box to close".into()))?;
        if frame.isolated {
            self.floats.pop_scope();
        } else {
            let bottom = self.tree.block(frame.block).total_bounds.bottom();
            self.set_y(bottom);
        }
        Ok(frame.block)
    }

    /// Fix the bounds of a frame's current fragment. `last` is false when
    /// the box continues in another column.
    fn finalize_fragment(&mut self, index: usize, last: bool) {
        let frame = &self.frames[index];
        let padding = frame.style.padding;
        let content_height = match frame.fixed_height {
            Some(h) => h,
            None => {
                let mut h = (frame.max_y.max(frame.y) - frame.content_top).max(0.0);
                if let Some(max) = frame.style.max_height {
                    h = h.min((max - padding.vertical()).max(0.0));
                }
                if last && frame.fragment == 0 {
                    if let Some(min) = frame.style.min_height {
                        h = h.max(min - padding.vertical());
                    }
                }
                h
            }
        };
        let rect = Rect::new(
            frame.columns.x,
            frame.content_top,
            frame.columns.width,
            content_height,
        );
        let margin = frame.style.margin;
        let (block_id, kind, fragment) = (frame.block, frame.kind, frame.fragment);
        let relative = frame.style.position == PositionMode::Relative && !frame.isolated;

        let block = self.tree.block_mut(block_id);
        if kind != BlockKind::Page {
            block.margins = Thickness {
                top: if fragment == 0 { margin.top } else { 0.0 },
                right: margin.right,
                bottom: if last { margin.bottom } else { 0.0 },
                left: margin.left,
            };
        }
        for region in &mut block.regions {
            region.bounds.height = content_height;
        }
        block.set_content_bounds(rect);
        if !last && block.is_empty() {
            block.excluded_from_output = true;
            debug!(target: LOG_TARGET, "fragment {block_id:?} left empty by a break");
        }
        if relative && index > 0 {
            self.record_relative(index);
        }
    }

    fn add_region(&mut self, index: usize) {
        let frame = &self.frames[index];
        let bounds = Rect::new(frame.column_x(), frame.content_top, frame.column_width(), 0.0);
        let (block, column) = (frame.block, frame.column);
        self.tree
            .block_mut(block)
            .regions
            .push(LayoutRegion::new(column, bounds));
    }

    fn top(&self) -> Result<&Frame, LayoutError> {
        self.frames
            .last()
            .ok_or_else(|| LayoutError::StructuralInconsistency("no open box".into()))
    }

    fn top_mut(&mut self) -> Result<&mut Frame, LayoutError> {
        self.frames
            .last_mut()
            .ok_or_else(|| LayoutError::StructuralInconsistency("no open box".into()))
    }

    fn region_mut(&mut self, index: usize) -> Result<&mut LayoutRegion, LayoutError> {
        let block = self.frames[index].block;
        self.tree
            .block_mut(block)
            .regions
            .last_mut()
            .ok_or_else(|| {
                LayoutError::StructuralInconsistency(format!("block {block:?} has no open region"))
            })
    }

    fn push_item(&mut self, item: LayoutItem) -> Result<(), LayoutError> {
        let index = self.frames.len() - 1;
        self.region_mut(index)?.items.push(item);
        Ok(())
    }

    fn set_y(&mut self, y: f64) {
        if let Some(frame) = self.frames.last_mut() {
            frame.y = y;
            frame.max_y = frame.max_y.max(y);
        }
    }

    /// Note that the current column of every enclosing paged box has content.
    fn mark_placed(&mut self) {
        for frame in self.frames.iter_mut().rev() {
            frame.column_has_content = true;
            if frame.isolated {
                break;
            }
        }
    }

    fn is_truncated(&self) -> bool {
        for frame in self.frames.iter().rev() {
            if frame.truncated {
                return true;
            }
            if frame.isolated {
                break;
            }
        }
        false
    }

    /// Run `f` and throw away everything it added to the tree. Used to
    /// measure content before committing to a placement.
    fn measure<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, LayoutError>,
    ) -> Result<R, LayoutError> {
        let blocks = self.tree.blocks.len();
        let diagnostics = self.tree.diagnostics.len();
        let positioned = self.positioned.len();
        let inline_positioned = self.inline_positioned.len();
        let result = f(self);
        self.tree.blocks.truncate(blocks);
        self.tree.diagnostics.truncate(diagnostics);
        self.positioned.truncate(positioned);
        self.inline_positioned.truncate(inline_positioned);
        result
    }

    // ── Flow ───────────────────────────────────────────────────

    fn layout_children(&mut self, id: ContentId) -> Result<(), LayoutError> {
        let children = self.content.children(id).to_vec();
        for child in children {
            if self.is_truncated() {
                debug!(target: LOG_TARGET, "skipping {child:?}: container truncated");
                break;
            }
            self.layout_child(child)?;
        }
        Ok(())
    }

    fn layout_child(&mut self, id: ContentId) -> Result<(), LayoutError> {
        let node = self.content.node(id);
        match &node.kind {
            NodeKind::PageBreak => {
                self.close_line(LineEnd::End)?;
                return self.page_break();
            }
            NodeKind::ColumnBreak => {
                self.close_line(LineEnd::End)?;
                return self.column_break();
            }
            _ => {}
        }

        let parent = self.top_style();
        let style = self.resolve_style(id, &parent);
        if style.break_before {
            self.close_line(LineEnd::End)?;
            self.page_break()?;
        }

        let display = display_of(&node.kind, &style);
        if style.position.is_out_of_flow() {
            let inline = display != Display::Block && self.line_is_open();
            return self.layout_out_of_flow(id, style, inline);
        }
        if style.is_floating() {
            return self.layout_float(id, style);
        }

        match (&node.kind, display) {
            // Relative text needs a box of its own to be shifted.
            (NodeKind::Text { .. }, Display::Block) if style.position == PositionMode::Relative => {
                self.close_line(LineEnd::End)?;
                self.layout_block(id, style)
            }
            (NodeKind::Text { .. }, Display::Block) => {
                self.close_line(LineEnd::End)?;
                self.inline_text(id, &style)?;
                self.close_line(LineEnd::End)
            }
            (NodeKind::Text { .. }, _) => self.inline_text(id, &style),
            (NodeKind::Image { .. }, Display::Block) => {
                self.close_line(LineEnd::End)?;
                self.block_image(id, style)
            }
            (NodeKind::Image { .. }, _) => self.inline_image(id, style),
            (NodeKind::Table { .. }, _) => {
                self.close_line(LineEnd::End)?;
                self.layout_table(id, style)
            }
            (NodeKind::Page { .. }, _) => {
                debug!(target: LOG_TARGET, "nested page {id:?} laid out as a block after a page break");
                self.close_line(LineEnd::End)?;
                self.page_break()?;
                self.layout_block(id, style)
            }
            (_, Display::Inline | Display::InlineBlock) => self.inline_block(id, style),
            _ => {
                self.close_line(LineEnd::End)?;
                self.layout_block(id, style)
            }
        }
    }

    /// Lay out a block-level box in the current flow.
    fn layout_block(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        let y = self.top()?.y;
        let cleared = self.floats.clear_y(style.clear, y);
        if cleared > y {
            self.set_y(cleared);
        }
        self.floats.retire_passed(self.top()?.y);

        let width = self.block_width(&style)?;
        let height = self.block_height(&style);

        if height.is_some() || style.keep_together {
            let total = match height {
                Some(h) => h + style.margin.vertical(),
                None => self.measure(|pass| {
                    let block =
                        pass.layout_isolated(id, style.clone(), width, BlockKind::Container)?;
                    Ok(pass.tree.block(block).total_bounds.height)
                })?,
            };
            if self.make_room(total)? == Fit::Truncate {
                return Ok(());
            }
        }

        let contents = style.clone();
        self.open_frame(FrameSpec {
            content: Some(id),
            style,
            kind: BlockKind::Container,
            width,
            height,
        })?;
        self.layout_contents(id, contents)?;
        self.close_frame()?;
        self.mark_placed();
        Ok(())
    }

    /// Border-box width of a block-level box in the innermost frame.
    fn block_width(&self, style: &StyleSnapshot) -> Result<f64, LayoutError> {
        Ok(constraints::block_width(
            style.width,
            style.min_width,
            style.max_width,
            self.top()?.column_width(),
            style.margin.horizontal(),
        ))
    }

    /// Fixed border-box height, clamped by min and max.
    fn block_height(&self, style: &StyleSnapshot) -> Option<f64> {
        style.height.map(|h| {
            let h = style.max_height.map_or(h, |m| h.min(m));
            style.min_height.map_or(h, |m| h.max(m))
        })
    }

    /// Lay out a node's children as an isolated flow at the page origin.
    fn layout_isolated(
        &mut self,
        id: ContentId,
        style: StyleSnapshot,
        width: f64,
        kind: BlockKind,
    ) -> Result<BlockId, LayoutError> {
        let height = self.block_height(&style);
        let inner = style.clone();
        self.open_isolated(FrameSpec {
            content: Some(id),
            style,
            kind,
            width,
            height,
        });
        self.layout_contents(id, inner)?;
        self.close_frame()
    }

    /// Fill the innermost frame with a node's own content.
    fn layout_contents(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        match &self.content.node(id).kind {
            NodeKind::Text { .. } => self.inline_text(id, &style),
            NodeKind::Table { .. } => {
                let inner = StyleSnapshot {
                    width: None,
                    height: None,
                    margin: Thickness::ZERO,
                    padding: Thickness::ZERO,
                    position: PositionMode::Static,
                    ..style
                };
                self.layout_table(id, inner)
            }
            _ => self.layout_children(id),
        }
    }

    /// Lay out a box away from the flow, to be moved into place later:
    /// images get their solved size, everything else an isolated flow of
    /// the given or shrink-to-fit width.
    fn layout_detached(
        &mut self,
        id: ContentId,
        style: StyleSnapshot,
        width: Option<f64>,
        available: Size,
    ) -> Result<BlockId, LayoutError> {
        if let NodeKind::Image { .. } = self.content.node(id).kind {
            return self.image_block(id, &style, available);
        }
        let width = width.unwrap_or_else(|| self.shrink_to_fit(id, &style, available.width));
        self.layout_isolated(id, style, width, BlockKind::Container)
    }

    // ── Images ─────────────────────────────────────────────────

    /// Size an image and create its block at the page origin.
    fn image_block(
        &mut self,
        id: ContentId,
        style: &StyleSnapshot,
        available: Size,
    ) -> Result<BlockId, LayoutError> {
        let outcome = self.image_size(id, style, available);
        if outcome.overflowed {
            self.diagnose(
                LayoutError::OverflowBeyondBounds(format!(
                    "image {id:?} needs {:.1}x{:.1}pt and cannot shrink further",
                    outcome.width, outcome.height
                )),
                Some(id),
            );
        }
        let block = self.tree.push_block(Some(id), BlockKind::Image);
        let b = self.tree.block_mut(block);
        b.padding = style.padding;
        b.margins = style.margin;
        b.position = style.position;
        b.float = style.float;
        b.set_content_bounds(Rect::new(
            style.margin.left + style.padding.left,
            style.margin.top + style.padding.top,
            outcome.width,
            outcome.height,
        ));
        Ok(block)
    }

    fn image_size(&self, id: ContentId, style: &StyleSnapshot, available: Size) -> SizeOutcome {
        let natural = match &self.content.node(id).kind {
            NodeKind::Image {
                pixel_width,
                pixel_height,
                resolution,
                ..
            } => {
                let ppi = resolution.unwrap_or(self.options.image_resolution);
                Some(Size::new(
                    constraints::pixels_to_points(*pixel_width, ppi),
                    constraints::pixels_to_points(*pixel_height, ppi),
                ))
            }
            _ => None,
        };
        let chrome = Size::new(
            style.padding.horizontal() + style.margin.horizontal(),
            style.padding.vertical() + style.margin.vertical(),
        );
        let inner = |v: Option<f64>, pad: f64| v.map(|v| (v - pad).max(0.0));
        constraints::solve(&SizeRequest {
            width: inner(style.width, style.padding.horizontal()),
            height: inner(style.height, style.padding.vertical()),
            min_width: inner(style.min_width, style.padding.horizontal()),
            min_height: inner(style.min_height, style.padding.vertical()),
            max_width: inner(style.max_width, style.padding.horizontal()),
            max_height: inner(style.max_height, style.padding.vertical()),
            natural,
            available: Size::new(
                (available.width - chrome.width).max(0.0),
                (available.height - chrome.height).max(0.0),
            ),
            min_scale_reduction: style.min_scale_reduction,
        })
    }

    /// A block-level image: kept whole, moved to the next column if needed.
    fn block_image(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        let available = Size::new(self.top()?.column_width(), self.available_height());
        let block = self.image_block(id, &style, available)?;
        let total = self.tree.block(block).total_bounds;
        if self.make_room(total.height)? == Fit::Truncate {
            self.tree.block_mut(block).excluded_from_output = true;
            return Ok(());
        }
        let (x, y) = {
            let frame = self.top()?;
            (frame.column_x(), frame.y)
        };
        self.tree.translate_block(block, x - total.x, y - total.y);
        if style.position == PositionMode::Relative {
            let index = self.record_relative_component(block, style)?;
            self.push_item(LayoutItem::Positioned { index })?;
        } else {
            self.push_item(LayoutItem::Block { block })?;
        }
        self.set_y(y + total.height);
        self.mark_placed();
        Ok(())
    }

    // ── Intrinsic sizing ───────────────────────────────────────

    /// Width a box would take if nothing wrapped, margins included.
    fn max_content_width(&self, id: ContentId, style: &StyleSnapshot) -> f64 {
        let node = self.content.node(id);
        if let Some(w) = style.width {
            return w + style.margin.horizontal();
        }
        let inner = match &node.kind {
            NodeKind::Text { content, runs } => {
                if runs.is_empty() {
                    crate::text::max_content_width(
                        content,
                        &style.font,
                        style.letter_spacing,
                        self.fonts,
                    ) + style.text_indent
                } else {
                    let ctx = self.style_context(None, None);
                    runs.iter()
                        .map(|run| {
                            let (s, _) = run.style.resolve(Some(style), &ctx);
                            crate::text::max_content_width(
                                &run.content,
                                &s.font,
                                s.letter_spacing,
                                self.fonts,
                            )
                        })
                        .sum::<f64>()
                        + style.text_indent
                }
            }
            NodeKind::Image { .. } => {
                let unbounded = Size::new(f64::INFINITY, f64::INFINITY);
                return self.image_size(id, style, unbounded).width
                    + style.padding.horizontal()
                    + style.margin.horizontal();
            }
            NodeKind::Table { .. } => self.table_max_content_width(id, style),
            _ => {
                let mut widest: f64 = 0.0;
                let mut inline_run = 0.0;
                for &child in self.content.children(id) {
                    let child_style = self.quiet_style(child, style, None);
                    if child_style.position.is_out_of_flow() {
                        continue;
                    }
                    let w = self.max_content_width(child, &child_style);
                    let kind = &self.content.node(child).kind;
                    if display_of(kind, &child_style) == Display::Block
                        && !child_style.is_floating()
                    {
                        widest = widest.max(inline_run).max(w);
                        inline_run = 0.0;
                    } else {
                        inline_run += w;
                    }
                }
                widest.max(inline_run)
            }
        };
        let mut width = inner + style.padding.horizontal();
        if let Some(max) = style.max_width {
            width = width.min(max);
        }
        if let Some(min) = style.min_width {
            width = width.max(min);
        }
        width + style.margin.horizontal()
    }

    /// Border-box width for a box sized to its content inside `available`.
    fn shrink_to_fit(&self, id: ContentId, style: &StyleSnapshot, available: f64) -> f64 {
        match style.width {
            Some(_) => constraints::block_width(
                style.width,
                style.min_width,
                style.max_width,
                available,
                style.margin.horizontal(),
            ),
            None => {
                let preferred = self.max_content_width(id, style) - style.margin.horizontal();
                preferred.min((available - style.margin.horizontal()).max(0.0)).max(0.0)
            }
        }
    }
}

/// Outer display of a node: its own setting, else what its kind implies.
fn display_of(kind: &NodeKind, style: &StyleSnapshot) -> Display {
    match style.display {
        Some(display) => display,
        None => match kind {
            NodeKind::Text { .. } | NodeKind::Image { .. } => Display::Inline,
            _ => Display::Block,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, PageSize};
    use crate::style::units::Unit;
    use crate::style::Style;

    fn small_page() -> PageConfig {
        PageConfig {
            size: PageSize::Custom {
                width: 300.0,
                height: 200.0,
            },
            margin: Thickness::uniform(10.0),
            ..Default::default()
        }
    }

    fn run(children: Vec<Node>) -> LayoutTree {
        let mut doc = Document::new(children);
        doc.default_page = small_page();
        LayoutEngine::new().layout(&doc, &FontContext::new()).unwrap()
    }

    fn fixed(height: f64) -> Style {
        Style {
            height: Some(Unit::pt(height)),
            ..Default::default()
        }
    }

    #[test]
    fn empty_document_has_one_page() {
        let tree = run(vec![]);
        assert_eq!(tree.pages.len(), 1);
        let page = tree.block(tree.pages[0].block);
        assert_eq!(page.content_bounds, Rect::new(10.0, 10.0, 280.0, 180.0));
    }

    #[test]
    fn blocks_stack_vertically() {
        let tree = run(vec![
            Node::block(fixed(50.0), vec![]),
            Node::block(fixed(30.0), vec![]),
        ]);
        let blocks: Vec<_> = tree.blocks.iter().filter(|b| b.kind == BlockKind::Container).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].total_bounds, Rect::new(10.0, 10.0, 280.0, 50.0));
        assert_eq!(blocks[1].total_bounds.y, 60.0);
    }

    #[test]
    fn fixed_height_block_moves_to_next_page() {
        let tree = run(vec![
            Node::block(fixed(150.0), vec![]),
            Node::block(fixed(50.0), vec![]),
        ]);
        assert_eq!(tree.pages.len(), 2);
        let second = tree.first_arrangement(ContentId(1)).unwrap();
        assert_eq!(second.page, 1);
        assert_eq!(second.total_bounds.y, 10.0);
    }

    #[test]
    fn split_block_leaves_one_fragment_per_page() {
        let children: Vec<Node> = (0..6).map(|_| Node::block(fixed(50.0), vec![])).collect();
        let tree = run(vec![Node::block(Style::default(), children)]);
        assert_eq!(tree.pages.len(), 2);
        let fragments = tree.arrangements(ContentId(0));
        assert_eq!(fragments.len(), 2);
        assert_eq!(tree.block(fragments[0]).page, 0);
        assert_eq!(tree.block(fragments[1]).page, 1);
        assert_eq!(tree.block(fragments[1]).total_bounds.y, 10.0);
    }

    #[test]
    fn page_break_starts_a_new_page() {
        let tree = run(vec![
            Node::block(fixed(20.0), vec![]),
            Node::page_break(),
            Node::block(fixed(20.0), vec![]),
        ]);
        assert_eq!(tree.pages.len(), 2);
        assert_eq!(tree.first_arrangement(ContentId(2)).unwrap().page, 1);
    }

    #[test]
    fn page_nodes_use_their_own_config() {
        let config = PageConfig {
            size: PageSize::Custom {
                width: 100.0,
                height: 100.0,
            },
            margin: Thickness::ZERO,
            ..Default::default()
        };
        let tree = run(vec![
            Node::page(config, Style::default(), vec![Node::block(fixed(10.0), vec![])]),
            Node::block(fixed(10.0), vec![]),
        ]);
        assert_eq!(tree.pages.len(), 2);
        assert_eq!(tree.pages[0].size, Size::new(100.0, 100.0));
        assert_eq!(tree.pages[1].size, Size::new(300.0, 200.0));
    }

    #[test]
    fn page_columns_fill_in_order() {
        let mut config = small_page();
        config.columns = 2;
        config.alley = 20.0;
        let mut doc = Document::new(vec![
            Node::block(fixed(120.0), vec![]),
            Node::block(fixed(120.0), vec![]),
        ]);
        doc.default_page = config;
        let tree = LayoutEngine::new().layout(&doc, &FontContext::new()).unwrap();
        assert_eq!(tree.pages.len(), 1);
        let second = tree.first_arrangement(ContentId(1)).unwrap();
        // Column width (280 - 20) / 2 = 130, second column starts at 10 + 150.
        assert_eq!(second.total_bounds, Rect::new(160.0, 10.0, 130.0, 120.0));
        assert_eq!(tree.block(tree.pages[0].block).regions.len(), 2);
    }
}
