//! # Inline Flow
//!
//! Fills lines with text pieces, atomic components (images, inline blocks)
//! and markers for inline positioned boxes.
//!
//! A [`LineBuilder`] goes `Open → Accumulating → Closed`. Each item asks for
//! width against the space the float manager leaves at the line's height.
//! An item that does not fit closes the line and is retried on the next
//! one; nothing is dropped. A word wider than an empty full-width line is
//! broken at a character boundary as a last resort.
//!
//! Line height is the largest extent of anything on the line. Text
//! contributes its ascent and descent plus half the leading on each side.
//! Components extend the line according to their vertical alignment without
//! moving the baseline of text already placed.

use log::debug;

use super::floats::LineSpace;
use super::paginate::Fit;
use super::tree::{BlockId, BlockKind, LayoutItem, LayoutLine, Rect, Run, Size};
use super::Pass;
use crate::error::LayoutError;
use crate::font::FontSpec;
use crate::model::{ContentId, NodeKind};
use crate::style::{HorizontalAlign, PositionMode, StyleSnapshot, VerticalAlign};
use crate::text::{segment, split_to_fit, BreakAfter, TextPiece};

const LOG_TARGET: &str = "quire::inline";
const EPSILON: f64 = 0.001;

/// Why a line was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// The next item did not fit.
    Wrap,
    /// A newline in the text.
    Mandatory,
    /// The inline content ended.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Open,
    Accumulating,
    Closed(LineEnd),
}

#[derive(Debug, Clone)]
struct PendingComponent {
    block: BlockId,
    run: usize,
    height: f64,
    /// Distance from the component's top to its baseline.
    baseline: f64,
    align: VerticalAlign,
    ex_height: f64,
    /// Style of a relatively positioned component.
    relative: Option<StyleSnapshot>,
}

/// A component ready to be moved next to its line.
#[derive(Debug, Clone)]
pub struct PlacedComponent {
    pub block: BlockId,
    pub run: usize,
    /// Left edge relative to the line.
    pub x: f64,
    /// Top edge relative to the line.
    pub offset_y: f64,
    pub relative: Option<StyleSnapshot>,
}

/// A closed line, still positioned where it was built.
#[derive(Debug, Clone)]
pub struct ClosedLine {
    pub line: LayoutLine,
    pub components: Vec<PlacedComponent>,
    /// Pending inline positioned boxes: (pending index, run index).
    pub positioned: Vec<(usize, usize)>,
    /// Left edge of the column the line was built in.
    pub column_x: f64,
}

/// Accumulates one line.
#[derive(Debug, Clone)]
pub struct LineBuilder {
    state: LineState,
    y: f64,
    column_x: f64,
    space: LineSpace,
    align: HorizontalAlign,
    used: f64,
    /// Hanging whitespace after the last piece.
    trailing: f64,
    ascent: f64,
    descent: f64,
    runs: Vec<Run>,
    /// Number of justifiable gaps before each run.
    run_gaps: Vec<usize>,
    gaps: usize,
    components: Vec<PendingComponent>,
    positioned: Vec<(usize, usize)>,
    open_text: Option<(ContentId, FontSpec)>,
    has_content: bool,
}

impl LineBuilder {
    pub fn new(y: f64, column_x: f64, space: LineSpace, align: HorizontalAlign, indent: f64) -> Self {
        let mut line = Self {
            state: LineState::Open,
            y,
            column_x,
            space,
            align,
            used: 0.0,
            trailing: 0.0,
            ascent: 0.0,
            descent: 0.0,
            runs: Vec::new(),
            run_gaps: Vec::new(),
            gaps: 0,
            components: Vec::new(),
            positioned: Vec::new(),
            open_text: None,
            has_content: false,
        };
        if indent != 0.0 {
            line.push_run(Run::Spacer {
                x: 0.0,
                width: indent,
            });
            line.used = indent;
        }
        line
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn space(&self) -> LineSpace {
        self.space
    }

    pub fn set_space(&mut self, space: LineSpace) {
        self.space = space;
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    pub fn remaining(&self) -> f64 {
        (self.space.width - self.used).max(0.0)
    }

    /// Whether `width` more fits, trailing whitespace allowed to hang.
    pub fn fits(&self, width: f64) -> bool {
        self.used + width <= self.space.width + EPSILON
    }

    /// Nothing but indentation and zero-width markers.
    pub fn is_empty(&self) -> bool {
        !self.has_content
    }

    fn push_run(&mut self, run: Run) {
        self.runs.push(run);
        self.run_gaps.push(self.gaps);
        self.state = LineState::Accumulating;
    }

    /// A gap exists between content separated by whitespace.
    fn begin_content(&mut self) {
        if self.trailing > 0.0 {
            self.gaps += 1;
        }
    }

    pub fn push_text(&mut self, owner: ContentId, style: &StyleSnapshot, piece: &TextPiece) {
        let same_text = matches!(&self.open_text, Some((o, f)) if *o == owner && *f == style.font);
        if !same_text {
            self.end_text();
            self.push_run(Run::TextBegin {
                owner,
                font: style.font.clone(),
            });
            self.open_text = Some((owner, style.font.clone()));
        }
        if !piece.text.is_empty() {
            self.begin_content();
            self.push_run(Run::Characters {
                text: piece.text.clone(),
                x: self.used,
                width: piece.full_width(),
            });
            self.used += piece.full_width();
            self.trailing = piece.trailing;
        }
        let m = style.metrics;
        let half_leading = (m.line_height - (m.ascent + m.descent)) / 2.0;
        self.ascent = self.ascent.max(m.ascent + half_leading);
        self.descent = self.descent.max(m.descent + half_leading);
        self.has_content = true;
    }

    pub fn end_text(&mut self) {
        if self.open_text.take().is_some() {
            self.push_run(Run::TextEnd);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_component(
        &mut self,
        owner: ContentId,
        block: BlockId,
        size: Size,
        baseline: f64,
        align: VerticalAlign,
        ex_height: f64,
        relative: Option<StyleSnapshot>,
    ) {
        self.end_text();
        self.begin_content();
        let run = self.runs.len();
        self.push_run(Run::Component {
            owner,
            block,
            x: self.used,
            width: size.width,
            height: size.height,
            offset_y: 0.0,
        });
        self.components.push(PendingComponent {
            block,
            run,
            height: size.height,
            baseline,
            align,
            ex_height,
            relative,
        });
        self.used += size.width;
        self.trailing = 0.0;
        self.has_content = true;
    }

    /// Mark the flow position of an inline positioned box. Takes no width.
    pub fn push_positioned(&mut self, pending: usize) {
        let run = self.runs.len();
        self.push_run(Run::PositionedRegion {
            index: 0,
            inset: self.used,
        });
        self.positioned.push((pending, run));
    }

    /// Compute the line's vertical metrics and horizontal alignment.
    pub fn close(mut self, end: LineEnd) -> ClosedLine {
        self.end_text();
        self.state = LineState::Closed(end);

        let (mut ascent, mut descent) = (self.ascent, self.descent);
        for c in &self.components {
            match c.align {
                VerticalAlign::Baseline => {
                    ascent = ascent.max(c.baseline);
                    descent = descent.max(c.height - c.baseline);
                }
                VerticalAlign::Middle => {
                    ascent = ascent.max(c.height / 2.0 + c.ex_height / 2.0);
                    descent = descent.max(c.height / 2.0 - c.ex_height / 2.0);
                }
                VerticalAlign::Top | VerticalAlign::Bottom => {}
            }
        }
        for c in &self.components {
            if ascent + descent >= c.height {
                continue;
            }
            match c.align {
                VerticalAlign::Top => descent = c.height - ascent,
                VerticalAlign::Bottom => ascent = c.height - descent,
                _ => {}
            }
        }
        let height = ascent + descent;

        let visible = self.used - self.trailing;
        let extra = (self.space.width - visible).max(0.0);
        let (shift, word_spacing) = match self.align {
            HorizontalAlign::Left => (0.0, 0.0),
            HorizontalAlign::Center => (extra / 2.0, 0.0),
            HorizontalAlign::Right => (extra, 0.0),
            HorizontalAlign::Justify if end == LineEnd::Wrap && self.gaps > 0 => {
                (0.0, extra / self.gaps as f64)
            }
            HorizontalAlign::Justify => (0.0, 0.0),
        };
        if word_spacing > 0.0 {
            for (run, gaps) in self.runs.iter_mut().zip(&self.run_gaps) {
                let offset = *gaps as f64 * word_spacing;
                match run {
                    Run::Characters { x, .. } | Run::Spacer { x, .. } | Run::Component { x, .. } => {
                        *x += offset
                    }
                    Run::PositionedRegion { inset, .. } => *inset += offset,
                    _ => {}
                }
            }
        }

        let mut components = Vec::with_capacity(self.components.len());
        for c in self.components {
            let offset = match c.align {
                VerticalAlign::Baseline => ascent - c.baseline,
                VerticalAlign::Top => 0.0,
                VerticalAlign::Bottom => height - c.height,
                VerticalAlign::Middle => ascent - c.ex_height / 2.0 - c.height / 2.0,
            };
            if let Some(Run::Component { x, offset_y, .. }) = self.runs.get_mut(c.run) {
                *offset_y = offset;
                components.push(PlacedComponent {
                    block: c.block,
                    run: c.run,
                    x: *x,
                    offset_y: offset,
                    relative: c.relative,
                });
            }
        }

        if end != LineEnd::End {
            self.runs.push(Run::NewLine { offset: height });
        }
        let width = if word_spacing > 0.0 {
            self.space.width
        } else {
            visible
        };
        ClosedLine {
            line: LayoutLine {
                bounds: Rect::new(self.space.left + shift, self.y, width, height),
                baseline_offset: ascent,
                baseline_to_bottom: descent,
                available_width: self.space.width,
                used_width: visible,
                word_spacing,
                runs: self.runs,
            },
            components,
            positioned: self.positioned,
            column_x: self.column_x,
        }
    }
}

// ── Pass side ──────────────────────────────────────────────────

impl Pass<'_> {
    pub(super) fn line_is_open(&self) -> bool {
        self.frames.last().is_some_and(|f| f.line.is_some())
    }

    pub(super) fn line_mut(&mut self) -> Result<&mut LineBuilder, LayoutError> {
        self.top_mut()?
            .line
            .as_mut()
            .ok_or_else(|| LayoutError::StructuralInconsistency("no open line".into()))
    }

    /// Open a line at the cursor unless one is open already.
    pub(super) fn ensure_line(&mut self, style: &StyleSnapshot) -> Result<(), LayoutError> {
        let frame = self.top()?;
        if frame.line.is_some() {
            return Ok(());
        }
        let (y, x, width) = (frame.y, frame.column_x(), frame.column_width());
        let estimate = frame.style.metrics.line_height;
        let align = frame.style.text_align;
        let indent = if frame.first_line { style.text_indent } else { 0.0 };
        self.floats.retire_passed(y);
        let space = self.floats.line_space(y, estimate, x, width);
        self.top_mut()?.line = Some(LineBuilder::new(y, x, space, align, indent));
        Ok(())
    }

    /// An empty line squeezed by floats moves down to where one ends.
    /// Returns false when no float narrows the line.
    fn skip_past_floats(&mut self) -> Result<bool, LayoutError> {
        let frame = self.top()?;
        let (x, width) = (frame.column_x(), frame.column_width());
        let line = match &frame.line {
            Some(line) if line.is_empty() && line.space().width + EPSILON < width => line,
            _ => return Ok(false),
        };
        match self.floats.next_bottom_below(line.y(), x, width) {
            Some(bottom) => {
                self.top_mut()?.line = None;
                self.set_y(bottom);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close the open line, if any, and place it.
    pub(super) fn close_line(&mut self, end: LineEnd) -> Result<(), LayoutError> {
        let builder = match self.frames.last_mut().and_then(|f| f.line.take()) {
            Some(builder) => builder,
            None => return Ok(()),
        };
        if builder.is_empty() && builder.positioned.is_empty() {
            return Ok(());
        }
        self.place_line(builder.close(end))
    }

    fn place_line(&mut self, closed: ClosedLine) -> Result<(), LayoutError> {
        let ClosedLine {
            mut line,
            components,
            positioned,
            column_x,
        } = closed;
        let built_y = line.bounds.y;
        if self.make_room(line.bounds.height)? == Fit::Truncate {
            for c in &components {
                self.tree.block_mut(c.block).excluded_from_output = true;
            }
            for (pending, _) in positioned {
                if let Some(p) = self.inline_positioned.get_mut(pending).and_then(Option::take) {
                    self.tree.block_mut(p.block).excluded_from_output = true;
                }
            }
            return Ok(());
        }

        let (x, y) = {
            let frame = self.top()?;
            (frame.column_x(), frame.y)
        };
        line.bounds.translate(x - column_x, y - built_y);

        for c in &components {
            let total = self.tree.block(c.block).total_bounds;
            self.tree.translate_block(
                c.block,
                line.bounds.x + c.x - total.x,
                line.bounds.y + c.offset_y - total.y,
            );
        }
        for (pending, run) in positioned {
            self.place_inline_positioned(pending, &mut line, run)?;
        }
        for c in components {
            if let Some(style) = c.relative {
                let index = self.record_relative_component(c.block, style)?;
                if let Some(run) = line.runs.get_mut(c.run) {
                    *run = Run::PositionedRegion { index, inset: c.x };
                }
            }
        }

        let height = line.bounds.height;
        self.push_item(LayoutItem::Line(line))?;
        self.set_y(y + height);
        self.mark_placed();
        self.top_mut()?.first_line = false;
        Ok(())
    }

    // ── Text ───────────────────────────────────────────────────

    pub(super) fn inline_text(&mut self, id: ContentId, style: &StyleSnapshot) -> Result<(), LayoutError> {
        let runs: Vec<(String, StyleSnapshot)> = match &self.content.node(id).kind {
            NodeKind::Text { content, runs } if runs.is_empty() => {
                vec![(content.clone(), style.clone())]
            }
            NodeKind::Text { runs, .. } => {
                let width = self.top()?.column_width();
                let ctx = self.style_context(Some(width), None);
                let mut resolved = Vec::with_capacity(runs.len());
                let mut problems = Vec::new();
                for run in runs {
                    let (snapshot, errors) = run.style.resolve(Some(style), &ctx);
                    problems.extend(errors);
                    resolved.push((run.content.clone(), snapshot));
                }
                for problem in problems {
                    self.diagnose(problem, Some(id));
                }
                resolved
            }
            _ => return Ok(()),
        };

        for (text, run_style) in runs {
            let pieces = segment(&text, &run_style.font, run_style.letter_spacing, self.fonts);
            for piece in pieces {
                if self.is_truncated() {
                    return Ok(());
                }
                self.place_piece(id, &run_style, piece)?;
            }
        }
        if let Some(line) = self.top_mut()?.line.as_mut() {
            line.end_text();
        }
        Ok(())
    }

    fn place_piece(&mut self, owner: ContentId, style: &StyleSnapshot, mut piece: TextPiece) -> Result<(), LayoutError> {
        loop {
            self.ensure_line(style)?;
            let line = self.line_mut()?;
            if line.fits(piece.width) {
                line.push_text(owner, style, &piece);
                if piece.break_after == BreakAfter::Mandatory {
                    self.close_line(LineEnd::Mandatory)?;
                }
                return Ok(());
            }
            if !line.is_empty() {
                self.close_line(LineEnd::Wrap)?;
                continue;
            }
            if self.skip_past_floats()? {
                continue;
            }
            let remaining = self.line_mut()?.remaining();
            match split_to_fit(&piece, remaining, &style.font, style.letter_spacing, self.fonts) {
                Some((head, tail)) => {
                    debug!(target: LOG_TARGET, "breaking {:?} inside a word", head.text);
                    self.line_mut()?.push_text(owner, style, &head);
                    self.close_line(LineEnd::Wrap)?;
                    piece = tail;
                }
                None => {
                    self.line_mut()?.push_text(owner, style, &piece);
                    if piece.break_after == BreakAfter::Mandatory {
                        self.close_line(LineEnd::Mandatory)?;
                    }
                    return Ok(());
                }
            }
        }
    }

    // ── Components ─────────────────────────────────────────────

    /// Put an atomic box on the current line, wrapping first if needed.
    fn place_component(
        &mut self,
        owner: ContentId,
        block: BlockId,
        style: &StyleSnapshot,
        baseline: f64,
    ) -> Result<(), LayoutError> {
        let total = self.tree.block(block).total_bounds;
        let size = Size::new(total.width, total.height);
        let relative = (style.position == PositionMode::Relative).then(|| style.clone());
        loop {
            self.ensure_line(style)?;
            let ex_height = self.top()?.style.metrics.ex_height;
            let line = self.line_mut()?;
            if line.fits(size.width) {
                line.push_component(owner, block, size, baseline, style.vertical_align, ex_height, relative);
                return Ok(());
            }
            if !line.is_empty() {
                self.close_line(LineEnd::Wrap)?;
                continue;
            }
            if self.skip_past_floats()? {
                continue;
            }
            debug!(target: LOG_TARGET, "{owner:?} is wider than its line");
            self.line_mut()?
                .push_component(owner, block, size, baseline, style.vertical_align, ex_height, relative);
            return Ok(());
        }
    }

    pub(super) fn inline_image(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        let available = Size::new(self.top()?.column_width(), self.available_height());
        let block = self.image_block(id, &style, available)?;
        // The bottom margin edge of an image sits on the baseline.
        let baseline = self.tree.block(block).total_bounds.height;
        self.place_component(id, block, &style, baseline)
    }

    pub(super) fn inline_block(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        let available = self.top()?.column_width();
        let width = self.shrink_to_fit(id, &style, available);
        let block = self.layout_isolated(id, style.clone(), width, BlockKind::InlineBlock)?;
        let total = self.tree.block(block).total_bounds;
        let baseline = self
            .tree
            .last_baseline(block)
            .map(|b| b - total.y)
            .unwrap_or(total.height);
        self.place_component(id, block, &style, baseline)
    }
}
