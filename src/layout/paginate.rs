//! # Column & Page Breaks
//!
//! Decides what happens when content does not fit the space left in its
//! column, and performs the move when it has to go elsewhere.
//!
//! The decision depends on the nearest box with a bottom edge: the page,
//! or an inner fixed-height box. Pages with `NewPage` overflow move the
//! content to the next column, then the next page. Fixed-height boxes
//! cannot grow onto another page, so their content is clipped or truncated.
//! Content that does not fit even an empty column is placed anyway and
//! reported, so a pass always terminates.
//!
//! Moving to the next column closes the current fragment of every box
//! between the column owner and the cursor, then reopens each one at the
//! top of the new column.

use log::debug;

use super::tree::{BlockKind, LayoutItem};
use super::{Pass, LOG_TARGET};
use crate::error::LayoutError;
use crate::model::{OverflowAction, RelativeOverflow};
use crate::style::PositionMode;

const EPSILON: f64 = 0.001;

/// Horizontal layout of a box's columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnGeometry {
    /// Left edge of the first column.
    pub x: f64,
    /// Width of all columns and alleys together.
    pub width: f64,
    pub count: usize,
    pub alley: f64,
}

impl ColumnGeometry {
    pub fn new(x: f64, width: f64, count: u32, alley: f64) -> Self {
        Self {
            x,
            width,
            count: count.max(1) as usize,
            alley: alley.max(0.0),
        }
    }

    pub fn column_width(&self) -> f64 {
        let alleys = self.alley * (self.count - 1) as f64;
        ((self.width - alleys) / self.count as f64).max(0.0)
    }

    pub fn column_x(&self, index: usize) -> f64 {
        self.x + index as f64 * (self.column_width() + self.alley)
    }
}

/// The box whose bottom edge limits a placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    /// Overflow moves content on: a page, or a box with a free column.
    pub paged: bool,
    pub overflow: OverflowAction,
    /// A relatively positioned box lies between the bound and the content.
    pub relative_inside: bool,
    /// Some column or page has content that a move would leave behind.
    pub can_advance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitDecision {
    /// It fits.
    Place,
    /// It does not fit but is kept where it is.
    Clip,
    /// It does not fit an empty column either; place it and report.
    Oversized,
    /// Move to the next column or page and ask again.
    Advance,
    /// Drop it and everything after it in the bounding box.
    Truncate,
}

/// Outcome of making room for content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Place,
    Truncate,
}

/// Decide what to do with content that may overflow its bound.
pub fn decide_fit(fits: bool, bound: Option<&Bound>, relative: RelativeOverflow) -> FitDecision {
    let bound = match bound {
        Some(bound) if !fits => bound,
        _ => return FitDecision::Place,
    };
    if bound.relative_inside && relative == RelativeOverflow::Truncate {
        return FitDecision::Truncate;
    }
    if !bound.paged {
        return match bound.overflow {
            OverflowAction::Clip => FitDecision::Clip,
            OverflowAction::NewPage | OverflowAction::Truncate => FitDecision::Truncate,
        };
    }
    match bound.overflow {
        OverflowAction::NewPage if bound.can_advance => FitDecision::Advance,
        OverflowAction::NewPage => FitDecision::Oversized,
        OverflowAction::Clip => FitDecision::Clip,
        OverflowAction::Truncate => FitDecision::Truncate,
    }
}

impl Pass<'_> {
    /// Check whether `height` fits below the cursor. Returns the decision
    /// and the frame that should be marked truncated if it comes to that.
    pub(super) fn check_fit(&self, height: f64) -> (FitDecision, Option<usize>) {
        let y = match self.frames.last() {
            Some(frame) => frame.y,
            None => return (FitDecision::Place, None),
        };
        let mut relative = None;
        for (i, frame) in self.frames.iter().enumerate().rev() {
            if let Some(limit) = frame.limit {
                let bound = Bound {
                    paged: frame.kind == BlockKind::Page
                        || frame.column + 1 < frame.columns.count,
                    overflow: frame.overflow,
                    relative_inside: relative.is_some(),
                    can_advance: self.paging_target().is_some(),
                };
                let fits = y + height <= limit + EPSILON;
                let decision = decide_fit(fits, Some(&bound), self.options.relative_overflow);
                let truncated = match (decision, relative) {
                    (FitDecision::Truncate, Some(r)) if bound.paged => r,
                    _ => i,
                };
                return (decision, Some(truncated));
            }
            if frame.isolated {
                break;
            }
            if frame.style.position == PositionMode::Relative && frame.kind != BlockKind::Page {
                relative = Some(i);
            }
        }
        (FitDecision::Place, None)
    }

    /// The frame that owns the next column to move to: the innermost box
    /// with a free column, or the page, provided it already holds content.
    pub(super) fn paging_target(&self) -> Option<usize> {
        for (i, frame) in self.frames.iter().enumerate().rev() {
            let free_column = frame.column + 1 < frame.columns.count;
            if (free_column || frame.kind == BlockKind::Page) && frame.column_has_content {
                return Some(i);
            }
            if frame.isolated || (frame.limit.is_some() && frame.kind != BlockKind::Page) {
                return None;
            }
        }
        None
    }

    /// Make sure `height` fits below the cursor, moving to another column
    /// or page when the overflow rules allow it.
    pub(super) fn make_room(&mut self, height: f64) -> Result<Fit, LayoutError> {
        loop {
            let (decision, frame) = self.check_fit(height);
            match decision {
                FitDecision::Place | FitDecision::Clip => return Ok(Fit::Place),
                FitDecision::Oversized => {
                    let content = self.frames.last().and_then(|f| f.content);
                    self.diagnose(
                        LayoutError::OverflowBeyondBounds(format!(
                            "{height:.1}pt of content does not fit an empty column"
                        )),
                        content,
                    );
                    return Ok(Fit::Place);
                }
                FitDecision::Advance => self.advance()?,
                FitDecision::Truncate => {
                    if let Some(index) = frame {
                        self.truncate_at(index);
                    }
                    return Ok(Fit::Truncate);
                }
            }
        }
    }

    fn truncate_at(&mut self, index: usize) {
        let frame = &mut self.frames[index];
        if frame.truncated {
            return;
        }
        frame.truncated = true;
        let content = frame.content;
        self.diagnose(
            LayoutError::OverflowBeyondBounds(format!(
                "content of {content:?} truncated at the bottom of its box"
            )),
            content,
        );
    }

    /// Height of a whole column in the box bounding the cursor.
    pub(super) fn available_height(&self) -> f64 {
        for frame in self.frames.iter().rev() {
            if let Some(limit) = frame.limit {
                return (limit - frame.content_top).max(0.0);
            }
            if frame.isolated {
                break;
            }
        }
        f64::INFINITY
    }

    /// Move the cursor to the next column or page.
    pub(super) fn advance(&mut self) -> Result<(), LayoutError> {
        let target = self.paging_target().ok_or_else(|| {
            LayoutError::StructuralInconsistency("no column or page to advance to".into())
        })?;
        self.break_to(target, false)
    }

    /// Force a new page. Ignored inside boxes that cannot split and at the
    /// top of an empty page.
    pub(super) fn page_break(&mut self) -> Result<(), LayoutError> {
        let blocked = self
            .frames
            .iter()
            .any(|f| f.isolated || (f.limit.is_some() && f.kind != BlockKind::Page));
        if blocked {
            debug!(target: LOG_TARGET, "page break inside an unsplittable box ignored");
            return Ok(());
        }
        match self.frames.first() {
            Some(page) if page.column_has_content || page.column > 0 => self.break_to(0, true),
            _ => Ok(()),
        }
    }

    /// Force the next column; a single-column page moves to the next page.
    pub(super) fn column_break(&mut self) -> Result<(), LayoutError> {
        match self.paging_target() {
            Some(target) => self.break_to(target, false),
            None => {
                debug!(target: LOG_TARGET, "column break at the top of a column ignored");
                Ok(())
            }
        }
    }

    fn break_to(&mut self, target: usize, new_page: bool) -> Result<(), LayoutError> {
        let depth = self.frames.len();
        for frame in &mut self.frames[target..] {
            frame.line = None;
        }
        for i in (target + 1..depth).rev() {
            self.finalize_fragment(i, false);
        }
        self.floats.retire_all();

        let frame = &self.frames[target];
        if !new_page && frame.column + 1 < frame.columns.count {
            self.next_column(target);
        } else if frame.kind == BlockKind::Page {
            self.new_page();
        } else {
            return Err(LayoutError::StructuralInconsistency(format!(
                "{:?} has no column left to break into",
                frame.block
            )));
        }

        for i in target + 1..depth {
            self.reopen_fragment(i)?;
        }
        Ok(())
    }

    fn next_column(&mut self, index: usize) {
        let frame = &mut self.frames[index];
        frame.column += 1;
        frame.y = frame.content_top;
        frame.column_has_content = false;
        debug!(
            target: LOG_TARGET,
            "{:?} moved to column {}",
            frame.block,
            frame.column
        );
        self.add_region(index);
    }

    fn new_page(&mut self) {
        self.finalize_fragment(0, true);
        let block = self.start_page(self.frames[0].content);
        let page = &mut self.frames[0];
        page.block = block;
        page.column = 0;
        page.y = page.content_top;
        page.max_y = page.content_top;
        page.column_has_content = false;
        page.truncated = false;
        page.fragment += 1;
        self.add_region(0);
    }

    /// Open the next fragment of a split box at the cursor of its parent.
    fn reopen_fragment(&mut self, index: usize) -> Result<(), LayoutError> {
        let (x, top) = {
            let parent = &self.frames[index - 1];
            (parent.column_x(), parent.y)
        };
        let frame = &self.frames[index];
        let margin = frame.style.margin;
        let block = self.tree.push_block(frame.content, frame.kind);
        let b = self.tree.block_mut(block);
        b.padding = frame.style.padding;
        b.position = frame.style.position;
        b.float = frame.style.float;
        self.region_mut(index - 1)?
            .items
            .push(LayoutItem::Block { block });

        let frame = &mut self.frames[index];
        let padding = frame.style.padding;
        frame.block = block;
        frame.columns.x = x + margin.left + padding.left;
        frame.column = 0;
        frame.top = top;
        frame.content_top = top + padding.top;
        frame.y = frame.content_top;
        frame.max_y = frame.content_top;
        frame.column_has_content = false;
        frame.fragment += 1;
        self.add_region(index);
        Ok(())
    }
}
