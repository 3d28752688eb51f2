//! # Float Manager
//!
//! Tracks left and right floats in page space and answers the one question
//! the inline flow asks: how much of a line is left at a given height.
//!
//! Floats are appended in flow order and never removed. Each records the
//! float before it, and a cursor marks the first float that can still take
//! width: once the flow has moved past a float's bottom edge it is retired
//! and queries skip it. Retired floats stay in the list for reporting.
//!
//! Isolated flows (inline blocks, table cells, positioned boxes) get their
//! own scope so their floats never leak into the surrounding flow.

use log::debug;

use super::paginate::{Fit, FitDecision};
use super::inline::LineEnd;
use super::tree::{BlockId, FloatAddition, Rect, Size};
use super::{Pass, LOG_TARGET};
use crate::error::LayoutError;
use crate::model::ContentId;
use crate::style::{Clear, FloatMode, PositionMode, StyleSnapshot};

#[derive(Debug, Clone)]
pub struct ActiveFloat {
    pub side: FloatMode,
    pub bounds: Rect,
    /// The float placed before this one in the same scope.
    pub prev: Option<usize>,
    retired: bool,
}

#[derive(Debug, Default)]
struct Scope {
    floats: Vec<ActiveFloat>,
    first_active: usize,
}

/// Horizontal space left for a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSpace {
    pub left: f64,
    pub width: f64,
}

#[derive(Debug)]
pub struct FloatManager {
    scopes: Vec<Scope>,
}

impl Default for FloatManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FloatManager {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn scope(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn scope_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn active(&self) -> impl Iterator<Item = &ActiveFloat> {
        let scope = self.scope();
        scope.floats[scope.first_active..]
            .iter()
            .filter(|f| !f.retired)
    }

    /// Register a placed float. Returns its index in the current scope.
    pub fn add(&mut self, side: FloatMode, bounds: Rect) -> usize {
        let scope = self.scope_mut();
        let prev = scope.floats.len().checked_sub(1);
        scope.floats.push(ActiveFloat {
            side,
            bounds,
            prev,
            retired: false,
        });
        scope.floats.len() - 1
    }

    pub fn floats(&self) -> &[ActiveFloat] {
        &self.scope().floats
    }

    /// Retire every float whose bottom edge lies at or above `y`.
    pub fn retire_passed(&mut self, y: f64) {
        let scope = self.scope_mut();
        for f in &mut scope.floats[scope.first_active..] {
            if f.bounds.bottom() <= y {
                f.retired = true;
            }
        }
        while scope
            .floats
            .get(scope.first_active)
            .is_some_and(|f| f.retired)
        {
            scope.first_active += 1;
        }
    }

    /// Retire everything in the current scope (the flow left the column).
    pub fn retire_all(&mut self) {
        let scope = self.scope_mut();
        for f in &mut scope.floats {
            f.retired = true;
        }
        scope.first_active = scope.floats.len();
    }

    /// Space left for a line spanning `[y, y + height)` inside the
    /// horizontal band `[x, x + width)`.
    pub fn line_space(&self, y: f64, height: f64, x: f64, width: f64) -> LineSpace {
        let mut left = x;
        let mut right = x + width;
        let bottom = y + height.max(f64::EPSILON);
        for f in self.active() {
            let b = &f.bounds;
            if b.y >= bottom || b.bottom() <= y || b.right() <= x || b.x >= x + width {
                continue;
            }
            match f.side {
                FloatMode::Left => left = left.max(b.right()),
                FloatMode::Right => right = right.min(b.x),
                FloatMode::None => {}
            }
        }
        LineSpace {
            left,
            width: (right - left).max(0.0),
        }
    }

    /// The nearest float bottom below `y` that overlaps the band, where more
    /// width becomes available.
    pub fn next_bottom_below(&self, y: f64, x: f64, width: f64) -> Option<f64> {
        self.active()
            .filter(|f| f.bounds.bottom() > y && f.bounds.right() > x && f.bounds.x < x + width)
            .map(|f| f.bounds.bottom())
            .fold(None, |acc: Option<f64>, b| Some(acc.map_or(b, |a| a.min(b))))
    }

    /// Lowest y a box with the given `clear` must start at.
    pub fn clear_y(&self, clear: Clear, y: f64) -> f64 {
        self.active()
            .filter(|f| match clear {
                Clear::None => false,
                Clear::Left => f.side == FloatMode::Left,
                Clear::Right => f.side == FloatMode::Right,
                Clear::Both => true,
            })
            .map(|f| f.bounds.bottom())
            .fold(y, f64::max)
    }

    /// Find the top-left corner for a new float of the given size, starting
    /// at `y` and moving down past existing floats until it fits. A float
    /// wider than the band is placed at the first height with no floats.
    pub fn place(
        &self,
        side: FloatMode,
        size: (f64, f64),
        mut y: f64,
        x: f64,
        width: f64,
    ) -> (f64, f64) {
        loop {
            let space = self.line_space(y, size.1, x, width);
            if space.width + 1e-9 >= size.0 || space.width >= width {
                let fx = match side {
                    FloatMode::Right => space.left + space.width - size.0,
                    _ => space.left,
                };
                return (fx, y);
            }
            match self.next_bottom_below(y, x, width) {
                Some(next) => y = next,
                None => return (space.left, y),
            }
        }
    }
}

// ── Placing floats ─────────────────────────────────────────────

impl Pass<'_> {
    /// Lay out a floating box and register the width it takes from lines.
    pub(super) fn layout_float(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        let (x, width) = {
            let frame = self.top()?;
            (frame.column_x(), frame.column_width())
        };
        let available = Size::new(width, self.available_height());
        let side = style.float;
        let clear = style.clear;
        let relative = (style.position == PositionMode::Relative).then(|| style.clone());
        let block = self.layout_detached(id, style, None, available)?;
        let total = self.tree.block(block).total_bounds;

        // A float may sit beside the open line only if it fits there.
        let open_line = self
            .top()?
            .line
            .as_ref()
            .map(|line| (line.is_empty(), line.fits(total.width)));
        let beside_line = match open_line {
            Some((false, fits)) => Some(fits),
            Some((true, _)) => {
                self.top_mut()?.line = None;
                None
            }
            None => None,
        };
        let start = match beside_line {
            Some(true) if matches!(
                self.check_fit(total.height).0,
                FitDecision::Place | FitDecision::Clip
            ) =>
            {
                Some(self.top()?.y)
            }
            Some(_) => {
                self.close_line(LineEnd::Wrap)?;
                self.make_float_room(block, total.height)?
            }
            None => self.make_float_room(block, total.height)?,
        };
        let start = match start {
            Some(y) => y,
            None => return Ok(()),
        };

        let (x, width) = {
            let frame = self.top()?;
            if frame.column_x() != x {
                debug!(target: LOG_TARGET, "float {id:?} moved to another column");
            }
            (frame.column_x(), frame.column_width())
        };
        let y = self.floats.clear_y(clear, start);
        let (fx, fy) = self
            .floats
            .place(side, (total.width, total.height), y, x, width);
        self.tree.translate_block(block, fx - total.x, fy - total.y);
        self.floats
            .add(side, Rect::new(fx, fy, total.width, total.height));

        let index = self.frames.len() - 1;
        let region = self.region_mut(index)?;
        let prev = region.floats.len().checked_sub(1);
        let (offset_y, inset) = (fy - region.bounds.y, fx - region.bounds.x);
        region.floats.push(FloatAddition {
            block,
            side,
            width: total.width,
            height: total.height,
            offset_y,
            inset,
            prev,
        });
        // The float keeps taking width at its flow position; only the box
        // itself is shifted.
        if let Some(style) = relative {
            self.record_relative_component(block, style)?;
        }

        let frame = self.top()?;
        let estimate = frame.style.metrics.line_height;
        if let Some(line_y) = frame.line.as_ref().map(|l| l.y()) {
            let space = self.floats.line_space(line_y, estimate, x, width);
            if let Some(line) = self.top_mut()?.line.as_mut() {
                line.set_space(space);
            }
        }
        self.mark_placed();
        Ok(())
    }

    /// Make room below the cursor for a float. Returns the cursor, or `None`
    /// when the float was truncated away.
    fn make_float_room(
        &mut self,
        block: BlockId,
        height: f64,
    ) -> Result<Option<f64>, LayoutError> {
        if self.make_room(height)? == Fit::Truncate {
            self.tree.block_mut(block).excluded_from_output = true;
            return Ok(None);
        }
        Ok(Some(self.top()?.y))
    }
}
