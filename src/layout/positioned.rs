//! # Positioned Boxes
//!
//! Relative, absolute and fixed boxes are laid out during the flow but get
//! their final coordinates only after the whole pass, when the boxes they
//! are positioned against have stopped moving.
//!
//! - **Relative** boxes take their natural place in the flow. Afterwards
//!   they are shifted by their offsets; the flow keeps the natural box as a
//!   placeholder, so nothing around them moves.
//! - **Absolute** boxes are laid out on their own and leave a zero-size
//!   placeholder at their flow position. Their offsets resolve against the
//!   padding box of the nearest positioned ancestor, or the page's content
//!   area. An unset axis keeps the flow position.
//! - **Fixed** boxes work like absolute ones against the whole page.
//!
//! Absolute and fixed boxes that end up outside their page are kept under a
//! `Clip` policy and dropped otherwise: their record gets zero bounds and
//! the box is excluded from output.

use log::debug;

use super::tree::{
    BlockId, BlockKind, LayoutItem, LayoutLine, OffsetSource, PositionedRegion, Rect, Run, Size,
};
use super::Pass;
use crate::error::LayoutError;
use crate::model::{ContentId, OverflowAction};
use crate::style::{Offsets, PositionMode, StyleSnapshot};

const LOG_TARGET: &str = "quire::positioned";

/// The rectangle a positioned box's offsets resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containing {
    /// Padding box of a positioned ancestor.
    Padding(BlockId),
    /// Content box of the flow parent; used by relative boxes.
    Content(BlockId),
    /// Content area of the page the box ends up on.
    PageArea,
    /// The whole page.
    Page,
}

/// A positioned box recorded in a region and waiting for coordinates.
#[derive(Debug, Clone)]
pub struct PendingPosition {
    /// Block whose region holds the record.
    pub anchor: BlockId,
    pub region: usize,
    pub index: usize,
    pub block: BlockId,
    pub content: Option<ContentId>,
    pub style: StyleSnapshot,
    pub containing: Containing,
}

/// An inline positioned box whose line has not been placed yet.
#[derive(Debug, Clone)]
pub struct InlinePositioned {
    pub block: BlockId,
    pub content: ContentId,
    pub style: StyleSnapshot,
    pub containing: Containing,
}

/// Shift of a relative box. `left` wins over `right`, `top` over `bottom`.
pub fn relative_shift(offsets: &Offsets) -> (f64, f64) {
    let dx = offsets.left.or(offsets.right.map(|r| -r)).unwrap_or(0.0);
    let dy = offsets.top.or(offsets.bottom.map(|b| -b)).unwrap_or(0.0);
    (dx, dy)
}

/// Final bounds of an absolute or fixed box whose flow bounds are
/// `natural`, positioned against `containing`.
pub fn resolve_absolute(natural: Rect, offsets: &Offsets, containing: Rect) -> (Rect, OffsetSource) {
    let x = match (offsets.left, offsets.right) {
        (Some(left), _) => Some(containing.x + left),
        (None, Some(right)) => Some(containing.right() - right - natural.width),
        (None, None) => None,
    };
    let y = match (offsets.top, offsets.bottom) {
        (Some(top), _) => Some(containing.y + top),
        (None, Some(bottom)) => Some(containing.bottom() - bottom - natural.height),
        (None, None) => None,
    };
    let source = if x.is_some() && y.is_some() {
        OffsetSource::Explicit
    } else {
        OffsetSource::Flow
    };
    (
        Rect::new(
            x.unwrap_or(natural.x),
            y.unwrap_or(natural.y),
            natural.width,
            natural.height,
        ),
        source,
    )
}

impl Pass<'_> {
    pub(super) fn containing_block(&self, mode: PositionMode) -> Containing {
        if mode == PositionMode::Fixed {
            return Containing::Page;
        }
        self.frames
            .iter()
            .rev()
            .find(|f| f.kind != BlockKind::Page && f.style.position != PositionMode::Static)
            .map(|f| Containing::Padding(f.block))
            .unwrap_or(Containing::PageArea)
    }

    /// Size of the containing block while the flow is still open.
    pub(super) fn containing_size(&self, containing: Containing) -> Size {
        match containing {
            Containing::Padding(block) | Containing::Content(block) => self
                .frames
                .iter()
                .rev()
                .find(|f| f.block == block)
                .map(|f| {
                    let padding = f.style.padding;
                    Size::new(
                        f.columns.width + padding.horizontal(),
                        f.fixed_height.map_or(0.0, |h| h + padding.vertical()),
                    )
                })
                .unwrap_or_else(|| {
                    let (w, h) = self.page_config.content_size();
                    Size::new(w, h)
                }),
            Containing::PageArea => {
                let (w, h) = self.page_config.content_size();
                Size::new(w, h)
            }
            Containing::Page => {
                let (w, h) = self.page_size();
                Size::new(w, h)
            }
        }
    }

    /// Lay out an absolute or fixed box and record its flow position.
    pub(super) fn layout_out_of_flow(
        &mut self,
        id: ContentId,
        style: StyleSnapshot,
        inline: bool,
    ) -> Result<(), LayoutError> {
        let containing = self.containing_block(style.position);
        let cb = self.containing_size(containing);
        let offsets = style
            .resolve_offsets(self.page_size(), self.options.root_font_size, (cb.width, cb.height))
            .unwrap_or_default();
        let width = match (style.width, offsets.left, offsets.right) {
            (Some(_), _, _) => Some(super::constraints::block_width(
                style.width,
                style.min_width,
                style.max_width,
                cb.width,
                style.margin.horizontal(),
            )),
            (None, Some(left), Some(right)) => {
                Some((cb.width - left - right - style.margin.horizontal()).max(0.0))
            }
            _ => None,
        };
        let available = Size::new(cb.width, self.page_config.content_size().1);
        let block = self.layout_detached(id, style.clone(), width, available)?;
        self.tree.block_mut(block).position = style.position;

        if inline {
            let pending = self.inline_positioned.len();
            self.inline_positioned.push(Some(InlinePositioned {
                block,
                content: id,
                style: style.clone(),
                containing,
            }));
            self.ensure_line(&style)?;
            self.line_mut()?.push_positioned(pending);
            return Ok(());
        }

        self.close_line(super::inline::LineEnd::End)?;
        let (x, y) = {
            let frame = self.top()?;
            (frame.column_x(), frame.y)
        };
        let total = self.tree.block(block).total_bounds;
        self.tree.translate_block(block, x - total.x, y - total.y);
        let index = self.anchor_positioned(block, Some(id), style, containing, Rect::new(x, y, 0.0, 0.0))?;
        self.push_item(LayoutItem::Positioned { index })?;
        debug!(target: LOG_TARGET, "{id:?} recorded at ({x:.1}, {y:.1})");
        Ok(())
    }

    /// Record a positioned box in the innermost frame's current region.
    fn anchor_positioned(
        &mut self,
        block: BlockId,
        content: Option<ContentId>,
        style: StyleSnapshot,
        containing: Containing,
        placeholder: Rect,
    ) -> Result<usize, LayoutError> {
        let frame = self.frames.len() - 1;
        let anchor = self.frames[frame].block;
        let region_index = self.tree.block(anchor).regions.len().saturating_sub(1);
        let region = self.region_mut(frame)?;
        region.positioned.push(PositionedRegion {
            block,
            mode: style.position,
            bounds: Rect::ZERO,
            placeholder,
            source: OffsetSource::Pending,
        });
        let index = region.positioned.len() - 1;
        self.positioned.push(PendingPosition {
            anchor,
            region: region_index,
            index,
            block,
            content,
            style,
            containing,
        });
        Ok(index)
    }

    /// Anchor an inline positioned box at its place on a line being placed.
    pub(super) fn place_inline_positioned(
        &mut self,
        pending: usize,
        line: &mut LayoutLine,
        run: usize,
    ) -> Result<(), LayoutError> {
        let p = match self.inline_positioned.get_mut(pending).and_then(Option::take) {
            Some(p) => p,
            None => return Ok(()),
        };
        let inset = match line.runs.get(run) {
            Some(Run::PositionedRegion { inset, .. }) => *inset,
            _ => 0.0,
        };
        let (x, y) = (line.bounds.x + inset, line.bounds.y);
        let total = self.tree.block(p.block).total_bounds;
        self.tree.translate_block(p.block, x - total.x, y - total.y);
        let index = self.anchor_positioned(
            p.block,
            Some(p.content),
            p.style,
            p.containing,
            Rect::new(x, y, 0.0, 0.0),
        )?;
        if let Some(Run::PositionedRegion { index: slot, .. }) = line.runs.get_mut(run) {
            *slot = index;
        }
        Ok(())
    }

    /// Turn the fragment of a relative frame into a positioned record in
    /// its parent, keeping its natural box as the placeholder.
    pub(super) fn record_relative(&mut self, index: usize) {
        let frame = &self.frames[index];
        let (block, content, style) = (frame.block, frame.content, frame.style.clone());
        let parent = self.frames[index - 1].block;
        let natural = self.tree.block(block).total_bounds;
        let regions = &mut self.tree.block_mut(parent).regions;
        let region_index = regions.len().saturating_sub(1);
        let region = match regions.last_mut() {
            Some(region) => region,
            None => return,
        };
        let slot = region
            .items
            .iter()
            .rposition(|item| matches!(item, LayoutItem::Block { block: b } if *b == block));
        let slot = match slot {
            Some(slot) => slot,
            None => return,
        };
        region.positioned.push(PositionedRegion {
            block,
            mode: PositionMode::Relative,
            bounds: Rect::ZERO,
            placeholder: natural,
            source: OffsetSource::Pending,
        });
        let position = region.positioned.len() - 1;
        region.items[slot] = LayoutItem::Positioned { index: position };
        self.positioned.push(PendingPosition {
            anchor: parent,
            region: region_index,
            index: position,
            block,
            content,
            style,
            containing: Containing::Content(parent),
        });
    }

    /// Record a relative inline box once its line is in place.
    pub(super) fn record_relative_component(
        &mut self,
        block: BlockId,
        style: StyleSnapshot,
    ) -> Result<usize, LayoutError> {
        let natural = self.tree.block(block).total_bounds;
        let owner = self.tree.block(block).owner;
        let parent = self.top()?.block;
        self.anchor_positioned(block, owner, style, Containing::Content(parent), natural)
    }

    /// Give every recorded positioned box its final bounds: relative and
    /// absolute boxes in flow order, then fixed ones.
    pub(super) fn resolve_positioned(&mut self) -> Result<(), LayoutError> {
        let mut pending = std::mem::take(&mut self.positioned);
        pending.sort_by_key(|p| p.style.position == PositionMode::Fixed);

        for p in pending {
            let page_index = self.tree.block(p.anchor).page;
            let page = self.tree.pages.get(page_index).ok_or_else(|| {
                LayoutError::StructuralInconsistency(format!(
                    "positioned box {:?} anchored on missing page {page_index}",
                    p.block
                ))
            })?;
            let size = page.size;
            let page_rect = Rect::new(0.0, 0.0, size.width, size.height);
            let cb = match p.containing {
                Containing::Padding(b) => self.tree.block(b).padding_box(),
                Containing::Content(b) => self.tree.block(b).content_bounds,
                Containing::PageArea => self.tree.block(page.block).content_bounds,
                Containing::Page => page_rect,
            };

            let offsets = match p.style.resolve_offsets(
                (size.width, size.height),
                self.options.root_font_size,
                (cb.width, cb.height),
            ) {
                Ok(offsets) => offsets,
                Err(error) => {
                    self.diagnose(error, p.content);
                    Offsets::default()
                }
            };

            let natural = self.tree.block(p.block).total_bounds;
            let (mut bounds, source) = match p.style.position {
                PositionMode::Absolute | PositionMode::Fixed => resolve_absolute(natural, &offsets, cb),
                _ => {
                    let (dx, dy) = relative_shift(&offsets);
                    let mut moved = natural;
                    moved.translate(dx, dy);
                    (moved, OffsetSource::Relative { dx, dy })
                }
            };
            self.tree
                .translate_block(p.block, bounds.x - natural.x, bounds.y - natural.y);

            if p.style.position.is_out_of_flow() && !page_rect.contains(&bounds) {
                let policy = p
                    .style
                    .overflow
                    .unwrap_or_else(|| self.page_overflow.get(page_index).copied().unwrap_or_default());
                match policy {
                    OverflowAction::Clip => {
                        debug!(target: LOG_TARGET, "{:?} kept outside page {page_index}", p.block);
                    }
                    OverflowAction::NewPage | OverflowAction::Truncate => {
                        self.diagnose(
                            LayoutError::OverflowBeyondBounds(format!(
                                "positioned box at ({:.1}, {:.1}) lies outside page {page_index}; dropped",
                                bounds.x, bounds.y
                            )),
                            p.content,
                        );
                        bounds = Rect::ZERO;
                        self.tree.block_mut(p.block).excluded_from_output = true;
                    }
                }
            }

            let record = self
                .tree
                .block_mut(p.anchor)
                .regions
                .get_mut(p.region)
                .and_then(|r| r.positioned.get_mut(p.index))
                .ok_or_else(|| {
                    LayoutError::StructuralInconsistency(format!(
                        "positioned record {} of {:?} is missing",
                        p.index, p.anchor
                    ))
                })?;
            record.bounds = bounds;
            record.source = source;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(top: Option<f64>, right: Option<f64>, bottom: Option<f64>, left: Option<f64>) -> Offsets {
        Offsets {
            top,
            right,
            bottom,
            left,
        }
    }

    #[test]
    fn relative_shift_adds_offsets_to_flow_position() {
        let (dx, dy) = relative_shift(&offsets(Some(20.0), None, None, Some(10.0)));
        let mut bounds = Rect::new(25.0, 85.0, 100.0, 40.0);
        bounds.translate(dx, dy);
        assert_eq!((bounds.x, bounds.y), (35.0, 105.0));
        assert_eq!(bounds.height, 40.0);
    }

    #[test]
    fn right_and_bottom_shift_the_other_way() {
        assert_eq!(
            relative_shift(&offsets(None, Some(5.0), Some(7.0), None)),
            (-5.0, -7.0)
        );
        assert_eq!(
            relative_shift(&offsets(Some(1.0), Some(5.0), Some(7.0), Some(2.0))),
            (2.0, 1.0)
        );
    }

    #[test]
    fn absolute_uses_containing_block() {
        let cb = Rect::new(50.0, 50.0, 400.0, 600.0);
        let natural = Rect::new(60.0, 300.0, 100.0, 20.0);
        let (bounds, source) = resolve_absolute(natural, &offsets(Some(10.0), None, None, Some(30.0)), cb);
        assert_eq!(bounds, Rect::new(80.0, 60.0, 100.0, 20.0));
        assert_eq!(source, OffsetSource::Explicit);

        let (bounds, _) = resolve_absolute(natural, &offsets(None, Some(0.0), Some(0.0), None), cb);
        assert_eq!(bounds, Rect::new(350.0, 630.0, 100.0, 20.0));
    }

    #[test]
    fn unset_axis_falls_back_to_flow() {
        let cb = Rect::new(0.0, 0.0, 400.0, 600.0);
        let natural = Rect::new(60.0, 300.0, 100.0, 20.0);
        let (bounds, source) = resolve_absolute(natural, &offsets(None, None, None, Some(5.0)), cb);
        assert_eq!((bounds.x, bounds.y), (5.0, 300.0));
        assert_eq!(source, OffsetSource::Flow);
    }
}
