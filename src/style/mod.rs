//! # Style System
//!
//! The engine consumes already-cascaded style values. [`Style`] is the input
//! shape (every property optional, lengths as [`Unit`]s); [`StyleSnapshot`]
//! is what layout works with once inheritance is applied and every length is
//! resolved to points against its surroundings.
//!
//! Only properties that influence geometry live here. Colour, borders and the
//! rest of the paint model belong to the renderer.

pub mod units;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::font::{FontContext, FontMetrics, FontSpec};
use crate::model::{LayoutOptions, OverflowAction, Thickness};
use units::{Axis, ResolutionContext, Unit, UnitKind};

/// The complete set of layout-relevant style properties for a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    // ── Box Model ──────────────────────────────────────────────
    pub width: Option<Unit>,
    pub height: Option<Unit>,
    pub min_width: Option<Unit>,
    pub min_height: Option<Unit>,
    pub max_width: Option<Unit>,
    pub max_height: Option<Unit>,
    /// Margin outside the padding, in points.
    pub margin: Option<Thickness>,
    /// Padding inside the box, in points.
    pub padding: Option<Thickness>,
    /// Outer display type. Unset lets the node kind decide.
    pub display: Option<Display>,

    // ── Positioning ─────────────────────────────────────────────
    pub position: Option<PositionMode>,
    pub top: Option<Unit>,
    pub right: Option<Unit>,
    pub bottom: Option<Unit>,
    pub left: Option<Unit>,
    pub float: Option<FloatMode>,
    pub clear: Option<Clear>,

    // ── Alignment ───────────────────────────────────────────────
    pub text_align: Option<HorizontalAlign>,
    /// Inline content: alignment against the line. Table cells: alignment
    /// of the content inside the cell.
    pub vertical_align: Option<VerticalAlign>,

    // ── Typography ─────────────────────────────────────────────
    pub font_family: Option<String>,
    /// Font size. `em` and `%` are relative to the parent's size.
    pub font_size: Option<Unit>,
    pub font_weight: Option<u32>,
    pub italic: Option<bool>,
    /// Line height as a multiplier of font size.
    pub line_height: Option<f64>,
    /// Indent of the first line of a block's text.
    pub text_indent: Option<Unit>,
    /// Extra space after every character, in points.
    pub letter_spacing: Option<f64>,

    // ── Columns & Paging ───────────────────────────────────────
    pub column_count: Option<u32>,
    pub alley_width: Option<f64>,
    /// What to do with content that overflows this box.
    pub overflow: Option<OverflowAction>,
    /// Floor for shrinking intrinsically sized content to fit.
    pub min_scale_reduction: Option<f64>,
    /// Move the box whole to the next column instead of splitting it.
    pub keep_together: Option<bool>,
    /// Force a page break before this node.
    pub break_before: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Display {
    Block,
    Inline,
    InlineBlock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionMode {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

impl PositionMode {
    /// Absolute and fixed boxes take no space in the flow.
    pub fn is_out_of_flow(self) -> bool {
        matches!(self, PositionMode::Absolute | PositionMode::Fixed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatMode {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clear {
    #[default]
    None,
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalAlign {
    #[default]
    Baseline,
    Top,
    Middle,
    Bottom,
}

/// Resolved offsets of a positioned box. `None` means the side is unset and
/// the flow position is used on that axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub top: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
}

/// Resolved style: the properties layout consumes, in points.
#[derive(Debug, Clone)]
pub struct StyleSnapshot {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub min_width: Option<f64>,
    pub min_height: Option<f64>,
    pub max_width: Option<f64>,
    pub max_height: Option<f64>,
    pub margin: Thickness,
    pub padding: Thickness,
    pub display: Option<Display>,

    pub position: PositionMode,
    /// Offsets kept as units: they resolve against the containing block,
    /// which is only final once the flow is laid out.
    pub offsets: [Option<Unit>; 4],
    pub float: FloatMode,
    pub clear: Clear,

    pub text_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,

    pub font: FontSpec,
    pub metrics: FontMetrics,
    pub line_height: f64,
    pub text_indent: f64,
    pub letter_spacing: f64,

    pub column_count: u32,
    pub alley_width: f64,
    pub overflow: Option<OverflowAction>,
    pub min_scale_reduction: f64,
    pub keep_together: bool,
    pub break_before: bool,
}

/// Everything style resolution needs from outside the node.
pub struct StyleContext<'a> {
    pub fonts: &'a FontContext,
    pub options: &'a LayoutOptions,
    pub page_size: (f64, f64),
    pub container_width: Option<f64>,
    pub container_height: Option<f64>,
}

impl StyleSnapshot {
    /// The style of the page itself: document defaults, nothing set.
    pub fn root(ctx: &StyleContext) -> Self {
        let (snapshot, _) = Style::default().resolve(None, ctx);
        snapshot
    }

    /// Resolution context for units inside a box with this style.
    pub fn units(&self, ctx: &StyleContext) -> ResolutionContext {
        ResolutionContext::new(ctx.page_size, self.metrics, ctx.options.root_font_size)
            .with_container(ctx.container_width, ctx.container_height)
    }

    pub fn is_floating(&self) -> bool {
        self.float != FloatMode::None && !self.position.is_out_of_flow()
    }

    /// Resolve the four offsets against a containing block.
    pub fn resolve_offsets(
        &self,
        page_size: (f64, f64),
        root_font_size: f64,
        container: (f64, f64),
    ) -> Result<Offsets, LayoutError> {
        let ctx = ResolutionContext::new(page_size, self.metrics, root_font_size)
            .with_container(Some(container.0), Some(container.1));
        let [top, right, bottom, left] = self.offsets;
        let resolve = |unit: Option<Unit>, axis| -> Result<Option<f64>, LayoutError> {
            unit.map(|u| u.resolve(axis, &ctx)).transpose()
        };
        Ok(Offsets {
            top: resolve(top, Axis::Vertical)?,
            right: resolve(right, Axis::Horizontal)?,
            bottom: resolve(bottom, Axis::Vertical)?,
            left: resolve(left, Axis::Horizontal)?,
        })
    }
}

impl Style {
    /// Resolve against the parent's snapshot. Lengths that cannot be
    /// resolved fall back to auto; each is reported in the returned list.
    pub fn resolve(
        &self,
        parent: Option<&StyleSnapshot>,
        ctx: &StyleContext,
    ) -> (StyleSnapshot, Vec<LayoutError>) {
        let mut problems = Vec::new();
        let options = ctx.options;

        let parent_size = parent.map(|p| p.font.size).unwrap_or(options.root_font_size);
        let font_size = match self.font_size {
            Some(unit) => match unit.kind {
                UnitKind::Em => unit.value * parent_size,
                UnitKind::Percent => unit.value * parent_size / 100.0,
                _ => {
                    let parent_metrics = parent
                        .map(|p| p.metrics)
                        .unwrap_or_else(|| FontMetrics::fallback(parent_size));
                    let units = ResolutionContext::new(
                        ctx.page_size,
                        parent_metrics,
                        options.root_font_size,
                    );
                    unit.resolve(Axis::Vertical, &units).unwrap_or(parent_size)
                }
            },
            None => parent_size,
        };

        let font = FontSpec {
            family: self
                .font_family
                .clone()
                .or_else(|| parent.map(|p| p.font.family.clone()))
                .unwrap_or_else(|| "Helvetica".to_string()),
            size: font_size,
            weight: self
                .font_weight
                .unwrap_or(parent.map(|p| p.font.weight).unwrap_or(400)),
            italic: self
                .italic
                .unwrap_or(parent.map(|p| p.font.italic).unwrap_or(false)),
        };
        let line_height = self
            .line_height
            .unwrap_or(parent.map(|p| p.line_height).unwrap_or(options.default_line_height));
        let metrics = ctx.fonts.metrics(&font, line_height);

        let margin = self.margin.unwrap_or_default();
        let padding = self.padding.unwrap_or_default();

        let units = ResolutionContext::new(ctx.page_size, metrics, options.root_font_size)
            .with_container(ctx.container_width, ctx.container_height);
        let mut length = |value: Option<Unit>, axis: Axis| -> Option<f64> {
            let unit = value?;
            match unit.resolve(axis, &units) {
                Ok(points) => Some(points),
                Err(e) => {
                    problems.push(e);
                    None
                }
            }
        };

        // A percentage width fills that share of the container once the
        // box's own horizontal margins are taken out.
        let width = match self.width {
            Some(unit) if unit.kind == UnitKind::Percent => match ctx.container_width {
                Some(container) => {
                    Some(((container - margin.horizontal()) * unit.value / 100.0).max(0.0))
                }
                None => length(Some(unit), Axis::Horizontal),
            },
            other => length(other, Axis::Horizontal),
        };
        let height = length(self.height, Axis::Vertical);
        let min_width = length(self.min_width, Axis::Horizontal);
        let min_height = length(self.min_height, Axis::Vertical);
        let max_width = length(self.max_width, Axis::Horizontal);
        let max_height = length(self.max_height, Axis::Vertical);
        let text_indent = match self.text_indent {
            Some(unit) => length(Some(unit), Axis::Horizontal).unwrap_or(0.0),
            None => parent.map(|p| p.text_indent).unwrap_or(0.0),
        };

        let snapshot = StyleSnapshot {
            width,
            height,
            min_width,
            min_height,
            max_width,
            max_height,
            margin,
            padding,
            display: self.display,

            position: self.position.unwrap_or_default(),
            offsets: [self.top, self.right, self.bottom, self.left],
            float: self.float.unwrap_or_default(),
            clear: self.clear.unwrap_or_default(),

            text_align: self
                .text_align
                .unwrap_or(parent.map(|p| p.text_align).unwrap_or_default()),
            vertical_align: self.vertical_align.unwrap_or_default(),

            font,
            metrics,
            line_height,
            text_indent,
            letter_spacing: self
                .letter_spacing
                .unwrap_or(parent.map(|p| p.letter_spacing).unwrap_or(0.0)),

            column_count: self.column_count.unwrap_or(1).max(1),
            alley_width: self.alley_width.unwrap_or(12.0).max(0.0),
            overflow: self.overflow,
            min_scale_reduction: self
                .min_scale_reduction
                .unwrap_or(options.minimum_scale_reduction)
                .clamp(0.0, 1.0),
            keep_together: self.keep_together.unwrap_or(false),
            break_before: self.break_before.unwrap_or(false),
        };
        (snapshot, problems)
    }
}
