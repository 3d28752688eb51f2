//! # Table Layout
//!
//! Tables are laid out in four steps:
//!
//! 1. **Occupancy.** Rows are walked top to bottom, cells left to right.
//!    Every cell stamps its column-span × row-span footprint into an
//!    [`OccupancyGrid`]; covered positions become continuations of the
//!    origin cell and are skipped when later cells look for a column.
//! 2. **Columns.** Fixed and fractional columns take their share first,
//!    auto columns split what is left. A cell with an explicit width pins
//!    the auto columns it spans.
//! 3. **Rows.** Every cell is laid out in isolation at its span width. Rows
//!    take the tallest single-row cell; a spanning cell is settled once its
//!    last row is known and any deficit goes to that last row.
//! 4. **Placement.** Rows are placed in groups that no rowspan crosses. A
//!    group that doesn't fit moves to the next column or page as a whole,
//!    and header rows repeat at the top of every continuation.
//!
//! Rows never split.

use std::ops::Range;

use log::{debug, warn};

use super::paginate::Fit;
use super::tree::{BlockId, BlockKind, LayoutItem, LayoutRegion, Rect};
use super::{FrameSpec, Pass};
use crate::error::LayoutError;
use crate::model::{ColumnWidth, ContentId, NodeKind};
use crate::style::{StyleSnapshot, VerticalAlign};

const LOG_TARGET: &str = "quire::table";

// ── Occupancy grid ─────────────────────────────────────────────

/// Index of a placed cell, in placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridCell {
    #[default]
    Empty,
    Origin {
        cell: CellId,
        col_span: usize,
        row_span: usize,
    },
    /// Covered by the span of another cell.
    Continuation(CellId),
}

/// Where a cell ended up and the spans it kept after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedCell {
    pub row: usize,
    pub col: usize,
    pub col_span: usize,
    pub row_span: usize,
}

impl PlacedCell {
    pub fn end_row(&self) -> usize {
        self.row + self.row_span
    }

    pub fn end_col(&self) -> usize {
        self.col + self.col_span
    }
}

/// Spans a cell asks for. Zero is read as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRequest {
    pub col_span: u32,
    pub row_span: u32,
}

impl SpanRequest {
    pub fn new(col_span: u32, row_span: u32) -> Self {
        Self { col_span, row_span }
    }
}

/// A span that had to be clamped or a cell that had to be dropped.
#[derive(Debug)]
pub struct SpanProblem {
    pub row: usize,
    /// Position of the cell among its row's cells.
    pub cell: usize,
    pub error: LayoutError,
}

#[derive(Debug)]
pub struct GridBuild {
    pub grid: OccupancyGrid,
    /// For each row, the cell each request became; `None` if dropped.
    pub assignments: Vec<Vec<Option<CellId>>>,
    pub problems: Vec<SpanProblem>,
}

#[derive(Debug, Clone, Default)]
pub struct OccupancyGrid {
    rows: usize,
    columns: usize,
    /// Row-major.
    cells: Vec<GridCell>,
    placed: Vec<PlacedCell>,
}

impl OccupancyGrid {
    /// Stamp every requested cell into a new grid. With `columns` set,
    /// spans are clamped to that many columns and cells with no column left
    /// are dropped; otherwise the grid grows to the widest row.
    pub fn build(rows: &[Vec<SpanRequest>], columns: Option<usize>) -> GridBuild {
        let row_count = rows.len();
        let mut stamped: Vec<Vec<GridCell>> = vec![Vec::new(); row_count];
        let mut placed = Vec::new();
        let mut assignments = Vec::with_capacity(row_count);
        let mut problems = Vec::new();

        let is_free = |grid: &Vec<Vec<GridCell>>, row: usize, col: usize| {
            grid[row].get(col).map_or(true, |c| *c == GridCell::Empty)
        };

        for (r, requests) in rows.iter().enumerate() {
            let mut row_assignments = Vec::with_capacity(requests.len());
            let mut col = 0;
            for (i, request) in requests.iter().enumerate() {
                while !is_free(&stamped, r, col) {
                    col += 1;
                }
                if columns.is_some_and(|limit| col >= limit) {
                    problems.push(SpanProblem {
                        row: r,
                        cell: i,
                        error: LayoutError::InvalidSpan(format!(
                            "cell {i} of row {r} has no column left; dropped"
                        )),
                    });
                    row_assignments.push(None);
                    continue;
                }

                let mut col_span = request.col_span.max(1) as usize;
                if let Some(limit) = columns {
                    if col + col_span > limit {
                        problems.push(SpanProblem {
                            row: r,
                            cell: i,
                            error: LayoutError::InvalidSpan(format!(
                                "colspan {col_span} at column {col} exceeds {limit} columns"
                            )),
                        });
                        col_span = limit - col;
                    }
                }
                let free = (col..col + col_span)
                    .take_while(|&c| is_free(&stamped, r, c))
                    .count();
                if free < col_span {
                    problems.push(SpanProblem {
                        row: r,
                        cell: i,
                        error: LayoutError::InvalidSpan(format!(
                            "colspan {col_span} at column {col} runs into a spanning cell"
                        )),
                    });
                    col_span = free;
                }

                let mut row_span = request.row_span.max(1) as usize;
                if r + row_span > row_count {
                    problems.push(SpanProblem {
                        row: r,
                        cell: i,
                        error: LayoutError::InvalidSpan(format!(
                            "rowspan {row_span} at row {r} exceeds the {} remaining rows",
                            row_count - r
                        )),
                    });
                    row_span = row_count - r;
                }
                let mut fit = 1;
                while fit < row_span && (col..col + col_span).all(|c| is_free(&stamped, r + fit, c)) {
                    fit += 1;
                }
                if fit < row_span {
                    problems.push(SpanProblem {
                        row: r,
                        cell: i,
                        error: LayoutError::InvalidSpan(format!(
                            "rowspan {row_span} at row {r} runs into a spanning cell"
                        )),
                    });
                    row_span = fit;
                }

                let id = CellId(placed.len());
                placed.push(PlacedCell {
                    row: r,
                    col,
                    col_span,
                    row_span,
                });
                for (rr, row) in stamped.iter_mut().enumerate().skip(r).take(row_span) {
                    if row.len() < col + col_span {
                        row.resize(col + col_span, GridCell::Empty);
                    }
                    for (cc, slot) in row.iter_mut().enumerate().skip(col).take(col_span) {
                        *slot = if rr == r && cc == col {
                            GridCell::Origin {
                                cell: id,
                                col_span,
                                row_span,
                            }
                        } else {
                            GridCell::Continuation(id)
                        };
                    }
                }
                row_assignments.push(Some(id));
                col += col_span;
            }
            assignments.push(row_assignments);
        }

        let width = columns.unwrap_or_else(|| stamped.iter().map(Vec::len).max().unwrap_or(0));
        let mut cells = Vec::with_capacity(row_count * width);
        for mut row in stamped {
            row.resize(width, GridCell::Empty);
            cells.extend(row);
        }

        GridBuild {
            grid: OccupancyGrid {
                rows: row_count,
                columns: width,
                cells,
                placed,
            },
            assignments,
            problems,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, col: usize) -> GridCell {
        if row >= self.rows || col >= self.columns {
            return GridCell::Empty;
        }
        self.cells[row * self.columns + col]
    }

    pub fn placed(&self) -> &[PlacedCell] {
        &self.placed
    }

    pub fn cell(&self, id: CellId) -> Option<&PlacedCell> {
        self.placed.get(id.0)
    }

    /// Cells whose origin is in `row`, left to right.
    pub fn origins_in_row(&self, row: usize) -> impl Iterator<Item = CellId> + '_ {
        (0..self.columns).filter_map(move |col| match self.get(row, col) {
            GridCell::Origin { cell, .. } => Some(cell),
            _ => None,
        })
    }

    /// Check that every grid position agrees with the cell that owns it.
    pub fn verify(&self) -> Result<(), LayoutError> {
        for row in 0..self.rows {
            for col in 0..self.columns {
                let owner = match self.get(row, col) {
                    GridCell::Empty => continue,
                    GridCell::Origin {
                        cell,
                        col_span,
                        row_span,
                    } => {
                        let placed = self.cell(cell).ok_or_else(|| orphan(row, col))?;
                        if placed.row != row
                            || placed.col != col
                            || placed.col_span != col_span
                            || placed.row_span != row_span
                        {
                            return Err(LayoutError::StructuralInconsistency(format!(
                                "origin at ({row}, {col}) disagrees with cell {}",
                                cell.0
                            )));
                        }
                        continue;
                    }
                    GridCell::Continuation(cell) => cell,
                };
                let placed = self.cell(owner).ok_or_else(|| orphan(row, col))?;
                let covered = (placed.row..placed.end_row()).contains(&row)
                    && (placed.col..placed.end_col()).contains(&col);
                if !covered {
                    return Err(orphan(row, col));
                }
            }
        }
        for (i, placed) in self.placed.iter().enumerate() {
            for row in placed.row..placed.end_row() {
                for col in placed.col..placed.end_col() {
                    let owner = match self.get(row, col) {
                        GridCell::Origin { cell, .. } | GridCell::Continuation(cell) => Some(cell),
                        GridCell::Empty => None,
                    };
                    if owner != Some(CellId(i)) {
                        return Err(LayoutError::StructuralInconsistency(format!(
                            "cell {i} does not own ({row}, {col}) in its footprint"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Contiguous row ranges that no rowspan crosses. Each range has to be
    /// placed as a unit.
    pub fn row_groups(&self) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        let mut start = 0;
        while start < self.rows {
            let mut end = start + 1;
            let mut row = start;
            while row < end {
                for cell in self.origins_in_row(row) {
                    if let Some(placed) = self.cell(cell) {
                        end = end.max(placed.end_row());
                    }
                }
                row += 1;
            }
            groups.push(start..end);
            start = end;
        }
        groups
    }

    /// Row heights from each cell's required height (by [`CellId`]) and a
    /// per-row minimum. Spanning cells are settled in order of their last
    /// row; a deficit is added to that last row.
    pub fn row_heights(&self, cell_heights: &[f64], minimums: &[f64]) -> Vec<f64> {
        let mut heights: Vec<f64> = (0..self.rows)
            .map(|r| minimums.get(r).copied().unwrap_or(0.0))
            .collect();
        let need = |i: usize| cell_heights.get(i).copied().unwrap_or(0.0);

        for (i, cell) in self.placed.iter().enumerate() {
            if cell.row_span == 1 {
                heights[cell.row] = heights[cell.row].max(need(i));
            }
        }

        let mut spanning: Vec<usize> = (0..self.placed.len())
            .filter(|&i| self.placed[i].row_span > 1)
            .collect();
        spanning.sort_by_key(|&i| self.placed[i].end_row());
        for i in spanning {
            let cell = &self.placed[i];
            let sum: f64 = heights[cell.row..cell.end_row()].iter().sum();
            if need(i) > sum {
                heights[cell.end_row() - 1] += need(i) - sum;
            }
        }
        heights
    }
}

fn orphan(row: usize, col: usize) -> LayoutError {
    LayoutError::StructuralInconsistency(format!(
        "continuation at ({row}, {col}) has no origin cell"
    ))
}

// ── Column widths ──────────────────────────────────────────────

/// A cell with an explicit width: first column, span, border-box width
/// plus margins.
pub type ColumnPin = (usize, usize, f64);

/// Resolve column widths. Fixed columns take their width and fractions
/// their share of `available`; pinned auto columns take what their cells
/// need and the other auto columns split the rest.
pub fn resolve_column_widths(defs: &[ColumnWidth], available: f64, pins: &[ColumnPin]) -> Vec<f64> {
    let mut widths = Vec::with_capacity(defs.len());
    let mut remaining = available;
    let mut auto: Vec<Option<f64>> = vec![None; defs.len()];
    let mut auto_columns = Vec::new();

    for (i, def) in defs.iter().enumerate() {
        match def {
            ColumnWidth::Fixed(w) => {
                widths.push(*w);
                remaining -= w;
            }
            ColumnWidth::Fraction(f) => {
                let w = available * f;
                widths.push(w);
                remaining -= w;
            }
            ColumnWidth::Auto => {
                widths.push(0.0);
                auto_columns.push(i);
            }
        }
    }

    let mut pins: Vec<ColumnPin> = pins
        .iter()
        .copied()
        .filter(|&(col, span, _)| span > 0 && col + span <= defs.len())
        .collect();
    pins.sort_by_key(|&(_, span, _)| span);
    for (col, span, width) in pins {
        let range = col..col + span;
        let open: Vec<usize> = range
            .clone()
            .filter(|&c| matches!(defs[c], ColumnWidth::Auto) && auto[c].is_none())
            .collect();
        if span == 1 {
            if matches!(defs[col], ColumnWidth::Auto) {
                auto[col] = Some(auto[col].unwrap_or(0.0).max(width));
            }
            continue;
        }
        if open.is_empty() {
            continue;
        }
        let known: f64 = range
            .filter(|c| !open.contains(c))
            .map(|c| auto[c].unwrap_or(widths[c]))
            .sum();
        let share = ((width - known) / open.len() as f64).max(0.0);
        for c in open {
            auto[c] = Some(share);
        }
    }

    let mut unpinned = 0;
    for &c in &auto_columns {
        match auto[c] {
            Some(w) => {
                widths[c] = w;
                remaining -= w;
            }
            None => unpinned += 1,
        }
    }
    if unpinned > 0 {
        let share = remaining.max(0.0) / unpinned as f64;
        for &c in &auto_columns {
            if auto[c].is_none() {
                widths[c] = share;
            }
        }
    }
    widths
}

// ── Table pass ─────────────────────────────────────────────────

struct RowEntry {
    content: ContentId,
    header: bool,
    /// Height floor from the row's own height or min height.
    minimum: f64,
    cells: Vec<(ContentId, StyleSnapshot)>,
}

struct CellEntry {
    content: ContentId,
    style: StyleSnapshot,
    placed: PlacedCell,
}

/// Everything the placement step needs once sizes are known.
struct TableLayout {
    rows: Vec<RowEntry>,
    cells: Vec<CellEntry>,
    grid: OccupancyGrid,
    /// Column offsets from the table's content edge.
    col_x: Vec<f64>,
    col_widths: Vec<f64>,
    heights: Vec<f64>,
    blocks: Vec<BlockId>,
}

impl TableLayout {
    fn span_width(&self, cell: &PlacedCell) -> f64 {
        self.col_widths[cell.col..cell.end_col()].iter().sum()
    }

    fn group_height(&self, rows: &Range<usize>) -> f64 {
        self.heights[rows.clone()].iter().sum()
    }

    fn cells_in_rows(&self, rows: Range<usize>) -> Vec<CellId> {
        rows.flat_map(|r| self.grid.origins_in_row(r).collect::<Vec<_>>())
            .collect()
    }
}

impl Pass<'_> {
    pub(super) fn layout_table(&mut self, id: ContentId, style: StyleSnapshot) -> Result<(), LayoutError> {
        let y = self.top()?.y;
        let cleared = self.floats.clear_y(style.clear, y);
        if cleared > y {
            self.set_y(cleared);
        }
        self.floats.retire_passed(self.top()?.y);

        let width = self.block_width(&style)?;
        let style = StyleSnapshot {
            column_count: 1,
            ..style
        };
        self.open_frame(FrameSpec {
            content: Some(id),
            style: style.clone(),
            kind: BlockKind::Table,
            width,
            height: None,
        })?;
        let frame = self.frames.len() - 1;

        let mut table = match self.size_table(id, &style)? {
            Some(table) => table,
            None => {
                self.close_frame()?;
                return Ok(());
            }
        };
        self.place_table(frame, &mut table)?;

        self.close_frame()?;
        self.mark_placed();
        Ok(())
    }

    /// Build the grid, resolve columns and rows and lay out every cell.
    fn size_table(&mut self, id: ContentId, style: &StyleSnapshot) -> Result<Option<TableLayout>, LayoutError> {
        let inner_width = self.top()?.column_width();
        let rows = self.table_rows(id, style);
        if rows.is_empty() {
            debug!(target: LOG_TARGET, "table {id:?} has no rows");
            return Ok(None);
        }

        let defs: Vec<ColumnWidth> = match &self.content.node(id).kind {
            NodeKind::Table { columns } => columns.iter().map(|c| c.width.clone()).collect(),
            _ => Vec::new(),
        };
        let requests: Vec<Vec<SpanRequest>> = rows
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|(cell, _)| match self.content.node(*cell).kind {
                        NodeKind::TableCell { col_span, row_span } => SpanRequest::new(col_span, row_span),
                        _ => SpanRequest::new(1, 1),
                    })
                    .collect()
            })
            .collect();
        let limit = (!defs.is_empty()).then_some(defs.len());
        let GridBuild {
            grid,
            assignments,
            problems,
        } = OccupancyGrid::build(&requests, limit);
        for problem in problems {
            let content = rows[problem.row].cells.get(problem.cell).map(|(c, _)| *c);
            self.diagnose(problem.error, content);
        }
        grid.verify()?;

        let mut slots: Vec<Option<CellEntry>> = (0..grid.placed().len()).map(|_| None).collect();
        for (row, assigned) in rows.iter().zip(&assignments) {
            for ((content, cell_style), cell) in row.cells.iter().zip(assigned) {
                if let Some(cell) = cell {
                    let placed = *grid.cell(*cell).ok_or_else(|| {
                        LayoutError::StructuralInconsistency(format!("cell {} was never placed", cell.0))
                    })?;
                    slots[cell.0] = Some(CellEntry {
                        content: *content,
                        style: cell_style.clone(),
                        placed,
                    });
                }
            }
        }
        let cells = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    LayoutError::StructuralInconsistency(format!("cell {i} has no content"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let defs = if defs.is_empty() {
            vec![ColumnWidth::Auto; grid.columns()]
        } else {
            defs
        };
        let pins: Vec<ColumnPin> = cells
            .iter()
            .filter_map(|c| {
                c.style
                    .width
                    .map(|w| (c.placed.col, c.placed.col_span, w + c.style.margin.horizontal()))
            })
            .collect();
        let col_widths = resolve_column_widths(&defs, inner_width, &pins);
        let col_x: Vec<f64> = col_widths
            .iter()
            .scan(0.0, |x, w| {
                let start = *x;
                *x += w;
                Some(start)
            })
            .collect();

        let mut table = TableLayout {
            rows,
            cells,
            grid,
            col_x,
            col_widths,
            heights: Vec::new(),
            blocks: Vec::new(),
        };
        let mut blocks = Vec::with_capacity(table.cells.len());
        for i in 0..table.cells.len() {
            blocks.push(self.layout_cell(&table, CellId(i))?);
        }
        let needs: Vec<f64> = blocks
            .iter()
            .map(|b| self.tree.block(*b).total_bounds.height)
            .collect();
        let minimums: Vec<f64> = table.rows.iter().map(|r| r.minimum).collect();
        table.heights = table.grid.row_heights(&needs, &minimums);
        table.blocks = blocks;
        debug!(
            target: LOG_TARGET,
            "table {id:?}: {} rows, {} columns, {:.1}pt tall",
            table.grid.rows(),
            table.grid.columns(),
            table.heights.iter().sum::<f64>()
        );
        Ok(Some(table))
    }

    /// Resolve the styles of a table's rows and cells. Anything that is not
    /// a row, or not a cell inside one, is skipped.
    fn table_rows(&mut self, id: ContentId, style: &StyleSnapshot) -> Vec<RowEntry> {
        let mut rows = Vec::new();
        for row in self.content.children(id).to_vec() {
            let header = match self.content.node(row).kind {
                NodeKind::TableRow { is_header } => is_header,
                _ => {
                    debug!(target: LOG_TARGET, "{row:?} is not a table row; skipped");
                    continue;
                }
            };
            let row_style = self.resolve_style(row, style);
            let mut cells = Vec::new();
            for cell in self.content.children(row).to_vec() {
                if !matches!(self.content.node(cell).kind, NodeKind::TableCell { .. }) {
                    debug!(target: LOG_TARGET, "{cell:?} is not a table cell; skipped");
                    continue;
                }
                let cell_style = self.resolve_style(cell, &row_style);
                cells.push((cell, cell_style));
            }
            rows.push(RowEntry {
                content: row,
                header,
                minimum: row_style.height.or(row_style.min_height).unwrap_or(0.0),
                cells,
            });
        }
        rows
    }

    fn layout_cell(&mut self, table: &TableLayout, cell: CellId) -> Result<BlockId, LayoutError> {
        let entry = &table.cells[cell.0];
        let width = (table.span_width(&entry.placed) - entry.style.margin.horizontal()).max(0.0);
        self.layout_isolated(entry.content, entry.style.clone(), width, BlockKind::TableCell)
    }

    /// Place every row group, moving whole groups to the next column or
    /// page and repeating header rows at the top of each continuation.
    fn place_table(&mut self, frame: usize, table: &mut TableLayout) -> Result<(), LayoutError> {
        let leading_headers = table.rows.iter().take_while(|r| r.header).count();
        let groups = table.grid.row_groups();
        let header_end = groups
            .iter()
            .take_while(|g| g.end <= leading_headers)
            .last()
            .map_or(0, |g| g.end);
        if header_end < leading_headers {
            debug!(target: LOG_TARGET, "rowspan crosses the header rows; repeating {header_end} of them");
        }
        let header = 0..header_end;
        let header_height = table.group_height(&header);
        let body: Vec<Range<usize>> = groups.into_iter().filter(|g| g.start >= header_end).collect();

        let mut header_fragment = None;
        if header_end > 0 {
            let first = body.first().map_or(0.0, |g| table.group_height(g));
            if self.make_room(header_height + first)? == Fit::Truncate {
                self.exclude_cells(table, 0..table.grid.rows());
                return Ok(());
            }
            self.place_rows(table, header.clone())?;
            header_fragment = Some(self.frames[frame].fragment);
        }

        for group in body {
            let height = table.group_height(&group);
            if self.is_truncated() || self.make_room(height)? == Fit::Truncate {
                self.exclude_cells(table, group);
                continue;
            }
            let fragment = self.frames[frame].fragment;
            if header_end > 0 && header_fragment != Some(fragment) {
                debug!(target: LOG_TARGET, "repeating {header_end} header rows in fragment {fragment}");
                for cell in table.cells_in_rows(header.clone()) {
                    let block = self.layout_cell(table, cell)?;
                    table.blocks[cell.0] = block;
                }
                if self.make_room(header_height + height)? == Fit::Truncate {
                    self.exclude_cells(table, group);
                    continue;
                }
                self.place_rows(table, header.clone())?;
                header_fragment = Some(fragment);
            }
            if group.len() > 1 {
                debug!(target: LOG_TARGET, "rows {group:?} placed together");
            }
            self.place_rows(table, group)?;
        }
        Ok(())
    }

    fn exclude_cells(&mut self, table: &TableLayout, rows: Range<usize>) {
        let cells = table.cells_in_rows(rows.clone());
        warn!(
            target: LOG_TARGET,
            "rows {rows:?} dropped: {} cells excluded from output",
            cells.len()
        );
        for cell in cells {
            self.tree.block_mut(table.blocks[cell.0]).excluded_from_output = true;
        }
    }

    /// Place rows at the cursor. Each row gets a block holding the cells
    /// that start in it; a cell spanning rows is stretched over all of them.
    fn place_rows(&mut self, table: &TableLayout, rows: Range<usize>) -> Result<(), LayoutError> {
        let width: f64 = table.col_widths.iter().sum();
        for r in rows {
            let (x, y) = {
                let frame = self.top()?;
                (frame.column_x(), frame.y)
            };
            let height = table.heights[r];
            let bounds = Rect::new(x, y, width, height);
            let row = self.tree.push_block(Some(table.rows[r].content), BlockKind::TableRow);
            let mut region = LayoutRegion::new(0, bounds);

            for cell in table.grid.origins_in_row(r).collect::<Vec<_>>() {
                let entry = &table.cells[cell.0];
                let block = table.blocks[cell.0];
                let slot = Rect::new(
                    x + table.col_x[entry.placed.col],
                    y,
                    table.span_width(&entry.placed),
                    table.heights[r..entry.placed.end_row()].iter().sum(),
                );
                self.fit_cell(block, entry.style.vertical_align, slot);
                region.items.push(LayoutItem::Block { block });
            }

            let b = self.tree.block_mut(row);
            b.regions.push(region);
            b.set_content_bounds(bounds);
            self.push_item(LayoutItem::Block { block: row })?;
            self.set_y(y + height);
            self.mark_placed();
        }
        Ok(())
    }

    /// Move a cell into its slot and stretch it to the slot's height,
    /// shifting its content for vertical alignment.
    fn fit_cell(&mut self, block: BlockId, align: VerticalAlign, slot: Rect) {
        let total = self.tree.block(block).total_bounds;
        self.tree
            .translate_block(block, slot.x - total.x, slot.y - total.y);
        let extra = slot.height - total.height;
        if extra <= 0.0 {
            return;
        }
        let shift = match align {
            VerticalAlign::Middle => extra / 2.0,
            VerticalAlign::Bottom => extra,
            VerticalAlign::Top | VerticalAlign::Baseline => 0.0,
        };
        self.tree.translate_contents(block, 0.0, shift);
        let b = self.tree.block_mut(block);
        let mut content = b.content_bounds;
        content.height += extra;
        for region in &mut b.regions {
            region.bounds.y = content.y;
            region.bounds.height = content.height;
        }
        b.set_content_bounds(content);
    }

    /// Unwrapped width of a table's content: the widest row, or the sum of
    /// its fixed columns when that is larger.
    pub(super) fn table_max_content_width(&self, id: ContentId, style: &StyleSnapshot) -> f64 {
        let fixed: f64 = match &self.content.node(id).kind {
            NodeKind::Table { columns } => columns
                .iter()
                .map(|c| match c.width {
                    ColumnWidth::Fixed(w) => w,
                    _ => 0.0,
                })
                .sum(),
            _ => 0.0,
        };
        let widest = self
            .content
            .children(id)
            .iter()
            .filter(|&&row| matches!(self.content.node(row).kind, NodeKind::TableRow { .. }))
            .map(|&row| {
                let row_style = self.quiet_style(row, style, None);
                self.content
                    .children(row)
                    .iter()
                    .map(|&cell| {
                        let cell_style = self.quiet_style(cell, &row_style, None);
                        self.max_content_width(cell, &cell_style)
                    })
                    .sum::<f64>()
            })
            .fold(0.0, f64::max);
        widest.max(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(rows: &[&[(u32, u32)]]) -> Vec<Vec<SpanRequest>> {
        rows.iter()
            .map(|r| r.iter().map(|&(c, s)| SpanRequest::new(c, s)).collect())
            .collect()
    }

    #[test]
    fn spans_stamp_continuations() {
        let build = OccupancyGrid::build(&spans(&[&[(2, 2), (1, 1)], &[(1, 1)]]), None);
        let grid = &build.grid;
        assert!(build.problems.is_empty());
        assert_eq!(grid.columns(), 3);
        assert_eq!(
            grid.get(0, 0),
            GridCell::Origin {
                cell: CellId(0),
                col_span: 2,
                row_span: 2
            }
        );
        assert_eq!(grid.get(1, 1), GridCell::Continuation(CellId(0)));
        // The only cell of row 1 skips the covered columns.
        assert_eq!(grid.cell(CellId(2)).map(|c| c.col), Some(2));
        grid.verify().unwrap();
    }

    #[test]
    fn rowspan_past_the_last_row_is_clamped() {
        let build = OccupancyGrid::build(&spans(&[&[(1, 5)], &[(1, 1)]]), None);
        assert_eq!(build.problems.len(), 1);
        assert!(matches!(build.problems[0].error, LayoutError::InvalidSpan(_)));
        assert_eq!(build.grid.cell(CellId(0)).map(|c| c.row_span), Some(2));
    }

    #[test]
    fn colspan_is_clamped_to_defined_columns() {
        let build = OccupancyGrid::build(&spans(&[&[(1, 1), (3, 1)], &[(1, 1), (1, 1), (1, 1)]]), Some(2));
        assert_eq!(build.grid.cell(CellId(1)).map(|c| c.col_span), Some(1));
        // Third cell of the second row has no column left.
        assert_eq!(build.assignments[1][2], None);
        assert_eq!(build.problems.len(), 2);
    }

    #[test]
    fn zero_span_counts_as_one() {
        let build = OccupancyGrid::build(&spans(&[&[(0, 0), (1, 1)]]), None);
        assert!(build.problems.is_empty());
        assert_eq!(build.grid.columns(), 2);
    }

    #[test]
    fn verify_rejects_orphan_continuations() {
        let mut grid = OccupancyGrid::build(&spans(&[&[(1, 1), (1, 1)]]), None).grid;
        grid.cells[1] = GridCell::Continuation(CellId(7));
        assert!(matches!(
            grid.verify(),
            Err(LayoutError::StructuralInconsistency(_))
        ));
    }

    #[test]
    fn rowspan_deficit_goes_to_last_row() {
        let grid = OccupancyGrid::build(&spans(&[&[(1, 3), (1, 1)], &[(1, 1)], &[(1, 1)]]), None).grid;
        let heights = grid.row_heights(&[180.0, 50.0, 50.0, 50.0], &[]);
        assert_eq!(heights, vec![50.0, 50.0, 80.0]);
        assert_eq!(heights.iter().sum::<f64>(), 180.0);
    }

    #[test]
    fn rowspan_without_deficit_leaves_rows_alone() {
        let grid = OccupancyGrid::build(&spans(&[&[(1, 2), (1, 1)], &[(1, 1)]]), None).grid;
        let heights = grid.row_heights(&[30.0, 40.0, 25.0], &[0.0, 10.0]);
        assert_eq!(heights, vec![40.0, 25.0]);
    }

    #[test]
    fn row_groups_follow_rowspans() {
        let grid = OccupancyGrid::build(
            &spans(&[&[(1, 1)], &[(1, 2), (1, 1)], &[(1, 2)], &[(1, 1)], &[(1, 1)]]),
            None,
        )
        .grid;
        assert_eq!(grid.row_groups(), vec![0..1, 1..4, 4..5]);
    }

    #[test]
    fn fixed_and_fraction_columns_come_first() {
        let widths = resolve_column_widths(
            &[ColumnWidth::Fixed(100.0), ColumnWidth::Fraction(0.25), ColumnWidth::Auto, ColumnWidth::Auto],
            400.0,
            &[],
        );
        assert_eq!(widths, vec![100.0, 100.0, 100.0, 100.0]);
    }

    #[test]
    fn pinned_auto_columns_keep_their_width() {
        let defs = vec![ColumnWidth::Auto; 3];
        let widths = resolve_column_widths(&defs, 300.0, &[(0, 1, 60.0)]);
        assert_eq!(widths, vec![60.0, 120.0, 120.0]);
    }

    #[test]
    fn spanning_pin_divides_over_its_columns() {
        let defs = vec![ColumnWidth::Auto, ColumnWidth::Auto, ColumnWidth::Auto];
        let widths = resolve_column_widths(&defs, 300.0, &[(0, 2, 200.0)]);
        assert_eq!(widths, vec![100.0, 100.0, 100.0]);

        let widths = resolve_column_widths(&defs, 300.0, &[(0, 1, 50.0), (0, 2, 200.0)]);
        assert_eq!(widths, vec![50.0, 150.0, 100.0]);
    }
}
