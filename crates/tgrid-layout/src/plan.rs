#![forbid(unsafe_code)]

//! Pure grid geometry.
//!
//! [`plan`] resolves column count, dynamic cell size, row count and the
//! minimum container size for `count` cells in a container. It mutates
//! nothing; [`ReflowLayout`](crate::ReflowLayout) applies the result.
//!
//! # Algorithm
//!
//! 1. Clamp the minimum cell width to the available width (container width
//!    minus left/right padding) on narrow viewports.
//! 2. Estimate rows with the *minimum* width. If the content would be taller
//!    than the viewport, reserve the scrollbar allowance before columns are
//!    final, since the reservation can drop a column.
//! 3. `columns = max(1, floor((available + gap) / (min_width + gap)))`.
//! 4. Spread leftover width over the columns so they exactly fill the
//!    available width.
//! 5. Rows and minimum container size follow from the column count.

use tgrid_core::geometry::{Point, Rect, Sides, Size};

/// Sizing rules for the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflowConfig {
    /// Minimum cell size. Individual cells may raise it.
    pub min_cell: Size,
    /// Padding between the container edge and the outermost cells.
    pub padding: Sides,
    /// Horizontal gap between adjacent columns.
    pub gap_x: f32,
    /// Vertical gap between adjacent rows.
    pub gap_y: f32,
    /// Width reserved for a vertical scrollbar when content overflows.
    pub scrollbar_width: f32,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            min_cell: Size::new(300.0, 120.0),
            padding: Sides::all(10.0),
            gap_x: 10.0,
            gap_y: 10.0,
            scrollbar_width: 16.0,
        }
    }
}

/// Why a reflow left the existing geometry untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Container width is zero, negative or not finite.
    InvalidWidth,
    /// Padding consumes the whole container width.
    NoAvailableWidth,
}

/// Resolved geometry for one (container, cell set) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Container width used for the computation.
    pub container_width: f32,
    /// Visible viewport height used for the scrollbar estimate.
    pub viewport_height: f32,
    /// Number of visible cells placed.
    pub item_count: usize,
    pub columns: usize,
    pub rows: usize,
    /// Dynamic cell size shared by every placed cell.
    pub cell_size: Size,
    /// Minimum cell width after narrow-viewport clamping.
    pub min_cell_width: f32,
    /// Space the grid needs from its parent.
    pub min_size: Size,
    /// Whether the scrollbar allowance was subtracted from the width.
    pub scrollbar_reserved: bool,
    padding: Sides,
    gap_x: f32,
    gap_y: f32,
    scrollbar_width: f32,
}

impl GridGeometry {
    /// Bounding rectangle of the cell in visible slot `index`.
    pub fn cell_rect(&self, index: usize) -> Rect {
        let columns = self.columns.max(1);
        let column = index % columns;
        let row = index / columns;
        let x = self.padding.left + column as f32 * (self.cell_size.width + self.gap_x);
        let y = self.padding.top + row as f32 * (self.cell_size.height + self.gap_y);
        Rect::from_origin_size(Point::new(x, y), self.cell_size)
    }

    /// All horizontal space not covered by cells: outer padding, column
    /// gaps and the scrollbar allowance when reserved.
    pub fn total_horizontal_padding(&self) -> f32 {
        let gaps = self.columns.saturating_sub(1) as f32 * self.gap_x;
        let scrollbar = if self.scrollbar_reserved {
            self.scrollbar_width
        } else {
            0.0
        };
        self.padding.horizontal_sum() + gaps + scrollbar
    }
}

/// Number of columns that fit `available` width.
///
/// `max(1, floor((available + gap) / (min_width + gap)))`. Degenerate
/// inputs (non-positive minimum width, non-finite values) resolve to one
/// column so callers never divide by zero.
pub fn column_count(available: f32, min_width: f32, gap: f32) -> usize {
    let gap = f64::from(gap.max(0.0));
    let min_width = f64::from(min_width);
    let available = f64::from(available.max(0.0));
    if !(min_width > 0.0) || !available.is_finite() || !gap.is_finite() {
        return 1;
    }
    let raw = ((available + gap) / (min_width + gap)).floor();
    if raw.is_finite() && raw >= 1.0 {
        raw as usize
    } else {
        1
    }
}

#[inline]
fn rows_for(count: usize, columns: usize) -> usize {
    count.div_ceil(columns.max(1))
}

#[inline]
fn stacked_height(rows: usize, cell_height: f32, gap: f32) -> f32 {
    if rows == 0 {
        return 0.0;
    }
    rows as f32 * cell_height + (rows - 1) as f32 * gap
}

/// Compute the geometry for `count` visible cells.
///
/// `content_min` is the largest minimum size requested by the cells
/// themselves; it is combined with `config.min_cell`.
pub fn plan(
    config: &ReflowConfig,
    container: Size,
    content_min: Size,
    count: usize,
) -> Result<GridGeometry, SkipReason> {
    let width = container.width;
    if !width.is_finite() || width <= 0.0 {
        return Err(SkipReason::InvalidWidth);
    }
    let padding = config.padding;
    let mut available = width - padding.horizontal_sum();
    if !(available > 0.0) {
        return Err(SkipReason::NoAvailableWidth);
    }

    let gap_x = config.gap_x.max(0.0);
    let gap_y = config.gap_y.max(0.0);
    let wanted = config.min_cell.max(content_min);
    let cell_height = wanted.height.max(0.0);
    let mut min_width = if wanted.width > 0.0 { wanted.width } else { 1.0 };
    min_width = min_width.min(available);

    let viewport_height = if container.height.is_finite() {
        container.height
    } else {
        0.0
    };

    let mut geometry = GridGeometry {
        container_width: width,
        viewport_height,
        item_count: count,
        columns: 1,
        rows: 0,
        cell_size: Size::new(available, cell_height),
        min_cell_width: min_width,
        min_size: Size::ZERO,
        scrollbar_reserved: false,
        padding,
        gap_x,
        gap_y,
        scrollbar_width: config.scrollbar_width.max(0.0),
    };
    if count == 0 {
        return Ok(geometry);
    }

    let estimated_columns = column_count(available, min_width, gap_x);
    let estimated_height = padding.vertical_sum()
        + stacked_height(rows_for(count, estimated_columns), cell_height, gap_y);
    let scrollbar = geometry.scrollbar_width;
    if viewport_height > 0.0
        && estimated_height > viewport_height
        && scrollbar > 0.0
        && available - scrollbar > 0.0
    {
        available -= scrollbar;
        min_width = min_width.min(available);
        geometry.scrollbar_reserved = true;
    }

    let columns = column_count(available, min_width, gap_x);
    let cell_width = (available - (columns - 1) as f32 * gap_x) / columns as f32;
    let rows = rows_for(count, columns);

    geometry.columns = columns;
    geometry.rows = rows;
    geometry.cell_size = Size::new(cell_width, cell_height);
    geometry.min_cell_width = min_width;
    let reserved = if geometry.scrollbar_reserved {
        scrollbar
    } else {
        0.0
    };
    geometry.min_size = Size::new(
        padding.horizontal_sum() + min_width + reserved,
        padding.vertical_sum() + stacked_height(rows, cell_height, gap_y),
    );
    Ok(geometry)
}
