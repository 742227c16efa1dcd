#![forbid(unsafe_code)]

//! Stateful reflow: caching, placement and drop-zone publication.
//!
//! # Cache
//!
//! The last computation is keyed by [`GeometryKey`]: container width,
//! viewport height, visible count and a fingerprint of the visible cells
//! (order and minimum sizes). While the key is unchanged, [`ReflowLayout::layout`]
//! returns immediately; this absorbs reflow storms during window resizes.
//! [`ReflowLayout::invalidate`] forces the next call to recompute.
//!
//! # Failure behavior
//!
//! A container with no usable width leaves every cell and the published
//! frame untouched: the grid keeps its last good geometry.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;
use tgrid_core::geometry::{Point, Size};
use tgrid_core::snapshot::SnapshotStore;

use crate::cell::{CellDescriptor, CellId};
use crate::plan::{GridGeometry, ReflowConfig, SkipReason, plan};
use crate::zones::{DropZone, LayoutFrame, LayoutReader};

/// Inputs that determine a cached geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub width_bits: u32,
    pub height_bits: u32,
    pub item_count: usize,
    /// Fingerprint of visible cell ids and minimum sizes, in order.
    pub cells_hash: u64,
}

impl GeometryKey {
    pub fn new(container: Size, cells: &[CellDescriptor]) -> Self {
        let mut hasher = FxHasher::default();
        let mut item_count = 0usize;
        for cell in cells.iter().filter(|c| c.is_visible()) {
            item_count += 1;
            cell.id().hash(&mut hasher);
            cell.min_size().width.to_bits().hash(&mut hasher);
            cell.min_size().height.to_bits().hash(&mut hasher);
        }
        Self {
            width_bits: container.width.to_bits(),
            height_bits: container.height.to_bits(),
            item_count,
            cells_hash: hasher.finish(),
        }
    }
}

/// Result of a [`ReflowLayout::layout`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowOutcome {
    /// Inputs matched the cached geometry; nothing was touched.
    Cached,
    /// Geometry was recomputed; `changed` cells were moved or resized.
    Applied { changed: usize },
    /// Inputs were unusable; previous geometry retained.
    Skipped(SkipReason),
}

/// Counters for cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReflowStats {
    pub computations: u64,
    pub cache_hits: u64,
    pub skipped: u64,
}

impl ReflowStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.computations + self.cache_hits;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Grid layout engine for one container.
///
/// Owned by the layout (UI) path; the drag path reads through
/// [`ReflowLayout::reader`].
#[derive(Debug)]
pub struct ReflowLayout {
    config: ReflowConfig,
    frames: Arc<SnapshotStore<LayoutFrame>>,
    cached: Option<GeometryKey>,
    last_container: Option<Size>,
    stats: ReflowStats,
}

fn content_min(cells: &[CellDescriptor]) -> Size {
    cells
        .iter()
        .filter(|c| c.is_visible())
        .fold(Size::ZERO, |acc, c| acc.max(c.min_size()))
}

impl ReflowLayout {
    pub fn new(config: ReflowConfig) -> Self {
        Self {
            config,
            frames: Arc::new(SnapshotStore::default()),
            cached: None,
            last_container: None,
            stats: ReflowStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &ReflowConfig {
        &self.config
    }

    /// Replace the sizing rules. Marks the cache dirty.
    pub fn set_config(&mut self, config: ReflowConfig) {
        self.config = config;
        self.invalidate();
    }

    /// Force the next [`layout`](Self::layout) to recompute.
    #[inline]
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.cached.is_none()
    }

    #[inline]
    pub fn stats(&self) -> ReflowStats {
        self.stats
    }

    /// Read handle for hit testing from other threads.
    pub fn reader(&self) -> LayoutReader {
        LayoutReader::new(Arc::clone(&self.frames))
    }

    /// Geometry from the last successful computation.
    pub fn geometry(&self) -> Option<GridGeometry> {
        self.frames.peek().geometry
    }

    /// Owning cell of the drop zone under `point`.
    pub fn hit_test(&self, point: Point) -> Option<CellId> {
        self.frames.peek().hit_test(point)
    }

    /// Lay out the visible `cells` inside `container`.
    ///
    /// Visible cells are placed in slice order, left to right and top to
    /// bottom. Hidden cells keep their last geometry and get no drop zone.
    pub fn layout(&mut self, cells: &mut [CellDescriptor], container: Size) -> ReflowOutcome {
        let key = GeometryKey::new(container, cells);
        if self.cached == Some(key) {
            self.stats.cache_hits += 1;
            tracing::trace!(
                target: "tgrid.reflow",
                width = container.width,
                items = key.item_count,
                "reflow cache hit"
            );
            return ReflowOutcome::Cached;
        }

        let geometry = match plan(&self.config, container, content_min(cells), key.item_count) {
            Ok(geometry) => geometry,
            Err(reason) => {
                self.stats.skipped += 1;
                tracing::debug!(
                    target: "tgrid.reflow",
                    width = container.width,
                    reason = ?reason,
                    "reflow skipped, keeping previous geometry"
                );
                return ReflowOutcome::Skipped(reason);
            }
        };

        let mut zones = Vec::with_capacity(key.item_count);
        let mut changed = 0usize;
        for (slot, cell) in cells.iter_mut().filter(|c| c.is_visible()).enumerate() {
            let rect = geometry.cell_rect(slot);
            if cell.place(slot, rect) {
                changed += 1;
            }
            zones.push(DropZone {
                rect,
                cell: cell.id(),
            });
        }

        let generation = self.frames.peek().generation + 1;
        self.frames.store(LayoutFrame {
            geometry: Some(geometry),
            zones: Arc::from(zones),
            generation,
        });
        self.cached = Some(key);
        self.last_container = Some(container);
        self.stats.computations += 1;

        tracing::debug!(
            target: "tgrid.reflow",
            width = container.width,
            items = key.item_count,
            columns = geometry.columns,
            rows = geometry.rows,
            cell_width = geometry.cell_size.width,
            scrollbar = geometry.scrollbar_reserved,
            changed,
            generation,
            "reflow applied"
        );
        ReflowOutcome::Applied { changed }
    }

    /// Space the grid needs to show `cells`.
    ///
    /// Uses the cached geometry when it was computed for the same cells,
    /// otherwise plans against the last known container without touching
    /// any state. Before the first layout, assumes a single column.
    pub fn min_size(&self, cells: &[CellDescriptor]) -> Size {
        let count = cells.iter().filter(|c| c.is_visible()).count();
        if count == 0 {
            return Size::ZERO;
        }
        if let (Some(key), Some(container), Some(geometry)) =
            (self.cached, self.last_container, self.geometry())
            && key == GeometryKey::new(container, cells)
        {
            return geometry.min_size;
        }
        let wanted = content_min(cells);
        let container = self.last_container.unwrap_or_else(|| {
            let min_width = self.config.min_cell.max(wanted).width.max(1.0);
            Size::new(self.config.padding.horizontal_sum() + min_width, 0.0)
        });
        plan(&self.config, container, wanted, count)
            .map(|geometry| geometry.min_size)
            .unwrap_or(Size::ZERO)
    }
}

impl Default for ReflowLayout {
    fn default() -> Self {
        Self::new(ReflowConfig::default())
    }
}
