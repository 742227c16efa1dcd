#![forbid(unsafe_code)]

//! Drop zones and the read side of the layout.
//!
//! A [`LayoutFrame`] bundles the geometry and the drop zones produced by one
//! reflow. Frames are immutable once published, so the drag path can
//! hit-test from any thread through a [`LayoutReader`] while the next
//! reflow builds a replacement.

use std::sync::Arc;

use tgrid_core::geometry::{Point, Rect};
use tgrid_core::snapshot::SnapshotStore;

use crate::cell::CellId;
use crate::plan::GridGeometry;

/// Hit-testable rectangle owned by a placed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropZone {
    pub rect: Rect,
    pub cell: CellId,
}

impl DropZone {
    #[inline]
    pub fn top(&self) -> f32 {
        self.rect.top()
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.rect.left()
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.rect.bottom()
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.rect.right()
    }
}

/// Output of one reflow: geometry plus the zones of every placed cell.
#[derive(Debug, Clone, Default)]
pub struct LayoutFrame {
    pub geometry: Option<GridGeometry>,
    pub zones: Arc<[DropZone]>,
    /// Monotonic counter of published frames.
    pub generation: u64,
}

impl LayoutFrame {
    /// Owning cell of the zone containing `point`.
    pub fn hit_test(&self, point: Point) -> Option<CellId> {
        self.zones
            .iter()
            .find(|zone| zone.rect.contains(point))
            .map(|zone| zone.cell)
    }

    pub fn zone_for(&self, cell: CellId) -> Option<DropZone> {
        self.zones.iter().copied().find(|zone| zone.cell == cell)
    }
}

/// Cloneable, thread-safe read handle onto the published layout.
#[derive(Debug, Clone)]
pub struct LayoutReader {
    frames: Arc<SnapshotStore<LayoutFrame>>,
}

impl LayoutReader {
    pub(crate) fn new(frames: Arc<SnapshotStore<LayoutFrame>>) -> Self {
        Self { frames }
    }

    /// The most recently published frame.
    pub fn frame(&self) -> Arc<LayoutFrame> {
        self.frames.load()
    }

    pub fn geometry(&self) -> Option<GridGeometry> {
        self.frames.peek().geometry
    }

    pub fn zones(&self) -> Arc<[DropZone]> {
        Arc::clone(&self.frames.peek().zones)
    }

    /// Owning cell of the drop zone under `point`, if any.
    pub fn hit_test(&self, point: Point) -> Option<CellId> {
        self.frames.peek().hit_test(point)
    }
}
