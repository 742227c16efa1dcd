#![forbid(unsafe_code)]

//! Cell descriptors walked by the reflow pass.

use tgrid_core::geometry::{Point, Rect, Size};

/// Stable identity of a cell across reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u64);

/// The closed set of things a grid can hold.
///
/// Callers that need to push new content into a cell ask
/// [`CellKind::supports_content_update`] instead of inspecting concrete
/// widget types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// A live price tile.
    Quote,
    /// A static placeholder that only occupies a slot.
    Spacer,
}

impl CellKind {
    #[inline]
    pub const fn supports_content_update(self) -> bool {
        matches!(self, Self::Quote)
    }
}

/// One cell as seen by the layout: identity, sizing constraints,
/// visibility, and the geometry last applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CellDescriptor {
    id: CellId,
    kind: CellKind,
    index: usize,
    min_size: Size,
    visible: bool,
    position: Point,
    size: Size,
    revision: u64,
}

impl CellDescriptor {
    pub fn new(id: CellId, kind: CellKind) -> Self {
        Self {
            id,
            kind,
            index: 0,
            min_size: Size::ZERO,
            visible: true,
            position: Point::ZERO,
            size: Size::ZERO,
            revision: 0,
        }
    }

    /// Shorthand for a visible quote tile.
    pub fn quote(id: u64) -> Self {
        Self::new(CellId(id), CellKind::Quote)
    }

    #[must_use]
    pub fn with_min_size(mut self, min_size: Size) -> Self {
        self.min_size = min_size;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    #[inline]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Slot among the visible cells at the last placement.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn min_size(&self) -> Size {
        self.min_size
    }

    pub fn set_min_size(&mut self, min_size: Size) {
        self.min_size = min_size;
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    #[inline]
    pub fn position(&self) -> Point {
        self.position
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Number of times layout actually moved or resized this cell.
    ///
    /// Each increment corresponds to one invalidation of the host's render
    /// node for this cell.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply a placement. Position and size are written only when they
    /// differ from the current values; returns whether anything changed.
    pub(crate) fn place(&mut self, index: usize, rect: Rect) -> bool {
        self.index = index;
        let position = rect.origin();
        let size = rect.size();
        if self.position == position && self.size == size {
            return false;
        }
        self.position = position;
        self.size = size;
        self.revision += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_quotes_take_content_updates() {
        assert!(CellKind::Quote.supports_content_update());
        assert!(!CellKind::Spacer.supports_content_update());
    }

    #[test]
    fn place_skips_identical_geometry() {
        let mut cell = CellDescriptor::quote(1);
        let rect = Rect::new(10.0, 10.0, 300.0, 120.0);
        assert!(cell.place(0, rect));
        assert_eq!(cell.revision(), 1);
        assert!(!cell.place(0, rect));
        assert_eq!(cell.revision(), 1);
        assert!(cell.place(1, Rect::new(320.0, 10.0, 300.0, 120.0)));
        assert_eq!(cell.revision(), 2);
        assert_eq!(cell.index(), 1);
    }

    #[test]
    fn builder_flags() {
        let cell = CellDescriptor::new(CellId(9), CellKind::Spacer)
            .with_min_size(Size::new(50.0, 60.0))
            .hidden();
        assert!(!cell.is_visible());
        assert_eq!(cell.min_size(), Size::new(50.0, 60.0));
        assert_eq!(cell.kind(), CellKind::Spacer);
    }
}
