#![forbid(unsafe_code)]

//! Drag events delivered by the host.
//!
//! Positions are absolute pointer coordinates in the same space as the
//! container origin reported by the scroll host.

use crate::geometry::Point;

/// Kind of drag notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEventKind {
    /// The pointer moved while a drag gesture is held.
    Move,
    /// The drag gesture was released or aborted.
    End,
}

/// A drag notification carrying the absolute pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragEvent {
    pub kind: DragEventKind,
    pub position: Point,
}

impl DragEvent {
    #[inline]
    pub const fn moved(x: f32, y: f32) -> Self {
        Self {
            kind: DragEventKind::Move,
            position: Point::new(x, y),
        }
    }

    #[inline]
    pub const fn ended(x: f32, y: f32) -> Self {
        Self {
            kind: DragEventKind::End,
            position: Point::new(x, y),
        }
    }
}
