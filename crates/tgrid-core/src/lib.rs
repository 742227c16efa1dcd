#![forbid(unsafe_code)]

//! Core: geometry, cooperative cancellation, snapshot publication and the
//! pointer/device vocabulary shared by the layout and runtime crates.

pub mod cancellation;
pub mod device;
pub mod event;
pub mod geometry;
pub mod snapshot;

pub use cancellation::{CancelSource, CancelToken};
pub use device::DeviceProfile;
pub use event::{DragEvent, DragEventKind};
pub use geometry::{Point, Rect, Sides, Size};
pub use snapshot::SnapshotStore;
