#![forbid(unsafe_code)]

//! Responsive grid reflow for live tile walls.
//!
//! - [`plan`] / [`column_count`] - pure geometry for a container and a cell count
//! - [`ReflowLayout`] - cached placement that mutates cells in place and
//!   publishes drop zones
//! - [`LayoutReader`] - thread-safe hit testing against the last published frame
//!
//! ```
//! use tgrid_layout::{CellDescriptor, ReflowLayout, ReflowOutcome};
//! use tgrid_core::geometry::{Point, Size};
//!
//! let mut layout = ReflowLayout::default();
//! let mut cells: Vec<_> = (0..4).map(CellDescriptor::quote).collect();
//! let outcome = layout.layout(&mut cells, Size::new(1280.0, 720.0));
//! assert!(matches!(outcome, ReflowOutcome::Applied { .. }));
//!
//! let target = cells[1].rect();
//! let hit = layout.hit_test(Point::new(target.x + 1.0, target.y + 1.0));
//! assert_eq!(hit, Some(cells[1].id()));
//! ```

pub mod cell;
pub mod plan;
pub mod reflow;
pub mod zones;

pub use cell::{CellDescriptor, CellId, CellKind};
pub use plan::{GridGeometry, ReflowConfig, SkipReason, column_count, plan};
pub use reflow::{GeometryKey, ReflowLayout, ReflowOutcome, ReflowStats};
pub use tgrid_core::geometry::{Point, Rect, Sides, Size};
pub use zones::{DropZone, LayoutFrame, LayoutReader};
