#![forbid(unsafe_code)]

//! Scheduling for live tile grids.
//!
//! - [`Dispatcher`] - bounded worker pool with FIFO admission
//! - [`Debouncer`] - per-key burst collapsing
//! - [`DragController`] - drag sessions with edge auto-scroll
//! - [`AnimationSequencer`] - cancellable fades, flashes and color blends
//! - [`UiQueue`] - channel-backed UI-thread marshalling
//! - [`GridRuntime`] - the root that owns one of each
//!
//! Layout lives in `tgrid-layout`; this crate re-exports what hosts need.

pub mod animation;
pub mod config;
pub mod debouncer;
pub mod dispatcher;
pub mod drag;
pub mod error;
pub mod runtime;
pub mod ui_thread;

pub use animation::{
    AnimationHandle, AnimationOutcome, AnimationSequencer, AnimationSlots, AnimationStep, Channel,
    OnComplete, Rgba, Sequence, VisualTarget, VisualValue,
};
pub use config::{
    AnimationSettings, ConfigError, DebounceSettings, DispatcherSettings, DragSettings,
    GridConfig, LayoutSettings,
};
pub use debouncer::{DebounceStats, Debouncer, FireMode};
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats, Task};
pub use drag::{
    DragConfig, DragController, DragSession, DragTransition, ScrollDecider, ScrollHost,
    scroll_direction,
};
pub use error::ScheduleError;
pub use runtime::GridRuntime;
pub use ui_thread::{InlineUi, UiAction, UiHandle, UiQueue, UiThread};

pub use tgrid_core::{CancelSource, CancelToken, DeviceProfile, DragEvent, DragEventKind};
pub use tgrid_layout::{CellDescriptor, CellId, CellKind, LayoutReader, ReflowLayout, ReflowOutcome};
