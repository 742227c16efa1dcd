#![forbid(unsafe_code)]

//! Drag session state and edge auto-scroll.
//!
//! [`DragController`] turns a stream of [`DragEvent`]s into a drag session
//! plus a background sampler that scrolls the container while the pointer
//! is held past the top or bottom edge.
//!
//! # State Machine
//!
//! - `Idle -> Dragging` on the first `Move` after idle. The container origin
//!   and the pointer-to-container offset are recorded and the sampler
//!   starts.
//! - `Dragging -> Dragging` on further `Move`s: only the last pointer
//!   position is updated.
//! - `Dragging -> Idle` on `End`: the sampler is cancelled and joined before
//!   `handle` returns.
//!
//! # Invariants
//!
//! 1. A scroll is issued only when two consecutive samples agree on a
//!    non-zero direction.
//! 2. No scroll is issued after the `End` event has been handled.
//! 3. Missing events and an `End` while idle are no-ops.
//! 4. Hover and drop targets are resolved in content coordinates: the
//!    host's current scroll offset is added to the pointer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tgrid_core::cancellation::{CancelSource, CancelToken};
use tgrid_core::device::DeviceProfile;
use tgrid_core::event::{DragEvent, DragEventKind};
use tgrid_core::geometry::Point;
use tgrid_layout::{CellId, LayoutReader};
use web_time::Duration;

use crate::error::ScheduleError;

// ---------------------------------------------------------------------------
// Host interface
// ---------------------------------------------------------------------------

/// The scrollable container hosting the grid.
pub trait ScrollHost: Send + Sync {
    /// Scroll the content by `delta` logical pixels (positive is down).
    fn scroll_by(&self, delta: f32);
    /// Absolute position of the container's top-left corner.
    fn container_origin(&self) -> Point;
    /// Current vertical scroll offset of the content, after clamping.
    fn scroll_offset(&self) -> f32;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Auto-scroll thresholds and timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConfig {
    /// Distance past the start position before a direction is reported
    /// (default: 40).
    pub edge_threshold: f32,
    /// Pixels scrolled per issued command (default: 24).
    pub scroll_step: f32,
    /// Sampler period (default: 50ms, 30ms on constrained devices).
    pub sample_interval: Duration,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            edge_threshold: 40.0,
            scroll_step: 24.0,
            sample_interval: DeviceProfile::Standard.drag_sample_interval(),
        }
    }
}

impl DragConfig {
    /// Defaults with the sample period of `device`.
    pub fn for_device(device: DeviceProfile) -> Self {
        Self {
            sample_interval: device.drag_sample_interval(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Direction decision
// ---------------------------------------------------------------------------

/// Scroll direction for a dragged item whose top sits at `target_y`.
///
/// `-1` above `origin_y - threshold`, `+1` below `origin_y + threshold`,
/// `0` in between.
pub fn scroll_direction(target_y: f32, origin_y: f32, threshold: f32) -> i8 {
    if target_y < origin_y - threshold {
        -1
    } else if target_y > origin_y + threshold {
        1
    } else {
        0
    }
}

/// Debounces direction samples: a direction is acted on only when it
/// repeats on the next sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollDecider {
    previous: i8,
}

impl ScrollDecider {
    /// Feed one sample. Returns the direction to scroll, if any.
    pub fn observe(&mut self, direction: i8) -> Option<i8> {
        let agreed = direction != 0 && direction == self.previous;
        self.previous = direction;
        agreed.then_some(direction)
    }

    pub fn previous(&self) -> i8 {
        self.previous
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Snapshot of an active drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Container origin when the drag started.
    pub origin: Point,
    /// Pointer position minus container origin at drag start.
    pub offset: Point,
    pub last_pointer: Point,
    /// Direction of the most recent sample.
    pub direction: i8,
    /// Scroll commands issued so far.
    pub scrolls: u64,
}

impl DragSession {
    fn start(pointer: Point, origin: Point) -> Self {
        Self {
            origin,
            offset: pointer.offset_from(origin),
            last_pointer: pointer,
            direction: 0,
            scrolls: 0,
        }
    }

    /// Where the dragged item's top would be given the last pointer.
    pub fn target_y(&self) -> f32 {
        self.last_pointer.y - self.offset.y
    }

    /// Last pointer position in container coordinates.
    pub fn local_pointer(&self) -> Point {
        self.last_pointer.offset_from(self.origin)
    }

    /// Last pointer position in content coordinates, given the container's
    /// scroll offset.
    pub fn content_pointer(&self, scroll_offset: f32) -> Point {
        let local = self.local_pointer();
        Point::new(local.x, local.y + scroll_offset)
    }
}

/// Result of feeding one event to [`DragController::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTransition {
    /// Missing event, or an `End` while idle.
    Ignored,
    Started,
    Moved,
    /// The drag finished; carries the cell under the pointer, if a layout
    /// is attached.
    Ended { drop_target: Option<CellId> },
}

struct ActiveDrag {
    session: Arc<Mutex<DragSession>>,
    cancel: CancelSource,
    sampler: Option<JoinHandle<()>>,
}

/// Per-container drag state machine with edge auto-scroll.
pub struct DragController {
    host: Arc<dyn ScrollHost>,
    config: DragConfig,
    layout: Option<LayoutReader>,
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn new(host: Arc<dyn ScrollHost>, config: DragConfig) -> Self {
        Self {
            host,
            config,
            layout: None,
            active: None,
        }
    }

    /// Attach a layout so drops resolve to the cell under the pointer.
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutReader) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Copy of the current session, if dragging.
    pub fn session(&self) -> Option<DragSession> {
        self.active.as_ref().map(|active| *lock(&active.session))
    }

    /// Cell currently under the pointer.
    pub fn hover_target(&self) -> Option<CellId> {
        let session = self.session()?;
        let layout = self.layout.as_ref()?;
        layout.hit_test(session.content_pointer(self.host.scroll_offset()))
    }

    /// Feed one drag notification.
    pub fn handle(&mut self, event: Option<&DragEvent>) -> Result<DragTransition, ScheduleError> {
        let Some(event) = event else {
            return Ok(DragTransition::Ignored);
        };
        match event.kind {
            DragEventKind::Move => self.on_move(event.position),
            DragEventKind::End => Ok(self.on_end(event.position)),
        }
    }

    fn on_move(&mut self, pointer: Point) -> Result<DragTransition, ScheduleError> {
        if let Some(active) = &self.active {
            lock(&active.session).last_pointer = pointer;
            return Ok(DragTransition::Moved);
        }

        let origin = self.host.container_origin();
        let session = Arc::new(Mutex::new(DragSession::start(pointer, origin)));
        let cancel = CancelSource::new();
        let sampler = {
            let session = Arc::clone(&session);
            let host = Arc::clone(&self.host);
            let token = cancel.token();
            let config = self.config;
            thread::Builder::new()
                .name("tgrid-drag-sampler".into())
                .spawn(move || sampler_loop(&session, host.as_ref(), &token, config))?
        };
        tracing::debug!(
            target: "tgrid.drag",
            x = pointer.x,
            y = pointer.y,
            origin_y = origin.y,
            "drag started"
        );
        self.active = Some(ActiveDrag {
            session,
            cancel,
            sampler: Some(sampler),
        });
        Ok(DragTransition::Started)
    }

    fn on_end(&mut self, pointer: Point) -> DragTransition {
        let Some(mut active) = self.active.take() else {
            return DragTransition::Ignored;
        };
        lock(&active.session).last_pointer = pointer;
        stop(&mut active);

        let session = *lock(&active.session);
        let scroll_offset = self.host.scroll_offset();
        let drop_target = self
            .layout
            .as_ref()
            .and_then(|layout| layout.hit_test(session.content_pointer(scroll_offset)));
        tracing::debug!(
            target: "tgrid.drag",
            scrolls = session.scrolls,
            scroll_offset,
            drop_target = ?drop_target.map(|c| c.0),
            "drag ended"
        );
        DragTransition::Ended { drop_target }
    }
}

impl Drop for DragController {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            stop(&mut active);
        }
    }
}

impl std::fmt::Debug for DragController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragController")
            .field("config", &self.config)
            .field("session", &self.session())
            .finish()
    }
}

fn stop(active: &mut ActiveDrag) {
    active.cancel.cancel();
    if let Some(handle) = active.sampler.take() {
        let _ = handle.join();
    }
}

fn lock(session: &Mutex<DragSession>) -> MutexGuard<'_, DragSession> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

fn sampler_loop(
    session: &Mutex<DragSession>,
    host: &dyn ScrollHost,
    token: &CancelToken,
    config: DragConfig,
) {
    let mut decider = ScrollDecider::default();
    while !token.wait_timeout(config.sample_interval) {
        let decision = {
            let mut session = lock(session);
            let direction =
                scroll_direction(session.target_y(), session.origin.y, config.edge_threshold);
            session.direction = direction;
            let decision = decider.observe(direction);
            tracing::trace!(
                target: "tgrid.drag",
                target_y = session.target_y(),
                direction,
                "drag sample"
            );
            decision
        };
        if let Some(direction) = decision {
            if token.is_cancelled() {
                break;
            }
            host.scroll_by(f32::from(direction) * config.scroll_step);
            lock(session).scrolls += 1;
        }
    }
}
