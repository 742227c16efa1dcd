//! The scripted price-tile wall.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tgrid_core::geometry::{Point, Size};
use tgrid_layout::{CellDescriptor, CellId, CellKind, ReflowOutcome, ReflowStats};
use tgrid_runtime::{
    AnimationSlots, DebounceStats, DispatcherStats, DragEvent, DragTransition, GridRuntime, Rgba,
    ScheduleError, ScrollHost, Sequence, UiQueue, UiThread, VisualTarget, VisualValue,
};
use web_time::{Duration, Instant};

const QUOTES: u64 = 23;
const SPACER: CellId = CellId(1_000);
const FEED_ROUNDS: u32 = 60;
const FEED_PERIOD: Duration = Duration::from_millis(20);
const FRAME: Duration = Duration::from_millis(16);
const VIEWPORT_HEIGHT: f32 = 720.0;

/// Container widths applied at the given frame numbers.
const RESIZE_SCRIPT: [(u32, f32); 5] = [
    (0, 1280.0),
    (30, 640.0),
    (60, 1920.0),
    (90, 960.0),
    (120, 1280.0),
];
const DRAG_START_FRAME: u32 = 150;
const DRAG_END_FRAME: u32 = 165;
const LAST_FRAME: u32 = 200;

const UP: Rgba = Rgba::opaque(46, 160, 67);
const DOWN: Rgba = Rgba::opaque(207, 34, 46);
const NEUTRAL: Rgba = Rgba::opaque(60, 60, 60);

// ---------------------------------------------------------------------------
// Visual objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct TileState {
    price: f64,
    alpha: f32,
    color: Rgba,
    updates: u64,
}

/// A live quote tile. Mutated only from UI-queue closures.
struct TileView {
    id: CellId,
    state: Mutex<TileState>,
    slots: Mutex<AnimationSlots>,
}

impl TileView {
    fn new(id: CellId) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(TileState {
                price: 100.0,
                alpha: 0.0,
                color: NEUTRAL,
                updates: 0,
            }),
            slots: Mutex::new(AnimationSlots::new()),
        })
    }

    fn state(&self) -> MutexGuard<'_, TileState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slots(&self) -> MutexGuard<'_, AnimationSlots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VisualTarget for TileView {
    fn apply(&self, value: VisualValue) {
        let mut state = self.state();
        match value {
            VisualValue::Alpha(alpha) => state.alpha = alpha,
            VisualValue::Color(color) => state.color = color,
        }
    }
}

/// Scroll container with a fixed origin.
#[derive(Default)]
struct Viewport {
    offset: Mutex<f32>,
}

impl Viewport {
    /// Screen position of a content point under the current scroll.
    fn to_screen(&self, content: Point) -> Point {
        let origin = self.container_origin();
        Point::new(
            origin.x + content.x,
            origin.y + content.y - self.scroll_offset(),
        )
    }
}

impl ScrollHost for Viewport {
    fn scroll_by(&self, delta: f32) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset = (*offset + delta).max(0.0);
    }

    fn container_origin(&self) -> Point {
        Point::new(0.0, 0.0)
    }

    fn scroll_offset(&self) -> f32 {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Price feed
// ---------------------------------------------------------------------------

/// Deterministic price walk so runs are reproducible.
struct Feed {
    state: u64,
}

impl Feed {
    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state >> 33
    }

    fn step(&mut self) -> f64 {
        (self.next() % 200) as f64 / 100.0 - 1.0
    }
}

fn spawn_feed(
    runtime: Arc<GridRuntime>,
    tiles: Vec<Arc<TileView>>,
) -> std::io::Result<thread::JoinHandle<u64>> {
    thread::Builder::new().name("tgrid-demo-feed".into()).spawn(move || {
        let mut feed = Feed { state: 0x5eed };
        let mut prices = vec![100.0_f64; tiles.len()];
        let mut requests = 0;
        let flash = runtime.config().flash();
        for _ in 0..FEED_ROUNDS {
            for (i, tile) in tiles.iter().enumerate() {
                if feed.next() % 3 != 0 {
                    continue;
                }
                let previous = prices[i];
                prices[i] = (previous + feed.step()).max(0.01);
                let price = prices[i];
                let tint = if price >= previous { UP } else { DOWN };

                let tile = Arc::clone(tile);
                let ui = Arc::clone(runtime.ui());
                let sequencer = runtime.sequencer().clone();
                let flash = flash.clone();
                let key = format!("quote-{}", tile.id.0);
                let result = runtime.debounce(key, move || {
                    ui.run_on_ui(Box::new(move || {
                        {
                            let mut state = tile.state();
                            state.price = price;
                            state.updates += 1;
                        }
                        let target: Arc<dyn VisualTarget> = tile.clone();
                        let tint = Sequence::color_transition(
                            tint,
                            NEUTRAL,
                            4,
                            Duration::from_millis(40),
                        );
                        let mut slots = tile.slots();
                        for sequence in [flash, tint] {
                            let started =
                                slots.play(&sequencer, sequence, Arc::clone(&target), None);
                            if let Err(e) = started {
                                tracing::warn!(target: "tgrid.demo", error = %e, "flash not started");
                            }
                        }
                    }));
                });
                match result {
                    Ok(()) => requests += 1,
                    Err(e) => {
                        tracing::warn!(target: "tgrid.demo", error = %e, "feed stopped");
                        return requests;
                    }
                }
            }
            thread::sleep(FEED_PERIOD);
        }
        requests
    })
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Summary printed at the end of a run.
#[derive(Debug)]
pub struct Report {
    frames: u32,
    ui_actions: u64,
    feed_requests: u64,
    tile_updates: u64,
    columns: Vec<(f32, usize)>,
    reflow: ReflowStats,
    dispatcher: DispatcherStats,
    debounce: DebounceStats,
    scroll_offset: f32,
    dropped: Option<(CellId, CellId)>,
    elapsed: Duration,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames            {}", self.frames)?;
        writeln!(f, "elapsed           {:?}", self.elapsed)?;
        writeln!(f, "ui actions        {}", self.ui_actions)?;
        writeln!(
            f,
            "quote requests    {} -> {} tile updates ({} coalesced)",
            self.feed_requests, self.tile_updates, self.debounce.replaced
        )?;
        for (width, columns) in &self.columns {
            writeln!(f, "width {width:>6}      {columns} columns")?;
        }
        writeln!(
            f,
            "reflow            {} computed, {} cached, {} skipped",
            self.reflow.computations, self.reflow.cache_hits, self.reflow.skipped
        )?;
        writeln!(
            f,
            "dispatcher        {} completed, {} panicked, peak {}/{}",
            self.dispatcher.completed,
            self.dispatcher.panicked,
            self.dispatcher.peak_active,
            self.dispatcher.workers
        )?;
        writeln!(f, "scroll offset     {}", self.scroll_offset)?;
        match self.dropped {
            Some((dragged, onto)) => write!(
                f,
                "drag              tile {} dropped onto slot of {}",
                dragged.0, onto.0
            ),
            None => write!(f, "drag              no drop target"),
        }
    }
}

pub fn run(runtime: &Arc<GridRuntime>, ui: &mut UiQueue) -> Result<Report, ScheduleError> {
    let started = Instant::now();
    let mut cells: Vec<CellDescriptor> = (0..QUOTES).map(CellDescriptor::quote).collect();
    cells.insert(QUOTES as usize / 2, CellDescriptor::new(SPACER, CellKind::Spacer));
    let tiles: Vec<Arc<TileView>> = cells
        .iter()
        .filter(|c| c.kind().supports_content_update())
        .map(|c| TileView::new(c.id()))
        .collect();

    let mut layout = runtime.layout();
    let viewport = Arc::new(Viewport::default());
    let mut drag = runtime.drag_controller(viewport.clone(), Some(layout.reader()));

    for tile in &tiles {
        let handle = runtime.animate(runtime.config().fade_in(), tile.clone(), None)?;
        tile.slots().insert(handle);
    }

    let feed = spawn_feed(Arc::clone(runtime), tiles.clone())?;

    let mut columns = Vec::new();
    let mut width = RESIZE_SCRIPT[0].1;
    let mut dragged = None;
    let mut dropped = None;
    for frame in 0..=LAST_FRAME {
        if let Some(&(_, w)) = RESIZE_SCRIPT.iter().find(|(at, _)| *at == frame) {
            width = w;
        }
        if let ReflowOutcome::Applied { .. } =
            layout.layout(&mut cells, Size::new(width, VIEWPORT_HEIGHT))
            && let Some(geometry) = layout.geometry()
        {
            columns.push((width, geometry.columns));
        }

        if frame == DRAG_START_FRAME {
            let grab = center(&cells[0]);
            dragged = layout.hit_test(grab);
            drag.handle(Some(&DragEvent::moved(grab.x, grab.y)))?;
            // Pull far below the start so the sampler scrolls down.
            drag.handle(Some(&DragEvent::moved(grab.x, grab.y + 400.0)))?;
        }
        if frame == DRAG_END_FRAME {
            let release = viewport.to_screen(center(&cells[5]));
            if let DragTransition::Ended { drop_target } =
                drag.handle(Some(&DragEvent::ended(release.x, release.y)))?
                && let (Some(from), Some(onto)) = (dragged, drop_target)
            {
                reorder(&mut cells, from, onto);
                dropped = Some((from, onto));
            }
        }

        ui.pump_for(FRAME);
    }

    let feed_requests = feed.join().unwrap_or_default();
    let debouncer = runtime.debouncer();
    ui.pump_until(Duration::from_secs(2), || {
        debouncer.pending_count() == 0 && runtime.dispatcher().wait_idle(Duration::ZERO)
    });
    for tile in &tiles {
        tile.slots().cancel_all();
    }
    ui.drain();

    let tile_updates: u64 = tiles.iter().map(|t| t.state().updates).sum();
    let scroll_offset = viewport.scroll_offset();
    Ok(Report {
        frames: LAST_FRAME + 1,
        ui_actions: ui.executed(),
        feed_requests,
        tile_updates,
        columns,
        reflow: layout.stats(),
        dispatcher: runtime.dispatcher().stats(),
        debounce: debouncer.stats(),
        scroll_offset,
        dropped,
        elapsed: started.elapsed(),
    })
}

fn center(cell: &CellDescriptor) -> Point {
    let rect = cell.rect();
    Point::new(rect.x + rect.width / 2.0, rect.y + rect.height / 2.0)
}

/// Move `from` into the slot currently held by `onto`.
fn reorder(cells: &mut Vec<CellDescriptor>, from: CellId, onto: CellId) {
    let Some(src) = cells.iter().position(|c| c.id() == from) else {
        return;
    };
    let Some(dst) = cells.iter().position(|c| c.id() == onto) else {
        return;
    };
    if src != dst {
        let cell = cells.remove(src);
        cells.insert(dst, cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgrid_runtime::{GridConfig, InlineUi};

    #[test]
    fn reorder_moves_into_target_slot() {
        let mut cells: Vec<_> = (0..5).map(CellDescriptor::quote).collect();
        reorder(&mut cells, CellId(0), CellId(3));
        let order: Vec<u64> = cells.iter().map(|c| c.id().0).collect();
        assert_eq!(order, vec![1, 2, 3, 0, 4]);
        reorder(&mut cells, CellId(4), CellId(1));
        let order: Vec<u64> = cells.iter().map(|c| c.id().0).collect();
        assert_eq!(order, vec![4, 1, 2, 3, 0]);
    }

    #[test]
    fn release_after_scroll_targets_the_visible_slot() {
        let runtime = GridRuntime::new(GridConfig::default(), Arc::new(InlineUi)).unwrap();
        let mut layout = runtime.layout();
        let mut cells: Vec<_> = (0..24).map(CellDescriptor::quote).collect();
        layout.layout(&mut cells, Size::new(1280.0, VIEWPORT_HEIGHT));

        let viewport = Arc::new(Viewport::default());
        let mut drag = runtime.drag_controller(viewport.clone(), Some(layout.reader()));
        let grab = viewport.to_screen(center(&cells[0]));
        drag.handle(Some(&DragEvent::moved(grab.x, grab.y))).unwrap();
        // Scrolled by the host while the drag is held near the start.
        viewport.scroll_by(300.0);

        let release = viewport.to_screen(center(&cells[13]));
        let end = drag
            .handle(Some(&DragEvent::ended(release.x, release.y)))
            .unwrap();
        assert_eq!(
            end,
            DragTransition::Ended {
                drop_target: Some(cells[13].id())
            }
        );
    }

    #[test]
    fn feed_is_deterministic() {
        let mut a = Feed { state: 7 };
        let mut b = Feed { state: 7 };
        for _ in 0..10 {
            let step = a.step();
            assert_eq!(step, b.step());
            assert!((-1.0..1.0).contains(&step));
        }
    }

    #[test]
    fn tile_applies_values() {
        let tile = TileView::new(CellId(1));
        tile.apply(VisualValue::Alpha(0.5));
        tile.apply(VisualValue::Color(UP));
        let state = *tile.state();
        assert_eq!(state.alpha, 0.5);
        assert_eq!(state.color, UP);
    }
}
