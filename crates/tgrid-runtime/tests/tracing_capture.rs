//! Structured log output of the scheduling and layout paths.
//!
//! Events are captured with a thread-local subscriber, so only events
//! emitted on the test thread are asserted on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tgrid_core::geometry::{Point, Size};
use tgrid_runtime::{
    CellDescriptor, Dispatcher, DispatcherConfig, DragConfig, DragController, DragEvent,
    ReflowLayout, ScheduleError, ScrollHost,
};
use tracing_subscriber::layer::SubscriberExt;
use web_time::Duration;

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    target: String,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map(String::as_str).unwrap_or("")
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }
}

fn capture<F: FnOnce()>(f: F) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

#[test]
fn reflow_logs_applied_geometry_and_skips() {
    let events = capture(|| {
        let mut layout = ReflowLayout::default();
        let mut cells: Vec<_> = (0..6).map(CellDescriptor::quote).collect();
        layout.layout(&mut cells, Size::new(650.0, 10_000.0));
        layout.layout(&mut cells, Size::new(0.0, 10_000.0));
    });

    let applied = events
        .iter()
        .find(|e| e.target == "tgrid.reflow" && e.message() == "reflow applied")
        .expect("reflow applied event");
    assert_eq!(applied.level, tracing::Level::DEBUG);
    assert_eq!(applied.fields["columns"], "2");
    assert_eq!(applied.fields["rows"], "3");
    assert_eq!(applied.fields["changed"], "6");

    assert!(events.iter().any(|e| e.target == "tgrid.reflow"
        && e.message().starts_with("reflow skipped")
        && e.fields.contains_key("reason")));
}

#[test]
fn rejected_submission_warns() {
    let dispatcher = Dispatcher::new(
        DispatcherConfig::default()
            .with_workers(1)
            .with_queue_capacity(1)
            .with_identity("warned"),
    )
    .unwrap();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    dispatcher
        .submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
    let deadline = web_time::Instant::now() + Duration::from_secs(2);
    while dispatcher.stats().active == 0 && web_time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }

    let mut results = Vec::new();
    let events = capture(|| {
        results.push(dispatcher.try_submit(|| {}));
        results.push(dispatcher.try_submit(|| {}));
    });
    release_tx.send(()).unwrap();

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ScheduleError::QueueFull)));
    let warn = events
        .iter()
        .find(|e| e.level == tracing::Level::WARN && e.target == "tgrid.dispatch")
        .expect("back-pressure warning");
    assert_eq!(warn.fields["identity"], "warned");
    assert_eq!(warn.fields["capacity"], "1");
}

struct FixedHost;

impl ScrollHost for FixedHost {
    fn scroll_by(&self, _delta: f32) {}

    fn container_origin(&self) -> Point {
        Point::new(0.0, 50.0)
    }

    fn scroll_offset(&self) -> f32 {
        0.0
    }
}

#[test]
fn drag_lifecycle_is_logged() {
    let events = capture(|| {
        let mut drag = DragController::new(Arc::new(FixedHost), DragConfig::default());
        drag.handle(Some(&DragEvent::moved(10.0, 60.0))).unwrap();
        drag.handle(Some(&DragEvent::ended(10.0, 60.0))).unwrap();
    });
    let drag_events: Vec<_> = events.iter().filter(|e| e.target == "tgrid.drag").collect();
    assert!(drag_events.iter().any(|e| e.message() == "drag started"));
    let ended = drag_events
        .iter()
        .find(|e| e.message() == "drag ended")
        .expect("drag ended event");
    assert_eq!(ended.fields["scrolls"], "0");
}
