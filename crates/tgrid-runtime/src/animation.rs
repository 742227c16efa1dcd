#![forbid(unsafe_code)]

//! Timed visual sequences applied on the UI thread.
//!
//! A [`Sequence`] is a list of `(value, hold)` steps built by pure
//! constructors ([`Sequence::fade_in`], [`Sequence::flash`], ...). The
//! [`AnimationSequencer`] drives a sequence from a timer loop: each step
//! waits its hold and then marshals [`VisualTarget::apply`] onto the UI
//! thread. After the last step the optional completion callback is
//! marshalled the same way.
//!
//! # Cancellation
//!
//! Every started sequence returns an [`AnimationHandle`]. Cancelling it (or
//! dropping it) stops the loop before the next step, skips the completion
//! callback, and turns already-marshalled but not yet executed UI closures
//! into no-ops. [`AnimationSlots`] keeps one handle per [`Channel`] so a new
//! fade on a tile replaces the old one instead of fighting it.
//!
//! # Failure Modes
//!
//! - Empty sequence: completes immediately; the callback still fires.
//! - `start_pooled` without a dispatcher: `DispatcherClosed`.
//! - Pool saturated: `QueueFull`, nothing is started.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tgrid_core::cancellation::{CancelSource, CancelToken};
use tgrid_core::device::DeviceProfile;
use web_time::{Duration, Instant};

use crate::dispatcher::Dispatcher;
use crate::error::ScheduleError;
use crate::ui_thread::UiThread;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Linear interpolation per channel; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, to: Rgba, t: f32) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mix = |a: u8, b: u8| -> u8 {
            let v = f32::from(a) + (f32::from(b) - f32::from(a)) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgba::new(
            mix(self.r, to.r),
            mix(self.g, to.g),
            mix(self.b, to.b),
            mix(self.a, to.a),
        )
    }
}

/// Independently animated property of a visual object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Alpha,
    Color,
}

/// A value applied to a [`VisualTarget`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisualValue {
    Alpha(f32),
    Color(Rgba),
}

impl VisualValue {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Alpha(_) => Channel::Alpha,
            Self::Color(_) => Channel::Color,
        }
    }
}

/// Receives animated values. Only ever called on the UI thread.
pub trait VisualTarget: Send + Sync {
    fn apply(&self, value: VisualValue);
}

/// One step: wait `hold`, then apply `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationStep {
    pub value: VisualValue,
    pub hold: Duration,
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

const FADE_OUT_TABLE: [f32; 4] = [0.75, 0.5, 0.25, 0.0];
const FADING_TEXT_TABLE: [f32; 6] = [1.0, 0.8, 0.6, 0.4, 0.2, 0.0];

/// An ordered list of animation steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    steps: Vec<AnimationStep>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, value: VisualValue, hold: Duration) -> Self {
        self.steps.push(AnimationStep { value, hold });
        self
    }

    /// Append every step of `other`.
    #[must_use]
    pub fn then(mut self, other: Sequence) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Alpha `1/steps, 2/steps, ..., 1.0`, one step per `interval`.
    pub fn fade_in(steps: u32, interval: Duration) -> Self {
        let steps = steps.max(1);
        (1..=steps).fold(Self::new(), |seq, i| {
            seq.step(VisualValue::Alpha(i as f32 / steps as f32), interval)
        })
    }

    /// Alpha `0.75, 0.5, 0.25, 0.0`.
    pub fn fade_out(interval: Duration) -> Self {
        Self::alpha_table(&FADE_OUT_TABLE, interval)
    }

    /// `repeats` pairs of `low` then `high`, so the sequence ends on `high`.
    pub fn flash(repeats: u32, high: f32, low: f32, interval: Duration) -> Self {
        (0..repeats).fold(Self::new(), |seq, _| {
            seq.step(VisualValue::Alpha(low), interval)
                .step(VisualValue::Alpha(high), interval)
        })
    }

    /// Text fade `1.0 .. 0.0` paced for `device`.
    pub fn fading_text(device: DeviceProfile) -> Self {
        Self::alpha_table(&FADING_TEXT_TABLE, device.text_fade_step())
    }

    /// Linear color blend from `from` to `to`, ending exactly on `to`.
    pub fn color_transition(from: Rgba, to: Rgba, steps: u32, interval: Duration) -> Self {
        let steps = steps.max(1);
        (1..=steps).fold(Self::new(), |seq, i| {
            let t = i as f32 / steps as f32;
            seq.step(VisualValue::Color(from.lerp(to, t)), interval)
        })
    }

    fn alpha_table(table: &[f32], interval: Duration) -> Self {
        table.iter().fold(Self::new(), |seq, &alpha| {
            seq.step(VisualValue::Alpha(alpha), interval)
        })
    }

    pub fn steps(&self) -> &[AnimationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Channel of the first step.
    pub fn channel(&self) -> Option<Channel> {
        self.steps.first().map(|s| s.value.channel())
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.hold).sum()
    }

    /// Value applied by the last step.
    pub fn final_value(&self) -> Option<VisualValue> {
        self.steps.last().map(|s| s.value)
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// How a sequence's timer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// Every step and the completion callback were marshalled.
    Completed,
    Cancelled,
}

#[derive(Default)]
struct Finish {
    outcome: Mutex<Option<AnimationOutcome>>,
    done: Condvar,
}

impl Finish {
    fn set(&self, outcome: AnimationOutcome) {
        let mut slot = self.outcome.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(outcome);
        self.done.notify_all();
    }

    fn get(&self) -> Option<AnimationOutcome> {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait(&self, timeout: Duration) -> Option<AnimationOutcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.outcome.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if slot.is_some() {
                return *slot;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = self
                .done
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }
}

/// Owner of a running sequence.
///
/// Dropping the handle cancels the sequence. For sequences started with
/// [`AnimationSequencer::start`] it also joins the timer thread; pooled
/// sequences exit at their next step boundary.
pub struct AnimationHandle {
    cancel: CancelSource,
    finish: Arc<Finish>,
    thread: Option<JoinHandle<()>>,
    channel: Option<Channel>,
}

impl AnimationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finish.get().is_some()
    }

    pub fn outcome(&self) -> Option<AnimationOutcome> {
        self.finish.get()
    }

    /// Block until the timer loop ends or `timeout` elapses.
    ///
    /// UI closures marshalled by the loop may still be queued afterwards.
    pub fn wait(&self, timeout: Duration) -> Option<AnimationOutcome> {
        self.finish.wait(timeout)
    }

    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    /// Token observing this sequence's cancellation.
    pub fn token(&self) -> CancelToken {
        self.cancel.token()
    }
}

impl Drop for AnimationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.thread.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for AnimationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationHandle")
            .field("channel", &self.channel)
            .field("cancelled", &self.is_cancelled())
            .field("outcome", &self.outcome())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Callback run on the UI thread once a sequence completes.
pub type OnComplete = Box<dyn FnOnce() + Send + 'static>;

/// Drives [`Sequence`]s against [`VisualTarget`]s.
#[derive(Clone)]
pub struct AnimationSequencer {
    ui: Arc<dyn UiThread>,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl AnimationSequencer {
    pub fn new(ui: Arc<dyn UiThread>) -> Self {
        Self {
            ui,
            dispatcher: None,
        }
    }

    /// Enable [`AnimationSequencer::start_pooled`].
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Run `sequence` on its own timer thread.
    pub fn start(
        &self,
        sequence: Sequence,
        target: Arc<dyn VisualTarget>,
        on_complete: Option<OnComplete>,
    ) -> Result<AnimationHandle, ScheduleError> {
        let cancel = CancelSource::new();
        let finish = Arc::new(Finish::default());
        let channel = sequence.channel();
        let run = SequenceRun {
            steps: sequence.steps,
            target,
            ui: Arc::clone(&self.ui),
            token: cancel.token(),
            on_complete,
            finish: Arc::clone(&finish),
        };
        let thread = thread::Builder::new()
            .name("tgrid-anim".into())
            .spawn(move || run.execute())?;
        Ok(AnimationHandle {
            cancel,
            finish,
            thread: Some(thread),
            channel,
        })
    }

    /// Run `sequence` as a dispatcher task, subject to the pool bound.
    ///
    /// The sequence occupies one worker for its whole duration.
    pub fn start_pooled(
        &self,
        sequence: Sequence,
        target: Arc<dyn VisualTarget>,
        on_complete: Option<OnComplete>,
    ) -> Result<AnimationHandle, ScheduleError> {
        let dispatcher = self
            .dispatcher
            .as_ref()
            .ok_or(ScheduleError::DispatcherClosed)?;
        let cancel = CancelSource::new();
        let finish = Arc::new(Finish::default());
        let channel = sequence.channel();
        let run = SequenceRun {
            steps: sequence.steps,
            target,
            ui: Arc::clone(&self.ui),
            token: cancel.token(),
            on_complete,
            finish: Arc::clone(&finish),
        };
        dispatcher.try_submit(move || run.execute())?;
        Ok(AnimationHandle {
            cancel,
            finish,
            thread: None,
            channel,
        })
    }
}

impl std::fmt::Debug for AnimationSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationSequencer")
            .field("pooled", &self.dispatcher.is_some())
            .finish()
    }
}

struct SequenceRun {
    steps: Vec<AnimationStep>,
    target: Arc<dyn VisualTarget>,
    ui: Arc<dyn UiThread>,
    token: CancelToken,
    on_complete: Option<OnComplete>,
    finish: Arc<Finish>,
}

impl SequenceRun {
    fn execute(self) {
        let total = self.steps.len();
        let started = Instant::now();
        for (index, step) in self.steps.into_iter().enumerate() {
            if self.token.wait_timeout(step.hold) {
                tracing::trace!(target: "tgrid.anim", index, total, "sequence cancelled");
                self.finish.set(AnimationOutcome::Cancelled);
                return;
            }
            let token = self.token.clone();
            let target = Arc::clone(&self.target);
            self.ui.run_on_ui(Box::new(move || {
                if !token.is_cancelled() {
                    target.apply(step.value);
                }
            }));
            tracing::trace!(target: "tgrid.anim", index, total, "step marshalled");
        }

        if self.token.is_cancelled() {
            self.finish.set(AnimationOutcome::Cancelled);
            return;
        }
        if let Some(callback) = self.on_complete {
            let token = self.token.clone();
            self.ui.run_on_ui(Box::new(move || {
                if !token.is_cancelled() {
                    callback();
                }
            }));
        }
        tracing::debug!(
            target: "tgrid.anim",
            steps = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sequence completed"
        );
        self.finish.set(AnimationOutcome::Completed);
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One running sequence per channel, owned by a visual object.
///
/// Starting a sequence on a busy channel cancels the previous one first.
/// Dropping the slots cancels everything.
#[derive(Debug, Default)]
pub struct AnimationSlots {
    alpha: Option<AnimationHandle>,
    color: Option<AnimationHandle>,
}

impl AnimationSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever runs on the sequence's channel, then start it.
    ///
    /// An empty sequence has no channel. Nothing is cancelled and
    /// `on_complete` is marshalled straight to the UI thread, matching
    /// [`AnimationSequencer::start`].
    pub fn play(
        &mut self,
        sequencer: &AnimationSequencer,
        sequence: Sequence,
        target: Arc<dyn VisualTarget>,
        on_complete: Option<OnComplete>,
    ) -> Result<(), ScheduleError> {
        let Some(channel) = sequence.channel() else {
            if let Some(callback) = on_complete {
                sequencer.ui.run_on_ui(callback);
            }
            return Ok(());
        };
        self.cancel(channel);
        let handle = sequencer.start(sequence, target, on_complete)?;
        *self.slot_mut(channel) = Some(handle);
        Ok(())
    }

    /// Store an already started handle, cancelling the previous one.
    pub fn insert(&mut self, handle: AnimationHandle) {
        let Some(channel) = handle.channel() else {
            return;
        };
        // Assigning drops the previous handle, which cancels and joins it.
        *self.slot_mut(channel) = Some(handle);
    }

    /// Cancel the sequence on `channel`. Returns whether one was running.
    pub fn cancel(&mut self, channel: Channel) -> bool {
        match self.slot_mut(channel).take() {
            Some(handle) => {
                let running = !handle.is_finished();
                drop(handle);
                running
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(Channel::Alpha);
        self.cancel(Channel::Color);
    }

    pub fn is_animating(&self, channel: Channel) -> bool {
        self.slot(channel).is_some_and(|h| !h.is_finished())
    }

    pub fn handle(&self, channel: Channel) -> Option<&AnimationHandle> {
        self.slot(channel)
    }

    fn slot(&self, channel: Channel) -> Option<&AnimationHandle> {
        match channel {
            Channel::Alpha => self.alpha.as_ref(),
            Channel::Color => self.color.as_ref(),
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<AnimationHandle> {
        match channel {
            Channel::Alpha => &mut self.alpha,
            Channel::Color => &mut self.color,
        }
    }
}
