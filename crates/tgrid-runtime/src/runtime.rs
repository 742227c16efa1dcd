#![forbid(unsafe_code)]

//! The explicitly constructed root of a grid.
//!
//! [`GridRuntime`] owns the one dispatcher, debouncer and animation
//! sequencer a grid uses and hands out the per-container pieces (layout,
//! drag controller) already configured. Components receive it by reference
//! instead of reaching for process-wide singletons.

use std::sync::Arc;

use tgrid_layout::{LayoutReader, ReflowLayout};

use crate::animation::{AnimationHandle, AnimationSequencer, OnComplete, Sequence, VisualTarget};
use crate::config::GridConfig;
use crate::debouncer::{Debouncer, FireMode};
use crate::dispatcher::Dispatcher;
use crate::drag::{DragController, ScrollHost};
use crate::error::ScheduleError;
use crate::ui_thread::UiThread;

/// Shared scheduling services for one grid.
pub struct GridRuntime {
    config: GridConfig,
    ui: Arc<dyn UiThread>,
    dispatcher: Arc<Dispatcher>,
    debouncer: Arc<Debouncer>,
    sequencer: AnimationSequencer,
}

impl GridRuntime {
    /// Start the worker pool and the debounce timer.
    pub fn new(config: GridConfig, ui: Arc<dyn UiThread>) -> Result<Self, ScheduleError> {
        let dispatcher = Arc::new(Dispatcher::new(config.to_dispatcher_config())?);
        let mode = if config.debounce.dispatch_callbacks {
            FireMode::Dispatch(Arc::clone(&dispatcher))
        } else {
            FireMode::Inline
        };
        let debouncer = Arc::new(Debouncer::new(mode)?);
        let sequencer =
            AnimationSequencer::new(Arc::clone(&ui)).with_dispatcher(Arc::clone(&dispatcher));

        tracing::debug!(
            target: "tgrid.runtime",
            device = config.device.name(),
            workers = config.dispatcher.workers,
            pooled_animations = config.animation.pooled,
            "grid runtime started"
        );
        Ok(Self {
            config,
            ui,
            dispatcher,
            debouncer,
            sequencer,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn ui(&self) -> &Arc<dyn UiThread> {
        &self.ui
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn debouncer(&self) -> &Arc<Debouncer> {
        &self.debouncer
    }

    pub fn sequencer(&self) -> &AnimationSequencer {
        &self.sequencer
    }

    /// A reflow layout using the configured geometry.
    pub fn layout(&self) -> ReflowLayout {
        ReflowLayout::new(self.config.to_reflow_config())
    }

    /// A drag controller for `host`, resolving drops against `layout`.
    pub fn drag_controller(
        &self,
        host: Arc<dyn ScrollHost>,
        layout: Option<LayoutReader>,
    ) -> DragController {
        let controller = DragController::new(host, self.config.to_drag_config());
        match layout {
            Some(reader) => controller.with_layout(reader),
            None => controller,
        }
    }

    /// Debounce `callback` under `key` with the configured delay.
    pub fn debounce<F>(&self, key: impl Into<String>, callback: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.debouncer
            .call(key, self.config.debounce_delay(), callback)
    }

    /// Run work on the pool, blocking while the queue is full.
    pub fn submit<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatcher.submit(task)
    }

    /// Start `sequence`, pooled or on its own thread as configured.
    pub fn animate(
        &self,
        sequence: Sequence,
        target: Arc<dyn VisualTarget>,
        on_complete: Option<OnComplete>,
    ) -> Result<AnimationHandle, ScheduleError> {
        if self.config.animation.pooled {
            self.sequencer.start_pooled(sequence, target, on_complete)
        } else {
            self.sequencer.start(sequence, target, on_complete)
        }
    }

    /// Discard pending debounces and drain the pool. Idempotent.
    pub fn shutdown(&self) {
        self.debouncer.shutdown();
        self.dispatcher.join();
    }
}

impl Drop for GridRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GridRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridRuntime")
            .field("dispatcher", &self.dispatcher.stats())
            .field("debounce_pending", &self.debouncer.pending_count())
            .finish()
    }
}
