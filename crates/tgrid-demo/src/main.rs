#![forbid(unsafe_code)]

//! Headless price-tile wall.
//!
//! Runs the whole pipeline without a window: a feed thread pushes quote
//! updates through the debouncer, the main thread plays the UI thread and
//! drains the UI queue at ~60 Hz, the container is resized on a schedule to
//! exercise reflow, and a scripted drag exercises auto-scroll and drop
//! resolution.
//!
//! ```text
//! RUST_LOG=tgrid=debug tgrid-demo [config.toml|config.json]
//! ```

mod wall;

use std::process::ExitCode;
use std::sync::Arc;

use tgrid_runtime::{GridConfig, GridRuntime, UiQueue};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tgrid=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match GridConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("tgrid-demo: {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => GridConfig::default(),
    };

    let mut ui = UiQueue::new();
    let runtime = match GridRuntime::new(config, Arc::new(ui.handle())) {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            eprintln!("tgrid-demo: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match wall::run(&runtime, &mut ui) {
        Ok(report) => {
            println!("{report}");
            runtime.shutdown();
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("tgrid-demo: {e}");
            runtime.shutdown();
            ExitCode::FAILURE
        }
    }
}
