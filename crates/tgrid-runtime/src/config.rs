#![forbid(unsafe_code)]

//! File-loadable configuration for the whole grid runtime.
//!
//! [`GridConfig`] groups every tunable of the dispatcher, debouncer, reflow
//! layout, drag controller and animation presets so a host can ship them
//! as data.
//!
//! ```toml
//! # tgrid.toml
//! device = "constrained"
//!
//! [dispatcher]
//! workers = 2
//! queue_capacity = 32
//!
//! [layout]
//! min_cell_width = 280.0
//! ```
//!
//! ```rust,ignore
//! let config = GridConfig::from_toml_file("tgrid.toml")?;
//! ```
//!
//! Missing sections and fields fall back to [`Default`], which matches the
//! constants the components use on their own.

use std::path::{Path, PathBuf};

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use tgrid_core::device::DeviceProfile;
use tgrid_core::geometry::{Sides, Size};
use tgrid_layout::ReflowConfig;
use web_time::Duration;

use crate::animation::Sequence;
use crate::dispatcher::DispatcherConfig;
use crate::drag::DragConfig;

// ---------------------------------------------------------------------------
// Top-level GridConfig
// ---------------------------------------------------------------------------

/// Every tunable of the grid runtime.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct GridConfig {
    /// Device class; tunes drag sampling and text fades.
    #[cfg_attr(
        feature = "config",
        serde(serialize_with = "serialize_device", deserialize_with = "deserialize_device")
    )]
    pub device: DeviceProfile,
    pub dispatcher: DispatcherSettings,
    pub debounce: DebounceSettings,
    pub layout: LayoutSettings,
    pub drag: DragSettings,
    pub animation: AnimationSettings,
}

impl GridConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Toml { path: None, source })
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = read_config(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|source| ConfigError::Json { path: None, source })
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = read_config(path)?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Load by extension (`.json` is JSON, anything else TOML) and validate.
    #[cfg(feature = "config")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_file(path)?
        } else {
            Self::from_toml_file(path)?
        };
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Serialize to pretty TOML.
    #[cfg(feature = "config")]
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check every value is usable.
    ///
    /// Returns a list of problems; an empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.dispatcher.workers == 0 {
            errors.push("dispatcher.workers must be > 0".into());
        }
        if self.dispatcher.queue_capacity == 0 {
            errors.push("dispatcher.queue_capacity must be > 0".into());
        }
        if self.dispatcher.idle_interval_ms == 0 {
            errors.push("dispatcher.idle_interval_ms must be > 0".into());
        }
        if self.dispatcher.identity.trim().is_empty() {
            errors.push("dispatcher.identity must not be empty".into());
        }

        for (name, value) in [
            ("layout.min_cell_width", self.layout.min_cell_width),
            ("layout.min_cell_height", self.layout.min_cell_height),
            ("layout.padding_top", self.layout.padding_top),
            ("layout.padding_right", self.layout.padding_right),
            ("layout.padding_bottom", self.layout.padding_bottom),
            ("layout.padding_left", self.layout.padding_left),
            ("layout.gap_x", self.layout.gap_x),
            ("layout.gap_y", self.layout.gap_y),
            ("layout.scrollbar_width", self.layout.scrollbar_width),
            ("drag.edge_threshold", self.drag.edge_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{name} must be a finite value >= 0, got {value}"));
            }
        }
        if self.layout.min_cell_width <= 0.0 {
            errors.push(format!(
                "layout.min_cell_width must be > 0, got {}",
                self.layout.min_cell_width
            ));
        }

        if !self.drag.scroll_step.is_finite() || self.drag.scroll_step <= 0.0 {
            errors.push(format!(
                "drag.scroll_step must be > 0, got {}",
                self.drag.scroll_step
            ));
        }
        if self.drag.sample_interval_ms == Some(0) {
            errors.push("drag.sample_interval_ms must be > 0".into());
        }

        if self.animation.fade_in_steps == 0 {
            errors.push("animation.fade_in_steps must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.animation.flash_low) {
            errors.push(format!(
                "animation.flash_low must be in [0, 1], got {}",
                self.animation.flash_low
            ));
        }

        errors
    }

    /// Build a [`DispatcherConfig`].
    #[must_use]
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.dispatcher.queue_capacity,
            workers: self.dispatcher.workers,
            idle_interval: Duration::from_millis(self.dispatcher.idle_interval_ms),
            identity: self.dispatcher.identity.clone(),
        }
    }

    /// Debounce delay used for refresh requests.
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce.delay_ms)
    }

    /// Build a [`ReflowConfig`].
    #[must_use]
    pub fn to_reflow_config(&self) -> ReflowConfig {
        let layout = &self.layout;
        ReflowConfig {
            min_cell: Size::new(layout.min_cell_width, layout.min_cell_height),
            padding: Sides::new(
                layout.padding_top,
                layout.padding_right,
                layout.padding_bottom,
                layout.padding_left,
            ),
            gap_x: layout.gap_x,
            gap_y: layout.gap_y,
            scrollbar_width: layout.scrollbar_width,
        }
    }

    /// Build a [`DragConfig`]; the sample interval follows the device unless
    /// overridden.
    #[must_use]
    pub fn to_drag_config(&self) -> DragConfig {
        let sample_interval = self
            .drag
            .sample_interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.device.drag_sample_interval());
        DragConfig {
            edge_threshold: self.drag.edge_threshold,
            scroll_step: self.drag.scroll_step,
            sample_interval,
        }
    }

    /// The configured fade-in preset.
    #[must_use]
    pub fn fade_in(&self) -> Sequence {
        Sequence::fade_in(
            self.animation.fade_in_steps,
            Duration::from_millis(self.animation.fade_in_interval_ms),
        )
    }

    /// The configured update-flash preset.
    #[must_use]
    pub fn flash(&self) -> Sequence {
        Sequence::flash(
            self.animation.flash_repeats,
            1.0,
            self.animation.flash_low,
            Duration::from_millis(self.animation.flash_interval_ms),
        )
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Worker pool parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DispatcherSettings {
    /// Tasks waiting for a worker. Default: 64.
    pub queue_capacity: usize,
    /// Worker threads. Default: 4.
    pub workers: usize,
    /// Idle poll period. Default: 200.
    pub idle_interval_ms: u64,
    /// Diagnostic label and thread name prefix. Default: `tgrid-dispatch`.
    pub identity: String,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            queue_capacity: defaults.queue_capacity,
            workers: defaults.workers,
            idle_interval_ms: defaults.idle_interval.as_millis() as u64,
            identity: defaults.identity,
        }
    }
}

/// Refresh debouncing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DebounceSettings {
    /// Default: 150.
    pub delay_ms: u64,
    /// Run fired callbacks on the dispatcher instead of the timer thread.
    /// Default: false.
    pub dispatch_callbacks: bool,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            delay_ms: 150,
            dispatch_callbacks: false,
        }
    }
}

/// Grid geometry constants.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct LayoutSettings {
    /// Default: 300.
    pub min_cell_width: f32,
    /// Default: 120.
    pub min_cell_height: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,
    /// Default: 10.
    pub gap_x: f32,
    /// Default: 10.
    pub gap_y: f32,
    /// Default: 16.
    pub scrollbar_width: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        let defaults = ReflowConfig::default();
        Self {
            min_cell_width: defaults.min_cell.width,
            min_cell_height: defaults.min_cell.height,
            padding_top: defaults.padding.top,
            padding_right: defaults.padding.right,
            padding_bottom: defaults.padding.bottom,
            padding_left: defaults.padding.left,
            gap_x: defaults.gap_x,
            gap_y: defaults.gap_y,
            scrollbar_width: defaults.scrollbar_width,
        }
    }
}

/// Drag auto-scroll.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DragSettings {
    /// Default: 40.
    pub edge_threshold: f32,
    /// Default: 24.
    pub scroll_step: f32,
    /// Overrides the device sample period when set.
    pub sample_interval_ms: Option<u64>,
}

impl Default for DragSettings {
    fn default() -> Self {
        let defaults = DragConfig::default();
        Self {
            edge_threshold: defaults.edge_threshold,
            scroll_step: defaults.scroll_step,
            sample_interval_ms: None,
        }
    }
}

/// Animation presets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct AnimationSettings {
    /// Default: 10.
    pub fade_in_steps: u32,
    /// Default: 30.
    pub fade_in_interval_ms: u64,
    /// Default: 2.
    pub flash_repeats: u32,
    /// Alpha at the bottom of a flash. Default: 0.4.
    pub flash_low: f32,
    /// Default: 80.
    pub flash_interval_ms: u64,
    /// Drive sequences on the dispatcher instead of dedicated threads.
    /// Default: false.
    pub pooled: bool,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            fade_in_steps: 10,
            fade_in_interval_ms: 30,
            flash_repeats: 2,
            flash_low: 0.4,
            flash_interval_ms: 80,
            pooled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a [`GridConfig`] could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The text is not a TOML grid config. `path` is `None` for in-memory
    /// sources.
    #[cfg(feature = "config")]
    Toml {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
    #[cfg(feature = "config")]
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    /// The config parsed, but these settings cannot drive a grid.
    Validation(Vec<String>),
}

impl ConfigError {
    /// File the error came from, when there was one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } => Some(path),
            #[cfg(feature = "config")]
            Self::Toml { path, .. } | Self::Json { path, .. } => path.as_deref(),
            Self::Validation(_) => None,
        }
    }
}

/// "grid config" or "grid config `<path>`".
struct Subject<'a>(Option<&'a Path>);

impl std::fmt::Display for Subject<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(path) => write!(f, "grid config `{}`", path.display()),
            None => f.write_str("grid config"),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subject = Subject(self.path());
        match self {
            Self::Io { source, .. } => write!(f, "cannot read {subject}: {source}"),
            #[cfg(feature = "config")]
            Self::Toml { source, .. } => write!(f, "{subject} is not valid TOML: {source}"),
            #[cfg(feature = "config")]
            Self::Json { source, .. } => write!(f, "{subject} is not valid JSON: {source}"),
            Self::Validation(errors) => write!(
                f,
                "{subject} rejected ({} problem{}): {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("; ")
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            #[cfg(feature = "config")]
            Self::Toml { source, .. } => Some(source),
            #[cfg(feature = "config")]
            Self::Json { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(feature = "config")]
fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Serde helpers for DeviceProfile
// ---------------------------------------------------------------------------

#[cfg(feature = "config")]
fn serialize_device<S>(device: &DeviceProfile, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(device.name())
}

#[cfg(feature = "config")]
fn deserialize_device<'de, D>(deserializer: D) -> Result<DeviceProfile, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    DeviceProfile::from_name(&name).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "unknown device profile {name:?}, expected \"standard\" or \"constrained\""
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let config = GridConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.to_dispatcher_config(), DispatcherConfig::default());
        assert_eq!(config.to_reflow_config(), ReflowConfig::default());
        assert_eq!(config.to_drag_config(), DragConfig::default());
        assert_eq!(config.debounce_delay(), Duration::from_millis(150));
        assert_eq!(config.fade_in().len(), 10);
        assert_eq!(config.fade_in().total_duration(), Duration::from_millis(300));
    }

    #[test]
    fn constrained_device_shortens_drag_interval() {
        let config = GridConfig {
            device: DeviceProfile::Constrained,
            ..GridConfig::default()
        };
        assert_eq!(config.to_drag_config().sample_interval, Duration::from_millis(30));

        let mut overridden = config.clone();
        overridden.drag.sample_interval_ms = Some(10);
        assert_eq!(
            overridden.to_drag_config().sample_interval,
            Duration::from_millis(10)
        );
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut config = GridConfig::default();
        config.dispatcher.workers = 0;
        config.dispatcher.queue_capacity = 0;
        config.layout.gap_x = -1.0;
        config.layout.min_cell_width = 0.0;
        config.drag.scroll_step = 0.0;
        config.animation.fade_in_steps = 0;
        let errors = config.validate();
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("dispatcher.workers")));
        assert!(errors.iter().any(|e| e.contains("layout.gap_x")));
    }

    #[test]
    fn flash_preset_ends_opaque() {
        let flash = GridConfig::default().flash();
        assert_eq!(flash.len(), 4);
        assert_eq!(
            flash.final_value(),
            Some(crate::animation::VisualValue::Alpha(1.0))
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_toml_keeps_defaults() {
        let config = GridConfig::from_toml_str(
            r#"
            device = "constrained"

            [dispatcher]
            workers = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.device, DeviceProfile::Constrained);
        assert_eq!(config.dispatcher.workers, 2);
        assert_eq!(config.dispatcher.queue_capacity, 64);
        assert_eq!(config.layout, LayoutSettings::default());
    }

    #[cfg(feature = "config")]
    #[test]
    fn unknown_device_is_a_parse_error() {
        let err = GridConfig::from_toml_str("device = \"tablet\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: None, .. }));
        assert!(err.to_string().contains("tablet"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_round_trips() {
        let mut config = GridConfig::default();
        config.debounce.delay_ms = 75;
        config.drag.sample_interval_ms = Some(20);
        let text = config.to_toml_string().unwrap();
        assert_eq!(GridConfig::from_toml_str(&text).unwrap(), config);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_sections() {
        let config =
            GridConfig::from_json_str(r#"{"layout": {"gap_x": 4.0}, "animation": {"pooled": true}}"#)
                .unwrap();
        assert_eq!(config.layout.gap_x, 4.0);
        assert!(config.animation.pooled);
        assert_eq!(config.to_reflow_config().gap_x, 4.0);
    }
}
