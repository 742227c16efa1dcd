#![forbid(unsafe_code)]

//! Device classes that tune timer periods.

use web_time::Duration;

/// Host device class.
///
/// Constrained devices (low-power laptops, remote sessions) sample the drag
/// pointer more often and step text fades faster so gestures and effects
/// stay responsive when frames are sparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    #[default]
    Standard,
    Constrained,
}

impl DeviceProfile {
    /// Period between drag auto-scroll samples.
    pub const fn drag_sample_interval(self) -> Duration {
        match self {
            Self::Standard => Duration::from_millis(50),
            Self::Constrained => Duration::from_millis(30),
        }
    }

    /// Delay between steps of a fading-text sequence.
    pub const fn text_fade_step(self) -> Duration {
        match self {
            Self::Standard => Duration::from_millis(120),
            Self::Constrained => Duration::from_millis(60),
        }
    }

    /// Parse a profile name as used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "constrained" => Some(Self::Constrained),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Constrained => "constrained",
        }
    }
}
