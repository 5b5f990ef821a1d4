//! User intents accepted by the player

use crate::types::{SettingsTab, VideoFit};
use serde::{Deserialize, Serialize};

/// A user command, from any input surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Attach a new source, disposing the current one
    Load(String),
    /// Dispose the current source and return to idle
    Teardown,

    Play,
    Pause,
    TogglePlay,
    /// Absolute position in seconds
    Seek(f64),
    /// Offset in seconds from the current position
    SeekRelative(f64),
    /// Seek bar position in [0, 1]
    SeekFraction(f64),
    /// Skip forward by the configured step
    StepForward,
    /// Skip back by the configured step
    StepBackward,

    SetVolume(f64),
    ToggleMute,
    SetSpeed(f64),
    /// Quality level index, `-1` for automatic
    SetQuality(i32),

    SetBrightness(f64),
    SetContrast(f64),
    SetSaturation(f64),
    SetFit(VideoFit),
    ToggleFit,
    ResetFilters,

    ToggleSettings,
    OpenSettings(SettingsTab),
    CloseSettings,
    SelectSettingsTab(SettingsTab),

    /// Pointer move or touch over the player
    PointerActivity,
    /// Pointer left the player
    PointerLeave,
}
