//! Core types for Marquee

use crate::error::ErrorInfo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one source attachment.
///
/// Sink and engine events are tagged with the attachment they were
/// subscribed under; events for any other attachment are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachmentId(pub u64);

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No source attached
    Idle,
    /// Source attached, metadata not yet available
    Loading,
    /// Metadata known, playback not started
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Reached the end of the content
    Ended,
    /// Fatal error, no automatic recovery
    Errored,
}

impl PlaybackPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Loading) |
            // From Loading
            (Loading, Ready) | (Loading, Playing) | (Loading, Paused) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Ended) |
            // From Playing
            (Playing, Paused) | (Playing, Ended) |
            // From Paused
            (Paused, Playing) | (Paused, Ended) |
            // From Ended
            (Ended, Playing) | (Ended, Paused)
        ) || (target == Errored && *self != Errored)
    }

    /// Phases in which the media sink accepts transport commands
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackPhase::Idle | PlaybackPhase::Errored)
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Ready => write!(f, "ready"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Paused => write!(f, "paused"),
            PlaybackPhase::Ended => write!(f, "ended"),
            PlaybackPhase::Errored => write!(f, "errored"),
        }
    }
}

/// Authoritative playback state, owned by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub phase: PlaybackPhase,
    /// A seek has been issued and the sink has not reported completion
    pub seeking: bool,
    pub is_playing: bool,
    /// Seconds
    pub current_time: f64,
    /// Seconds, 0 while unknown
    pub duration: f64,
    /// User volume in [0, 1]
    pub volume: f64,
    pub muted: bool,
    /// Last non-zero volume before muting
    pub muted_volume_memory: f64,
    pub playback_speed: f64,
    pub is_loading: bool,
    pub error: Option<ErrorInfo>,
}

impl PlayerState {
    pub fn new(volume: f64) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            phase: PlaybackPhase::Idle,
            seeking: false,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume,
            muted: false,
            muted_volume_memory: if volume > 0.0 { volume } else { 1.0 },
            playback_speed: 1.0,
            is_loading: false,
            error: None,
        }
    }

    /// Volume actually applied to the sink
    pub fn effective_volume(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Playback progress in [0, 1], 0 while the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// One selectable rendition of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Engine level index, `-1` for automatic selection
    pub index: i32,
    /// Vertical resolution, 0 for the auto level
    pub height_px: u32,
}

impl QualityLevel {
    /// Synthetic automatic-selection level
    pub const AUTO: QualityLevel = QualityLevel { index: -1, height_px: 0 };

    pub fn new(index: i32, height_px: u32) -> Self {
        Self { index, height_px }
    }

    pub fn is_auto(&self) -> bool {
        self.index == Self::AUTO.index
    }

    /// Label shown in the quality menu
    pub fn label(&self) -> String {
        if self.is_auto() {
            "Auto".to_string()
        } else {
            format!("{}p", self.height_px)
        }
    }
}

/// Contiguous interval of downloaded media time, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferRange {
    pub start: f64,
    pub end: f64,
}

impl BufferRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    /// Left offset and width of this range as fractions of `duration`,
    /// for drawing the buffered bar behind the seek slider
    pub fn bar_geometry(&self, duration: f64) -> Option<(f64, f64)> {
        if duration <= 0.0 {
            return None;
        }
        let left = (self.start / duration).clamp(0.0, 1.0);
        let right = (self.end / duration).clamp(0.0, 1.0);
        Some((left, right - left))
    }
}

/// Settings panel tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SettingsTab {
    #[default]
    Playback,
    Quality,
    Display,
}

impl SettingsTab {
    pub const ALL: [SettingsTab; 3] = [SettingsTab::Playback, SettingsTab::Quality, SettingsTab::Display];

    pub fn label(&self) -> &'static str {
        match self {
            SettingsTab::Playback => "Playback",
            SettingsTab::Quality => "Quality",
            SettingsTab::Display => "Display",
        }
    }
}

/// The single settings panel; `active_tab` only matters while `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettingsPanelState {
    pub open: bool,
    pub active_tab: SettingsTab,
}

/// How the video frame fills its box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoFit {
    #[default]
    Contain,
    Cover,
}

impl VideoFit {
    /// CSS `object-fit` keyword
    pub fn as_css(&self) -> &'static str {
        match self {
            VideoFit::Contain => "contain",
            VideoFit::Cover => "cover",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            VideoFit::Contain => VideoFit::Cover,
            VideoFit::Cover => VideoFit::Contain,
        }
    }
}

/// Visual adjustment inputs, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub fit: VideoFit,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            fit: VideoFit::Contain,
        }
    }
}

/// Format seconds as `m:ss`, or `h:mm:ss` past the hour
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
