//! Media sink boundary
//!
//! The sink is the element that decodes and renders: an `HTMLVideoElement`
//! in the browser, a mock in tests. Calls into the sink never block; their
//! outcomes come back later as [`MediaEvent`]s through the session inbox.

use crate::{source::SourceKind, types::AttachmentId};
use serde::{Deserialize, Serialize};

/// Generation number of a play request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayToken(pub u64);

impl std::fmt::Display for PlayToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "play#{}", self.0)
    }
}

/// Events emitted by the media sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    DurationChange { duration: f64 },
    /// Playback stalled waiting for data
    Waiting,
    Playing,
    Pause,
    Seeking,
    Seeked { time: f64 },
    TimeUpdate { time: f64 },
    /// More data was buffered
    Progress,
    Ended,
    Error { message: String },
    /// The play request identified by `token` succeeded
    PlayResolved { token: PlayToken },
    /// The play request identified by `token` was refused or aborted
    PlayRejected { token: PlayToken, reason: String },
}

impl MediaEvent {
    /// DOM event name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::LoadedMetadata { .. } => "loadedmetadata",
            MediaEvent::DurationChange { .. } => "durationchange",
            MediaEvent::Waiting => "waiting",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked { .. } => "seeked",
            MediaEvent::TimeUpdate { .. } => "timeupdate",
            MediaEvent::Progress => "progress",
            MediaEvent::Ended => "ended",
            MediaEvent::Error { .. } => "error",
            MediaEvent::PlayResolved { .. } => "play-resolved",
            MediaEvent::PlayRejected { .. } => "play-rejected",
        }
    }
}

/// Capabilities the player needs from the media element
pub trait MediaSink {
    /// Whether the sink can play this container without an adaptive engine
    fn can_play_natively(&self, kind: SourceKind) -> bool;

    /// Start delivering events tagged with `attachment`
    fn bind(&mut self, attachment: AttachmentId);

    /// Point the sink directly at a resource
    fn load_native(&mut self, url: &str);

    /// Request playback; the outcome arrives as `PlayResolved`/`PlayRejected`
    fn play(&mut self, token: PlayToken);

    fn pause(&mut self);

    fn seek_to(&mut self, time: f64);

    /// Effective output volume in [0, 1]
    fn set_volume(&mut self, volume: f64);

    fn set_playback_rate(&mut self, rate: f64);

    /// Currently buffered intervals in seconds, in sink order
    fn buffered(&self) -> Vec<(f64, f64)>;

    /// Stop event delivery and release the current resource
    fn detach(&mut self);
}
