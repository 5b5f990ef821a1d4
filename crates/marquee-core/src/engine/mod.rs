//! Adaptive-bitrate engine boundary and lifecycle
//!
//! The engine itself (hls.js in the browser, [`HlsManifestEngine`] natively)
//! lives behind [`AdaptiveEngine`]. [`StreamingEngineAdapter`] owns its
//! lifecycle: one live instance at most, listeners released on dispose,
//! engine errors translated and retried before they reach the controller.

mod adapter;
#[cfg(feature = "hls")]
mod hls;
mod retry;

pub use adapter::{build_quality_levels, AdapterOutcome, PlaybackPath, StreamingEngineAdapter};
#[cfg(feature = "hls")]
pub use hls::{parse_levels, HlsManifestEngine, HlsManifestEngineFactory};
pub use retry::BackoffPolicy;

use crate::source::SourceKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Handle returned by [`AdaptiveEngine::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Callback receiving engine events
pub type EngineListener = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// One rendition as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLevel {
    /// Engine-side level index
    pub index: i32,
    /// Vertical resolution, 0 when unknown
    pub height: u32,
    /// Advertised bandwidth in bits per second
    pub bitrate: u64,
}

/// Engine error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineErrorKind {
    /// Manifest or segment fetch failure
    Network,
    /// Parse, demux or decode failure
    Media,
    Other,
}

/// Events emitted by an adaptive engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    ManifestParsed { levels: Vec<EngineLevel> },
    LevelSwitched { level: i32 },
    FragmentLoaded,
    Error {
        kind: EngineErrorKind,
        /// The engine has given up on its own recovery
        fatal: bool,
        details: String,
    },
}

/// Capabilities required from an adaptive-bitrate engine
pub trait AdaptiveEngine<S: ?Sized> {
    /// Bind the engine to the media sink
    fn attach_media(&mut self, sink: &S);

    /// Request the manifest and start loading
    fn load_source(&mut self, url: &str);

    fn subscribe(&mut self, listener: EngineListener) -> ListenerId;

    fn unsubscribe(&mut self, id: ListenerId);

    fn levels(&self) -> Vec<EngineLevel>;

    /// Level currently being played, `-1` when automatic
    fn current_level(&self) -> i32;

    /// Pin a level, or `-1` to re-enable automatic selection
    fn set_level(&mut self, index: i32);

    /// Restart loading after a network failure
    fn start_load(&mut self);

    /// Engine-level recovery after a media failure
    fn recover_media_error(&mut self);

    /// Release network and decoder resources
    fn destroy(&mut self);
}

/// Creates engine instances for the adapter
pub trait EngineFactory<S: ?Sized> {
    /// Whether this environment can play `kind` through the engine
    fn is_supported(&self, kind: SourceKind) -> bool;

    fn create(&self) -> Box<dyn AdaptiveEngine<S>>;
}

/// Factory for hosts without any adaptive engine
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEngine;

impl<S: ?Sized> EngineFactory<S> for NoEngine {
    fn is_supported(&self, _kind: SourceKind) -> bool {
        false
    }

    fn create(&self) -> Box<dyn AdaptiveEngine<S>> {
        Box::new(NoEngine)
    }
}

impl<S: ?Sized> AdaptiveEngine<S> for NoEngine {
    fn attach_media(&mut self, _sink: &S) {}
    fn load_source(&mut self, _url: &str) {}
    fn subscribe(&mut self, _listener: EngineListener) -> ListenerId {
        ListenerId(0)
    }
    fn unsubscribe(&mut self, _id: ListenerId) {}
    fn levels(&self) -> Vec<EngineLevel> {
        Vec::new()
    }
    fn current_level(&self) -> i32 {
        -1
    }
    fn set_level(&mut self, _index: i32) {}
    fn start_load(&mut self) {}
    fn recover_media_error(&mut self) {}
    fn destroy(&mut self) {}
}
