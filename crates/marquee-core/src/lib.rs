//! Marquee Core - Video Player Library for Marquee
//!
//! This crate provides the embeddable core of the player:
//! - Playback state machine with race-free play requests
//! - Adaptive engine lifecycle, quality levels, retry and recovery
//! - Buffered range tracking for the buffering bar
//! - Controls auto-hide and the settings panel
//! - Display filters (brightness, contrast, saturation, fit)
//!
//! The host supplies the media element ([`MediaSink`]), the adaptive engine
//! ([`EngineFactory`]) and a timer source ([`Scheduler`]). Everything else is
//! plain state driven one [`Envelope`] at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Marquee Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   commands        sink events      engine events      timers    │
//! │      │                 │                 │               │      │
//! │      └─────────────────┴────────┬────────┴───────────────┘      │
//! │                                 │                               │
//! │                          ┌──────┴──────┐                        │
//! │                          │    Inbox    │                        │
//! │                          └──────┬──────┘                        │
//! │                          ┌──────┴──────┐                        │
//! │                          │   Player    │──── watch ──▶ state    │
//! │                          │   Session   │                        │
//! │                          └──────┬──────┘                        │
//! │         ┌──────────────┬────────┼────────┬──────────────┐       │
//! │  ┌──────┴──────┐ ┌─────┴─────┐ ┌┴──────┐ ┌┴──────────┐ ┌─┴────┐  │
//! │  │  Playback   │ │  Engine   │ │Buffer │ │Visibility │ │Filter│  │
//! │  │ Controller  │ │  Adapter  │ │Tracker│ │  Manager  │ │      │  │
//! │  └─────────────┘ └───────────┘ └───────┘ └───────────┘ └──────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod source;
pub mod media;
pub mod timer;
pub mod controls;
pub mod event;
pub mod engine;
pub mod controller;
pub mod buffer;
pub mod visibility;
pub mod filter;
pub mod session;
#[cfg(feature = "runtime")]
pub mod runtime;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{Error, ErrorInfo, ErrorKind, Result};
pub use types::*;
pub use config::{PlayerConfig, RetryConfig};
pub use source::{SourceKind, SourceLocator};
pub use media::{MediaEvent, MediaSink, PlayToken};
pub use timer::{CancellableTimer, Scheduler, TimerId, TimerKind};
pub use controls::Command;
pub use event::{Envelope, EventReceiver, EventSender};
pub use engine::{
    AdaptiveEngine, BackoffPolicy, EngineErrorKind, EngineEvent, EngineFactory, EngineLevel,
    EngineListener, ListenerId, NoEngine, PlaybackPath, StreamingEngineAdapter,
};
pub use controller::PlaybackController;
pub use buffer::BufferTracker;
pub use visibility::VisibilityManager;
pub use filter::{compose_filter, DisplayFilterController, FilterDescriptor};
pub use session::PlayerSession;
#[cfg(feature = "runtime")]
pub use runtime::{PlayerHandle, SessionDriver, TokioScheduler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Marquee Core initialized");
}
