//! Error types for Marquee Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("Invalid source locator: {0}")]
    Resolution(String),

    #[error("No native or adaptive playback path for {url}")]
    EngineUnsupported { url: String },

    // Streaming errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Network error after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Media error: {0}")]
    Media(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    #[cfg(feature = "hls")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Engine lifecycle errors
    #[error("An engine is already attached; dispose it before attaching another")]
    EngineBusy,

    #[error("Unknown quality level: {0}")]
    UnknownQualityLevel(i32),

    // Playback errors
    #[error("Invalid playback rate: {0}")]
    InvalidPlaybackRate(f64),

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration: {0}")]
    Config(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// User-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad or empty source locator
    Resolution,
    /// Neither native nor adaptive playback is available
    EngineUnsupported,
    /// Manifest or segment fetch failure
    Network,
    /// Decode or format failure
    Media,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Resolution => write!(f, "resolution"),
            ErrorKind::EngineUnsupported => write!(f, "engine-unsupported"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Media => write!(f, "media"),
        }
    }
}

impl Error {
    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Media(_))
    }

    /// Map onto the user-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolution(_) => ErrorKind::Resolution,
            Error::EngineUnsupported { .. } => ErrorKind::EngineUnsupported,
            Error::Network(_) | Error::RetriesExhausted { .. } => ErrorKind::Network,
            #[cfg(feature = "hls")]
            Error::Http(_) => ErrorKind::Network,
            _ => ErrorKind::Media,
        }
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Resolution(_) => "RESOLUTION",
            Error::EngineUnsupported { .. } => "ENGINE_UNSUPPORTED",
            Error::Network(_) => "NETWORK",
            Error::RetriesExhausted { .. } => "NETWORK_EXHAUSTED",
            Error::Media(_) => "MEDIA",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            #[cfg(feature = "hls")]
            Error::Http(_) => "HTTP",
            Error::EngineBusy => "ENGINE_BUSY",
            Error::UnknownQualityLevel(_) => "UNKNOWN_LEVEL",
            Error::InvalidPlaybackRate(_) => "INVALID_RATE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Config(_) => "CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

/// Serializable error record surfaced in the player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub fatal: bool,
}

impl From<&Error> for ErrorInfo {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            fatal: !error.is_recoverable(),
        }
    }
}
