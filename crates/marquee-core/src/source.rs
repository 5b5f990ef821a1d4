//! Source locator validation
//!
//! The player receives one already-resolved locator from its host. This
//! module only checks that it is usable before any engine attachment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Source container types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// HLS playlist (`.m3u8`)
    Hls,
    /// DASH manifest (`.mpd`)
    Dash,
    /// Single progressive file
    Progressive,
}

impl SourceKind {
    /// MIME type used to check native support
    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceKind::Hls => "application/vnd.apple.mpegurl",
            SourceKind::Dash => "application/dash+xml",
            SourceKind::Progressive => "video/mp4",
        }
    }

    pub fn is_adaptive(&self) -> bool {
        !matches!(self, SourceKind::Progressive)
    }
}

/// A validated media locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLocator {
    /// Absolute URL
    Absolute(Url),
    /// Path relative to the embedding page's origin
    RootRelative(String),
}

const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "blob", "file"];

impl SourceLocator {
    /// Validate a raw locator
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Resolution("empty locator".into()));
        }

        if trimmed.starts_with('/') {
            if trimmed.starts_with("//") {
                return Err(Error::Resolution(format!(
                    "protocol-relative locator not accepted: {}",
                    trimmed
                )));
            }
            return Ok(SourceLocator::RootRelative(trimmed.to_string()));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| Error::Resolution(format!("{}: {}", trimmed, e)))?;
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(Error::Resolution(format!("unsupported scheme: {}", url.scheme())));
        }
        Ok(SourceLocator::Absolute(url))
    }

    /// Locator as handed to the sink or engine
    pub fn as_str(&self) -> &str {
        match self {
            SourceLocator::Absolute(url) => url.as_str(),
            SourceLocator::RootRelative(path) => path,
        }
    }

    /// Detect the container from the path extension
    pub fn kind(&self) -> SourceKind {
        let path = match self {
            SourceLocator::Absolute(url) => url.path().to_lowercase(),
            SourceLocator::RootRelative(path) => {
                let end = path.find(['?', '#']).unwrap_or(path.len());
                path[..end].to_lowercase()
            }
        };

        if path.ends_with(".m3u8") || path.ends_with(".m3u") {
            SourceKind::Hls
        } else if path.ends_with(".mpd") {
            SourceKind::Dash
        } else {
            SourceKind::Progressive
        }
    }

    /// Join a root-relative locator onto an origin
    pub fn resolve(&self, origin: &Url) -> Result<Url> {
        match self {
            SourceLocator::Absolute(url) => Ok(url.clone()),
            SourceLocator::RootRelative(path) => origin
                .join(path)
                .map_err(|e| Error::Resolution(format!("{}: {}", path, e))),
        }
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
