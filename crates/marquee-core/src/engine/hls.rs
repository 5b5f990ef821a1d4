//! Native HLS manifest engine
//!
//! Fetches the multivariant playlist with reqwest and reports its levels
//! through the engine event contract. Segment delivery is left to the sink,
//! which makes this engine suitable for headless hosts and stream probing.

use super::{
    AdaptiveEngine, EngineErrorKind, EngineEvent, EngineFactory, EngineLevel, EngineListener,
    ListenerId,
};
use crate::{source::SourceKind, Error, Result};
use m3u8_rs::Playlist;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

type Listeners = Arc<Mutex<HashMap<ListenerId, EngineListener>>>;

/// HLS engine backed by reqwest and m3u8-rs
pub struct HlsManifestEngine {
    client: Client,
    listeners: Listeners,
    next_listener: u64,
    levels: Arc<Mutex<Vec<EngineLevel>>>,
    current_level: i32,
    source: Option<String>,
    task: Option<JoinHandle<()>>,
}

impl HlsManifestEngine {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: 1,
            levels: Arc::new(Mutex::new(Vec::new())),
            current_level: -1,
            source: None,
            task: None,
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn emit(listeners: &Listeners, event: EngineEvent) {
    // Callbacks run outside the lock so they may (un)subscribe
    let snapshot: Vec<EngineListener> = listeners
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .cloned()
        .collect();
    for listener in snapshot {
        listener(event.clone());
    }
}

/// Parse a playlist into engine levels. A media playlist yields one level.
pub fn parse_levels(content: &[u8]) -> Result<Vec<EngineLevel>> {
    let playlist = m3u8_rs::parse_playlist_res(content)
        .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS playlist: {:?}", e)))?;

    match playlist {
        Playlist::MasterPlaylist(master) => {
            let levels: Vec<EngineLevel> = master
                .variants
                .iter()
                .filter(|variant| !variant.is_i_frame)
                .enumerate()
                .map(|(idx, variant)| EngineLevel {
                    index: idx as i32,
                    height: variant.resolution.as_ref().map(|r| r.height as u32).unwrap_or(0),
                    bitrate: variant.bandwidth,
                })
                .collect();
            if levels.is_empty() {
                return Err(Error::ManifestParse("multivariant playlist has no variants".into()));
            }
            Ok(levels)
        }
        Playlist::MediaPlaylist(_) => Ok(vec![EngineLevel {
            index: 0,
            height: 0,
            bitrate: 0,
        }]),
    }
}

async fn fetch_levels(client: &Client, url: Url) -> std::result::Result<Vec<EngineLevel>, EngineEvent> {
    let network = |e: reqwest::Error| EngineEvent::Error {
        kind: EngineErrorKind::Network,
        fatal: true,
        details: Error::Http(e).to_string(),
    };

    let response = client.get(url).send().await.map_err(network)?;
    let response = response.error_for_status().map_err(network)?;
    let body = response.bytes().await.map_err(network)?;

    parse_levels(&body).map_err(|e| EngineEvent::Error {
        kind: EngineErrorKind::Media,
        fatal: true,
        details: e.to_string(),
    })
}

impl<S: ?Sized> AdaptiveEngine<S> for HlsManifestEngine {
    fn attach_media(&mut self, _sink: &S) {}

    fn load_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
        <Self as AdaptiveEngine<S>>::start_load(self);
    }

    fn subscribe(&mut self, listener: EngineListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, listener);
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn levels(&self) -> Vec<EngineLevel> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn current_level(&self) -> i32 {
        self.current_level
    }

    fn set_level(&mut self, index: i32) {
        self.current_level = index;
        emit(&self.listeners, EngineEvent::LevelSwitched { level: index });
    }

    #[instrument(skip(self))]
    fn start_load(&mut self) {
        self.abort_task();

        let Some(source) = self.source.clone() else {
            return;
        };
        let url = match Url::parse(&source) {
            Ok(url) => url,
            Err(e) => {
                emit(
                    &self.listeners,
                    EngineEvent::Error {
                        kind: EngineErrorKind::Other,
                        fatal: true,
                        details: format!("cannot fetch {}: {}", source, e),
                    },
                );
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, manifest not fetched");
            emit(
                &self.listeners,
                EngineEvent::Error {
                    kind: EngineErrorKind::Other,
                    fatal: true,
                    details: "no async runtime available".into(),
                },
            );
            return;
        };

        let client = self.client.clone();
        let listeners = Arc::clone(&self.listeners);
        let levels = Arc::clone(&self.levels);

        debug!(url = %url, "Fetching HLS manifest");
        self.task = Some(runtime.spawn(async move {
            match fetch_levels(&client, url).await {
                Ok(parsed) => {
                    *levels.lock().unwrap_or_else(PoisonError::into_inner) = parsed.clone();
                    emit(&listeners, EngineEvent::ManifestParsed { levels: parsed });
                }
                Err(event) => emit(&listeners, event),
            }
        }));
    }

    fn recover_media_error(&mut self) {
        <Self as AdaptiveEngine<S>>::start_load(self);
    }

    fn destroy(&mut self) {
        self.abort_task();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.source = None;
        debug!("HLS engine destroyed");
    }
}

/// Factory producing [`HlsManifestEngine`]s that share one HTTP client
#[derive(Clone)]
pub struct HlsManifestEngineFactory {
    client: Client,
}

impl HlsManifestEngineFactory {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl<S: ?Sized> EngineFactory<S> for HlsManifestEngineFactory {
    fn is_supported(&self, kind: SourceKind) -> bool {
        kind == SourceKind::Hls
    }

    fn create(&self) -> Box<dyn AdaptiveEngine<S>> {
        Box::new(HlsManifestEngine::new(self.client.clone()))
    }
}
