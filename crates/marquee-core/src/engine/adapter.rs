//! Streaming engine adapter
//!
//! Handles:
//! - Native vs adaptive playback path selection
//! - Engine creation, listener registration and disposal
//! - Quality level enumeration and switching
//! - Error translation, network backoff and media recovery

use super::{
    AdaptiveEngine, BackoffPolicy, EngineErrorKind, EngineEvent, EngineFactory, EngineLevel,
    ListenerId,
};
use crate::{
    config::PlayerConfig,
    event::{Envelope, EventSender},
    media::MediaSink,
    source::SourceLocator,
    timer::{CancellableTimer, Scheduler, TimerId, TimerKind},
    types::{AttachmentId, QualityLevel},
    Error, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How the current source is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPath {
    /// The sink plays the resource directly
    Native,
    /// An adaptive engine feeds the sink
    Adaptive,
}

/// Result of handling an engine event or timer
#[derive(Debug)]
pub enum AdapterOutcome {
    /// Nothing the controller needs to know about
    Ignored,
    LevelsUpdated,
    LevelSwitched(i32),
    RetryScheduled { attempt: u32, delay: Duration },
    /// Engine-level media recovery was requested
    Recovering,
    /// Unrecoverable; the controller must enter the errored phase
    Fatal(Error),
}

struct LiveEngine<S: ?Sized> {
    engine: Box<dyn AdaptiveEngine<S>>,
    listener: ListenerId,
    attachment: AttachmentId,
}

/// Owns the adaptive engine lifecycle for one player
pub struct StreamingEngineAdapter<S: ?Sized> {
    factory: Box<dyn EngineFactory<S>>,
    live: Option<LiveEngine<S>>,
    path: Option<PlaybackPath>,
    levels: Vec<QualityLevel>,
    selected: i32,
    active_level: Option<i32>,
    backoff: BackoffPolicy,
    failures: u32,
    last_network_error: Option<String>,
    retry_timer: CancellableTimer,
    media_recoveries: u32,
    max_media_recoveries: u32,
    /// Set once a fatal error was reported; later engine errors are ignored
    halted: bool,
}

impl<S: MediaSink + ?Sized> StreamingEngineAdapter<S> {
    pub fn new(factory: Box<dyn EngineFactory<S>>, config: &PlayerConfig) -> Self {
        Self {
            factory,
            live: None,
            path: None,
            levels: vec![QualityLevel::AUTO],
            selected: QualityLevel::AUTO.index,
            active_level: None,
            backoff: BackoffPolicy::from(&config.retry),
            failures: 0,
            last_network_error: None,
            retry_timer: CancellableTimer::new(TimerKind::RetryBackoff),
            media_recoveries: 0,
            max_media_recoveries: config.media_recovery_attempts,
            halted: false,
        }
    }

    /// Attach a source to the sink.
    ///
    /// Fails with [`Error::EngineBusy`] while a previous attachment is still
    /// live; callers must [`dispose`](Self::dispose) first.
    #[instrument(skip(self, sink, tx), fields(source = %locator))]
    pub fn attach(
        &mut self,
        locator: &SourceLocator,
        sink: &mut S,
        attachment: AttachmentId,
        tx: &EventSender,
    ) -> Result<PlaybackPath> {
        if self.path.is_some() {
            return Err(Error::EngineBusy);
        }

        let kind = locator.kind();

        if sink.can_play_natively(kind) {
            sink.load_native(locator.as_str());
            self.path = Some(PlaybackPath::Native);
            info!(kind = ?kind, "Playing natively, adaptive engine bypassed");
            return Ok(PlaybackPath::Native);
        }

        if !self.factory.is_supported(kind) {
            return Err(Error::EngineUnsupported {
                url: locator.to_string(),
            });
        }

        let mut engine = self.factory.create();
        let tx = tx.clone();
        let listener = engine.subscribe(Arc::new(move |event| {
            // A closed inbox means the session is gone
            let _ = tx.send(Envelope::engine(attachment, event));
        }));
        engine.attach_media(sink);
        engine.load_source(locator.as_str());

        self.live = Some(LiveEngine {
            engine,
            listener,
            attachment,
        });
        self.path = Some(PlaybackPath::Adaptive);
        info!(kind = ?kind, attachment = %attachment, "Adaptive engine attached");

        Ok(PlaybackPath::Adaptive)
    }

    /// Handle an event from the live engine
    pub fn on_engine_event(&mut self, event: EngineEvent, scheduler: &mut dyn Scheduler) -> AdapterOutcome {
        match event {
            EngineEvent::ManifestParsed { levels } => {
                self.levels = build_quality_levels(&levels);
                self.selected = QualityLevel::AUTO.index;
                self.reset_failures();
                info!(levels = self.levels.len() - 1, "Manifest parsed");
                AdapterOutcome::LevelsUpdated
            }
            EngineEvent::LevelSwitched { level } => {
                self.active_level = Some(level);
                debug!(level, "Level switched");
                AdapterOutcome::LevelSwitched(level)
            }
            EngineEvent::FragmentLoaded => {
                self.reset_failures();
                AdapterOutcome::Ignored
            }
            EngineEvent::Error { kind, fatal, details } => {
                if self.halted {
                    debug!(details = %details, "Engine error after fatal failure ignored");
                    return AdapterOutcome::Ignored;
                }
                if !fatal {
                    debug!(kind = ?kind, details = %details, "Non-fatal engine error");
                    return AdapterOutcome::Ignored;
                }
                let outcome = match kind {
                    EngineErrorKind::Network => self.on_network_failure(details, scheduler),
                    EngineErrorKind::Media => self.on_media_failure(details),
                    EngineErrorKind::Other => AdapterOutcome::Fatal(Error::Media(details)),
                };
                if matches!(outcome, AdapterOutcome::Fatal(_)) {
                    self.halted = true;
                }
                outcome
            }
        }
    }

    fn on_network_failure(&mut self, details: String, scheduler: &mut dyn Scheduler) -> AdapterOutcome {
        self.failures += 1;
        let attempt = self.failures;

        match self.backoff.next_delay(attempt) {
            Some(delay) => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    details = %details,
                    "Network failure, retrying"
                );
                self.last_network_error = Some(details);
                self.retry_timer.arm(scheduler, delay);
                AdapterOutcome::RetryScheduled { attempt, delay }
            }
            None => {
                warn!(attempts = attempt, details = %details, "Network retries exhausted");
                self.retry_timer.cancel(scheduler);
                AdapterOutcome::Fatal(Error::RetriesExhausted {
                    attempts: attempt,
                    last: details,
                })
            }
        }
    }

    fn on_media_failure(&mut self, details: String) -> AdapterOutcome {
        match self.live.as_mut() {
            Some(live) if self.media_recoveries < self.max_media_recoveries => {
                self.media_recoveries += 1;
                warn!(attempt = self.media_recoveries, details = %details, "Media error, attempting recovery");
                live.engine.recover_media_error();
                AdapterOutcome::Recovering
            }
            _ => AdapterOutcome::Fatal(Error::Media(details)),
        }
    }

    fn reset_failures(&mut self) {
        if self.failures > 0 {
            debug!(failures = self.failures, "Network recovered");
        }
        self.failures = 0;
        self.last_network_error = None;
    }

    /// Handle a fired timer; returns false if it was not ours or stale
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        if !self.retry_timer.fire(id) {
            return false;
        }
        if let Some(live) = self.live.as_mut() {
            info!(
                attempt = self.failures + 1,
                last_error = self.last_network_error.as_deref().unwrap_or(""),
                "Restarting load"
            );
            live.engine.start_load();
        }
        true
    }

    /// Select a quality level; `-1` re-enables automatic selection
    pub fn set_quality(&mut self, index: i32) -> Result<()> {
        if !self.levels.iter().any(|level| level.index == index) {
            return Err(Error::UnknownQualityLevel(index));
        }
        if let Some(live) = self.live.as_mut() {
            live.engine.set_level(index);
        }
        self.selected = index;
        info!(level = index, "Quality selected");
        Ok(())
    }

    /// Release the engine and all of its listeners. Idempotent.
    #[instrument(skip(self, scheduler))]
    pub fn dispose(&mut self, scheduler: &mut dyn Scheduler) {
        self.retry_timer.cancel(scheduler);

        if let Some(mut live) = self.live.take() {
            live.engine.unsubscribe(live.listener);
            live.engine.destroy();
            info!(attachment = %live.attachment, "Adaptive engine disposed");
        }

        self.path = None;
        self.levels = vec![QualityLevel::AUTO];
        self.selected = QualityLevel::AUTO.index;
        self.active_level = None;
        self.failures = 0;
        self.last_network_error = None;
        self.media_recoveries = 0;
        self.halted = false;
    }

    /// Available levels, auto first, then descending by height
    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    /// Selected level index, `-1` for auto
    pub fn selected_quality(&self) -> i32 {
        self.selected
    }

    /// Level the engine is currently playing, if reported
    pub fn active_level(&self) -> Option<i32> {
        self.active_level
    }

    pub fn path(&self) -> Option<PlaybackPath> {
        self.path
    }

    pub fn has_live_engine(&self) -> bool {
        self.live.is_some()
    }
}

/// Sort engine levels by descending height and prepend the auto level
pub fn build_quality_levels(levels: &[EngineLevel]) -> Vec<QualityLevel> {
    let mut quality: Vec<QualityLevel> = levels
        .iter()
        .filter(|level| level.index != QualityLevel::AUTO.index)
        .map(|level| QualityLevel::new(level.index, level.height))
        .collect();
    quality.sort_by(|a, b| b.height_px.cmp(&a.height_px).then(a.index.cmp(&b.index)));
    quality.insert(0, QualityLevel::AUTO);
    quality
}
