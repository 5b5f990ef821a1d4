//! Player Session - Main orchestrator for playback
//!
//! Coordinates:
//! - Source attachment and disposal
//! - Routing of commands, sink events, engine events and timers
//! - Stale attachment filtering
//! - State broadcasting

use crate::{
    buffer::BufferTracker,
    config::PlayerConfig,
    controller::PlaybackController,
    controls::Command,
    engine::{AdapterOutcome, EngineEvent, EngineFactory, PlaybackPath, StreamingEngineAdapter},
    event::{Envelope, EventReceiver, EventSender},
    filter::{DisplayFilterController, FilterDescriptor},
    media::{MediaEvent, MediaSink},
    source::SourceLocator,
    timer::{Scheduler, TimerId, TimerKind},
    types::*,
    visibility::VisibilityManager,
    Result,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Player session managing one player component
pub struct PlayerSession<S: MediaSink> {
    /// Unique session ID
    id: SessionId,
    /// Session configuration
    config: PlayerConfig,
    /// The host's media element
    sink: S,
    /// Adaptive engine lifecycle
    adapter: StreamingEngineAdapter<S>,
    /// Playback state machine
    controller: PlaybackController,
    /// Buffered intervals for the buffering bar
    buffer: BufferTracker,
    /// Controls auto-hide and settings panel
    visibility: VisibilityManager,
    /// Brightness, contrast, saturation and fit
    filters: DisplayFilterController,
    scheduler: Box<dyn Scheduler>,
    /// Attachment whose events are currently accepted
    attachment: Option<AttachmentId>,
    next_attachment: u64,
    /// Inbox sender handed to engine listeners
    tx: EventSender,
    /// State change broadcaster
    state_tx: watch::Sender<PlayerState>,
}

impl<S: MediaSink> PlayerSession<S> {
    /// Create a new player session.
    ///
    /// `tx` must feed the inbox this session is driven from; engine
    /// listeners post their events through it.
    pub fn new(
        config: PlayerConfig,
        sink: S,
        factory: Box<dyn EngineFactory<S>>,
        scheduler: Box<dyn Scheduler>,
        tx: EventSender,
    ) -> Result<Self> {
        config.validate()?;

        let controller = PlaybackController::new(config.initial_volume);
        let (state_tx, _) = watch::channel(controller.state().clone());
        let id = SessionId::new();
        info!(session_id = %id, "Player session created");

        Ok(Self {
            id,
            adapter: StreamingEngineAdapter::new(factory, &config),
            controller,
            buffer: BufferTracker::new(),
            visibility: VisibilityManager::new(config.controls_hide_delay()),
            filters: DisplayFilterController::with_bounds(config.filter_bounds),
            config,
            sink,
            scheduler,
            attachment: None,
            next_attachment: 0,
            tx,
            state_tx,
        })
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> &PlayerState {
        self.controller.state()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.controller.phase()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current attachment, `None` when idle or torn down
    pub fn attachment(&self) -> Option<AttachmentId> {
        self.attachment
    }

    pub fn playback_path(&self) -> Option<PlaybackPath> {
        self.adapter.path()
    }

    /// Quality levels, auto first then descending by height
    pub fn quality_levels(&self) -> &[QualityLevel] {
        self.adapter.levels()
    }

    pub fn selected_quality(&self) -> i32 {
        self.adapter.selected_quality()
    }

    pub fn buffered(&self) -> Arc<[BufferRange]> {
        self.buffer.ranges()
    }

    pub fn buffered_ahead(&self) -> f64 {
        self.buffer.buffered_ahead(self.controller.state().current_time)
    }

    /// Whether a seek to `time` would land in buffered media
    pub fn is_buffered(&self, time: f64) -> bool {
        self.buffer.contains(time)
    }

    pub fn total_buffered(&self) -> f64 {
        self.buffer.total_buffered()
    }

    pub fn controls_visible(&self) -> bool {
        self.visibility.controls_visible()
    }

    pub fn settings(&self) -> SettingsPanelState {
        self.visibility.settings()
    }

    pub fn filter(&self) -> FilterDescriptor {
        self.filters.descriptor()
    }

    pub fn filter_state(&self) -> &FilterState {
        self.filters.state()
    }

    /// CSS `object-fit` for the video element
    pub fn object_fit(&self) -> &'static str {
        self.filters.object_fit()
    }

    /// Load content, replacing whatever was attached before
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn load(&mut self, raw: &str) -> Result<()> {
        self.detach_current();
        self.controller.reset(self.config.initial_volume);
        self.buffer.clear();

        let locator = match SourceLocator::parse(raw) {
            Ok(locator) => locator,
            Err(e) => {
                self.controller.fail(&e);
                self.publish();
                return Err(e);
            }
        };

        self.next_attachment += 1;
        let attachment = AttachmentId(self.next_attachment);
        self.sink.bind(attachment);
        self.attachment = Some(attachment);

        self.controller.begin_loading()?;
        self.controller.apply_to_sink(&mut self.sink);
        info!(source = %locator, attachment = %attachment, "Loading content");

        match self.adapter.attach(&locator, &mut self.sink, attachment, &self.tx) {
            Ok(path) => {
                debug!(path = ?path, "Source attached");
                self.publish();
                Ok(())
            }
            Err(e) => {
                self.controller.fail(&e);
                self.publish();
                Err(e)
            }
        }
    }

    /// Release the engine, the sink and every timer, returning to idle
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn teardown(&mut self) {
        self.detach_current();
        self.visibility.cancel(self.scheduler.as_mut());
        self.buffer.clear();
        self.controller.reset(self.config.initial_volume);
        self.publish();
        info!("Session torn down");
    }

    fn detach_current(&mut self) {
        self.adapter.dispose(self.scheduler.as_mut());
        if let Some(attachment) = self.attachment.take() {
            self.sink.detach();
            debug!(attachment = %attachment, "Sink detached");
        }
    }

    /// Apply a user command
    pub fn command(&mut self, command: Command) -> Result<()> {
        self.dispatch(Envelope::Command(command))
    }

    /// Process one inbox entry to completion and publish the result
    pub fn dispatch(&mut self, envelope: Envelope) -> Result<()> {
        let result = match envelope {
            Envelope::Command(command) => self.apply_command(command),
            Envelope::Media { attachment, event } => {
                if self.is_current(attachment) {
                    self.on_media_event(event);
                } else {
                    debug!(attachment = %attachment, event = event.name(), "Dropping event for stale attachment");
                }
                Ok(())
            }
            Envelope::Engine { attachment, event } => {
                if self.is_current(attachment) {
                    self.on_engine_event(event);
                } else {
                    debug!(attachment = %attachment, "Dropping engine event for stale attachment");
                }
                Ok(())
            }
            Envelope::Timer(id) => {
                self.on_timer(id);
                Ok(())
            }
            Envelope::Shutdown => {
                self.teardown();
                Ok(())
            }
        };
        self.publish();
        result
    }

    /// Process everything already queued in `rx` without waiting.
    /// Returns the number of envelopes handled.
    pub fn drain(&mut self, rx: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(envelope) = rx.try_recv() {
            if let Err(e) = self.dispatch(envelope) {
                warn!(error = %e, "Command failed");
            }
            handled += 1;
        }
        handled
    }

    fn is_current(&self, attachment: AttachmentId) -> bool {
        self.attachment == Some(attachment)
    }

    fn apply_command(&mut self, command: Command) -> Result<()> {
        let sink = &mut self.sink;
        let scheduler = self.scheduler.as_mut();

        match command {
            Command::Load(raw) => return self.load(&raw),
            Command::Teardown => self.teardown(),

            Command::Play => {
                self.controller.play(sink);
            }
            Command::Pause => self.controller.pause(sink),
            Command::TogglePlay => self.controller.toggle_play(sink),
            Command::Seek(time) => {
                self.controller.seek(time, sink);
            }
            Command::SeekRelative(delta) => {
                self.controller.seek_relative(delta, sink);
            }
            Command::SeekFraction(fraction) => {
                self.controller.seek_fraction(fraction, sink);
            }
            Command::StepForward => {
                self.controller.seek_relative(self.config.seek_step_secs, sink);
            }
            Command::StepBackward => {
                self.controller.seek_relative(-self.config.seek_step_secs, sink);
            }

            Command::SetVolume(volume) => self.controller.set_volume(volume, sink),
            Command::ToggleMute => self.controller.toggle_mute(sink),
            Command::SetSpeed(rate) => return self.controller.set_speed(rate, sink),
            Command::SetQuality(index) => return self.adapter.set_quality(index),

            Command::SetBrightness(percent) => {
                self.filters.set_brightness(percent);
            }
            Command::SetContrast(percent) => {
                self.filters.set_contrast(percent);
            }
            Command::SetSaturation(percent) => {
                self.filters.set_saturation(percent);
            }
            Command::SetFit(fit) => self.filters.set_fit(fit),
            Command::ToggleFit => {
                self.filters.toggle_fit();
            }
            Command::ResetFilters => {
                self.filters.reset();
            }

            Command::ToggleSettings => self.visibility.toggle_settings(scheduler),
            Command::OpenSettings(tab) => self.visibility.open_settings(tab, scheduler),
            Command::CloseSettings => self.visibility.close_settings(scheduler),
            Command::SelectSettingsTab(tab) => self.visibility.select_tab(tab),
            Command::PointerActivity => self.visibility.on_activity(scheduler),
            Command::PointerLeave => self.visibility.on_pointer_leave(scheduler),
        }
        Ok(())
    }

    fn on_media_event(&mut self, event: MediaEvent) {
        let was_playing = self.controller.state().is_playing;
        let refresh_buffer = matches!(
            event,
            MediaEvent::Progress
                | MediaEvent::TimeUpdate { .. }
                | MediaEvent::LoadedMetadata { .. }
                | MediaEvent::Seeked { .. }
        );

        self.controller.on_media_event(event);

        if refresh_buffer && self.controller.phase() != PlaybackPhase::Errored {
            self.buffer.update(self.sink.buffered());
        }
        if !was_playing && self.controller.state().is_playing {
            self.visibility.on_playback_resumed(self.scheduler.as_mut());
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match self.adapter.on_engine_event(event, self.scheduler.as_mut()) {
            AdapterOutcome::Fatal(error) => self.controller.fail(&error),
            AdapterOutcome::RetryScheduled { attempt, delay } => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Engine retry pending");
            }
            AdapterOutcome::Ignored
            | AdapterOutcome::LevelsUpdated
            | AdapterOutcome::LevelSwitched(_)
            | AdapterOutcome::Recovering => {}
        }
    }

    fn on_timer(&mut self, id: TimerId) {
        let handled = match id.kind {
            TimerKind::ControlsHide => self.visibility.on_timer(id, self.controller.state().is_playing),
            TimerKind::RetryBackoff => self.adapter.on_timer(id),
        };
        if !handled {
            debug!(kind = ?id.kind, generation = id.generation, "Timer dropped");
        }
    }

    fn publish(&self) {
        let state = self.controller.state();
        self.state_tx.send_if_modified(|current| {
            if *current != *state {
                *current = state.clone();
                true
            } else {
                false
            }
        });
    }
}

impl<S: MediaSink> Drop for PlayerSession<S> {
    fn drop(&mut self) {
        self.detach_current();
        self.visibility.cancel(self.scheduler.as_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{EngineErrorKind, EngineLevel},
        event,
        media::PlayToken,
        source::SourceKind,
        testing::{ManualScheduler, MockEngineFactory, MockSink},
        Error, ErrorKind,
    };
    use std::time::Duration;

    struct Harness {
        session: PlayerSession<MockSink>,
        sink: MockSink,
        factory: MockEngineFactory,
        scheduler: ManualScheduler,
        rx: EventReceiver,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, rx) = event::channel();
            let sink = MockSink::new();
            let factory = MockEngineFactory::new();
            let scheduler = ManualScheduler::new();
            let session = PlayerSession::new(
                PlayerConfig::default(),
                sink.clone(),
                Box::new(factory.clone()),
                Box::new(scheduler.clone()),
                tx,
            )
            .unwrap();
            Self {
                session,
                sink,
                factory,
                scheduler,
                rx,
            }
        }

        fn media(&mut self, event: MediaEvent) {
            let attachment = self.session.attachment().unwrap();
            self.session.dispatch(Envelope::media(attachment, event)).unwrap();
        }

        fn fire_due(&mut self, by: Duration) {
            for id in self.scheduler.advance(by) {
                self.session.dispatch(Envelope::Timer(id)).unwrap();
            }
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (tx, _rx) = event::channel();
        let config = PlayerConfig {
            initial_volume: 3.0,
            ..PlayerConfig::default()
        };
        let result = PlayerSession::new(
            config,
            MockSink::new(),
            Box::new(MockEngineFactory::new()),
            Box::new(ManualScheduler::new()),
            tx,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_resolution_error_attaches_nothing() {
        let mut h = Harness::new();

        let result = h.session.load("  ");
        assert!(matches!(result, Err(Error::Resolution(_))));

        let state = h.session.state();
        assert_eq!(state.phase, PlaybackPhase::Errored);
        assert_eq!(state.error.as_ref().unwrap().kind, ErrorKind::Resolution);
        assert_eq!(h.factory.created(), 0);
        assert!(h.sink.bound().is_none());
    }

    #[test]
    fn test_engine_unsupported_is_fatal() {
        let mut h = Harness::new();
        h.factory.set_supported(false);

        assert!(h.session.load("https://cdn.example.com/live.m3u8").is_err());
        assert_eq!(h.session.phase(), PlaybackPhase::Errored);
        assert_eq!(h.session.state().error.as_ref().unwrap().kind, ErrorKind::EngineUnsupported);
    }

    #[test]
    fn test_progressive_source_plays_natively() {
        let mut h = Harness::new();
        h.sink.set_native_support(SourceKind::Progressive, true);

        h.session.load("/media/trailer.mp4").unwrap();
        assert_eq!(h.session.playback_path(), Some(PlaybackPath::Native));
        assert_eq!(h.sink.native_source().as_deref(), Some("/media/trailer.mp4"));
        assert_eq!(h.factory.created(), 0);
    }

    #[test]
    fn test_engine_events_flow_through_inbox() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();

        h.factory.engine(0).emit(EngineEvent::ManifestParsed {
            levels: vec![
                EngineLevel { index: 0, height: 360, bitrate: 600_000 },
                EngineLevel { index: 1, height: 1080, bitrate: 6_000_000 },
            ],
        });
        assert_eq!(h.session.drain(&mut h.rx), 1);

        let labels: Vec<String> = h.session.quality_levels().iter().map(QualityLevel::label).collect();
        assert_eq!(labels, vec!["Auto", "1080p", "360p"]);

        h.session.command(Command::SetQuality(1)).unwrap();
        assert_eq!(h.factory.engine(0).current_level(), 1);
        assert!(h.session.command(Command::SetQuality(5)).is_err());
    }

    #[test]
    fn test_stale_attachment_events_dropped() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/a.m3u8").unwrap();
        let old = h.session.attachment().unwrap();
        h.session.load("https://cdn.example.com/b.m3u8").unwrap();

        h.session
            .dispatch(Envelope::media(old, MediaEvent::LoadedMetadata { duration: 99.0 }))
            .unwrap();
        h.session
            .dispatch(Envelope::engine(
                old,
                EngineEvent::Error {
                    kind: EngineErrorKind::Other,
                    fatal: true,
                    details: "old".into(),
                },
            ))
            .unwrap();

        assert_eq!(h.session.phase(), PlaybackPhase::Loading);
        assert_eq!(h.session.state().duration, 0.0);
    }

    #[test]
    fn test_volume_and_speed_applied_on_attach() {
        let mut h = Harness::new();
        h.session.command(Command::SetSpeed(1.5)).unwrap();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        assert_eq!(h.sink.playback_rate(), 1.0);
        assert_eq!(h.sink.volume(), 1.0);
    }

    #[test]
    fn test_step_commands_use_configured_step() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        h.media(MediaEvent::LoadedMetadata { duration: 100.0 });

        h.session.command(Command::StepForward).unwrap();
        h.session.command(Command::StepForward).unwrap();
        assert_eq!(h.session.state().current_time, 20.0);

        h.session.command(Command::StepBackward).unwrap();
        assert_eq!(h.sink.last_seek(), Some(10.0));
    }

    #[test]
    fn test_buffer_follows_sink() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        h.sink.set_buffered(vec![(0.0, 5.0), (5.0, 12.0), (30.0, 40.0)]);

        h.media(MediaEvent::Progress);
        assert_eq!(
            &*h.session.buffered(),
            &[BufferRange::new(0.0, 12.0), BufferRange::new(30.0, 40.0)]
        );
        assert_eq!(h.session.buffered_ahead(), 12.0);
        assert_eq!(h.session.total_buffered(), 22.0);
        assert!(h.session.is_buffered(35.0));
        assert!(!h.session.is_buffered(20.0));
    }

    #[test]
    fn test_controls_hide_only_while_playing() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        h.media(MediaEvent::LoadedMetadata { duration: 60.0 });

        h.session.command(Command::PointerActivity).unwrap();
        h.fire_due(Duration::from_secs(3));
        assert!(h.session.controls_visible());

        h.session.command(Command::Play).unwrap();
        let token: PlayToken = h.sink.play_requests()[0];
        h.media(MediaEvent::PlayResolved { token });
        assert_eq!(h.scheduler.pending_count(), 1);

        h.fire_due(Duration::from_secs(3));
        assert!(!h.session.controls_visible());
    }

    #[test]
    fn test_filter_commands() {
        let mut h = Harness::new();
        h.session.command(Command::SetBrightness(130.0)).unwrap();
        h.session.command(Command::SetContrast(500.0)).unwrap();
        h.session.command(Command::ToggleFit).unwrap();

        assert_eq!(h.session.filter().to_string(), "brightness(130%) contrast(200%) saturate(100%)");
        assert_eq!(h.session.object_fit(), "cover");

        h.session.command(Command::ResetFilters).unwrap();
        assert!(h.session.filter().is_identity());
    }

    #[test]
    fn test_state_published_on_change() {
        let mut h = Harness::new();
        let mut rx = h.session.subscribe_state();
        assert!(!rx.has_changed().unwrap());

        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, PlaybackPhase::Loading);

        // Settings changes do not touch PlayerState
        h.session.command(Command::ToggleSettings).unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        h.session.command(Command::PointerActivity).unwrap();
        let attachment = h.session.attachment().unwrap();

        h.session.command(Command::Teardown).unwrap();

        assert_eq!(h.factory.live_engines(), 0);
        assert_eq!(h.sink.detach_calls(), 1);
        assert_eq!(h.scheduler.pending_count(), 0);
        assert_eq!(h.session.phase(), PlaybackPhase::Idle);

        h.session
            .dispatch(Envelope::media(attachment, MediaEvent::Playing))
            .unwrap();
        assert!(!h.session.state().is_playing);
    }

    #[test]
    fn test_drop_disposes_engine() {
        let mut h = Harness::new();
        h.session.load("https://cdn.example.com/master.m3u8").unwrap();
        let factory = h.factory.clone();
        drop(h);
        assert_eq!(factory.live_engines(), 0);
    }
}
