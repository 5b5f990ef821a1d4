//! Integration tests for Marquee Core

use marquee_core::{
    event::{self, EventReceiver},
    testing::{ManualScheduler, MockEngineFactory, MockSink},
    BufferTracker, Command, EngineErrorKind, EngineEvent, EngineLevel, Envelope, Error, ErrorKind,
    MediaEvent, PlaybackPhase, PlayerConfig, PlayerSession, SettingsTab,
};
use std::time::Duration;

const MASTER: &str = "https://cdn.example.com/vod/master.m3u8";

struct Player {
    session: PlayerSession<MockSink>,
    sink: MockSink,
    factory: MockEngineFactory,
    scheduler: ManualScheduler,
    inbox: EventReceiver,
}

impl Player {
    fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    fn with_config(config: PlayerConfig) -> Self {
        let (tx, inbox) = event::channel();
        let sink = MockSink::new();
        let factory = MockEngineFactory::new();
        let scheduler = ManualScheduler::new();
        let session = PlayerSession::new(
            config,
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
            inbox,
        }
    }

    fn media(&mut self, event: MediaEvent) {
        let attachment = self.session.attachment().expect("no attachment");
        self.session.dispatch(Envelope::media(attachment, event)).unwrap();
    }

    /// Deliver whatever the engine posted to the inbox
    fn pump(&mut self) -> usize {
        self.session.drain(&mut self.inbox)
    }

    fn advance(&mut self, by: Duration) {
        for id in self.scheduler.advance(by) {
            self.session.dispatch(Envelope::Timer(id)).unwrap();
        }
    }

    fn load_ready(&mut self, duration: f64) {
        self.session.load(MASTER).unwrap();
        self.media(MediaEvent::LoadedMetadata { duration });
    }

    fn play(&mut self) {
        self.session.command(Command::Play).unwrap();
        let token = *self.sink.play_requests().last().unwrap();
        self.media(MediaEvent::PlayResolved { token });
    }
}

fn segment_failure() -> EngineEvent {
    EngineEvent::Error {
        kind: EngineErrorKind::Network,
        fatal: true,
        details: "fragLoadError".into(),
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_adaptive_load_then_play() {
    let mut player = Player::new();
    let mut phases = vec![player.session.phase()];

    player.session.load(MASTER).unwrap();
    phases.push(player.session.phase());

    player.factory.engine(0).emit(EngineEvent::ManifestParsed {
        levels: vec![
            EngineLevel { index: 0, height: 720, bitrate: 2_500_000 },
            EngineLevel { index: 1, height: 1080, bitrate: 5_000_000 },
        ],
    });
    player.pump();
    player.media(MediaEvent::LoadedMetadata { duration: 596.0 });
    phases.push(player.session.phase());

    player.play();
    phases.push(player.session.phase());

    assert_eq!(
        phases,
        vec![
            PlaybackPhase::Idle,
            PlaybackPhase::Loading,
            PlaybackPhase::Ready,
            PlaybackPhase::Playing
        ]
    );
    assert!(player.session.state().is_playing);
    assert!(!player.session.state().is_loading);
    assert_eq!(player.factory.engine(0).source().as_deref(), Some(MASTER));
    assert!(player.factory.engine(0).is_attached());
}

#[test]
fn test_invalid_locator_never_attaches() {
    for raw in ["", "   ", "//cdn.example.com/a.m3u8", "ftp://cdn.example.com/a.m3u8", "not a url"] {
        let mut player = Player::new();

        let result = player.session.load(raw);

        assert!(matches!(result, Err(Error::Resolution(_))), "{:?} accepted", raw);
        let state = player.session.state();
        assert_eq!(state.phase, PlaybackPhase::Errored);
        assert_eq!(state.error.as_ref().unwrap().kind, ErrorKind::Resolution);
        assert!(!state.is_playing && !state.is_loading);
        assert_eq!(player.factory.created(), 0);
        assert!(player.sink.bound().is_none());
    }
}

#[test]
fn test_repeated_segment_failures_become_fatal() {
    let mut player = Player::new();
    player.load_ready(120.0);
    player.play();
    let engine = player.factory.engine(0);

    // Two failures are retried after 1s and 2s
    engine.emit(segment_failure());
    player.pump();
    player.advance(Duration::from_secs(1));
    assert_eq!(engine.start_load_calls(), 1);

    engine.emit(segment_failure());
    player.pump();
    player.advance(Duration::from_secs(2));
    assert_eq!(engine.start_load_calls(), 2);
    assert_eq!(player.session.phase(), PlaybackPhase::Playing);

    engine.emit(segment_failure());
    player.pump();

    let state = player.session.state();
    assert_eq!(state.phase, PlaybackPhase::Errored);
    assert!(!state.is_playing);
    assert!(!state.is_loading);
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Network);
    assert!(error.fatal);
    assert_eq!(player.scheduler.pending_count(), 0);
}

#[test]
fn test_seek_bar_to_half() {
    let mut player = Player::new();
    player.load_ready(120.0);

    player.session.command(Command::SeekFraction(0.5)).unwrap();

    assert_eq!(player.session.state().current_time, 60.0);
    assert_eq!(player.sink.last_seek(), Some(60.0));
}

#[test]
fn test_mute_unmute_restores_volume() {
    let mut player = Player::new();
    player.load_ready(60.0);

    player.session.command(Command::SetVolume(0.8)).unwrap();
    player.session.command(Command::ToggleMute).unwrap();
    assert_eq!(player.sink.volume(), 0.0);
    player.session.command(Command::ToggleMute).unwrap();

    let state = player.session.state();
    assert_eq!(state.volume, 0.8);
    assert!(!state.muted);
    assert_eq!(player.sink.volume(), 0.8);
}

#[test]
fn test_source_switch_disposes_previous_engine() {
    let mut player = Player::new();
    player.load_ready(300.0);
    player.play();
    let first = player.factory.engine(0);
    let first_attachment = player.session.attachment().unwrap();

    player.session.load("https://cdn.example.com/other/master.m3u8").unwrap();

    assert!(first.is_destroyed());
    assert_eq!(first.listener_count(), 0);
    assert_eq!(player.factory.created(), 2);
    assert_eq!(player.factory.live_engines(), 1);
    assert_eq!(player.sink.detach_calls(), 1);

    // The old engine can no longer reach the inbox
    first.emit(EngineEvent::FragmentLoaded);
    first.emit(segment_failure());
    assert_eq!(player.pump(), 0);

    // Late sink events from the old attachment are dropped
    player
        .session
        .dispatch(Envelope::media(first_attachment, MediaEvent::Ended))
        .unwrap();
    assert_eq!(player.session.phase(), PlaybackPhase::Loading);
    assert_eq!(player.session.state().current_time, 0.0);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_seek_always_clamped() {
    let mut player = Player::new();
    player.load_ready(90.0);

    for target in [-100.0, -0.1, 0.0, 12.5, 45.0, 89.999, 90.0, 90.1, 1e9, f64::INFINITY] {
        player.session.command(Command::Seek(target)).unwrap();
        let expected = target.clamp(0.0, 90.0);
        assert_eq!(player.session.state().current_time, expected, "seek({})", target);
    }
}

#[test]
fn test_mute_round_trip_for_any_positive_volume() {
    let mut player = Player::new();
    player.load_ready(60.0);

    for volume in [0.01, 0.25, 0.5, 0.8, 1.0] {
        player.session.command(Command::SetVolume(volume)).unwrap();
        player.session.command(Command::ToggleMute).unwrap();
        player.session.command(Command::ToggleMute).unwrap();
        assert_eq!(player.session.state().volume, volume);
        assert!(!player.session.state().muted);
    }
}

#[test]
fn test_quality_levels_sorted_with_single_auto() {
    let mut player = Player::new();
    player.session.load(MASTER).unwrap();
    player.factory.engine(0).emit(EngineEvent::ManifestParsed {
        levels: vec![
            EngineLevel { index: 0, height: 240, bitrate: 400_000 },
            EngineLevel { index: 1, height: 1080, bitrate: 5_000_000 },
            EngineLevel { index: 2, height: 480, bitrate: 1_200_000 },
            EngineLevel { index: 3, height: 720, bitrate: 2_800_000 },
        ],
    });
    player.pump();

    let levels = player.session.quality_levels();
    assert_eq!(levels.iter().filter(|level| level.index == -1).count(), 1);
    let heights: Vec<u32> = levels[1..].iter().map(|level| level.height_px).collect();
    assert!(heights.windows(2).all(|pair| pair[0] >= pair[1]), "{:?}", heights);
}

#[test]
fn test_buffer_updates_never_overlap() {
    let mut tracker = BufferTracker::new();
    let mut seed: u64 = 0x5eed;

    for _ in 0..200 {
        let count = (seed % 6) as usize;
        let mut raw = Vec::with_capacity(count);
        for _ in 0..count {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let start = (seed >> 40) as f64 % 100.0;
            let len = (seed >> 20) as f64 % 10.0;
            raw.push((start, start + len));
        }
        tracker.update(raw);

        let ranges = tracker.ranges();
        for pair in ranges.windows(2) {
            assert!(pair[0].end < pair[1].start, "{:?}", ranges);
        }
    }
}

#[test]
fn test_double_play_then_pause() {
    let mut player = Player::new();
    player.load_ready(60.0);

    player.session.command(Command::Play).unwrap();
    player.session.command(Command::Play).unwrap();
    let requests = player.sink.play_requests();
    assert_eq!(requests.len(), 1);

    player.session.command(Command::Pause).unwrap();
    player.media(MediaEvent::PlayResolved { token: requests[0] });

    assert!(!player.session.state().is_playing);
    assert_eq!(player.session.phase(), PlaybackPhase::Paused);
}

#[test]
fn test_seek_between_plays_issues_one_request() {
    let mut player = Player::new();
    player.load_ready(60.0);

    player.session.command(Command::Play).unwrap();
    player.session.command(Command::Seek(10.0)).unwrap();
    player.session.command(Command::Play).unwrap();

    let requests = player.sink.play_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(player.sink.pause_calls(), 0);

    player.media(MediaEvent::Seeked { time: 10.0 });
    player.media(MediaEvent::PlayResolved { token: requests[0] });
    assert!(player.session.state().is_playing);
    assert_eq!(player.session.phase(), PlaybackPhase::Playing);
}

#[test]
fn test_no_mutation_after_teardown() {
    let mut player = Player::new();
    player.load_ready(60.0);
    player.play();
    let attachment = player.session.attachment().unwrap();
    let engine = player.factory.engine(0);

    player.session.teardown();
    let before = player.session.state().clone();

    engine.emit(EngineEvent::LevelSwitched { level: 2 });
    engine.emit(segment_failure());
    player.pump();
    for event in [
        MediaEvent::TimeUpdate { time: 30.0 },
        MediaEvent::Pause,
        MediaEvent::Error { message: "decode".into() },
    ] {
        player.session.dispatch(Envelope::media(attachment, event)).unwrap();
    }
    player.advance(Duration::from_secs(60));

    assert_eq!(player.session.state(), &before);
    assert!(engine.is_destroyed());
}

// =============================================================================
// Recovery and controls
// =============================================================================

#[test]
fn test_media_error_recovered_once() {
    let mut player = Player::new();
    player.load_ready(60.0);
    player.play();
    let engine = player.factory.engine(0);
    let media_error = || EngineEvent::Error {
        kind: EngineErrorKind::Media,
        fatal: true,
        details: "bufferAppendError".into(),
    };

    engine.emit(media_error());
    player.pump();
    assert_eq!(engine.recover_calls(), 1);
    assert_eq!(player.session.phase(), PlaybackPhase::Playing);

    engine.emit(media_error());
    player.pump();
    assert_eq!(player.session.phase(), PlaybackPhase::Errored);
    assert_eq!(player.session.state().error.as_ref().unwrap().kind, ErrorKind::Media);
}

#[test]
fn test_configured_retry_policy() {
    let config = PlayerConfig::from_json(r#"{"retry": {"max_attempts": 1}}"#).unwrap();
    let mut player = Player::with_config(config);
    player.load_ready(60.0);

    player.factory.engine(0).emit(segment_failure());
    player.pump();
    assert_eq!(player.session.phase(), PlaybackPhase::Errored);
}

#[test]
fn test_settings_panel_keeps_controls_visible() {
    let mut player = Player::new();
    player.load_ready(60.0);
    player.play();

    player.session.command(Command::PointerActivity).unwrap();
    player.session.command(Command::OpenSettings(SettingsTab::Quality)).unwrap();
    player.advance(Duration::from_secs(10));
    player.session.command(Command::PointerLeave).unwrap();
    assert!(player.session.controls_visible());
    assert_eq!(player.session.settings().active_tab, SettingsTab::Quality);

    player.session.command(Command::CloseSettings).unwrap();
    player.advance(Duration::from_secs(3));
    assert!(!player.session.controls_visible());
}

#[test]
fn test_replay_after_end() {
    let mut player = Player::new();
    player.load_ready(30.0);
    player.play();
    player.media(MediaEvent::Ended);
    assert_eq!(player.session.phase(), PlaybackPhase::Ended);
    assert_eq!(player.session.state().progress(), 1.0);

    player.play();
    assert_eq!(player.sink.last_seek(), Some(0.0));
    assert_eq!(player.session.phase(), PlaybackPhase::Playing);
}
