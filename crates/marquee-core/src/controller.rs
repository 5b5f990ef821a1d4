//! Playback controller - the player state machine
//!
//! Owns the authoritative [`PlayerState`]. User commands and sink events are
//! applied here one at a time; every phase change goes through
//! [`PlaybackPhase::can_transition_to`].
//!
//! Play requests are asynchronous. Each one carries a [`PlayToken`]; only
//! the outstanding token may move the state, so a resolution arriving after
//! a pause or seek superseded it is dropped.
//!
//! A seek does not abort the sink's request. Until it settles the request
//! is still outstanding at the sink, and a later `play()` adopts it instead
//! of issuing an overlapping one.

use crate::{
    error::ErrorInfo,
    media::{MediaEvent, MediaSink, PlayToken},
    types::{PlaybackPhase, PlayerState},
    Error, Result,
};
use tracing::{debug, info, warn};

/// The playback state machine
#[derive(Debug)]
pub struct PlaybackController {
    state: PlayerState,
    next_token: u64,
    in_flight: Option<PlayToken>,
    /// Superseded by a seek but not yet settled at the sink
    superseded: Option<PlayToken>,
}

impl PlaybackController {
    pub fn new(initial_volume: f64) -> Self {
        Self {
            state: PlayerState::new(initial_volume),
            next_token: 0,
            in_flight: None,
            superseded: None,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state.phase
    }

    /// Outstanding play request, if any
    pub fn pending_play(&self) -> Option<PlayToken> {
        self.in_flight
    }

    fn transition(&mut self, to: PlaybackPhase) -> bool {
        let from = self.state.phase;
        if from == to {
            return true;
        }
        if !from.can_transition_to(to) {
            debug!(from = %from, to = %to, "Transition rejected");
            return false;
        }
        self.state.phase = to;
        info!(from = %from, to = %to, "State transition");
        true
    }

    /// Discard all playback state, keeping nothing from the previous source
    pub fn reset(&mut self, initial_volume: f64) {
        self.state = PlayerState::new(initial_volume);
        self.in_flight = None;
        self.superseded = None;
    }

    /// Idle -> Loading once a source is being attached
    pub fn begin_loading(&mut self) -> Result<()> {
        if !self.transition(PlaybackPhase::Loading) {
            return Err(Error::InvalidStateTransition {
                from: self.state.phase.to_string(),
                to: PlaybackPhase::Loading.to_string(),
            });
        }
        self.state.is_loading = true;
        self.state.error = None;
        Ok(())
    }

    /// Push volume and speed to a freshly attached sink
    pub fn apply_to_sink(&self, sink: &mut (impl MediaSink + ?Sized)) {
        sink.set_volume(self.state.effective_volume());
        sink.set_playback_rate(self.state.playback_speed);
    }

    /// Enter the errored phase. No further automatic recovery.
    pub fn fail(&mut self, error: &Error) {
        let info = ErrorInfo::from(error);
        warn!(code = %info.code, message = %info.message, phase = %self.state.phase, "Playback failed");
        if self.state.phase != PlaybackPhase::Errored {
            self.transition(PlaybackPhase::Errored);
        }
        self.in_flight = None;
        self.superseded = None;
        self.state.is_playing = false;
        self.state.is_loading = false;
        self.state.seeking = false;
        self.state.error = Some(ErrorInfo { fatal: true, ..info });
    }

    /// Request playback.
    ///
    /// Returns the token of the request issued, or `None` when no new
    /// request was needed: already playing, one is already in flight, or an
    /// unsettled request superseded by a seek was taken over.
    pub fn play(&mut self, sink: &mut (impl MediaSink + ?Sized)) -> Option<PlayToken> {
        match self.state.phase {
            PlaybackPhase::Loading | PlaybackPhase::Ready | PlaybackPhase::Paused => {}
            PlaybackPhase::Ended => {
                // Replay from the start
                self.seek(0.0, sink);
            }
            phase => {
                debug!(phase = %phase, "Play ignored");
                return None;
            }
        }

        if let Some(token) = self.in_flight {
            debug!(token = %token, "Play request already in flight");
            return None;
        }
        if let Some(token) = self.superseded.take() {
            debug!(token = %token, "Play request resumed after seek");
            self.in_flight = Some(token);
            return None;
        }

        self.next_token += 1;
        let token = PlayToken(self.next_token);
        self.in_flight = Some(token);
        debug!(token = %token, "Play requested");
        sink.play(token);
        Some(token)
    }

    /// Pause immediately, superseding any in-flight play request
    pub fn pause(&mut self, sink: &mut (impl MediaSink + ?Sized)) {
        if !self.state.phase.is_active() {
            return;
        }
        if let Some(token) = self.in_flight.take() {
            debug!(token = %token, "Play request superseded by pause");
        }
        // Pausing aborts any request still pending at the sink
        self.superseded = None;
        sink.pause();
        self.state.is_playing = false;
        if matches!(self.state.phase, PlaybackPhase::Playing | PlaybackPhase::Ready) {
            self.transition(PlaybackPhase::Paused);
        }
    }

    pub fn toggle_play(&mut self, sink: &mut (impl MediaSink + ?Sized)) {
        if self.state.is_playing || self.in_flight.is_some() {
            self.pause(sink);
        } else {
            self.play(sink);
        }
    }

    /// Clamp a target position to the seekable window.
    ///
    /// NaN maps to 0. While the duration is unknown there is no upper bound,
    /// so +inf keeps the current position.
    pub fn clamp_time(&self, time: f64) -> f64 {
        if time.is_nan() {
            return 0.0;
        }
        if self.state.duration > 0.0 {
            time.clamp(0.0, self.state.duration)
        } else if time == f64::INFINITY {
            self.state.current_time
        } else {
            time.max(0.0)
        }
    }

    /// Seek to `time`, clamped. Returns the applied position.
    pub fn seek(&mut self, time: f64, sink: &mut (impl MediaSink + ?Sized)) -> f64 {
        if !self.state.phase.is_active() {
            debug!(phase = %self.state.phase, "Seek ignored");
            return self.state.current_time;
        }
        let target = self.clamp_time(time);
        if let Some(token) = self.in_flight.take() {
            debug!(token = %token, "Play request superseded by seek");
            self.superseded = Some(token);
        }
        if self.state.phase == PlaybackPhase::Ended {
            self.transition(PlaybackPhase::Paused);
        }
        self.state.current_time = target;
        self.state.seeking = true;
        debug!(target, "Seeking");
        sink.seek_to(target);
        target
    }

    pub fn seek_relative(&mut self, delta: f64, sink: &mut (impl MediaSink + ?Sized)) -> f64 {
        let target = self.state.current_time + delta;
        self.seek(target, sink)
    }

    /// Seek to a seek-bar position in [0, 1]
    pub fn seek_fraction(&mut self, fraction: f64, sink: &mut (impl MediaSink + ?Sized)) -> f64 {
        let target = fraction.clamp(0.0, 1.0) * self.state.duration;
        self.seek(target, sink)
    }

    /// Set the user volume. Zero volume does not mute.
    pub fn set_volume(&mut self, volume: f64, sink: &mut (impl MediaSink + ?Sized)) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        if self.state.muted {
            // Stay silent; unmuting restores this level
            if volume > 0.0 {
                self.state.muted_volume_memory = volume;
            }
        } else {
            sink.set_volume(volume);
        }
    }

    pub fn toggle_mute(&mut self, sink: &mut (impl MediaSink + ?Sized)) {
        if self.state.muted {
            self.state.muted = false;
            self.state.volume = self.state.muted_volume_memory;
            sink.set_volume(self.state.volume);
        } else {
            if self.state.volume > 0.0 {
                self.state.muted_volume_memory = self.state.volume;
            }
            self.state.muted = true;
            sink.set_volume(0.0);
        }
    }

    /// Set the playback rate; non-positive rates are rejected
    pub fn set_speed(&mut self, rate: f64, sink: &mut (impl MediaSink + ?Sized)) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidPlaybackRate(rate));
        }
        self.state.playback_speed = rate;
        sink.set_playback_rate(rate);
        Ok(())
    }

    /// Apply a sink event
    pub fn on_media_event(&mut self, event: MediaEvent) {
        if matches!(self.state.phase, PlaybackPhase::Idle | PlaybackPhase::Errored) {
            debug!(event = event.name(), phase = %self.state.phase, "Media event ignored");
            return;
        }

        match event {
            MediaEvent::LoadedMetadata { duration } => {
                self.set_duration(duration);
                self.state.is_loading = false;
                if self.state.phase == PlaybackPhase::Loading {
                    self.transition(PlaybackPhase::Ready);
                }
            }
            MediaEvent::DurationChange { duration } => self.set_duration(duration),
            MediaEvent::Waiting => self.state.is_loading = true,
            MediaEvent::Playing => {
                self.state.is_loading = false;
                self.state.is_playing = true;
                self.transition(PlaybackPhase::Playing);
            }
            MediaEvent::Pause => {
                self.state.is_playing = false;
                if self.state.phase == PlaybackPhase::Playing {
                    self.transition(PlaybackPhase::Paused);
                }
            }
            MediaEvent::Seeking => self.state.seeking = true,
            MediaEvent::Seeked { time } => {
                self.state.seeking = false;
                self.state.current_time = self.clamp_time(time);
            }
            MediaEvent::TimeUpdate { time } => {
                // The bar shows the seek target until the sink catches up
                if !self.state.seeking {
                    self.state.current_time = self.clamp_time(time);
                }
            }
            MediaEvent::Progress => {}
            MediaEvent::Ended => {
                self.in_flight = None;
                self.superseded = None;
                self.state.is_playing = false;
                self.state.is_loading = false;
                if self.state.duration > 0.0 {
                    self.state.current_time = self.state.duration;
                }
                self.transition(PlaybackPhase::Ended);
            }
            MediaEvent::Error { message } => self.fail(&Error::Media(message)),
            MediaEvent::PlayResolved { token } => self.on_play_resolved(token),
            MediaEvent::PlayRejected { token, reason } => self.on_play_rejected(token, reason),
        }
    }

    fn set_duration(&mut self, duration: f64) {
        self.state.duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        self.state.current_time = self.clamp_time(self.state.current_time);
    }

    fn settle_superseded(&mut self, token: PlayToken) {
        if self.superseded == Some(token) {
            self.superseded = None;
        }
    }

    fn on_play_resolved(&mut self, token: PlayToken) {
        if self.in_flight != Some(token) {
            self.settle_superseded(token);
            debug!(token = %token, "Stale play resolution dropped");
            return;
        }
        self.in_flight = None;
        self.state.is_playing = true;
        self.transition(PlaybackPhase::Playing);
    }

    fn on_play_rejected(&mut self, token: PlayToken, reason: String) {
        if self.in_flight != Some(token) {
            self.settle_superseded(token);
            debug!(token = %token, reason = %reason, "Stale play rejection dropped");
            return;
        }
        self.in_flight = None;
        self.state.is_playing = false;
        warn!(token = %token, reason = %reason, "Play request rejected");
        if self.state.phase == PlaybackPhase::Ready {
            self.transition(PlaybackPhase::Paused);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSink;

    fn ready(duration: f64) -> (PlaybackController, MockSink) {
        let mut controller = PlaybackController::new(1.0);
        controller.begin_loading().unwrap();
        controller.on_media_event(MediaEvent::LoadedMetadata { duration });
        (controller, MockSink::new())
    }

    #[test]
    fn test_load_then_play() {
        let (mut controller, mut sink) = ready(120.0);
        assert_eq!(controller.phase(), PlaybackPhase::Ready);
        assert!(!controller.state().is_loading);

        let token = controller.play(&mut sink).unwrap();
        assert_eq!(sink.play_requests(), vec![token]);

        controller.on_media_event(MediaEvent::PlayResolved { token });
        assert_eq!(controller.phase(), PlaybackPhase::Playing);
        assert!(controller.state().is_playing);
    }

    #[test]
    fn test_double_play_issues_one_request() {
        let (mut controller, mut sink) = ready(60.0);

        let first = controller.play(&mut sink);
        let second = controller.play(&mut sink);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(sink.play_requests().len(), 1);
    }

    #[test]
    fn test_late_resolution_does_not_override_pause() {
        let (mut controller, mut sink) = ready(60.0);

        let token = controller.play(&mut sink).unwrap();
        controller.pause(&mut sink);
        controller.on_media_event(MediaEvent::PlayResolved { token });

        assert!(!controller.state().is_playing);
        assert_eq!(controller.phase(), PlaybackPhase::Paused);
        assert_eq!(sink.pause_calls(), 1);
    }

    #[test]
    fn test_play_after_pause_supersedes_old_token() {
        let (mut controller, mut sink) = ready(60.0);

        let old = controller.play(&mut sink).unwrap();
        controller.pause(&mut sink);
        let new = controller.play(&mut sink).unwrap();
        assert_ne!(old, new);

        controller.on_media_event(MediaEvent::PlayRejected { token: old, reason: "AbortError".into() });
        assert_eq!(controller.pending_play(), Some(new));

        controller.on_media_event(MediaEvent::PlayResolved { token: new });
        assert_eq!(controller.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_rejected_play_from_ready_pauses() {
        let (mut controller, mut sink) = ready(60.0);
        let token = controller.play(&mut sink).unwrap();
        controller.on_media_event(MediaEvent::PlayRejected { token, reason: "NotAllowedError".into() });

        assert_eq!(controller.phase(), PlaybackPhase::Paused);
        assert!(controller.state().error.is_none());
    }

    #[test]
    fn test_seek_clamps() {
        let (mut controller, mut sink) = ready(120.0);

        for (target, expected) in [
            (-5.0, 0.0),
            (60.0, 60.0),
            (500.0, 120.0),
            (f64::INFINITY, 120.0),
            (f64::NEG_INFINITY, 0.0),
            (f64::NAN, 0.0),
        ] {
            assert_eq!(controller.seek(target, &mut sink), expected);
            assert_eq!(controller.state().current_time, expected);
        }
        assert_eq!(sink.last_seek(), Some(0.0));
    }

    #[test]
    fn test_seek_bar_fraction() {
        let (mut controller, mut sink) = ready(120.0);
        controller.seek_fraction(0.5, &mut sink);
        assert_eq!(controller.state().current_time, 60.0);
    }

    #[test]
    fn test_seek_relative_clamps() {
        let (mut controller, mut sink) = ready(30.0);
        controller.seek(25.0, &mut sink);
        assert_eq!(controller.seek_relative(10.0, &mut sink), 30.0);
        assert_eq!(controller.seek_relative(-45.0, &mut sink), 0.0);
    }

    #[test]
    fn test_seek_position_held_until_seeked() {
        let (mut controller, mut sink) = ready(120.0);
        controller.seek(90.0, &mut sink);
        assert!(controller.state().seeking);

        controller.on_media_event(MediaEvent::TimeUpdate { time: 12.0 });
        assert_eq!(controller.state().current_time, 90.0);

        controller.on_media_event(MediaEvent::Seeked { time: 89.9 });
        assert!(!controller.state().seeking);
        assert_eq!(controller.state().current_time, 89.9);

        controller.on_media_event(MediaEvent::TimeUpdate { time: 90.2 });
        assert_eq!(controller.state().current_time, 90.2);
    }

    #[test]
    fn test_seek_supersedes_pending_play() {
        let (mut controller, mut sink) = ready(120.0);
        let token = controller.play(&mut sink).unwrap();
        controller.seek(10.0, &mut sink);
        controller.on_media_event(MediaEvent::PlayResolved { token });
        assert!(!controller.state().is_playing);
    }

    #[test]
    fn test_play_after_seek_takes_over_pending_request() {
        let (mut controller, mut sink) = ready(120.0);
        let token = controller.play(&mut sink).unwrap();
        controller.seek(10.0, &mut sink);

        assert!(controller.play(&mut sink).is_none());
        assert_eq!(sink.play_requests(), vec![token]);
        assert_eq!(controller.pending_play(), Some(token));

        controller.on_media_event(MediaEvent::PlayResolved { token });
        assert_eq!(controller.phase(), PlaybackPhase::Playing);
        assert!(controller.state().is_playing);
    }

    #[test]
    fn test_settled_superseded_request_allows_new_play() {
        let (mut controller, mut sink) = ready(120.0);
        let old = controller.play(&mut sink).unwrap();
        controller.seek(10.0, &mut sink);
        controller.on_media_event(MediaEvent::PlayResolved { token: old });
        assert!(!controller.state().is_playing);

        let new = controller.play(&mut sink).unwrap();
        assert_ne!(old, new);
        assert_eq!(sink.play_requests(), vec![old, new]);
    }

    #[test]
    fn test_pause_after_seek_drops_pending_request() {
        let (mut controller, mut sink) = ready(120.0);
        let old = controller.play(&mut sink).unwrap();
        controller.seek(10.0, &mut sink);
        controller.pause(&mut sink);

        let new = controller.play(&mut sink).unwrap();
        assert_ne!(old, new);
        controller.on_media_event(MediaEvent::PlayRejected { token: old, reason: "AbortError".into() });
        assert_eq!(controller.pending_play(), Some(new));
    }

    #[test]
    fn test_mute_round_trip() {
        let (mut controller, mut sink) = ready(60.0);
        controller.set_volume(0.8, &mut sink);

        controller.toggle_mute(&mut sink);
        assert!(controller.state().muted);
        assert_eq!(sink.volume(), 0.0);

        controller.toggle_mute(&mut sink);
        assert!(!controller.state().muted);
        assert_eq!(controller.state().volume, 0.8);
        assert_eq!(sink.volume(), 0.8);
    }

    #[test]
    fn test_zero_volume_is_not_mute() {
        let (mut controller, mut sink) = ready(60.0);
        controller.set_volume(0.6, &mut sink);
        controller.set_volume(0.0, &mut sink);
        assert!(!controller.state().muted);

        // Muting at zero keeps the earlier memory
        controller.toggle_mute(&mut sink);
        assert_eq!(controller.state().muted_volume_memory, 0.6);
        controller.toggle_mute(&mut sink);
        assert_eq!(controller.state().volume, 0.6);
    }

    #[test]
    fn test_volume_while_muted_stays_silent() {
        let (mut controller, mut sink) = ready(60.0);
        controller.toggle_mute(&mut sink);
        controller.set_volume(0.3, &mut sink);
        assert_eq!(sink.volume(), 0.0);

        controller.toggle_mute(&mut sink);
        assert_eq!(sink.volume(), 0.3);
    }

    #[test]
    fn test_volume_clamped() {
        let (mut controller, mut sink) = ready(60.0);
        controller.set_volume(1.7, &mut sink);
        assert_eq!(controller.state().volume, 1.0);
        controller.set_volume(-0.2, &mut sink);
        assert_eq!(controller.state().volume, 0.0);
    }

    #[test]
    fn test_speed_validation() {
        let (mut controller, mut sink) = ready(60.0);
        controller.set_speed(1.5, &mut sink).unwrap();
        assert_eq!(sink.playback_rate(), 1.5);

        assert!(matches!(controller.set_speed(0.0, &mut sink), Err(Error::InvalidPlaybackRate(_))));
        assert!(matches!(controller.set_speed(-1.0, &mut sink), Err(Error::InvalidPlaybackRate(_))));
        assert_eq!(controller.state().playback_speed, 1.5);
    }

    #[test]
    fn test_error_event_from_any_phase() {
        let (mut controller, mut sink) = ready(60.0);
        let token = controller.play(&mut sink).unwrap();
        controller.on_media_event(MediaEvent::PlayResolved { token });
        controller.on_media_event(MediaEvent::Waiting);
        assert!(controller.state().is_loading);

        controller.on_media_event(MediaEvent::Error { message: "decode".into() });

        let state = controller.state();
        assert_eq!(state.phase, PlaybackPhase::Errored);
        assert!(!state.is_playing);
        assert!(!state.is_loading);
        assert!(state.error.as_ref().unwrap().fatal);

        // Sink events no longer mutate state
        controller.on_media_event(MediaEvent::Playing);
        assert!(!controller.state().is_playing);
    }

    #[test]
    fn test_ended_then_play_restarts() {
        let (mut controller, mut sink) = ready(60.0);
        let token = controller.play(&mut sink).unwrap();
        controller.on_media_event(MediaEvent::PlayResolved { token });
        controller.on_media_event(MediaEvent::Ended);
        assert_eq!(controller.phase(), PlaybackPhase::Ended);
        assert_eq!(controller.state().current_time, 60.0);

        controller.play(&mut sink).unwrap();
        assert_eq!(sink.last_seek(), Some(0.0));
        assert_eq!(controller.state().current_time, 0.0);
    }

    #[test]
    fn test_duration_unknown_clamps_at_zero_only() {
        let mut controller = PlaybackController::new(1.0);
        let mut sink = MockSink::new();
        controller.begin_loading().unwrap();
        assert_eq!(controller.seek(42.0, &mut sink), 42.0);
        assert_eq!(controller.seek(-1.0, &mut sink), 0.0);

        controller.seek(42.0, &mut sink);
        assert_eq!(controller.seek(f64::INFINITY, &mut sink), 42.0);
    }

    #[test]
    fn test_idle_ignores_commands() {
        let mut controller = PlaybackController::new(1.0);
        let mut sink = MockSink::new();
        assert!(controller.play(&mut sink).is_none());
        controller.seek(10.0, &mut sink);
        assert!(sink.play_requests().is_empty());
        assert_eq!(sink.last_seek(), None);
    }
}
