//! Test doubles for the host boundaries
//!
//! Every double is a cheap handle over shared state, so a test can keep a
//! clone for inspection after handing the original to a session.

use crate::{
    engine::{AdaptiveEngine, EngineEvent, EngineFactory, EngineLevel, EngineListener, ListenerId},
    media::{MediaSink, PlayToken},
    source::SourceKind,
    timer::{Scheduler, TimerId},
    types::AttachmentId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct SinkState {
    native: HashSet<SourceKind>,
    bound: Option<AttachmentId>,
    native_source: Option<String>,
    play_requests: Vec<PlayToken>,
    pause_calls: usize,
    seeks: Vec<f64>,
    volume: f64,
    playback_rate: f64,
    buffered: Vec<(f64, f64)>,
    detach_calls: usize,
}

/// Recording media sink
#[derive(Debug, Clone)]
pub struct MockSink {
    inner: Arc<Mutex<SinkState>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                volume: 1.0,
                playback_rate: 1.0,
                ..SinkState::default()
            })),
        }
    }

    pub fn set_native_support(&self, kind: SourceKind, supported: bool) {
        let mut state = lock(&self.inner);
        if supported {
            state.native.insert(kind);
        } else {
            state.native.remove(&kind);
        }
    }

    /// Intervals returned by the next `buffered()` calls
    pub fn set_buffered(&self, ranges: Vec<(f64, f64)>) {
        lock(&self.inner).buffered = ranges;
    }

    pub fn bound(&self) -> Option<AttachmentId> {
        lock(&self.inner).bound
    }

    pub fn native_source(&self) -> Option<String> {
        lock(&self.inner).native_source.clone()
    }

    pub fn play_requests(&self) -> Vec<PlayToken> {
        lock(&self.inner).play_requests.clone()
    }

    pub fn pause_calls(&self) -> usize {
        lock(&self.inner).pause_calls
    }

    pub fn last_seek(&self) -> Option<f64> {
        lock(&self.inner).seeks.last().copied()
    }

    pub fn volume(&self) -> f64 {
        lock(&self.inner).volume
    }

    pub fn playback_rate(&self) -> f64 {
        lock(&self.inner).playback_rate
    }

    pub fn detach_calls(&self) -> usize {
        lock(&self.inner).detach_calls
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSink for MockSink {
    fn can_play_natively(&self, kind: SourceKind) -> bool {
        lock(&self.inner).native.contains(&kind)
    }

    fn bind(&mut self, attachment: AttachmentId) {
        lock(&self.inner).bound = Some(attachment);
    }

    fn load_native(&mut self, url: &str) {
        lock(&self.inner).native_source = Some(url.to_string());
    }

    fn play(&mut self, token: PlayToken) {
        lock(&self.inner).play_requests.push(token);
    }

    fn pause(&mut self) {
        lock(&self.inner).pause_calls += 1;
    }

    fn seek_to(&mut self, time: f64) {
        lock(&self.inner).seeks.push(time);
    }

    fn set_volume(&mut self, volume: f64) {
        lock(&self.inner).volume = volume;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        lock(&self.inner).playback_rate = rate;
    }

    fn buffered(&self) -> Vec<(f64, f64)> {
        lock(&self.inner).buffered.clone()
    }

    fn detach(&mut self) {
        let mut state = lock(&self.inner);
        state.bound = None;
        state.native_source = None;
        state.detach_calls += 1;
    }
}

#[derive(Default)]
struct EngineState {
    listeners: HashMap<ListenerId, EngineListener>,
    next_listener: u64,
    attached: bool,
    source: Option<String>,
    levels: Vec<EngineLevel>,
    current_level: i32,
    start_load_calls: usize,
    recover_calls: usize,
    destroyed: bool,
}

/// Inspection handle for one engine created by [`MockEngineFactory`]
#[derive(Clone)]
pub struct MockEngineHandle {
    inner: Arc<Mutex<EngineState>>,
}

impl MockEngineHandle {
    /// Deliver `event` to every subscribed listener
    pub fn emit(&self, event: EngineEvent) {
        let listeners: Vec<EngineListener> = lock(&self.inner).listeners.values().cloned().collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    /// Levels reported by `levels()`; does not emit anything
    pub fn set_levels(&self, levels: Vec<EngineLevel>) {
        lock(&self.inner).levels = levels;
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.inner).attached
    }

    pub fn source(&self) -> Option<String> {
        lock(&self.inner).source.clone()
    }

    pub fn current_level(&self) -> i32 {
        lock(&self.inner).current_level
    }

    pub fn start_load_calls(&self) -> usize {
        lock(&self.inner).start_load_calls
    }

    pub fn recover_calls(&self) -> usize {
        lock(&self.inner).recover_calls
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner).destroyed
    }
}

struct MockEngine {
    inner: Arc<Mutex<EngineState>>,
}

impl<S: ?Sized> AdaptiveEngine<S> for MockEngine {
    fn attach_media(&mut self, _sink: &S) {
        lock(&self.inner).attached = true;
    }

    fn load_source(&mut self, url: &str) {
        lock(&self.inner).source = Some(url.to_string());
    }

    fn subscribe(&mut self, listener: EngineListener) -> ListenerId {
        let mut state = lock(&self.inner);
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.insert(id, listener);
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        lock(&self.inner).listeners.remove(&id);
    }

    fn levels(&self) -> Vec<EngineLevel> {
        lock(&self.inner).levels.clone()
    }

    fn current_level(&self) -> i32 {
        lock(&self.inner).current_level
    }

    fn set_level(&mut self, index: i32) {
        lock(&self.inner).current_level = index;
    }

    fn start_load(&mut self) {
        lock(&self.inner).start_load_calls += 1;
    }

    fn recover_media_error(&mut self) {
        lock(&self.inner).recover_calls += 1;
    }

    fn destroy(&mut self) {
        let mut state = lock(&self.inner);
        state.destroyed = true;
        state.attached = false;
        state.listeners.clear();
    }
}

struct FactoryState {
    supported: bool,
    engines: Vec<Arc<Mutex<EngineState>>>,
}

/// Engine factory recording every instance it creates
#[derive(Clone)]
pub struct MockEngineFactory {
    inner: Arc<Mutex<FactoryState>>,
}

impl MockEngineFactory {
    /// Supports every adaptive source kind until told otherwise
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FactoryState {
                supported: true,
                engines: Vec::new(),
            })),
        }
    }

    pub fn set_supported(&self, supported: bool) {
        lock(&self.inner).supported = supported;
    }

    /// Engines created so far
    pub fn created(&self) -> usize {
        lock(&self.inner).engines.len()
    }

    /// Engines created and not yet destroyed
    pub fn live_engines(&self) -> usize {
        lock(&self.inner)
            .engines
            .iter()
            .filter(|engine| !lock(engine).destroyed)
            .count()
    }

    /// Handle to the `index`-th engine created. Panics if there is none.
    pub fn engine(&self, index: usize) -> MockEngineHandle {
        let state = lock(&self.inner);
        match state.engines.get(index) {
            Some(inner) => MockEngineHandle {
                inner: Arc::clone(inner),
            },
            None => panic!("engine {} was never created ({} exist)", index, state.engines.len()),
        }
    }

    /// Handle to the most recently created engine, if any
    pub fn latest(&self) -> Option<MockEngineHandle> {
        lock(&self.inner).engines.last().map(|inner| MockEngineHandle {
            inner: Arc::clone(inner),
        })
    }
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> EngineFactory<S> for MockEngineFactory {
    fn is_supported(&self, kind: SourceKind) -> bool {
        kind.is_adaptive() && lock(&self.inner).supported
    }

    fn create(&self) -> Box<dyn AdaptiveEngine<S>> {
        let inner = Arc::new(Mutex::new(EngineState {
            current_level: -1,
            ..EngineState::default()
        }));
        lock(&self.inner).engines.push(Arc::clone(&inner));
        Box::new(MockEngine { inner })
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    now: Duration,
    pending: Vec<(TimerId, Duration)>,
}

/// Scheduler driven by hand: time only moves through [`advance`](Self::advance)
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    pub fn is_pending(&self, timer: TimerId) -> bool {
        lock(&self.inner).pending.iter().any(|(id, _)| *id == timer)
    }

    /// Move time forward, returning the timers that came due in deadline order
    pub fn advance(&self, by: Duration) -> Vec<TimerId> {
        let mut state = lock(&self.inner);
        state.now += by;
        let now = state.now;

        let mut due: Vec<(TimerId, Duration)> = Vec::new();
        state.pending.retain(|entry| {
            if entry.1 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(_, deadline)| *deadline);
        due.into_iter().map(|(id, _)| id).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration) {
        let mut state = lock(&self.inner);
        let deadline = state.now + delay;
        state.pending.retain(|(id, _)| *id != timer);
        state.pending.push((timer, deadline));
    }

    fn cancel(&mut self, timer: TimerId) {
        lock(&self.inner).pending.retain(|(id, _)| *id != timer);
    }
}
