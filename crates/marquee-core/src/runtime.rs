//! Tokio driver
//!
//! [`SessionDriver`] owns a [`PlayerSession`] and drains its inbox; timers
//! are sleeping tasks that post back into the same inbox. Nothing here is
//! `Send`-bound on the session, so the driver runs on the task that owns it
//! (`LocalSet`, `block_on`, or joined with other futures).

use crate::{
    config::PlayerConfig,
    controls::Command,
    engine::EngineFactory,
    event::{Envelope, EventReceiver, EventSender},
    media::MediaSink,
    session::PlayerSession,
    timer::{Scheduler, TimerId},
    types::PlayerState,
    Error, Result,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Scheduler backed by `tokio::time::sleep` tasks
pub struct TokioScheduler {
    runtime: Handle,
    tx: EventSender,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Must be called from within a tokio runtime
    pub fn new(tx: EventSender) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self {
            runtime,
            tx,
            tasks: HashMap::new(),
        })
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration) {
        self.tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = self.tasks.remove(&timer) {
            previous.abort();
        }

        let tx = self.tx.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Inbox gone means the session is gone
            let _ = tx.send(Envelope::Timer(timer));
        });
        self.tasks.insert(timer, task);
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.tasks.remove(&timer) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Cloneable command sender for a running session
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: EventSender,
}

impl PlayerHandle {
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(Envelope::Command(command))
            .map_err(|_| Error::Internal("player session closed".into()))
    }

    pub fn load(&self, url: impl Into<String>) -> Result<()> {
        self.send(Command::Load(url.into()))
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn seek(&self, time: f64) -> Result<()> {
        self.send(Command::Seek(time))
    }

    /// Ask the driver to tear the session down and stop
    pub fn shutdown(&self) -> Result<()> {
        self.tx
            .send(Envelope::Shutdown)
            .map_err(|_| Error::Internal("player session closed".into()))
    }

    /// Raw inbox sender, for sinks that post media events
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }
}

/// Drives one session from its inbox
pub struct SessionDriver<S: MediaSink> {
    session: PlayerSession<S>,
    rx: EventReceiver,
}

impl<S: MediaSink> SessionDriver<S> {
    /// Build a session on a [`TokioScheduler`].
    ///
    /// `tx` and `rx` must be the two ends of one [`event::channel`](crate::event::channel);
    /// give the sink a clone of `tx` before calling this.
    pub fn new(
        config: PlayerConfig,
        sink: S,
        factory: Box<dyn EngineFactory<S>>,
        tx: EventSender,
        rx: EventReceiver,
    ) -> Result<(Self, PlayerHandle)> {
        let scheduler = TokioScheduler::new(tx.clone())?;
        let session = PlayerSession::new(config, sink, factory, Box::new(scheduler), tx.clone())?;
        Ok((Self { session, rx }, PlayerHandle::new(tx)))
    }

    pub fn session(&self) -> &PlayerSession<S> {
        &self.session
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.session.subscribe_state()
    }

    /// Process envelopes until [`PlayerHandle::shutdown`]
    pub async fn run(&mut self) {
        info!(session_id = %self.session.id(), "Session driver started");

        while let Some(envelope) = self.rx.recv().await {
            let shutdown = matches!(envelope, Envelope::Shutdown);
            if let Err(e) = self.session.dispatch(envelope) {
                warn!(error = %e, code = e.error_code(), "Command failed");
            }
            if shutdown {
                break;
            }
        }

        debug!(session_id = %self.session.id(), "Session driver stopped");
    }
}
