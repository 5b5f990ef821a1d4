//! Headless playback example
//!
//! Fetches a real HLS master playlist through the native manifest engine,
//! drives a simulated media element and prints every state change.
//!
//! Run with:
//!   RUST_LOG=marquee_core=debug cargo run -p marquee-core --example headless_playback -- <url>

use anyhow::Context;
use marquee_core::{
    engine::HlsManifestEngineFactory,
    event::{self, EventSender},
    AttachmentId, Envelope, MediaEvent, MediaSink, PlayToken, PlayerConfig, SessionDriver,
    SourceKind,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_SOURCE: &str = "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";

/// Media element stand-in: reports metadata once a source is bound and
/// grants every play request
struct SimulatedSink {
    tx: EventSender,
    attachment: Option<AttachmentId>,
    position: f64,
}

impl SimulatedSink {
    fn new(tx: EventSender) -> Self {
        Self {
            tx,
            attachment: None,
            position: 0.0,
        }
    }

    fn post(&self, event: MediaEvent) {
        if let Some(attachment) = self.attachment {
            let _ = self.tx.send(Envelope::media(attachment, event));
        }
    }
}

impl MediaSink for SimulatedSink {
    fn can_play_natively(&self, _kind: SourceKind) -> bool {
        false
    }

    fn bind(&mut self, attachment: AttachmentId) {
        self.attachment = Some(attachment);
        self.post(MediaEvent::LoadedMetadata { duration: 634.5 });
    }

    fn load_native(&mut self, _url: &str) {}

    fn play(&mut self, token: PlayToken) {
        self.post(MediaEvent::PlayResolved { token });
        self.post(MediaEvent::Playing);
    }

    fn pause(&mut self) {
        self.post(MediaEvent::Pause);
    }

    fn seek_to(&mut self, time: f64) {
        self.position = time;
        self.post(MediaEvent::Seeking);
        self.post(MediaEvent::Seeked { time });
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn set_playback_rate(&mut self, _rate: f64) {}

    fn buffered(&self) -> Vec<(f64, f64)> {
        vec![(0.0, self.position + 30.0)]
    }

    fn detach(&mut self) {
        self.attachment = None;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("marquee_core=info".parse()?))
        .init();
    marquee_core::init();

    let source = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let (tx, rx) = event::channel();
    let factory = HlsManifestEngineFactory::new(Duration::from_secs(10))
        .context("failed to build HTTP client")?;
    let (mut driver, handle) = SessionDriver::new(
        PlayerConfig::default(),
        SimulatedSink::new(tx.clone()),
        Box::new(factory),
        tx,
        rx,
    )?;
    let mut states = driver.subscribe_state();

    let script = async {
        handle.load(source.as_str())?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.play()?;
        handle.seek(120.0)?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.pause()?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown()?;
        anyhow::Ok(())
    };

    let watch = async {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            println!(
                "{} {} / {}{}",
                state.phase,
                marquee_core::format_time(state.current_time),
                marquee_core::format_time(state.duration),
                state
                    .error
                    .as_ref()
                    .map(|e| format!("  [{}] {}", e.code, e.message))
                    .unwrap_or_default()
            );
        }
    };

    let result = tokio::select! {
        (_, result) = async { tokio::join!(driver.run(), script) } => result,
        _ = watch => Ok(()),
    };
    result?;

    println!("Session {} finished in phase {}", driver.session().id(), driver.session().phase());
    Ok(())
}
