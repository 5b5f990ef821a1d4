//! Marquee WASM - WebAssembly Video Player Library
//!
//! Runs the Marquee player core in the browser:
//! - `<video>` element as the media sink
//! - hls.js as the adaptive engine
//! - `setTimeout` for controls auto-hide and retry backoff
//!
//! ## Usage
//!
//! ```javascript
//! import init, { MarqueePlayer } from '@marquee/wasm';
//!
//! await init();
//! const player = new MarqueePlayer(document.querySelector('video'), null);
//! player.onStateChange((state) => render(state));
//! player.load('https://cdn.example.com/vod/master.m3u8');
//! player.play();
//! ```

use marquee_core::{
    event, Command, Envelope, EventReceiver, MediaSink, PlayerConfig, PlayerSession, PlayerState, SettingsTab,
};
use serde::Serialize;
use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use tokio::sync::watch;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::HtmlVideoElement;

mod hls_js;
mod scheduler;
mod sink;

pub use hls_js::{HlsJsEngine, HlsJsFactory};
pub use scheduler::TimeoutScheduler;
pub use sink::VideoElementSink;

type Session = PlayerSession<VideoElementSink>;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    web_sys::console::log_1(&"[Marquee WASM] Initialized".into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    marquee_core::VERSION.to_string()
}

fn js_error(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn parse_tab(tab: &str) -> Result<SettingsTab, JsValue> {
    SettingsTab::ALL
        .into_iter()
        .find(|candidate| candidate.label().eq_ignore_ascii_case(tab))
        .ok_or_else(|| js_error(format!("unknown settings tab: {}", tab)))
}

fn changes_display(command: &Command) -> bool {
    matches!(
        command,
        Command::SetBrightness(_)
            | Command::SetContrast(_)
            | Command::SetSaturation(_)
            | Command::SetFit(_)
            | Command::ToggleFit
            | Command::ResetFilters
    )
}

/// Quality menu entry
#[derive(Serialize)]
struct LevelView {
    index: i32,
    height: u32,
    label: String,
    selected: bool,
}

/// Settings panel and controls state for the UI layer
#[derive(Serialize)]
struct ChromeView {
    controls_visible: bool,
    settings_open: bool,
    active_tab: &'static str,
    filter: String,
    object_fit: &'static str,
}

/// The player, exported to JavaScript
#[wasm_bindgen]
pub struct MarqueePlayer {
    session: Rc<RefCell<Session>>,
    on_state: Rc<RefCell<Option<js_sys::Function>>>,
}

#[wasm_bindgen]
impl MarqueePlayer {
    /// Create a player on `video`. `config` is an optional JSON string;
    /// missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(video: HtmlVideoElement, config: Option<String>) -> Result<MarqueePlayer, JsValue> {
        let config = match config {
            Some(json) => PlayerConfig::from_json(&json).map_err(js_error)?,
            None => PlayerConfig::default(),
        };

        let (tx, rx) = event::channel();
        let sink = VideoElementSink::new(video, tx.clone());
        let scheduler = TimeoutScheduler::new(tx.clone())?;
        let session = PlayerSession::new(config, sink, Box::new(HlsJsFactory), Box::new(scheduler), tx.clone())
            .map_err(js_error)?;
        let session = Rc::new(RefCell::new(session));

        let on_state = Rc::new(RefCell::new(None));
        let states = session.borrow().subscribe_state();
        wasm_bindgen_futures::spawn_local(run_inbox(Rc::downgrade(&session), rx));
        wasm_bindgen_futures::spawn_local(forward_states(states, Rc::clone(&on_state)));
        drop(tx);

        Ok(Self { session, on_state })
    }

    fn command(&self, command: Command) -> Result<(), JsValue> {
        let display = changes_display(&command);
        let mut session = self.session.try_borrow_mut().map_err(js_error)?;
        let result = session.command(command);
        if display {
            session.sink().apply_display(&session.filter(), session.object_fit());
        }
        result.map_err(js_error)
    }

    /// Load a source, replacing the current one
    pub fn load(&self, url: String) -> Result<(), JsValue> {
        self.command(Command::Load(url))
    }

    pub fn play(&self) -> Result<(), JsValue> {
        self.command(Command::Play)
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        self.command(Command::Pause)
    }

    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&self) -> Result<(), JsValue> {
        self.command(Command::TogglePlay)
    }

    pub fn seek(&self, time: f64) -> Result<(), JsValue> {
        self.command(Command::Seek(time))
    }

    /// Seek to a seek-bar position in [0, 1]
    #[wasm_bindgen(js_name = seekFraction)]
    pub fn seek_fraction(&self, fraction: f64) -> Result<(), JsValue> {
        self.command(Command::SeekFraction(fraction))
    }

    #[wasm_bindgen(js_name = stepForward)]
    pub fn step_forward(&self) -> Result<(), JsValue> {
        self.command(Command::StepForward)
    }

    #[wasm_bindgen(js_name = stepBackward)]
    pub fn step_backward(&self) -> Result<(), JsValue> {
        self.command(Command::StepBackward)
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) -> Result<(), JsValue> {
        self.command(Command::SetVolume(volume))
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) -> Result<(), JsValue> {
        self.command(Command::ToggleMute)
    }

    #[wasm_bindgen(js_name = setSpeed)]
    pub fn set_speed(&self, rate: f64) -> Result<(), JsValue> {
        self.command(Command::SetSpeed(rate))
    }

    /// Quality level index, `-1` for automatic
    #[wasm_bindgen(js_name = setQuality)]
    pub fn set_quality(&self, index: i32) -> Result<(), JsValue> {
        self.command(Command::SetQuality(index))
    }

    #[wasm_bindgen(js_name = setBrightness)]
    pub fn set_brightness(&self, percent: f64) -> Result<(), JsValue> {
        self.command(Command::SetBrightness(percent))
    }

    #[wasm_bindgen(js_name = setContrast)]
    pub fn set_contrast(&self, percent: f64) -> Result<(), JsValue> {
        self.command(Command::SetContrast(percent))
    }

    #[wasm_bindgen(js_name = setSaturation)]
    pub fn set_saturation(&self, percent: f64) -> Result<(), JsValue> {
        self.command(Command::SetSaturation(percent))
    }

    #[wasm_bindgen(js_name = toggleFit)]
    pub fn toggle_fit(&self) -> Result<(), JsValue> {
        self.command(Command::ToggleFit)
    }

    #[wasm_bindgen(js_name = resetFilters)]
    pub fn reset_filters(&self) -> Result<(), JsValue> {
        self.command(Command::ResetFilters)
    }

    #[wasm_bindgen(js_name = toggleSettings)]
    pub fn toggle_settings(&self) -> Result<(), JsValue> {
        self.command(Command::ToggleSettings)
    }

    /// Open the settings panel on `"playback"`, `"quality"` or `"display"`
    #[wasm_bindgen(js_name = openSettings)]
    pub fn open_settings(&self, tab: &str) -> Result<(), JsValue> {
        self.command(Command::OpenSettings(parse_tab(tab)?))
    }

    #[wasm_bindgen(js_name = closeSettings)]
    pub fn close_settings(&self) -> Result<(), JsValue> {
        self.command(Command::CloseSettings)
    }

    #[wasm_bindgen(js_name = selectTab)]
    pub fn select_tab(&self, tab: &str) -> Result<(), JsValue> {
        self.command(Command::SelectSettingsTab(parse_tab(tab)?))
    }

    #[wasm_bindgen(js_name = pointerActivity)]
    pub fn pointer_activity(&self) -> Result<(), JsValue> {
        self.command(Command::PointerActivity)
    }

    #[wasm_bindgen(js_name = pointerLeave)]
    pub fn pointer_leave(&self) -> Result<(), JsValue> {
        self.command(Command::PointerLeave)
    }

    /// Current player state as a plain object
    pub fn state(&self) -> Result<JsValue, JsValue> {
        let session = self.session.try_borrow().map_err(js_error)?;
        serde_wasm_bindgen::to_value(session.state()).map_err(js_error)
    }

    /// Quality menu entries, auto first
    #[wasm_bindgen(js_name = qualityLevels)]
    pub fn quality_levels(&self) -> Result<JsValue, JsValue> {
        let session = self.session.try_borrow().map_err(js_error)?;
        let selected = session.selected_quality();
        let levels: Vec<LevelView> = session
            .quality_levels()
            .iter()
            .map(|level| LevelView {
                index: level.index,
                height: level.height_px,
                label: level.label(),
                selected: level.index == selected,
            })
            .collect();
        serde_wasm_bindgen::to_value(&levels).map_err(js_error)
    }

    /// Buffered bar segments as `[left, width]` fractions of the duration
    #[wasm_bindgen(js_name = bufferedSegments)]
    pub fn buffered_segments(&self) -> Result<JsValue, JsValue> {
        let session = self.session.try_borrow().map_err(js_error)?;
        let duration = session.state().duration;
        let segments: Vec<(f64, f64)> = session
            .buffered()
            .iter()
            .filter_map(|range| range.bar_geometry(duration))
            .collect();
        serde_wasm_bindgen::to_value(&segments).map_err(js_error)
    }

    /// Controls visibility, settings panel and display filter
    pub fn chrome(&self) -> Result<JsValue, JsValue> {
        let session = self.session.try_borrow().map_err(js_error)?;
        let settings = session.settings();
        let view = ChromeView {
            controls_visible: session.controls_visible(),
            settings_open: settings.open,
            active_tab: settings.active_tab.label(),
            filter: session.filter().to_string(),
            object_fit: session.object_fit(),
        };
        serde_wasm_bindgen::to_value(&view).map_err(js_error)
    }

    /// Speeds offered in the playback tab
    #[wasm_bindgen(js_name = playbackSpeeds)]
    pub fn playback_speeds(&self) -> Result<Vec<f64>, JsValue> {
        let session = self.session.try_borrow().map_err(js_error)?;
        Ok(session.config().playback_speeds.clone())
    }

    /// Register a callback receiving every new state
    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, callback: js_sys::Function) {
        *self.on_state.borrow_mut() = Some(callback);
    }

    /// Release the engine, the element and all timers
    pub fn destroy(&self) -> Result<(), JsValue> {
        self.on_state.borrow_mut().take();
        self.command(Command::Teardown)
    }
}

/// Drain sink, engine and timer events into the session until it is gone
async fn run_inbox(session: Weak<RefCell<Session>>, mut rx: EventReceiver) {
    while let Some(envelope) = rx.recv().await {
        if !deliver(&session, envelope, yield_now).await {
            break;
        }
    }
    debug!("Inbox closed");
}

/// Dispatch one envelope, waiting out a borrow held by an exported method.
/// Returns false once the session has been dropped.
async fn deliver<S, F, Fut>(session: &Weak<RefCell<PlayerSession<S>>>, envelope: Envelope, mut wait: F) -> bool
where
    S: MediaSink,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let Some(session) = session.upgrade() else {
            return false;
        };
        if let Ok(mut session) = session.try_borrow_mut() {
            if let Err(e) = session.dispatch(envelope) {
                warn!(error = %e, "Event failed");
            }
            return true;
        }
        drop(session);
        debug!("Session busy, event deferred");
        wait().await;
    }
}

/// Let the current task finish before retrying
async fn yield_now() {
    let tick = js_sys::Promise::resolve(&JsValue::UNDEFINED);
    if let Err(e) = wasm_bindgen_futures::JsFuture::from(tick).await {
        warn!(error = ?e, "Microtask yield failed");
    }
}

/// Call the registered JS callback for every published state
async fn forward_states(
    mut states: watch::Receiver<PlayerState>,
    callback: Rc<RefCell<Option<js_sys::Function>>>,
) {
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        let Some(callback) = callback.borrow().clone() else {
            continue;
        };
        match serde_wasm_bindgen::to_value(&state) {
            Ok(value) => {
                if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                    warn!(error = ?e, "State callback threw");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize state"),
        }
    }
}
