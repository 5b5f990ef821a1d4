//! `HTMLVideoElement` media sink
//!
//! DOM listeners are registered per attachment and removed on detach, so a
//! detached element can never post into the inbox again.

use marquee_core::{
    event::EventSender, AttachmentId, Envelope, FilterDescriptor, MediaEvent, MediaSink, PlayToken,
    SourceKind,
};
use tracing::{debug, warn};
use wasm_bindgen::{prelude::*, JsCast};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Event, HtmlVideoElement};

/// DOM events forwarded to the player
const MEDIA_EVENTS: [&str; 11] = [
    "loadedmetadata",
    "durationchange",
    "waiting",
    "playing",
    "pause",
    "seeking",
    "seeked",
    "timeupdate",
    "progress",
    "ended",
    "error",
];

type DomListener = Closure<dyn FnMut(Event)>;

pub struct VideoElementSink {
    video: HtmlVideoElement,
    tx: EventSender,
    attachment: Option<AttachmentId>,
    listeners: Vec<(&'static str, DomListener)>,
}

impl VideoElementSink {
    pub fn new(video: HtmlVideoElement, tx: EventSender) -> Self {
        Self {
            video,
            tx,
            attachment: None,
            listeners: Vec::new(),
        }
    }

    pub fn element(&self) -> &HtmlVideoElement {
        &self.video
    }

    /// Push the display filter and fit onto the element's inline style
    pub fn apply_display(&self, filter: &FilterDescriptor, object_fit: &str) {
        let style = self.video.style();
        if let Err(e) = style.set_property("filter", &filter.to_string()) {
            warn!(error = ?e, "Failed to set filter");
        }
        if let Err(e) = style.set_property("object-fit", object_fit) {
            warn!(error = ?e, "Failed to set object-fit");
        }
    }

    fn post(&self, event: MediaEvent) {
        if let Some(attachment) = self.attachment {
            let _ = self.tx.send(Envelope::media(attachment, event));
        }
    }

    fn listen(&mut self, attachment: AttachmentId) {
        for name in MEDIA_EVENTS {
            let video = self.video.clone();
            let tx = self.tx.clone();
            let listener: DomListener = Closure::new(move |_event: Event| {
                if let Some(event) = translate(name, &video) {
                    let _ = tx.send(Envelope::media(attachment, event));
                }
            });
            match self
                .video
                .add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
            {
                Ok(()) => self.listeners.push((name, listener)),
                Err(e) => warn!(event = name, error = ?e, "Failed to add media listener"),
            }
        }
    }

    fn unlisten(&mut self) {
        for (name, listener) in self.listeners.drain(..) {
            if let Err(e) = self
                .video
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
            {
                warn!(event = name, error = ?e, "Failed to remove media listener");
            }
        }
    }
}

/// Read the element state that goes with a DOM event
fn translate(name: &str, video: &HtmlVideoElement) -> Option<MediaEvent> {
    let event = match name {
        "loadedmetadata" => MediaEvent::LoadedMetadata {
            duration: video.duration(),
        },
        "durationchange" => MediaEvent::DurationChange {
            duration: video.duration(),
        },
        "waiting" => MediaEvent::Waiting,
        "playing" => MediaEvent::Playing,
        "pause" => MediaEvent::Pause,
        "seeking" => MediaEvent::Seeking,
        "seeked" => MediaEvent::Seeked {
            time: video.current_time(),
        },
        "timeupdate" => MediaEvent::TimeUpdate {
            time: video.current_time(),
        },
        "progress" => MediaEvent::Progress,
        "ended" => MediaEvent::Ended,
        "error" => MediaEvent::Error {
            message: video
                .error()
                .map(|e| format!("media error {}: {}", e.code(), e.message()))
                .unwrap_or_else(|| "media error".to_string()),
        },
        _ => return None,
    };
    Some(event)
}

impl MediaSink for VideoElementSink {
    fn can_play_natively(&self, kind: SourceKind) -> bool {
        // "", "maybe" or "probably"
        !self.video.can_play_type(kind.mime_type()).is_empty()
    }

    fn bind(&mut self, attachment: AttachmentId) {
        self.unlisten();
        self.attachment = Some(attachment);
        self.listen(attachment);
        debug!(attachment = %attachment, "Video element bound");
    }

    fn load_native(&mut self, url: &str) {
        self.video.set_src(url);
        self.video.load();
    }

    fn play(&mut self, token: PlayToken) {
        let Some(attachment) = self.attachment else {
            return;
        };
        let promise = match self.video.play() {
            Ok(promise) => promise,
            Err(e) => {
                self.post(MediaEvent::PlayRejected {
                    token,
                    reason: describe(&e),
                });
                return;
            }
        };

        let tx = self.tx.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let event = match JsFuture::from(promise).await {
                Ok(_) => MediaEvent::PlayResolved { token },
                Err(e) => MediaEvent::PlayRejected {
                    token,
                    reason: describe(&e),
                },
            };
            let _ = tx.send(Envelope::media(attachment, event));
        });
    }

    fn pause(&mut self) {
        if let Err(e) = self.video.pause() {
            warn!(error = ?e, "pause() threw");
        }
    }

    fn seek_to(&mut self, time: f64) {
        self.video.set_current_time(time);
    }

    fn set_volume(&mut self, volume: f64) {
        self.video.set_volume(volume);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.video.set_playback_rate(rate);
    }

    fn buffered(&self) -> Vec<(f64, f64)> {
        let ranges = self.video.buffered();
        (0..ranges.length())
            .filter_map(|i| Some((ranges.start(i).ok()?, ranges.end(i).ok()?)))
            .collect()
    }

    fn detach(&mut self) {
        self.unlisten();
        self.attachment = None;
        if let Err(e) = self.video.remove_attribute("src") {
            warn!(error = ?e, "Failed to clear src");
        }
        self.video.load();
    }
}

impl Drop for VideoElementSink {
    fn drop(&mut self) {
        self.unlisten();
    }
}

/// Error name of a rejected promise, e.g. `NotAllowedError`
fn describe(error: &JsValue) -> String {
    error
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.name()))
        .or_else(|| error.as_string())
        .unwrap_or_else(|| "play() rejected".to_string())
}
