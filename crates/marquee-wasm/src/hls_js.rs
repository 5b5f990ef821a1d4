//! hls.js adaptive engine
//!
//! Binds the global `Hls` class. The page loads hls.js itself:
//!
//! ```html
//! <script src="https://cdn.jsdelivr.net/npm/hls.js@1"></script>
//! ```
//!
//! Without it, [`HlsJsFactory::is_supported`] reports false and only
//! natively playable sources can be loaded.

use crate::sink::VideoElementSink;
use marquee_core::{
    AdaptiveEngine, EngineErrorKind, EngineEvent, EngineFactory, EngineLevel, EngineListener,
    ListenerId, SourceKind,
};
use std::collections::HashMap;
use tracing::{debug, info};
use wasm_bindgen::{prelude::*, JsCast};

#[wasm_bindgen]
extern "C" {
    type Hls;

    #[wasm_bindgen(static_method_of = Hls, js_name = isSupported)]
    fn is_supported() -> bool;

    #[wasm_bindgen(constructor)]
    fn new() -> Hls;

    #[wasm_bindgen(method, js_name = loadSource)]
    fn load_source(this: &Hls, url: &str);

    #[wasm_bindgen(method, js_name = attachMedia)]
    fn attach_media(this: &Hls, media: &web_sys::HtmlMediaElement);

    #[wasm_bindgen(method)]
    fn on(this: &Hls, event: &str, handler: &js_sys::Function);

    #[wasm_bindgen(method)]
    fn off(this: &Hls, event: &str, handler: &js_sys::Function);

    #[wasm_bindgen(method, getter)]
    fn levels(this: &Hls) -> js_sys::Array;

    #[wasm_bindgen(method, getter, js_name = currentLevel)]
    fn current_level(this: &Hls) -> i32;

    #[wasm_bindgen(method, setter, js_name = currentLevel)]
    fn set_current_level(this: &Hls, level: i32);

    #[wasm_bindgen(method, js_name = startLoad)]
    fn start_load(this: &Hls);

    #[wasm_bindgen(method, js_name = recoverMediaError)]
    fn recover_media_error(this: &Hls);

    #[wasm_bindgen(method)]
    fn destroy(this: &Hls);
}

// Hls.Events values
const MANIFEST_PARSED: &str = "hlsManifestParsed";
const LEVEL_SWITCHED: &str = "hlsLevelSwitched";
const FRAG_LOADED: &str = "hlsFragLoaded";
const ERROR: &str = "hlsError";

type HlsHandler = Closure<dyn FnMut(JsValue, JsValue)>;

/// One hls.js instance
pub struct HlsJsEngine {
    hls: Hls,
    handlers: HashMap<ListenerId, Vec<(&'static str, HlsHandler)>>,
    next_listener: u64,
    destroyed: bool,
}

impl HlsJsEngine {
    fn new() -> Self {
        Self {
            hls: Hls::new(),
            handlers: HashMap::new(),
            next_listener: 0,
            destroyed: false,
        }
    }

    fn handler(listener: &EngineListener, translate: fn(&JsValue) -> Option<EngineEvent>) -> HlsHandler {
        let listener = listener.clone();
        Closure::new(move |_event: JsValue, data: JsValue| {
            if let Some(event) = translate(&data) {
                listener(event);
            }
        })
    }
}

fn prop(object: &JsValue, key: &str) -> JsValue {
    js_sys::Reflect::get(object, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn level_from(index: i32, level: &JsValue) -> EngineLevel {
    EngineLevel {
        index,
        height: prop(level, "height").as_f64().unwrap_or(0.0) as u32,
        bitrate: prop(level, "bitrate").as_f64().unwrap_or(0.0) as u64,
    }
}

fn levels_from(array: &js_sys::Array) -> Vec<EngineLevel> {
    array
        .iter()
        .enumerate()
        .map(|(i, level)| level_from(i as i32, &level))
        .collect()
}

fn manifest_parsed(data: &JsValue) -> Option<EngineEvent> {
    let levels = prop(data, "levels").dyn_into::<js_sys::Array>().ok()?;
    Some(EngineEvent::ManifestParsed {
        levels: levels_from(&levels),
    })
}

fn level_switched(data: &JsValue) -> Option<EngineEvent> {
    let level = prop(data, "level").as_f64()? as i32;
    Some(EngineEvent::LevelSwitched { level })
}

fn frag_loaded(_data: &JsValue) -> Option<EngineEvent> {
    Some(EngineEvent::FragmentLoaded)
}

fn error(data: &JsValue) -> Option<EngineEvent> {
    let kind = error_kind(&prop(data, "type").as_string().unwrap_or_default());
    Some(EngineEvent::Error {
        kind,
        fatal: prop(data, "fatal").as_bool().unwrap_or(false),
        details: prop(data, "details").as_string().unwrap_or_default(),
    })
}

/// Map `Hls.ErrorTypes` onto engine error classes
fn error_kind(error_type: &str) -> EngineErrorKind {
    match error_type {
        "networkError" => EngineErrorKind::Network,
        "mediaError" => EngineErrorKind::Media,
        _ => EngineErrorKind::Other,
    }
}

impl AdaptiveEngine<VideoElementSink> for HlsJsEngine {
    fn attach_media(&mut self, sink: &VideoElementSink) {
        self.hls.attach_media(sink.element());
    }

    fn load_source(&mut self, url: &str) {
        info!(url, "hls.js loading source");
        self.hls.load_source(url);
    }

    fn subscribe(&mut self, listener: EngineListener) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);

        let handlers: Vec<(&'static str, HlsHandler)> = vec![
            (MANIFEST_PARSED, Self::handler(&listener, manifest_parsed)),
            (LEVEL_SWITCHED, Self::handler(&listener, level_switched)),
            (FRAG_LOADED, Self::handler(&listener, frag_loaded)),
            (ERROR, Self::handler(&listener, error)),
        ];
        for (name, handler) in &handlers {
            self.hls.on(name, handler.as_ref().unchecked_ref());
        }
        self.handlers.insert(id, handlers);
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        if let Some(handlers) = self.handlers.remove(&id) {
            for (name, handler) in &handlers {
                self.hls.off(name, handler.as_ref().unchecked_ref());
            }
        }
    }

    fn levels(&self) -> Vec<EngineLevel> {
        levels_from(&self.hls.levels())
    }

    fn current_level(&self) -> i32 {
        self.hls.current_level()
    }

    fn set_level(&mut self, index: i32) {
        self.hls.set_current_level(index);
    }

    fn start_load(&mut self) {
        self.hls.start_load();
    }

    fn recover_media_error(&mut self) {
        self.hls.recover_media_error();
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let ids: Vec<ListenerId> = self.handlers.keys().copied().collect();
        for id in ids {
            self.unsubscribe(id);
        }
        self.hls.destroy();
        self.destroyed = true;
        debug!("hls.js instance destroyed");
    }
}

impl Drop for HlsJsEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Creates hls.js instances when the library is present
#[derive(Debug, Default, Clone, Copy)]
pub struct HlsJsFactory;

impl HlsJsFactory {
    fn library_loaded() -> bool {
        js_sys::Reflect::has(&js_sys::global(), &JsValue::from_str("Hls")).unwrap_or(false)
    }
}

impl EngineFactory<VideoElementSink> for HlsJsFactory {
    fn is_supported(&self, kind: SourceKind) -> bool {
        kind == SourceKind::Hls && Self::library_loaded() && Hls::is_supported()
    }

    fn create(&self) -> Box<dyn AdaptiveEngine<VideoElementSink>> {
        Box::new(HlsJsEngine::new())
    }
}
