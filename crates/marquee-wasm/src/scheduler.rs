//! `setTimeout` scheduler

use marquee_core::{event::EventSender, Envelope, Scheduler, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;
use wasm_bindgen::{prelude::*, JsCast};

struct PendingTimeout {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

/// Timers posted back into the player inbox from `window.setTimeout`
pub struct TimeoutScheduler {
    window: web_sys::Window,
    tx: EventSender,
    timeouts: HashMap<TimerId, PendingTimeout>,
}

impl TimeoutScheduler {
    pub fn new(tx: EventSender) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
        Ok(Self {
            window,
            tx,
            timeouts: HashMap::new(),
        })
    }
}

impl Scheduler for TimeoutScheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration) {
        // Earlier generations of this kind have fired or been cancelled
        self.timeouts.retain(|id, _| id.kind != timer.kind);

        let tx = self.tx.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            let _ = tx.send(Envelope::Timer(timer));
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);

        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), millis)
        {
            Ok(handle) => {
                self.timeouts.insert(
                    timer,
                    PendingTimeout {
                        handle,
                        _callback: callback,
                    },
                );
            }
            Err(e) => warn!(kind = ?timer.kind, error = ?e, "setTimeout failed"),
        }
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(pending) = self.timeouts.remove(&timer) {
            self.window.clear_timeout_with_handle(pending.handle);
        }
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        for (_, pending) in self.timeouts.drain() {
            self.window.clear_timeout_with_handle(pending.handle);
        }
    }
}
