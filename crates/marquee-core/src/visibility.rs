//! Transport controls visibility and the settings panel

use crate::{
    timer::{CancellableTimer, Scheduler, TimerId, TimerKind},
    types::{SettingsPanelState, SettingsTab},
};
use std::time::Duration;
use tracing::debug;

/// Auto-hide for the transport controls plus the single settings panel
#[derive(Debug)]
pub struct VisibilityManager {
    controls_visible: bool,
    settings: SettingsPanelState,
    hide_timer: CancellableTimer,
    hide_delay: Duration,
}

impl VisibilityManager {
    pub fn new(hide_delay: Duration) -> Self {
        Self {
            controls_visible: false,
            settings: SettingsPanelState::default(),
            hide_timer: CancellableTimer::new(TimerKind::ControlsHide),
            hide_delay,
        }
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn settings(&self) -> SettingsPanelState {
        self.settings
    }

    /// Pointer or touch activity: show controls and restart the countdown
    pub fn on_activity(&mut self, scheduler: &mut dyn Scheduler) {
        self.controls_visible = true;
        self.hide_timer.arm(scheduler, self.hide_delay);
    }

    /// Pointer left the player: hide at once unless settings are open
    pub fn on_pointer_leave(&mut self, scheduler: &mut dyn Scheduler) {
        if self.settings.open {
            return;
        }
        self.hide_timer.cancel(scheduler);
        self.controls_visible = false;
    }

    /// Handle a fired timer. Returns false if it was not ours or stale.
    pub fn on_timer(&mut self, id: TimerId, playing: bool) -> bool {
        if !self.hide_timer.fire(id) {
            return false;
        }
        if self.settings.open || !playing {
            debug!(settings_open = self.settings.open, playing, "Controls kept visible");
        } else {
            self.controls_visible = false;
        }
        true
    }

    /// Playback (re)started: resume the countdown if controls are showing
    pub fn on_playback_resumed(&mut self, scheduler: &mut dyn Scheduler) {
        if self.controls_visible && !self.hide_timer.is_pending() {
            self.hide_timer.arm(scheduler, self.hide_delay);
        }
    }

    pub fn toggle_settings(&mut self, scheduler: &mut dyn Scheduler) {
        if self.settings.open {
            self.close_settings(scheduler);
        } else {
            self.open_settings(self.settings.active_tab, scheduler);
        }
    }

    /// Open the panel on `tab`; opening while open only switches tabs
    pub fn open_settings(&mut self, tab: SettingsTab, scheduler: &mut dyn Scheduler) {
        self.settings = SettingsPanelState {
            open: true,
            active_tab: tab,
        };
        self.controls_visible = true;
        self.hide_timer.cancel(scheduler);
    }

    pub fn close_settings(&mut self, scheduler: &mut dyn Scheduler) {
        if !self.settings.open {
            return;
        }
        self.settings.open = false;
        if self.controls_visible {
            self.hide_timer.arm(scheduler, self.hide_delay);
        }
    }

    /// Switch tabs; ignored while the panel is closed
    pub fn select_tab(&mut self, tab: SettingsTab) {
        if self.settings.open {
            self.settings.active_tab = tab;
        }
    }

    /// Cancel the countdown and close the panel
    pub fn cancel(&mut self, scheduler: &mut dyn Scheduler) {
        self.hide_timer.cancel(scheduler);
        self.settings = SettingsPanelState::default();
        self.controls_visible = false;
    }
}
