//! Display filters - brightness, contrast, saturation and fit

use crate::types::{FilterState, VideoFit};
use serde::{Deserialize, Serialize};

/// Composed visual filter, rendered as a CSS `filter` value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
}

impl FilterDescriptor {
    /// True when the filter leaves the picture unchanged
    pub fn is_identity(&self) -> bool {
        self.brightness == 100.0 && self.contrast == 100.0 && self.saturation == 100.0
    }
}

impl std::fmt::Display for FilterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "brightness({}%) contrast({}%) saturate({}%)",
            self.brightness, self.contrast, self.saturation
        )
    }
}

/// Compose the three percentages into one descriptor
pub fn compose_filter(brightness: f64, contrast: f64, saturation: f64) -> FilterDescriptor {
    FilterDescriptor {
        brightness,
        contrast,
        saturation,
    }
}

/// Slider range applied when no configuration is given
pub const DEFAULT_FILTER_BOUNDS: (f64, f64) = (0.0, 200.0);

/// Holds the display settings; every change recomputes synchronously
#[derive(Debug, Clone)]
pub struct DisplayFilterController {
    state: FilterState,
    bounds: (f64, f64),
}

impl DisplayFilterController {
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_FILTER_BOUNDS)
    }

    /// Percentages outside `bounds` are clamped
    pub fn with_bounds(bounds: (f64, f64)) -> Self {
        Self {
            state: FilterState::default(),
            bounds,
        }
    }

    fn clamp(&self, percent: f64) -> f64 {
        if percent.is_nan() {
            return 100.0_f64.clamp(self.bounds.0, self.bounds.1);
        }
        percent.clamp(self.bounds.0, self.bounds.1)
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn set_brightness(&mut self, percent: f64) -> FilterDescriptor {
        self.state.brightness = self.clamp(percent);
        self.descriptor()
    }

    pub fn set_contrast(&mut self, percent: f64) -> FilterDescriptor {
        self.state.contrast = self.clamp(percent);
        self.descriptor()
    }

    pub fn set_saturation(&mut self, percent: f64) -> FilterDescriptor {
        self.state.saturation = self.clamp(percent);
        self.descriptor()
    }

    pub fn set_fit(&mut self, fit: VideoFit) {
        self.state.fit = fit;
    }

    pub fn toggle_fit(&mut self) -> VideoFit {
        self.state.fit = self.state.fit.toggled();
        self.state.fit
    }

    /// Restore 100% on every channel; fit is left alone
    pub fn reset(&mut self) -> FilterDescriptor {
        let fit = self.state.fit;
        self.state = FilterState {
            fit,
            ..FilterState::default()
        };
        self.descriptor()
    }

    pub fn descriptor(&self) -> FilterDescriptor {
        compose_filter(self.state.brightness, self.state.contrast, self.state.saturation)
    }

    /// CSS `object-fit` value
    pub fn object_fit(&self) -> &'static str {
        self.state.fit.as_css()
    }
}

impl Default for DisplayFilterController {
    fn default() -> Self {
        Self::new()
    }
}
