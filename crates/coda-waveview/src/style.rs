//! Visual parameters for waveform rendering
//!
//! Three layers of visual state:
//!
//! - `WaveViewConfig`: on-disk defaults (YAML via `coda_core::config`),
//!   loaded once at startup
//! - `GlobalVisuals`: the process-wide style properties every view
//!   follows unless it has the matching independence flag set
//! - `RenderStyle`: the complete per-request snapshot handed to the
//!   background render thread, so rendering never reads view state

use serde::{Deserialize, Serialize};

use crate::color::Color;
use coda_core::db::db_to_coefficient;

/// Waveform body shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shape {
    /// Min/max straddling a midline
    #[default]
    Normal,
    /// |peak| rising from the bottom of the view
    Rectified,
}

/// Default clip threshold as a linear coefficient (~-0.1 dBFS), low
/// enough to flag inter-sample clipping on the reduced peak data.
pub const DEFAULT_CLIP_LEVEL: f32 = 0.98853;

/// Default vertical gradient depth.
pub const DEFAULT_GRADIENT_DEPTH: f64 = 0.6;

/// Process-wide visual properties shared by all waveform views.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVisuals {
    pub shape: Shape,
    pub logscaled: bool,
    pub gradient_depth: f64,
    pub show_waveform_clipping: bool,
    /// Linear clip threshold (not yet scaled by any region gain)
    pub clip_level: f32,
}

impl Default for GlobalVisuals {
    fn default() -> Self {
        Self {
            shape: Shape::Normal,
            logscaled: false,
            gradient_depth: DEFAULT_GRADIENT_DEPTH,
            show_waveform_clipping: true,
            clip_level: DEFAULT_CLIP_LEVEL,
        }
    }
}

/// Complete snapshot of the visual parameters one render needs.
///
/// Built on the GUI thread when a request is queued; the render
/// thread reads only this, never the originating view.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub height: u32,
    pub shape: Shape,
    pub logscaled: bool,
    pub gradient_depth: f64,
    pub fill_color: Color,
    pub outline_color: Color,
    pub zero_color: Color,
    pub clip_color: Color,
    pub show_zero: bool,
    pub show_clipping: bool,
    /// Linear clip threshold, already multiplied by the region's gain
    /// so indicators reflect on-disk data
    pub clip_level: f32,
}

/// On-disk configuration for the waveform display layer.
///
/// Loaded with `coda_core::config::load_config`; unknown or missing
/// fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveViewConfig {
    pub shape: Shape,
    pub logscaled: bool,
    pub gradient_depth: f64,
    pub show_waveform_clipping: bool,
    /// Clip threshold in dBFS
    pub clip_level_db: f32,
    pub fill_color: Color,
    pub outline_color: Color,
    pub zero_color: Color,
    pub clip_color: Color,
}

impl Default for WaveViewConfig {
    fn default() -> Self {
        Self {
            shape: Shape::Normal,
            logscaled: false,
            gradient_depth: DEFAULT_GRADIENT_DEPTH,
            show_waveform_clipping: true,
            clip_level_db: -0.1,
            fill_color: Color::from_rgb(0.36, 0.60, 0.82),
            outline_color: Color::from_rgb(0.12, 0.12, 0.12),
            zero_color: Color::from_rgb(1.0, 0.0, 0.0),
            clip_color: Color::from_rgb(1.0, 0.0, 0.0),
        }
    }
}

impl WaveViewConfig {
    /// The global style properties this configuration seeds.
    pub fn global_visuals(&self) -> GlobalVisuals {
        GlobalVisuals {
            shape: self.shape,
            logscaled: self.logscaled,
            gradient_depth: self.gradient_depth,
            show_waveform_clipping: self.show_waveform_clipping,
            clip_level: db_to_coefficient(self.clip_level_db),
        }
    }
}
