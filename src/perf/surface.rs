//! Rendering surface collaborator

use crate::system::{Effect, RenderComplexityMode, RenderQuality};
use serde::{Deserialize, Serialize};

/// Everything pushed to the renderer on a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSettings {
    /// Target frame rate
    pub target_fps: u32,
    /// Render resolution multiplier
    pub resolution_scale: f64,
    /// Effects level 0-4
    pub effects_level: u8,
    /// Effects enabled by the tier preset
    pub effects: Vec<Effect>,
    /// Full preset of the current tier
    pub quality_preset: RenderQuality,
    /// Derived complexity mode, if coupling is enabled
    pub complexity: Option<RenderComplexityMode>,
}

/// The renderer this subsystem tunes
pub trait RenderSurface: Send {
    /// Apply new settings
    fn apply_settings(&mut self, settings: &SurfaceSettings);

    /// Frame rate the renderer measured itself, if it tracks one
    fn current_fps(&self) -> Option<f64> {
        None
    }
}
