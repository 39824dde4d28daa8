//! Closed-loop performance controller
//!
//! Holds the mutable tuning state, applies the classifier's tier at start,
//! and once per cadence turns counted frames into an FPS sample and
//! re-evaluates the tier. The hysteresis band keeps small deviations from
//! causing a change, and a change never moves more than one tier.

use super::history::{FpsHistory, FpsRatioSource, FrameCounter, SharedFpsRatio};
use super::surface::{RenderSurface, SurfaceSettings};
use crate::config::{BandPosition, HysteresisBand, TuningConfig};
use crate::error::{PerfTierError, Result};
use crate::notify::{NotificationSink, TuningEvent};
use crate::system::{
    CapabilityAssessment, CapabilityClassifier, HardwareProfile, PerformanceTier,
    RenderComplexityMode,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Allowed manual frame-rate range
pub const FPS_RANGE: (u32, u32) = (15, 144);

/// Allowed manual resolution-scale range
pub const RESOLUTION_SCALE_RANGE: (f64, f64) = (0.5, 2.0);

/// Highest effects level
pub const MAX_EFFECTS_LEVEL: u8 = 4;

/// Tuning state owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceState {
    /// Active tier
    pub current_tier: PerformanceTier,
    /// Frame rate the loop measures against
    pub target_fps: u32,
    /// Render resolution multiplier
    pub resolution_scale: f64,
    /// Effects level 0-4
    pub effects_level: u8,
    /// Derived complexity mode
    pub render_complexity: RenderComplexityMode,
}

impl PerformanceState {
    /// State matching a tier's preset
    pub fn for_tier(tier: PerformanceTier) -> Self {
        let preset = tier.preset();
        Self {
            current_tier: tier,
            target_fps: preset.target_fps,
            resolution_scale: preset.resolution_scale,
            effects_level: preset.effects_level,
            render_complexity: tier.render_complexity(),
        }
    }

    fn validate(&self) -> Result<()> {
        let (fps_min, fps_max) = FPS_RANGE;
        if !(fps_min..=fps_max).contains(&self.target_fps) {
            return Err(PerfTierError::snapshot(format!(
                "target_fps {} outside [{}, {}]",
                self.target_fps, fps_min, fps_max
            )));
        }
        let (scale_min, scale_max) = RESOLUTION_SCALE_RANGE;
        if !(scale_min..=scale_max).contains(&self.resolution_scale) {
            return Err(PerfTierError::snapshot(format!(
                "resolution_scale {} outside [{}, {}]",
                self.resolution_scale, scale_min, scale_max
            )));
        }
        if self.effects_level > MAX_EFFECTS_LEVEL {
            return Err(PerfTierError::snapshot(format!(
                "effects_level {} above {}",
                self.effects_level, MAX_EFFECTS_LEVEL
            )));
        }
        Ok(())
    }
}

impl Default for PerformanceState {
    fn default() -> Self {
        Self::for_tier(PerformanceTier::Standard)
    }
}

/// Loop counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerMetrics {
    /// Evaluations run
    pub evaluations: u64,
    /// One-step upgrades applied
    pub upgrades: u64,
    /// One-step downgrades applied
    pub downgrades: u64,
    /// FPS samples appended
    pub samples_recorded: u64,
    /// Cadences with no FPS source
    pub samples_skipped: u64,
}

/// Result of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationOutcome {
    /// No FPS samples yet
    NoData,
    /// Ratio inside the band
    Hold {
        /// Realized/target ratio
        ratio: f64,
    },
    /// Tier moved one step
    Changed {
        /// Tier before
        from: PerformanceTier,
        /// Tier after
        to: PerformanceTier,
        /// Realized/target ratio
        ratio: f64,
    },
    /// Ratio outside the band but already at the floor or ceiling
    Saturated {
        /// Tier held
        tier: PerformanceTier,
        /// Realized/target ratio
        ratio: f64,
    },
}

/// Exportable controller state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Tuning state
    pub state: PerformanceState,
    /// FPS samples, oldest first
    pub history: Vec<f64>,
    /// Loop counters
    pub metrics: ControllerMetrics,
}

/// Stops a running control loop from anywhere
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Halt future ticks
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the loop is still allowed to tick
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Performance controller
pub struct PerformanceController {
    cadence: Duration,
    band: HysteresisBand,
    auto_complexity: bool,
    state: PerformanceState,
    history: FpsHistory,
    frames: FrameCounter,
    window_start: Instant,
    ratio: SharedFpsRatio,
    surface: Option<Box<dyn RenderSurface>>,
    sink: Option<Arc<dyn NotificationSink>>,
    last_profile: Option<HardwareProfile>,
    running: Arc<AtomicBool>,
    metrics: ControllerMetrics,
}

impl PerformanceController {
    /// Create a controller with no surface attached
    pub fn new(config: &TuningConfig) -> Self {
        Self {
            cadence: config.cadence(),
            band: config.hysteresis,
            auto_complexity: config.auto_complexity,
            state: PerformanceState::default(),
            history: FpsHistory::new(config.history_capacity),
            frames: FrameCounter::new(),
            window_start: Instant::now(),
            ratio: SharedFpsRatio::new(),
            surface: None,
            sink: None,
            last_profile: None,
            running: Arc::new(AtomicBool::new(false)),
            metrics: ControllerMetrics::default(),
        }
    }

    /// Attach a rendering surface
    pub fn with_surface(mut self, surface: Box<dyn RenderSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Attach a notification sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Bind a surface after construction and push the current settings to it
    pub fn attach_surface(&mut self, surface: Box<dyn RenderSurface>) {
        self.surface = Some(surface);
        self.push_settings();
    }

    /// Unbind the surface; later changes become pure state updates
    pub fn detach_surface(&mut self) -> Option<Box<dyn RenderSurface>> {
        self.surface.take()
    }

    /// Classify, apply the starting tier, and arm the loop
    ///
    /// Without a profile the last known one is reused; without either the
    /// controller starts at `standard`.
    pub fn initialize(&mut self, profile: Option<HardwareProfile>) -> CapabilityAssessment {
        if profile.is_some() {
            self.last_profile = profile;
        }
        let assessment = CapabilityClassifier::classify_or_default(self.last_profile.as_ref());

        self.apply_tier(assessment.performance_tier);
        self.notify(TuningEvent::tier_changed(assessment.performance_tier));

        self.frames.take();
        self.window_start = Instant::now();
        self.running.store(true, Ordering::Release);

        info!(
            "Performance controller initialized at tier {} (target {} fps, cadence {})",
            self.state.current_tier,
            self.state.target_fps,
            humantime::format_duration(self.cadence)
        );
        assessment
    }

    /// Handle the render side uses to count frames
    pub fn frame_counter(&self) -> FrameCounter {
        self.frames.clone()
    }

    /// Count one rendered frame
    pub fn record_frame(&self) {
        self.frames.record_frame();
    }

    /// Handle publishing the latest FPS ratio
    pub fn fps_ratio_handle(&self) -> SharedFpsRatio {
        self.ratio.clone()
    }

    /// Latest realized/target ratio
    pub fn fps_ratio(&self) -> Option<f64> {
        self.ratio.fps_ratio()
    }

    /// Append an FPS sample directly
    pub fn record_sample(&mut self, fps: f64) {
        self.history.push(fps);
        self.metrics.samples_recorded += 1;
    }

    /// One cadence step: close the sampling window, then evaluate
    ///
    /// Returns `None` when the loop is stopped.
    pub fn tick(&mut self) -> Option<EvaluationOutcome> {
        self.tick_at(Instant::now())
    }

    /// [`Self::tick`] with an explicit clock reading
    pub fn tick_at(&mut self, now: Instant) -> Option<EvaluationOutcome> {
        if !self.is_running() {
            return None;
        }
        self.close_window(now);
        Some(self.evaluate())
    }

    fn close_window(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        self.window_start = now;
        let frames = self.frames.take();

        let sample = if frames > 0 && !elapsed.is_zero() {
            Some(frames as f64 / elapsed.as_secs_f64())
        } else {
            self.surface.as_ref().and_then(|s| s.current_fps())
        };

        match sample {
            Some(fps) => self.record_sample(fps),
            None => {
                self.metrics.samples_skipped += 1;
                debug!("No FPS sample this cadence, skipping");
            }
        }
    }

    /// Compare the moving average against the target and move at most one tier
    pub fn evaluate(&mut self) -> EvaluationOutcome {
        self.metrics.evaluations += 1;

        let Some(average) = self.history.average() else {
            return EvaluationOutcome::NoData;
        };
        if self.state.target_fps == 0 {
            return EvaluationOutcome::NoData;
        }

        let ratio = average / self.state.target_fps as f64;
        self.ratio.set(ratio);
        let current = self.state.current_tier;

        let next = match self.band.position(ratio) {
            BandPosition::Within => {
                debug!("FPS ratio {:.2} within band, holding {}", ratio, current);
                return EvaluationOutcome::Hold { ratio };
            }
            BandPosition::Below => current.step_down(),
            BandPosition::Above => current.step_up(),
        };

        match next {
            Some(to) => {
                if to < current {
                    self.metrics.downgrades += 1;
                } else {
                    self.metrics.upgrades += 1;
                }
                info!(
                    "FPS ratio {:.2} ({:.1}/{} fps), tier {} -> {}",
                    ratio, average, self.state.target_fps, current, to
                );
                self.set_tier(to);
                EvaluationOutcome::Changed {
                    from: current,
                    to,
                    ratio,
                }
            }
            None => EvaluationOutcome::Saturated {
                tier: current,
                ratio,
            },
        }
    }

    /// Switch tier and apply its preset
    pub fn set_tier(&mut self, tier: PerformanceTier) {
        let previous = self.state.current_tier;
        self.apply_tier(tier);
        if previous != tier {
            self.notify(TuningEvent::tier_changed(tier));
        }
    }

    fn apply_tier(&mut self, tier: PerformanceTier) {
        let preset = tier.preset();
        self.state.current_tier = tier;
        self.state.target_fps = preset.target_fps;
        self.state.resolution_scale = preset.resolution_scale;
        self.state.effects_level = preset.effects_level;
        if self.auto_complexity {
            self.state.render_complexity = tier.render_complexity();
        }
        self.push_settings();
    }

    /// Override the target frame rate, clamped to [15, 144]
    pub fn set_target_fps(&mut self, fps: u32) {
        let (min, max) = FPS_RANGE;
        self.state.target_fps = fps.clamp(min, max);
        self.push_settings();
    }

    /// Override the resolution scale, clamped to [0.5, 2.0]
    pub fn set_resolution_scale(&mut self, scale: f64) {
        let (min, max) = RESOLUTION_SCALE_RANGE;
        let scale = if scale.is_nan() { min } else { scale };
        self.state.resolution_scale = scale.clamp(min, max);
        self.push_settings();
    }

    /// Override the effects level, clamped to [0, 4]
    pub fn set_effects_level(&mut self, level: u8) {
        self.state.effects_level = level.min(MAX_EFFECTS_LEVEL);
        self.push_settings();
    }

    /// Toggle tier-derived complexity mode
    pub fn set_auto_complexity(&mut self, enabled: bool) {
        self.auto_complexity = enabled;
        if enabled {
            self.state.render_complexity = self.state.current_tier.render_complexity();
            self.push_settings();
        }
    }

    /// Settings the surface would receive right now
    pub fn surface_settings(&self) -> SurfaceSettings {
        let quality = self.state.current_tier.render_quality();
        let preset_level = self.state.current_tier.preset().effects_level;
        let mut effects = quality.effects.clone();
        if self.state.effects_level < preset_level {
            effects.truncate(self.state.effects_level as usize);
        }
        SurfaceSettings {
            target_fps: self.state.target_fps,
            resolution_scale: self.state.resolution_scale,
            effects_level: self.state.effects_level,
            effects,
            quality_preset: quality,
            complexity: self.auto_complexity.then_some(self.state.render_complexity),
        }
    }

    fn push_settings(&mut self) {
        if self.surface.is_none() {
            return;
        }
        let settings = self.surface_settings();
        if let Some(surface) = self.surface.as_mut() {
            surface.apply_settings(&settings);
        }
    }

    fn notify(&self, event: TuningEvent) {
        if let Some(sink) = &self.sink {
            sink.notify(&event);
        }
    }

    /// Current tuning state
    pub fn state(&self) -> &PerformanceState {
        &self.state
    }

    /// Active tier
    pub fn current_tier(&self) -> PerformanceTier {
        self.state.current_tier
    }

    /// FPS history
    pub fn history(&self) -> &FpsHistory {
        &self.history
    }

    /// Loop counters
    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    /// Profile used by the last initialization
    pub fn last_profile(&self) -> Option<&HardwareProfile> {
        self.last_profile.as_ref()
    }

    /// Handle that stops the loop
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Halt future ticks
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether ticks are being processed
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Drive ticks at the configured cadence until stopped
    pub async fn run(&mut self) {
        if !self.is_running() {
            return;
        }
        let mut interval = tokio::time::interval(self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        interval.tick().await;
        self.window_start = Instant::now();

        loop {
            interval.tick().await;
            if self.tick().is_none() {
                debug!("Performance loop stopped");
                break;
            }
        }
    }

    /// Export state, history and counters
    pub fn export_snapshot(&self) -> Result<serde_json::Value> {
        let snapshot = PerformanceSnapshot {
            state: self.state.clone(),
            history: self.history.samples().collect(),
            metrics: self.metrics.clone(),
        };
        Ok(serde_json::to_value(snapshot)?)
    }

    /// Validate and apply a snapshot
    ///
    /// A malformed snapshot is rejected whole and live state is untouched.
    pub fn import_snapshot(&mut self, value: &serde_json::Value) -> Result<()> {
        let snapshot = PerformanceSnapshot::deserialize(value)
            .map_err(|e| PerfTierError::snapshot(format!("performance snapshot: {}", e)))?;

        snapshot.state.validate()?;
        if snapshot.history.len() > self.history.capacity() {
            return Err(PerfTierError::snapshot(format!(
                "history holds {} samples, capacity is {}",
                snapshot.history.len(),
                self.history.capacity()
            )));
        }
        if snapshot.history.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(PerfTierError::snapshot("history contains invalid samples"));
        }

        let previous = self.state.current_tier;
        let mut history = FpsHistory::new(self.history.capacity());
        for sample in &snapshot.history {
            history.push(*sample);
        }

        self.state = snapshot.state;
        self.history = history;
        self.metrics = snapshot.metrics;
        self.push_settings();
        if previous != self.state.current_tier {
            self.notify(TuningEvent::tier_changed(self.state.current_tier));
        }
        Ok(())
    }
}
