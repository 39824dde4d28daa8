//! Bounded FPS history and the lock-free handles around it

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Circular buffer of FPS samples, oldest dropped at capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpsHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FpsHistory {
    /// Create an empty history
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, dropping the oldest when full
    ///
    /// Non-finite or negative samples are ignored.
    pub fn push(&mut self, fps: f64) {
        if !fps.is_finite() || fps < 0.0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    /// Moving average over the retained samples
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
        }
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are retained
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum retained samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Frame counter shared with the render side
///
/// Cloning yields another handle onto the same counter.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    frames: Arc<AtomicU32>,
}

impl FrameCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one rendered frame
    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset the count
    pub fn take(&self) -> u32 {
        self.frames.swap(0, Ordering::Relaxed)
    }

    /// Current count without resetting
    pub fn peek(&self) -> u32 {
        self.frames.load(Ordering::Relaxed)
    }
}

/// Anything that can report the realized/target FPS ratio
pub trait FpsRatioSource: Send + Sync {
    /// Latest ratio, `None` before the first evaluation with data
    fn fps_ratio(&self) -> Option<f64>;
}

/// Ratio published by the controller after each evaluation
///
/// Stored as f64 bits; NaN means unset.
#[derive(Debug, Clone)]
pub struct SharedFpsRatio {
    bits: Arc<AtomicU64>,
}

impl Default for SharedFpsRatio {
    fn default() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(f64::NAN.to_bits())),
        }
    }
}

impl SharedFpsRatio {
    /// Create an unset ratio
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new ratio
    pub fn set(&self, ratio: f64) {
        self.bits.store(ratio.to_bits(), Ordering::Release);
    }

    /// Forget the ratio
    pub fn clear(&self) {
        self.bits.store(f64::NAN.to_bits(), Ordering::Release);
    }
}

impl FpsRatioSource for SharedFpsRatio {
    fn fps_ratio(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        (!value.is_nan()).then_some(value)
    }
}
