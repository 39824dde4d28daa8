//! Configuration settings for PerfTier
//!
//! Defines the construction-time tuning knobs, CLI arguments, and defaults
//! shared by the controller and the precision manager.

use crate::error::{IoResultExt, PerfTierError, Result};
use crate::system::{GpuVendorClass, PerformanceTier};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Highest precision level the store supports
pub const MAX_PRECISION_LEVEL: u8 = 4;

/// Hard ceiling for a single hardware detection
pub const MAX_DETECT_TIMEOUT_MS: u64 = 5000;

/// PerfTier - hardware-aware performance tiering
#[derive(Parser, Debug, Clone)]
#[command(name = "perftier")]
#[command(author = "PerfTier Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hardware-aware render tuning with FPS feedback and tiered precision storage")]
#[command(long_about = r#"
PerfTier profiles the host, derives a rendering tier, and keeps that tier
honest against realized frame rate.

Examples:
  perftier detect                               # Profile this machine
  perftier classify --memory-gb 6 --gpu unknown # Classify a synthetic profile
  perftier simulate --samples 20,20,20          # Replay FPS samples
  perftier precision --cells 50000 --target-gb 0.001
"#)]
pub struct CliArgs {
    /// Path to a JSON tuning config
    #[arg(short = 'c', long, global = true, value_name = "PATH", env = "PERFTIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Detect hardware and print the capability assessment
    #[command(name = "detect")]
    Detect {
        /// Print the profile and assessment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a synthetic hardware profile
    #[command(name = "classify")]
    Classify {
        /// Memory in GB
        #[arg(long, default_value = "4")]
        memory_gb: f64,
        /// GPU vendor class
        #[arg(long, value_enum, default_value = "unknown")]
        gpu: GpuVendorClass,
    },

    /// Replay FPS samples through the feedback loop
    #[command(name = "simulate")]
    Simulate {
        /// Comma-separated FPS samples, one per cadence
        #[arg(long, value_delimiter = ',', required = true)]
        samples: Vec<f64>,
        /// Starting tier (defaults to the detected one)
        #[arg(long, value_enum)]
        tier: Option<PerformanceTier>,
        /// Cadence between samples (e.g. 1s, 250ms)
        #[arg(long, value_parser = humantime::parse_duration)]
        cadence: Option<Duration>,
    },

    /// Estimate precision store memory and savings
    #[command(name = "precision")]
    Precision {
        /// Number of cells to register
        #[arg(long, default_value = "10000")]
        cells: usize,
        /// Memory budget in GB to optimize for
        #[arg(long)]
        target_gb: Option<f64>,
    },
}

/// Ratio band inside which no corrective change happens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisBand {
    /// Ratios strictly below this trigger a downgrade
    pub low: f64,
    /// Ratios strictly above this trigger an upgrade
    pub high: f64,
}

/// Where an FPS ratio falls relative to the band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    /// Realized rate is too low
    Below,
    /// Inside the band, hold steady
    Within,
    /// Realized rate has headroom
    Above,
}

impl HysteresisBand {
    /// Classify a realized/target ratio
    pub fn position(&self, ratio: f64) -> BandPosition {
        if ratio < self.low {
            BandPosition::Below
        } else if ratio > self.high {
            BandPosition::Above
        } else {
            BandPosition::Within
        }
    }
}

impl Default for HysteresisBand {
    fn default() -> Self {
        Self { low: 0.8, high: 1.2 }
    }
}

/// One row of the layer to precision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPrecisionRule {
    /// First layer covered (inclusive)
    pub min_layer: u32,
    /// Last layer covered (inclusive)
    pub max_layer: u32,
    /// Precision level for layers in range
    pub level: u8,
}

/// Construction-time tuning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Sampling/evaluation cadence in milliseconds
    pub cadence_ms: u64,
    /// FPS ratio hysteresis band
    pub hysteresis: HysteresisBand,
    /// Number of FPS samples kept
    pub history_capacity: usize,
    /// Highest precision level the store may use
    pub max_precision_level: u8,
    /// Ceiling for one hardware detection
    pub detect_timeout_ms: u64,
    /// Layer ranges mapped to precision levels, first match wins
    pub layer_precision: Vec<LayerPrecisionRule>,
    /// Level for layers no rule covers
    pub default_layer_level: u8,
    /// Modeled bytes per cell at full precision
    pub per_cell_bytes: u64,
    /// Derive render complexity mode from the tier
    pub auto_complexity: bool,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 1000,
            hysteresis: HysteresisBand::default(),
            history_capacity: 60,
            max_precision_level: MAX_PRECISION_LEVEL,
            detect_timeout_ms: 3000,
            layer_precision: vec![
                LayerPrecisionRule { min_layer: 1, max_layer: 3, level: 4 },
                LayerPrecisionRule { min_layer: 4, max_layer: 6, level: 3 },
                LayerPrecisionRule { min_layer: 7, max_layer: 9, level: 2 },
            ],
            default_layer_level: 4,
            per_cell_bytes: 64,
            auto_complexity: true,
        }
    }
}

impl TuningConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PerfTierError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)
    }

    /// Reject settings the controller or store cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.cadence_ms == 0 {
            return Err(PerfTierError::config("cadence_ms must be greater than zero"));
        }
        if self.history_capacity == 0 {
            return Err(PerfTierError::config("history_capacity must be greater than zero"));
        }
        let band = self.hysteresis;
        if !(band.low > 0.0 && band.low <= 1.0 && band.high >= 1.0) {
            return Err(PerfTierError::config(format!(
                "hysteresis band [{}, {}] must bracket 1.0",
                band.low, band.high
            )));
        }
        if self.max_precision_level > MAX_PRECISION_LEVEL {
            return Err(PerfTierError::config(format!(
                "max_precision_level {} exceeds {}",
                self.max_precision_level, MAX_PRECISION_LEVEL
            )));
        }
        for rule in &self.layer_precision {
            if rule.min_layer > rule.max_layer {
                return Err(PerfTierError::config(format!(
                    "layer rule {}-{} is inverted",
                    rule.min_layer, rule.max_layer
                )));
            }
        }
        Ok(())
    }

    /// Cadence as a duration
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms.max(1))
    }

    /// Detection ceiling, kept within [500 ms, 5 s]
    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms.clamp(500, MAX_DETECT_TIMEOUT_MS))
    }

    /// Precision level configured for a logical layer
    pub fn level_for_layer(&self, layer: u32) -> u8 {
        self.layer_precision
            .iter()
            .find(|rule| (rule.min_layer..=rule.max_layer).contains(&layer))
            .map(|rule| rule.level)
            .unwrap_or(self.default_layer_level)
            .min(MAX_PRECISION_LEVEL)
    }
}
