//! Configuration module for PerfTier
//!
//! Provides the tuning configuration, CLI arguments, and the shared
//! hysteresis band.

mod settings;

pub use settings::*;
