//! # PerfTier - Hardware-Aware Performance Tiering
//!
//! PerfTier profiles the host, classifies it into one of six ordered
//! performance tiers, and keeps that tier honest against the frame rate the
//! renderer actually achieves. Alongside it sits a tiered-precision store
//! that keeps many floating values at a memory-bounded fixed-point
//! resolution.
//!
//! ## Features
//!
//! - **Hardware Profiling**: Best-effort memory, CPU, GPU vendor and device class detection
//! - **Capability Classification**: Exhaustive (vendor, memory) tier table with render presets
//! - **FPS Feedback Loop**: Hysteretic one-step tier changes driven by a moving average
//! - **Tiered Precision**: Integer + residue encoding with per-layer levels and memory optimization
//! - **Snapshots**: JSON export/import of controller and store state
//!
//! ## Quick Start
//!
//! ```no_run
//! use perftier::config::TuningConfig;
//! use perftier::perf::PerformanceController;
//! use perftier::system::HardwareProfiler;
//!
//! # async fn demo() {
//! let config = TuningConfig::default();
//! let profiler = HardwareProfiler::new(&config);
//! let profile = profiler.detect().await;
//!
//! let mut controller = PerformanceController::new(&config);
//! let assessment = controller.initialize(Some(profile));
//! assessment.print_summary();
//!
//! // Render side counts frames; the loop samples and re-evaluates each second
//! let frames = controller.frame_counter();
//! frames.record_frame();
//! controller.run().await;
//! # }
//! ```
//!
//! ## Precision Store
//!
//! ```no_run
//! use perftier::config::TuningConfig;
//! use perftier::precision::PrecisionManager;
//!
//! let mut store = PrecisionManager::new(&TuningConfig::default());
//! let encoded = store.encode("joint.angle", 1.23456, 8);
//! assert_eq!(encoded.precision_level, 2);
//!
//! let result = store.optimize_for_memory(0.5);
//! result.print_summary();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod notify;
pub mod perf;
pub mod precision;
pub mod system;

// Re-export commonly used types
pub use config::TuningConfig;
pub use error::{PerfTierError, Result};
pub use perf::PerformanceController;
pub use precision::PrecisionManager;
pub use system::{CapabilityClassifier, HardwareProfiler, PerformanceTier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use perftier::prelude::*;
    //! ```

    pub use crate::config::{HysteresisBand, LayerPrecisionRule, TuningConfig};
    pub use crate::error::{PerfTierError, Result};
    pub use crate::notify::{ChannelSink, NotificationSink, TracingSink, TuningEvent};
    pub use crate::perf::{
        EvaluationOutcome, FpsRatioSource, FrameCounter, PerformanceController, PerformanceState,
        RenderSurface, SharedFpsRatio, StopHandle, SurfaceSettings,
    };
    pub use crate::precision::{
        decode, encode_at_level, EncodedValue, OptimizationResult, PrecisionManager, ResidueTable,
    };
    pub use crate::system::{
        CapabilityAssessment, CapabilityClassifier, GpuVendorClass, HardwareProfile,
        HardwareProfiler, PerformanceTier, RenderComplexityMode,
    };
}
