//! Hardware profiling and capability classification
//!
//! Detects host signals into a [`HardwareProfile`] and derives the
//! [`CapabilityAssessment`] the controller starts from.

mod classify;
mod resources;

pub use classify::*;
pub use resources::*;
