//! Frame-rate feedback loop
//!
//! The controller turns counted frames into FPS samples and moves the tier
//! one step at a time when the realized/target ratio leaves the hysteresis
//! band.

mod controller;
mod history;
mod surface;

pub use controller::*;
pub use history::*;
pub use surface::*;
