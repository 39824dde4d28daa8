//! Tiered-precision value storage

mod codec;
mod manager;

pub use codec::*;
pub use manager::*;
