//! Numeric building blocks for the allocation engine.

pub mod ema;
pub mod sigmoid;

pub use ema::*;
pub use sigmoid::*;
