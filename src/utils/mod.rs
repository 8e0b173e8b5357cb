//! Utility Module
//!
//! - [`Timer`]: wall-clock frame timing
//! - [`FixedStepClock`]: fixed-timestep accumulator driving simulation ticks

pub mod time;

pub use time::{FixedStepClock, Timer};
