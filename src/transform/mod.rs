//! Transformation System Module
//!
//! - [`TransformController`]: per-entity prev/next/future buffers
//! - [`TransformationSystem`]: fixed-tick advance, render-rate interpolation
//!   and on-demand world matrix recompute

pub mod controller;
pub mod system;

pub use controller::TransformController;
pub use system::{TransformationSystem, update_hierarchy};
