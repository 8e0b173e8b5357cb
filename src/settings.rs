//! Core Settings
//!
//! Tunables for the simulation clock and the instance storage growth policy.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nbcore::settings::CoreSettings;
//!
//! // Defaults: 60 Hz tick, +1024 atlas growth at 90% occupancy
//! let settings = CoreSettings::default();
//!
//! // Partial documents fall back to defaults for missing fields
//! let settings = CoreSettings::from_json_str(r#"{ "tick_rate_hz": 30.0 }"#)?;
//! ```

use serde::Deserialize;

use crate::errors::{CoreError, Result};

/// Configuration shared by every subsystem of a [`RenderWorld`](crate::world::RenderWorld).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// Simulation tick frequency. The tick interval is `1 / tick_rate_hz`.
    pub tick_rate_hz: f32,

    /// Number of records a mesh's instance buffer grows by when full.
    pub instance_buffer_increment: usize,

    /// Initial slot capacity of the global instance atlas.
    pub atlas_initial_capacity: usize,
    /// Slots added to the atlas on each growth.
    pub atlas_growth_step: usize,
    /// Occupancy ratio above which the atlas grows.
    pub atlas_growth_threshold: f32,

    /// Fractional growth of the per-frame packed array when a frame overflows it.
    pub packed_growth_factor: f32,
    /// Mesh ranges inside the packed array start on multiples of this many records.
    pub instance_alignment: usize,
    /// Upper bound on bytes handed to the backend per frame.
    pub max_frame_transfer_bytes: usize,

    /// Maximum simulation ticks run for a single rendered frame.
    pub max_frame_steps: u32,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            instance_buffer_increment: 32,
            atlas_initial_capacity: 1024,
            atlas_growth_step: 1024,
            atlas_growth_threshold: 0.9,
            packed_growth_factor: 0.25,
            instance_alignment: 4,
            max_frame_transfer_bytes: 64 * 1024 * 1024,
            max_frame_steps: 5,
        }
    }
}

impl CoreSettings {
    /// Parses and validates a JSON settings document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Length of one simulation tick in seconds.
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> f32 {
        1.0 / self.tick_rate_hz
    }

    /// Checks every field against its valid range.
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(invalid(
                "tick_rate_hz",
                format!("must be positive, got {}", self.tick_rate_hz),
            ));
        }
        if self.instance_buffer_increment == 0 {
            return Err(invalid("instance_buffer_increment", "must be at least 1".into()));
        }
        if self.atlas_initial_capacity == 0 {
            return Err(invalid("atlas_initial_capacity", "must be at least 1".into()));
        }
        if self.atlas_growth_step == 0 {
            return Err(invalid("atlas_growth_step", "must be at least 1".into()));
        }
        if !(self.atlas_growth_threshold > 0.0 && self.atlas_growth_threshold <= 1.0) {
            return Err(invalid(
                "atlas_growth_threshold",
                format!("must be in (0, 1], got {}", self.atlas_growth_threshold),
            ));
        }
        if !(self.packed_growth_factor.is_finite() && self.packed_growth_factor > 0.0) {
            return Err(invalid("packed_growth_factor", "must be positive".into()));
        }
        if self.instance_alignment == 0 {
            return Err(invalid("instance_alignment", "must be at least 1".into()));
        }
        if self.max_frame_steps == 0 {
            return Err(invalid("max_frame_steps", "must be at least 1".into()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> CoreError {
    CoreError::InvalidSetting { field, reason }
}
