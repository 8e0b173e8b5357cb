use glam::{Quat, Vec3};

use crate::scene::transform::TransformState;

/// Double-buffered transform state for one dynamic entity.
///
/// Producers write `future` during a simulation tick. [`advance`](Self::advance)
/// rotates the buffers at the tick boundary, and [`update`](Self::update)
/// interpolates `prev -> next` at render rate.
#[derive(Debug, Clone)]
pub struct TransformController {
    prev: TransformState,
    next: TransformState,
    future: TransformState,
    current: TransformState,

    time: f32,
    interval: f32,
    interpolation_coeff: f32,
}

impl TransformController {
    /// Creates a controller resting at `initial`.
    ///
    /// # Panics
    /// `interval` must be positive.
    #[must_use]
    pub fn new(initial: TransformState, interval: f32) -> Self {
        assert!(interval > 0.0, "controller interval must be positive, got {interval}");
        Self {
            prev: initial,
            next: initial,
            future: initial,
            current: initial,
            time: 0.0,
            interval,
            interpolation_coeff: 0.0,
        }
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    pub fn add_future_state(&mut self, position: Vec3, rotation: Quat, scale: Vec3) {
        self.future = TransformState::new(position, rotation, scale);
    }

    pub fn set_future_position(&mut self, position: Vec3) {
        self.future.position = position;
    }

    pub fn set_future_rotation(&mut self, rotation: Quat) {
        self.future.rotation = rotation;
    }

    pub fn set_future_scale(&mut self, scale: Vec3) {
        self.future.scale = scale;
    }

    // ========================================================================
    // Clocks
    // ========================================================================

    /// Tick boundary: `current -> prev`, `future -> next`, time reset.
    pub fn advance(&mut self) {
        self.prev = self.current;
        self.next = self.future;
        self.time = 0.0;
        self.interpolation_coeff = 0.0;
    }

    /// Render step: accumulates `dt` (clamped to the interval) and
    /// interpolates the current state.
    pub fn update(&mut self, dt: f32) -> &TransformState {
        self.time = (self.time + dt.max(0.0)).min(self.interval);
        self.interpolation_coeff = (self.time / self.interval).clamp(0.0, 1.0);
        self.current =
            TransformState::interpolate(&self.prev, &self.next, self.interpolation_coeff);
        &self.current
    }

    // ========================================================================
    // Getters
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn prev(&self) -> &TransformState {
        &self.prev
    }

    #[inline]
    #[must_use]
    pub fn next(&self) -> &TransformState {
        &self.next
    }

    #[inline]
    #[must_use]
    pub fn future(&self) -> &TransformState {
        &self.future
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> &TransformState {
        &self.current
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }

    #[inline]
    #[must_use]
    pub fn interpolation_coeff(&self) -> f32 {
        self.interpolation_coeff
    }
}
