use glam::{Affine3A, Quat, Vec3};

/// A translation / rotation / scale triple.
///
/// This is the unit the transform controllers buffer and interpolate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl TransformState {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Component-wise lerp of position/scale, slerp of rotation.
    ///
    /// `t >= 1` returns `to` exactly so the end of an interpolation window
    /// lands on the target state bit-for-bit.
    #[must_use]
    pub fn interpolate(from: &Self, to: &Self, t: f32) -> Self {
        if t >= 1.0 {
            return *to;
        }
        if t <= 0.0 {
            return *from;
        }
        Self {
            position: from.position.lerp(to.position, t),
            rotation: from.rotation.slerp(to.rotation, t),
            scale: from.scale.lerp(to.scale, t),
        }
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Local TRS plus cached local / world / inverse-world matrices.
///
/// Matrices are never refreshed implicitly: the transformation system
/// recalculates them when an update is requested for the owning node.
#[derive(Debug, Clone)]
pub struct TransformData {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,
    pub(crate) world_matrix_inverse: Affine3A,
}

impl TransformData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,

            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,
            world_matrix_inverse: Affine3A::IDENTITY,
        }
    }

    #[must_use]
    pub fn from_state(state: &TransformState) -> Self {
        let mut data = Self::new();
        data.apply_state(state);
        data.recalculate_local();
        data
    }

    // ========================================================================
    // Recalculation
    // ========================================================================

    /// Rebuilds the local matrix from the current TRS.
    pub fn recalculate_local(&mut self) {
        self.local_matrix =
            Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation);
    }

    /// Rebuilds local, world and inverse-world matrices under `parent_world`.
    pub fn recalculate(&mut self, parent_world: &Affine3A) {
        self.recalculate_local();
        self.world_matrix = *parent_world * self.local_matrix;
        self.world_matrix_inverse = self.world_matrix.inverse();
    }

    // ========================================================================
    // State exchange with controllers
    // ========================================================================

    #[must_use]
    pub fn state(&self) -> TransformState {
        TransformState::new(self.translation, self.rotation, self.scale)
    }

    pub fn apply_state(&mut self, state: &TransformState) {
        self.translation = state.position;
        self.rotation = state.rotation;
        self.scale = state.scale;
    }

    // ========================================================================
    // Getters
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix_inverse(&self) -> &Affine3A {
        &self.world_matrix_inverse
    }
}

impl Default for TransformData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_do_not_recalculate() {
        let mut t = TransformData::new();
        t.translation = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(*t.local_matrix(), Affine3A::IDENTITY);

        t.recalculate(&Affine3A::IDENTITY);
        assert_eq!(t.world_matrix().translation, Vec3::new(1.0, 2.0, 3.0).into());
    }

    #[test]
    fn inverse_tracks_world() {
        let mut t = TransformData::new();
        t.translation = Vec3::new(4.0, 0.0, 0.0);
        t.scale = Vec3::splat(2.0);
        let parent = Affine3A::from_translation(Vec3::Y);
        t.recalculate(&parent);

        let round = *t.world_matrix() * *t.world_matrix_inverse();
        assert!(round.abs_diff_eq(Affine3A::IDENTITY, 1e-5));
    }

    #[test]
    fn interpolate_endpoints_are_exact() {
        let a = TransformState::IDENTITY;
        let b = TransformState::new(
            Vec3::new(0.3, 0.1, 0.7),
            Quat::from_rotation_z(0.9),
            Vec3::splat(1.7),
        );
        assert_eq!(TransformState::interpolate(&a, &b, 1.0), b);
        assert_eq!(TransformState::interpolate(&a, &b, 0.0), a);
    }
}
