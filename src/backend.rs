//! Render backend seam.
//!
//! The core prepares CPU-side data; a [`RenderBackend`] owns the GPU. Each
//! frame [`RenderWorld::render_frame`](crate::world::RenderWorld::render_frame)
//! calls, in order:
//!
//! 1. [`wait_for_atlas_idle`](RenderBackend::wait_for_atlas_idle)
//! 2. [`upload_skinning`](RenderBackend::upload_skinning) per skeleton
//! 3. [`upload_instance_atlas`](RenderBackend::upload_instance_atlas) once
//! 4. [`bind_mesh_range`](RenderBackend::bind_mesh_range) + [`draw`](RenderBackend::draw) per mesh

use glam::Mat4;

use crate::instancing::MeshInstance;
use crate::scene::{MeshKey, SkeletonKey};

pub trait RenderBackend {
    /// Blocks until the GPU no longer reads last frame's atlas.
    fn wait_for_atlas_idle(&mut self);

    /// Uploads the packed instance records; `total_size` is in bytes.
    fn upload_instance_atlas(&mut self, instances: &[MeshInstance], total_size: usize);

    /// Binds the `[offset, offset + size)` record window for `mesh`.
    fn bind_mesh_range(&mut self, mesh: MeshKey, offset: usize, size: usize);

    fn draw(&mut self, mesh: MeshKey, instance_count: usize);

    fn upload_skinning(&mut self, _skeleton: SkeletonKey, _joint_matrices: &[Mat4]) {}
}

/// Per-frame counters returned by `render_frame`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes_drawn: usize,
    pub meshes_skipped: usize,
    pub instances_drawn: usize,
    pub bytes_uploaded: usize,
}
