//! Instanced Rendering Module
//!
//! CPU-side storage for instanced draws:
//! - [`MeshInstance`]: the fixed-layout per-instance GPU record
//! - [`NbMesh`]: one mesh's growable instance buffer with swap-compaction
//! - [`InstanceAtlas`]: global slot store + per-frame packed upload array
//! - [`InstanceManager`]: ties components, meshes and the atlas together
//!
//! # Data Flow
//!
//! ```text
//! component ──add_instance──▶ NbMesh slot ──allocate──▶ atlas slot
//!                                  │
//!                       prepare() each frame
//!                                  ▼
//!                      packed atlas ──▶ RenderBackend
//! ```

pub mod atlas;
pub mod instance;
pub mod manager;
pub mod mesh;

pub use atlas::{AtlasRange, InstanceAtlas};
pub use instance::{InstancePayload, MeshInstance};
pub use manager::InstanceManager;
pub use mesh::{NbMesh, SlotRelease, SwapRemoval};

use crate::entity::ComponentKind;
use crate::scene::{MeshKey, NodeHandle};

/// Local instance slot held by a component; negative means "no instance".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceSlot(i32);

impl InstanceSlot {
    pub const NONE: Self = Self(-1);

    #[must_use]
    pub fn from_index(index: usize) -> Self {
        assert!(i32::try_from(index).is_ok(), "instance slot {index} exceeds i32::MAX");
        Self(index as i32)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    #[inline]
    #[must_use]
    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl Default for InstanceSlot {
    fn default() -> Self {
        Self::NONE
    }
}

/// A component's link to its mesh instance.
#[derive(Debug, Clone)]
pub struct InstanceBinding {
    pub mesh: MeshKey,
    pub(crate) slot: InstanceSlot,
    pub(crate) dirty: bool,
}

impl InstanceBinding {
    #[must_use]
    pub fn new(mesh: MeshKey) -> Self {
        Self {
            mesh,
            slot: InstanceSlot::NONE,
            dirty: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> InstanceSlot {
        self.slot
    }

    /// Set when the record must be rewritten (moved by compaction or the
    /// owner's transform changed).
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Back-reference from a mesh slot to the component that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceOwner {
    pub node: NodeHandle,
    pub kind: ComponentKind,
}

/// Component kinds that can own an instance.
pub const INSTANCED_KINDS: [ComponentKind; 3] =
    [ComponentKind::Mesh, ComponentKind::Light, ComponentKind::Joint];
