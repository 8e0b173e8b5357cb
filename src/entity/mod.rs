//! Entity Module
//!
//! Stable identities for every engine object:
//! - [`EntityId`]: monotonically increasing `u64`, `0` means "not registered"
//! - [`Entity`]: id + type + capability [`Components`]
//! - [`EntityRegistry`]: id lookup and per-type buckets

pub mod component;
pub mod registry;

pub use component::{Component, ComponentKind, ComponentMask, ComponentVariant, Components};
pub use registry::{EntityHandle, EntityRegistry};

use std::fmt;

/// Session-unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Sentinel carried by entities that have not been registered.
    pub const UNASSIGNED: Self = Self(0);

    #[inline]
    #[must_use]
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tag used for bucketed lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// Generic bucket holding every scene-node subtype.
    SceneNode,
    ModelNode,
    GroupNode,
    MeshNode,
    LightNode,
    LocatorNode,
    JointNode,
    /// Instanced mesh resource ([`NbMesh`](crate::instancing::NbMesh)).
    Mesh,
    AnimationClip,
    Skeleton,
}

impl EntityType {
    /// Whether entities of this type live in the scene graph.
    #[must_use]
    pub fn is_scene_node(self) -> bool {
        matches!(
            self,
            Self::SceneNode
                | Self::ModelNode
                | Self::GroupNode
                | Self::MeshNode
                | Self::LightNode
                | Self::LocatorNode
                | Self::JointNode
        )
    }
}

/// An engine object: identity plus optional capability components.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) id: EntityId,
    entity_type: EntityType,
    pub components: Components,
}

impl Entity {
    #[must_use]
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            id: EntityId::UNASSIGNED,
            entity_type,
            components: Components::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    #[inline]
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.id.is_assigned()
    }
}
