use crate::entity::{Entity, EntityId, EntityType};
use crate::scene::NodeHandle;
use crate::scene::components::TransformComponent;
use crate::scene::transform::TransformData;

/// A scene graph node: an [`Entity`] with a place in the hierarchy.
///
/// # Hierarchy
///
/// Nodes live in the [`Scene`](crate::scene::Scene) arena and refer to each
/// other by [`NodeHandle`]:
/// - `parent`: `None` for root nodes
/// - `children`: ordered child handles
///
/// Capability data (transform, mesh, light, joint, animation, scene) sits in
/// `entity.components`.
#[derive(Debug, Clone)]
pub struct Node {
    pub entity: Entity,
    pub name: String,

    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    /// Expanded in the editor outliner.
    pub is_open: bool,
    /// Candidate for instanced drawing.
    pub is_renderable: bool,
}

impl Node {
    /// Creates an unregistered node of the given scene-node type.
    ///
    /// # Panics
    /// `entity_type` must be a scene-node type.
    #[must_use]
    pub fn new(name: &str, entity_type: EntityType) -> Self {
        assert!(
            entity_type.is_scene_node(),
            "{entity_type:?} is not a scene node type"
        );
        Self {
            entity: Entity::new(entity_type),
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            is_open: false,
            is_renderable: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> Option<&TransformData> {
        self.entity.components.get::<TransformComponent>().map(|t| &t.data)
    }

    #[inline]
    pub fn transform_mut(&mut self) -> Option<&mut TransformData> {
        self.entity
            .components
            .get_mut::<TransformComponent>()
            .map(|t| &mut t.data)
    }
}
