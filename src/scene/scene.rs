use glam::{Affine3A, Vec3};
use slotmap::SlotMap;

use crate::animation::skeleton::Skeleton;
use crate::entity::{ComponentVariant, EntityHandle, EntityRegistry, EntityType};
use crate::errors::{CoreError, Result};
use crate::scene::components::TransformComponent;
use crate::scene::node::Node;
use crate::scene::transform::TransformData;
use crate::scene::{NodeHandle, SkeletonKey};

/// Scene graph storage.
///
/// Nodes live in a single arena; parent/child links are handles, so there
/// are no owning back-references. A node goes through three stages:
///
/// 1. created (in the arena, detached, id = sentinel)
/// 2. registered (id assigned, attached under a parent or as a root)
/// 3. removed (detached, id released, slot freed)
///
/// Removal of whole subtrees is orchestrated by
/// [`RenderWorld`](crate::world::RenderWorld) so every subsystem drops the
/// node in the same frame.
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) nodes: SlotMap<NodeHandle, Node>,
    pub(crate) root_nodes: Vec<NodeHandle>,

    pub skeletons: SlotMap<SkeletonKey, Skeleton>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Creation & Registration
    // ========================================================================

    /// Starts building a node.
    pub fn build_node(&mut self, name: &str, entity_type: EntityType) -> NodeBuilder<'_> {
        NodeBuilder::new(self, name, entity_type)
    }

    /// Inserts a detached, unregistered node into the arena.
    pub fn create_node(&mut self, node: Node) -> NodeHandle {
        self.nodes.insert(node)
    }

    /// Assigns an id to the node and attaches it under `parent` (root if `None`).
    ///
    /// Returns `false` if the node is already registered.
    ///
    /// # Panics
    /// `handle` must refer to a live node.
    pub fn register_node(
        &mut self,
        registry: &mut EntityRegistry,
        handle: NodeHandle,
        parent: Option<NodeHandle>,
    ) -> bool {
        let node = self
            .nodes
            .get_mut(handle)
            .unwrap_or_else(|| panic!("register_node: {handle:?} is not a live node"));

        if !registry.register(&mut node.entity, EntityHandle::Node(handle)) {
            return false;
        }

        match parent {
            Some(parent) => {
                if let Err(err) = self.attach(handle, parent) {
                    log::error!("Registering `{}` as root: {err}", self.name_of(handle));
                    self.root_nodes.push(handle);
                }
            }
            None => self.root_nodes.push(handle),
        }
        true
    }

    /// Detaches a childless node, releases its id and frees its slot.
    ///
    /// # Panics
    /// Removing a node that still has children would orphan them.
    pub fn remove_node(
        &mut self,
        registry: &mut EntityRegistry,
        handle: NodeHandle,
    ) -> Option<Node> {
        let node = self.nodes.get(handle)?;
        assert!(
            node.children.is_empty(),
            "remove_node: `{}` still has {} children",
            node.name,
            node.children.len()
        );

        self.unlink(handle);
        let mut node = self.nodes.remove(handle)?;
        registry.unregister(&mut node.entity);
        Some(node)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Moves `child` under `parent`, keeping both sides in sync.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(CoreError::NodeNotFound(format!("{child:?}")));
        }
        if !self.nodes.contains_key(parent) {
            return Err(CoreError::NodeNotFound(format!("{parent:?}")));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(CoreError::HierarchyCycle {
                child: self.name_of(child).to_string(),
                parent: self.name_of(parent).to_string(),
            });
        }

        self.unlink(child);

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Makes `child` a root node.
    pub fn detach(&mut self, child: NodeHandle) {
        if !self.nodes.contains_key(child) {
            log::warn!("detach: {child:?} is not a live node");
            return;
        }
        self.unlink(child);
        self.root_nodes.push(child);
    }

    /// Removes `handle` from its parent's child list (or the root list).
    fn unlink(&mut self, handle: NodeHandle) {
        let old_parent = self.nodes.get(handle).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p)
                && let Some(i) = n.children.iter().position(|&x| x == handle)
            {
                n.children.remove(i);
            }
        } else if let Some(i) = self.root_nodes.iter().position(|&x| x == handle) {
            self.root_nodes.remove(i);
        }
        if let Some(n) = self.nodes.get_mut(handle) {
            n.parent = None;
        }
    }

    /// Whether `ancestor` appears on the parent chain of `node`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.nodes.get(handle).and_then(|n| n.parent);
        }
        false
    }

    /// `root` and all its descendants, children before parents.
    #[must_use]
    pub fn collect_subtree_post_order(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((handle, expanded)) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            if expanded {
                out.push(handle);
            } else {
                stack.push((handle, true));
                for &child in node.children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        out
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[must_use]
    pub fn root_nodes(&self) -> &[NodeHandle] {
        &self.root_nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn name_of(&self, handle: NodeHandle) -> &str {
        self.nodes.get(handle).map_or("<removed>", |n| n.name.as_str())
    }

    /// First node named `name` in the subtree rooted at `root` (depth-first).
    #[must_use]
    pub fn find_by_name_under(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let node = self.nodes.get(handle)?;
            if node.name == name {
                return Some(handle);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// First node named `name` under any root.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.root_nodes
            .iter()
            .find_map(|&root| self.find_by_name_under(root, name))
    }

    /// Typed component access on a node.
    #[must_use]
    pub fn component<C: ComponentVariant>(&self, handle: NodeHandle) -> Option<&C> {
        self.nodes.get(handle)?.entity.components.get::<C>()
    }

    pub fn component_mut<C: ComponentVariant>(&mut self, handle: NodeHandle) -> Option<&mut C> {
        self.nodes.get_mut(handle)?.entity.components.get_mut::<C>()
    }

    /// Effective world matrix: the node's own, or the nearest transformed
    /// ancestor's for nodes without a transform.
    #[must_use]
    pub fn world_matrix(&self, handle: NodeHandle) -> Affine3A {
        let mut current = Some(handle);
        while let Some(h) = current {
            let Some(node) = self.nodes.get(h) else {
                break;
            };
            if let Some(t) = node.transform() {
                return t.world_matrix;
            }
            current = node.parent;
        }
        Affine3A::IDENTITY
    }
}

/// Fluent construction of an unregistered node.
pub struct NodeBuilder<'a> {
    scene: &'a mut Scene,
    node: Node,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(scene: &'a mut Scene, name: &str, entity_type: EntityType) -> Self {
        Self {
            scene,
            node: Node::new(name, entity_type),
        }
    }

    /// Adds a transform at the given position.
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        let components = &mut self.node.entity.components;
        if let Some(t) = components.get_mut::<TransformComponent>() {
            t.data.translation = Vec3::new(x, y, z);
        } else {
            let mut data = TransformData::new();
            data.translation = Vec3::new(x, y, z);
            components.insert(TransformComponent::new(data));
        }
        self
    }

    #[must_use]
    pub fn with_transform(mut self, data: TransformData) -> Self {
        self.node.entity.components.insert(TransformComponent::new(data));
        self
    }

    #[must_use]
    pub fn controllable(mut self) -> Self {
        let components = &mut self.node.entity.components;
        if !components.has::<TransformComponent>() {
            components.insert(TransformComponent::default());
        }
        if let Some(t) = components.get_mut::<TransformComponent>() {
            t.controllable = true;
        }
        self
    }

    #[must_use]
    pub fn with_component<C: ComponentVariant>(mut self, component: C) -> Self {
        self.node.entity.components.insert(component);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.node.is_renderable = false;
        self
    }

    /// Inserts the node into the arena, detached and unregistered.
    pub fn build(self) -> NodeHandle {
        self.scene.create_node(self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(
        scene: &mut Scene,
        registry: &mut EntityRegistry,
        name: &str,
        parent: Option<NodeHandle>,
    ) -> NodeHandle {
        let handle = scene.build_node(name, EntityType::GroupNode).build();
        assert!(scene.register_node(registry, handle, parent));
        handle
    }

    #[test]
    fn register_attaches_and_assigns_id() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let root = registered(&mut scene, &mut registry, "root", None);
        let child = registered(&mut scene, &mut registry, "child", Some(root));

        assert_eq!(scene.root_nodes(), &[root]);
        assert_eq!(scene.get_node(child).unwrap().parent(), Some(root));
        assert_eq!(scene.get_node(root).unwrap().children(), &[child]);
        assert!(scene.get_node(child).unwrap().id().is_assigned());
    }

    #[test]
    fn register_twice_is_rejected() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let root = registered(&mut scene, &mut registry, "root", None);
        assert!(!scene.register_node(&mut registry, root, None));
        assert_eq!(scene.root_nodes().len(), 1);
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let a = registered(&mut scene, &mut registry, "a", None);
        let b = registered(&mut scene, &mut registry, "b", Some(a));

        assert!(matches!(scene.attach(a, b), Err(CoreError::HierarchyCycle { .. })));
        assert!(matches!(scene.attach(a, a), Err(CoreError::HierarchyCycle { .. })));
        assert_eq!(scene.get_node(b).unwrap().parent(), Some(a));
    }

    #[test]
    fn reattach_moves_between_parents() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let p1 = registered(&mut scene, &mut registry, "p1", None);
        let p2 = registered(&mut scene, &mut registry, "p2", None);
        let c = registered(&mut scene, &mut registry, "c", Some(p1));

        scene.attach(c, p2).unwrap();
        assert!(scene.get_node(p1).unwrap().children().is_empty());
        assert_eq!(scene.get_node(p2).unwrap().children(), &[c]);

        scene.detach(c);
        assert!(scene.root_nodes().contains(&c));
        assert!(scene.get_node(p2).unwrap().children().is_empty());
    }

    #[test]
    fn subtree_is_post_order() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let r = registered(&mut scene, &mut registry, "r", None);
        let a = registered(&mut scene, &mut registry, "a", Some(r));
        let b = registered(&mut scene, &mut registry, "b", Some(a));

        assert_eq!(scene.collect_subtree_post_order(r), vec![b, a, r]);
        assert_eq!(scene.find_by_name("b"), Some(b));
        assert_eq!(scene.find_by_name("missing"), None);
    }

    #[test]
    fn remove_node_releases_id() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let r = registered(&mut scene, &mut registry, "r", None);
        let c = registered(&mut scene, &mut registry, "c", Some(r));
        let id = scene.get_node(c).unwrap().id();

        let removed = scene.remove_node(&mut registry, c).unwrap();
        assert!(!removed.entity.is_registered());
        assert!(!registry.contains(id));
        assert!(scene.get_node(r).unwrap().children().is_empty());
    }
}
