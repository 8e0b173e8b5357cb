//! Transformation System
//!
//! Keeps world matrices in sync with the scene graph on two clocks:
//!
//! - **Simulation tick** ([`TransformationSystem::tick`]): controllers
//!   advance, queued [`request_entity_update`](TransformationSystem::request_entity_update)
//!   calls are resolved by recomputing world matrices immediately.
//! - **Render step** ([`TransformationSystem::update`]): controllers
//!   interpolate, the result is written into each node's `TransformData` and
//!   world matrices are recomputed for the affected subtrees.
//!
//! Static geometry never pays for the controller path; only entities
//! registered as controllable get a [`TransformController`].

use glam::{Affine3A, Quat, Vec3};
use rustc_hash::FxHashSet;
use slotmap::SparseSecondaryMap;

use crate::scene::components::TransformComponent;
use crate::scene::transform::TransformState;
use crate::scene::{NodeHandle, Scene};
use crate::transform::controller::TransformController;

pub struct TransformationSystem {
    interval: f32,
    registered: FxHashSet<NodeHandle>,
    controllers: SparseSecondaryMap<NodeHandle, TransformController>,
    pending: FxHashSet<NodeHandle>,
    /// Nodes whose world matrix changed since the last drain.
    changed: Vec<NodeHandle>,
}

impl TransformationSystem {
    /// # Panics
    /// `interval` must be positive.
    #[must_use]
    pub fn new(interval: f32) -> Self {
        assert!(interval > 0.0, "tick interval must be positive, got {interval}");
        Self {
            interval,
            registered: FxHashSet::default(),
            controllers: SparseSecondaryMap::new(),
            pending: FxHashSet::default(),
            changed: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers a node carrying a transform. Controllable nodes (per their
    /// `TransformComponent`) get a controller seeded with their current TRS.
    ///
    /// An initial update is queued so the world matrices become valid on the
    /// next tick.
    ///
    /// # Panics
    /// The node must exist and carry a `TransformComponent`.
    pub fn register_entity(&mut self, scene: &Scene, handle: NodeHandle) -> bool {
        let node = scene
            .get_node(handle)
            .unwrap_or_else(|| panic!("register_entity: {handle:?} is not a live node"));
        let transform = node
            .entity
            .components
            .get::<TransformComponent>()
            .unwrap_or_else(|| {
                panic!("register_entity: `{}` has no Transform component", node.name)
            });

        if !self.registered.insert(handle) {
            log::debug!("`{}` is already registered with the transformation system", node.name);
            return false;
        }

        if transform.controllable {
            self.controllers
                .insert(handle, TransformController::new(transform.data.state(), self.interval));
        }
        self.pending.insert(handle);
        true
    }

    /// Promotes a registered node to the controller path.
    pub fn make_controllable(&mut self, scene: &mut Scene, handle: NodeHandle) -> bool {
        if !self.registered.contains(&handle) {
            log::warn!("make_controllable: `{}` is not registered", scene.name_of(handle));
            return false;
        }
        if self.controllers.contains_key(handle) {
            return true;
        }
        let Some(component) = scene.component_mut::<TransformComponent>(handle) else {
            return false;
        };
        component.controllable = true;
        let state = component.data.state();
        self.controllers
            .insert(handle, TransformController::new(state, self.interval));
        true
    }

    pub fn unregister_entity(&mut self, handle: NodeHandle) -> bool {
        if !self.registered.remove(&handle) {
            log::debug!("unregister_entity: {handle:?} is not registered");
            return false;
        }
        self.controllers.remove(handle);
        self.pending.remove(&handle);
        self.changed.retain(|&h| h != handle);
        true
    }

    #[must_use]
    pub fn is_registered(&self, handle: NodeHandle) -> bool {
        self.registered.contains(&handle)
    }

    #[must_use]
    pub fn is_controllable(&self, handle: NodeHandle) -> bool {
        self.controllers.contains_key(handle)
    }

    #[must_use]
    pub fn controller(&self, handle: NodeHandle) -> Option<&TransformController> {
        self.controllers.get(handle)
    }

    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Queues a world-matrix recompute for the next tick.
    pub fn request_entity_update(&mut self, handle: NodeHandle) {
        if !self.registered.contains(&handle) {
            log::warn!("Update requested for unregistered entity {handle:?}; ignored");
            return;
        }
        self.pending.insert(handle);
    }

    /// Sets the target state a controllable entity reaches at the next tick.
    pub fn add_future_state(
        &mut self,
        handle: NodeHandle,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> bool {
        match self.controllers.get_mut(handle) {
            Some(controller) => {
                controller.add_future_state(position, rotation, scale);
                true
            }
            None => {
                log::debug!("add_future_state: {handle:?} has no controller");
                false
            }
        }
    }

    pub fn set_entity_location(&mut self, scene: &mut Scene, handle: NodeHandle, position: Vec3) {
        self.edit(scene, handle, |c| c.set_future_position(position), |s| s.position = position);
    }

    pub fn set_entity_rotation(&mut self, scene: &mut Scene, handle: NodeHandle, rotation: Quat) {
        self.edit(scene, handle, |c| c.set_future_rotation(rotation), |s| s.rotation = rotation);
    }

    pub fn set_entity_scale(&mut self, scene: &mut Scene, handle: NodeHandle, scale: Vec3) {
        self.edit(scene, handle, |c| c.set_future_scale(scale), |s| s.scale = scale);
    }

    /// Controllable: edit the future state. Otherwise: edit TRS and request
    /// an update.
    fn edit(
        &mut self,
        scene: &mut Scene,
        handle: NodeHandle,
        on_controller: impl FnOnce(&mut TransformController),
        on_state: impl FnOnce(&mut TransformState),
    ) {
        if let Some(controller) = self.controllers.get_mut(handle) {
            on_controller(controller);
            return;
        }
        if !self.registered.contains(&handle) {
            log::warn!("Transform edit on unregistered entity {handle:?}; ignored");
            return;
        }
        if let Some(component) = scene.component_mut::<TransformComponent>(handle) {
            let mut state = component.data.state();
            on_state(&mut state);
            component.data.apply_state(&state);
            self.pending.insert(handle);
        }
    }

    // ========================================================================
    // Clocks
    // ========================================================================

    /// Simulation tick: advance controllers, then resolve queued requests.
    pub fn tick(&mut self, scene: &mut Scene) {
        for (_, controller) in &mut self.controllers {
            controller.advance();
        }

        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        update_hierarchy(scene, &pending, &mut self.changed);
    }

    /// Render step: interpolate controllers and recompute their subtrees.
    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        let mut dirty = FxHashSet::default();
        for (handle, controller) in &mut self.controllers {
            let state = *controller.update(dt);
            if let Some(component) = scene.component_mut::<TransformComponent>(handle) {
                component.data.apply_state(&state);
                dirty.insert(handle);
            }
        }

        if !dirty.is_empty() {
            update_hierarchy(scene, &dirty, &mut self.changed);
        }
    }

    /// Takes the list of nodes whose world matrix changed.
    pub fn drain_changed(&mut self) -> Vec<NodeHandle> {
        let mut changed = std::mem::take(&mut self.changed);
        let mut seen = FxHashSet::default();
        changed.retain(|h| seen.insert(*h));
        changed
    }
}

/// Recomputes world matrices for every node in `dirty` and their
/// descendants, walking from the roots with an explicit stack.
///
/// Nodes without a transform pass their parent's world matrix through.
pub fn update_hierarchy(
    scene: &mut Scene,
    dirty: &FxHashSet<NodeHandle>,
    changed: &mut Vec<NodeHandle>,
) {
    // (node, parent world matrix, parent changed)
    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);
    for &root in scene.root_nodes.iter().rev() {
        stack.push((root, Affine3A::IDENTITY, false));
    }

    while let Some((handle, parent_world, parent_changed)) = stack.pop() {
        let Some(node) = scene.nodes.get_mut(handle) else {
            continue;
        };

        let needs_update = parent_changed || dirty.contains(&handle);
        let world = match node.transform_mut() {
            Some(transform) => {
                if needs_update {
                    transform.recalculate(&parent_world);
                }
                transform.world_matrix
            }
            None => parent_world,
        };
        if needs_update {
            changed.push(handle);
        }

        for &child in node.children.iter().rev() {
            stack.push((child, world, needs_update));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRegistry, EntityType};

    #[test]
    fn test_hierarchy_update() {
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let mut transforms = TransformationSystem::new(1.0 / 60.0);

        let parent = scene
            .build_node("parent", EntityType::GroupNode)
            .with_position(1.0, 0.0, 0.0)
            .build();
        scene.register_node(&mut registry, parent, None);
        let child = scene
            .build_node("child", EntityType::GroupNode)
            .with_position(0.0, 1.0, 0.0)
            .build();
        scene.register_node(&mut registry, child, Some(parent));

        transforms.register_entity(&scene, parent);
        transforms.register_entity(&scene, child);
        transforms.tick(&mut scene);

        let child_world_pos = scene.world_matrix(child).translation;
        assert!((child_world_pos.x - 1.0).abs() < 1e-5);
        assert!((child_world_pos.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn unregistered_request_is_ignored() {
        let mut scene = Scene::new();
        let mut transforms = TransformationSystem::new(1.0 / 60.0);
        let handle = scene
            .build_node("loose", EntityType::GroupNode)
            .with_position(3.0, 0.0, 0.0)
            .build();

        transforms.request_entity_update(handle);
        transforms.tick(&mut scene);
        assert!(transforms.drain_changed().is_empty());
    }
}
