//! Render World
//!
//! [`RenderWorld`] owns every subsystem and sequences them:
//!
//! ```text
//! step(frame_dt)
//!   ├─ tick() × N          flush disposals → animation → controllers advance
//!   └─ render_update(dt)   interpolate → world matrices → skinning
//! render_frame(backend)    wait → instance sync → atlas prepare → upload → draw
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nbcore::prelude::*;
//!
//! let mut world = RenderWorld::new(CoreSettings::default())?;
//! let cube = world.add_mesh("cube");
//! let node = world
//!     .build_node("box", EntityType::MeshNode)
//!     .with_position(0.0, 1.0, 0.0)
//!     .with_component(MeshComponent::new(cube))
//!     .build();
//! world.register_node(node, None);
//!
//! loop {
//!     world.step(frame_dt);
//!     let stats = world.render_frame(&mut backend);
//! }
//! ```

use glam::{Quat, Vec3};

use crate::animation::{AnimationClip, AnimationSystem, Skeleton};
use crate::backend::{FrameStats, RenderBackend};
use crate::entity::{ComponentMask, EntityHandle, EntityRegistry, EntityType};
use crate::errors::Result;
use crate::instancing::{INSTANCED_KINDS, InstanceManager, MeshInstance};
use crate::scene::components::{AnimationComponent, JointComponent, TransformComponent};
use crate::scene::{ClipKey, MeshKey, NodeBuilder, NodeHandle, Scene, SkeletonKey};
use crate::settings::CoreSettings;
use crate::transform::TransformationSystem;
use crate::utils::FixedStepClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceAction {
    Add,
    Remove,
}

pub struct RenderWorld {
    settings: CoreSettings,

    pub registry: EntityRegistry,
    pub scene: Scene,
    pub transforms: TransformationSystem,
    pub instances: InstanceManager,
    pub animation: AnimationSystem,

    clock: FixedStepClock,
    pending_disposals: Vec<NodeHandle>,
    needs_rebuild: bool,
}

impl RenderWorld {
    pub fn new(settings: CoreSettings) -> Result<Self> {
        settings.validate()?;
        let interval = settings.tick_interval();
        log::info!(
            "Render world: {} Hz tick, atlas capacity {}",
            settings.tick_rate_hz,
            settings.atlas_initial_capacity
        );

        Ok(Self {
            registry: EntityRegistry::new(),
            scene: Scene::new(),
            transforms: TransformationSystem::new(interval),
            instances: InstanceManager::new(&settings),
            animation: AnimationSystem::new(),
            clock: FixedStepClock::new(interval, settings.max_frame_steps),
            pending_disposals: Vec::new(),
            needs_rebuild: false,
            settings,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    #[must_use]
    pub fn clock(&self) -> &FixedStepClock {
        &self.clock
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn build_node(&mut self, name: &str, entity_type: EntityType) -> NodeBuilder<'_> {
        self.scene.build_node(name, entity_type)
    }

    /// Registers a built node with the registry, scene graph and every
    /// subsystem its components call for.
    ///
    /// Instances are created lazily by the next [`render_frame`](Self::render_frame).
    pub fn register_node(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) -> bool {
        if !self.scene.register_node(&mut self.registry, handle, parent) {
            return false;
        }

        let Some(node) = self.scene.get_node(handle) else {
            return false;
        };
        let components = &node.entity.components;
        let has_transform = components.has::<TransformComponent>();
        let is_joint = components.has::<JointComponent>();
        let is_animated = components.has::<AnimationComponent>();

        if has_transform {
            self.transforms.register_entity(&self.scene, handle);
            if is_joint {
                self.transforms.make_controllable(&mut self.scene, handle);
            }
        }
        if is_animated {
            self.animation.register(&mut self.scene, &mut self.transforms, handle);
        }
        true
    }

    /// Queues `handle` and its subtree for removal at the start of the next tick.
    pub fn dispose_node(&mut self, handle: NodeHandle) {
        if !self.scene.contains(handle) {
            log::debug!("dispose_node: {handle:?} is not a live node");
            return;
        }
        if !self.pending_disposals.contains(&handle) {
            self.pending_disposals.push(handle);
        }
    }

    /// Removes every queued subtree from all subsystems, children first.
    pub fn flush_disposals(&mut self) {
        if self.pending_disposals.is_empty() {
            return;
        }

        for root in std::mem::take(&mut self.pending_disposals) {
            if !self.scene.contains(root) {
                continue;
            }
            for node in self.scene.collect_subtree_post_order(root) {
                for kind in INSTANCED_KINDS {
                    if InstanceManager::has_instance(&self.scene, node, kind) {
                        self.instances.remove_instance(&mut self.scene, node, kind);
                    }
                }
                self.animation.unregister(node);
                self.transforms.unregister_entity(node);
                if let Some(removed) = self.scene.remove_node(&mut self.registry, node) {
                    log::debug!("Disposed `{}`", removed.name);
                }
            }
        }

        let orphaned: Vec<_> = self
            .scene
            .skeletons
            .iter()
            .filter(|(_, s)| {
                !s.joints.is_empty() && s.joints.iter().all(|&j| !self.scene.contains(j))
            })
            .map(|(key, _)| key)
            .collect();
        for key in orphaned {
            self.remove_skeleton(key);
        }
    }

    // ========================================================================
    // Resources
    // ========================================================================

    pub fn add_mesh(&mut self, name: &str) -> MeshKey {
        self.instances.add_mesh(&mut self.registry, name)
    }

    /// Stores a skeleton and links its joint nodes back to it.
    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonKey {
        let joints = skeleton.joints.clone();
        let key = self.scene.skeletons.insert(skeleton);
        if let Some(skeleton) = self.scene.skeletons.get_mut(key) {
            self.registry.register(&mut skeleton.entity, EntityHandle::Skeleton(key));
        }
        for joint in joints {
            if let Some(component) = self.scene.component_mut::<JointComponent>(joint) {
                component.skeleton = Some(key);
            }
        }
        key
    }

    /// Drops a skeleton and unlinks its joints. Animation components still
    /// naming it stop posing anything.
    pub fn remove_skeleton(&mut self, key: SkeletonKey) -> Option<Skeleton> {
        let mut skeleton = self.scene.skeletons.remove(key)?;
        self.registry.unregister(&mut skeleton.entity);
        for &joint in &skeleton.joints {
            if let Some(component) = self.scene.component_mut::<JointComponent>(joint)
                && component.skeleton == Some(key)
            {
                component.skeleton = None;
            }
        }
        log::debug!("Removed skeleton `{}`", skeleton.name);
        Some(skeleton)
    }

    /// Gives `node` an animation component driving `skeleton` and registers
    /// it with the animation system.
    pub fn attach_animation(&mut self, node: NodeHandle, skeleton: SkeletonKey) -> bool {
        let Some(target) = self.scene.get_node_mut(node) else {
            log::warn!("attach_animation: {node:?} is not a live node");
            return false;
        };
        target.entity.components.insert(AnimationComponent::new(skeleton));
        self.animation.register(&mut self.scene, &mut self.transforms, node)
    }

    pub fn add_clip(&mut self, clip: AnimationClip) -> ClipKey {
        self.animation.add_clip(&mut self.registry, clip)
    }

    /// Flags that externally owned resources changed on disk.
    pub fn mark_resources_dirty(&mut self) {
        self.needs_rebuild = true;
    }

    /// Returns and clears the rebuild flag.
    pub fn take_rebuild_request(&mut self) -> bool {
        std::mem::take(&mut self.needs_rebuild)
    }

    // ========================================================================
    // Transform & animation requests
    // ========================================================================

    pub fn set_entity_location(&mut self, handle: NodeHandle, position: Vec3) {
        self.transforms.set_entity_location(&mut self.scene, handle, position);
    }

    pub fn set_entity_rotation(&mut self, handle: NodeHandle, rotation: Quat) {
        self.transforms.set_entity_rotation(&mut self.scene, handle, rotation);
    }

    pub fn set_entity_scale(&mut self, handle: NodeHandle, scale: Vec3) {
        self.transforms.set_entity_scale(&mut self.scene, handle, scale);
    }

    pub fn request_entity_update(&mut self, handle: NodeHandle) {
        self.transforms.request_entity_update(handle);
    }

    pub fn add_future_state(
        &mut self,
        handle: NodeHandle,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> bool {
        self.transforms.add_future_state(handle, position, rotation, scale)
    }

    /// Starts `clip` on `node`; unknown clips and nodes are logged and ignored.
    pub fn play(&mut self, node: NodeHandle, clip: &str) -> bool {
        match self.animation.play(&mut self.scene, node, clip) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("play `{clip}` on `{}`: {err}", self.scene.name_of(node));
                false
            }
        }
    }

    pub fn stop(&mut self, node: NodeHandle, clip: &str) -> bool {
        match self.animation.stop(&mut self.scene, node, clip) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("stop `{clip}` on `{}`: {err}", self.scene.name_of(node));
                false
            }
        }
    }

    #[must_use]
    pub fn is_playing(&self, node: NodeHandle, clip: &str) -> bool {
        self.animation.is_playing(&self.scene, node, clip)
    }

    /// Forces the instance records of `node` to be rewritten next frame.
    pub fn refresh_instances(&mut self, node: NodeHandle) {
        let Some(target) = self.scene.get_node_mut(node) else {
            return;
        };
        for kind in INSTANCED_KINDS {
            if let Some(binding) = target.entity.components.instance_binding_mut(kind)
                && binding.slot().is_assigned()
            {
                binding.mark_dirty();
            }
        }
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// One simulation tick.
    pub fn tick(&mut self) {
        self.flush_disposals();
        let dt = self.transforms.interval();
        self.animation.tick(dt, &mut self.scene, &mut self.transforms);
        self.transforms.tick(&mut self.scene);
    }

    /// Render-rate update: interpolation, world matrices, skinning.
    pub fn render_update(&mut self, dt: f32) {
        self.transforms.update(dt, &mut self.scene);
        AnimationSystem::update_skinning(&mut self.scene);
    }

    /// Runs the ticks owed for `frame_dt`, then one render update.
    /// Returns the number of ticks run.
    pub fn step(&mut self, frame_dt: f32) -> u32 {
        let steps = self.clock.accumulate(frame_dt);
        for _ in 0..steps {
            self.tick();
        }
        self.render_update(frame_dt);
        steps
    }

    /// Brings instance buffers in line with the scene and hands the frame to
    /// `backend`.
    pub fn render_frame<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> FrameStats {
        self.instances.atlas().wait_for_gpu(backend);
        self.sync_instances();
        self.instances.prepare(self.settings.max_frame_transfer_bytes);

        for (key, skeleton) in &self.scene.skeletons {
            backend.upload_skinning(key, skeleton.joint_matrices());
        }

        let atlas = self.instances.atlas();
        let packed = atlas.packed_instances();
        let bytes = packed.len() * MeshInstance::SIZE;
        backend.upload_instance_atlas(packed, bytes);

        let mut stats = FrameStats {
            meshes_skipped: atlas.skipped().len(),
            bytes_uploaded: bytes,
            ..FrameStats::default()
        };
        for range in atlas.ranges() {
            backend.bind_mesh_range(range.mesh, range.offset, range.aligned_size);
            backend.draw(range.mesh, range.count);
            stats.meshes_drawn += 1;
            stats.instances_drawn += range.count;
        }
        stats
    }

    /// Adds instances for renderable nodes, removes them from hidden ones,
    /// then rewrites every dirty record (moved nodes and compacted slots).
    pub fn sync_instances(&mut self) {
        for handle in self.transforms.drain_changed() {
            self.refresh_instances(handle);
        }

        let mut actions = Vec::new();
        for (handle, node) in self.scene.iter() {
            let components = &node.entity.components;
            if !node.entity.is_registered()
                || !components.mask().intersects(ComponentMask::INSTANCED)
            {
                continue;
            }
            for kind in INSTANCED_KINDS {
                let Some(binding) = components.instance_binding(kind) else {
                    continue;
                };
                let action = match (node.is_renderable, binding.slot().is_assigned()) {
                    (true, false) => InstanceAction::Add,
                    (false, true) => InstanceAction::Remove,
                    _ => continue,
                };
                actions.push((handle, kind, action));
            }
        }

        for (handle, kind, action) in actions {
            match action {
                InstanceAction::Add => {
                    self.instances.add_instance(&mut self.scene, handle, kind);
                }
                InstanceAction::Remove => {
                    self.instances.remove_instance(&mut self.scene, handle, kind);
                }
            }
        }

        let dirty: Vec<_> = self
            .scene
            .iter()
            .flat_map(|(handle, node)| {
                INSTANCED_KINDS.into_iter().filter_map(move |kind| {
                    let binding = node.entity.components.instance_binding(kind)?;
                    (binding.slot().is_assigned() && binding.is_dirty()).then_some((handle, kind))
                })
            })
            .collect();
        for (handle, kind) in dirty {
            self.instances.update_instance(&mut self.scene, handle, kind);
        }
    }
}
