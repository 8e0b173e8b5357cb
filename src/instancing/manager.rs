use slotmap::SlotMap;

use crate::entity::{ComponentKind, EntityHandle, EntityRegistry};
use crate::instancing::atlas::InstanceAtlas;
use crate::instancing::instance::{InstancePayload, MeshInstance};
use crate::instancing::mesh::NbMesh;
use crate::instancing::{InstanceOwner, InstanceSlot};
use crate::scene::{MeshKey, NodeHandle, Scene};
use crate::settings::CoreSettings;

/// Owns every mesh's instance buffer and the global atlas, and keeps the
/// component-side slot bindings consistent with both.
#[derive(Debug)]
pub struct InstanceManager {
    meshes: SlotMap<MeshKey, NbMesh>,
    atlas: InstanceAtlas,
    increment: usize,
}

impl InstanceManager {
    #[must_use]
    pub fn new(settings: &CoreSettings) -> Self {
        Self {
            meshes: SlotMap::with_key(),
            atlas: InstanceAtlas::new(settings),
            increment: settings.instance_buffer_increment,
        }
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    pub fn add_mesh(&mut self, registry: &mut EntityRegistry, name: &str) -> MeshKey {
        let key = self.meshes.insert(NbMesh::new(name, self.increment));
        if let Some(mesh) = self.meshes.get_mut(key) {
            registry.register(&mut mesh.entity, EntityHandle::Mesh(key));
        }
        key
    }

    /// Removes a mesh with no live instances.
    ///
    /// # Panics
    /// Instances still referencing the mesh would dangle.
    pub fn remove_mesh(&mut self, registry: &mut EntityRegistry, key: MeshKey) -> Option<NbMesh> {
        let mesh = self.meshes.get(key)?;
        assert!(
            mesh.instance_count() == 0,
            "remove_mesh: `{}` still has {} instances",
            mesh.name,
            mesh.instance_count()
        );
        let mut mesh = self.meshes.remove(key)?;
        registry.unregister(&mut mesh.entity);
        Some(mesh)
    }

    #[must_use]
    pub fn mesh(&self, key: MeshKey) -> Option<&NbMesh> {
        self.meshes.get(key)
    }

    #[must_use]
    pub fn meshes(&self) -> &SlotMap<MeshKey, NbMesh> {
        &self.meshes
    }

    #[must_use]
    pub fn atlas(&self) -> &InstanceAtlas {
        &self.atlas
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Whether the component of `kind` on `node` currently holds a slot.
    #[must_use]
    pub fn has_instance(scene: &Scene, node: NodeHandle, kind: ComponentKind) -> bool {
        scene
            .get_node(node)
            .and_then(|n| n.entity.components.instance_binding(kind))
            .is_some_and(|b| b.slot.is_assigned())
    }

    /// Creates the instance for the component of `kind` on `node`.
    ///
    /// Returns the local slot, or `None` if the bound mesh does not exist.
    ///
    /// # Panics
    /// The node must carry an instance-owning component of `kind` that does
    /// not already hold a slot.
    pub fn add_instance(
        &mut self,
        scene: &mut Scene,
        node: NodeHandle,
        kind: ComponentKind,
    ) -> Option<usize> {
        let world = scene.world_matrix(node);
        let target = scene
            .get_node_mut(node)
            .unwrap_or_else(|| panic!("add_instance: {node:?} is not a live node"));
        let payload = InstancePayload::from_node(target, kind)
            .unwrap_or_else(|| {
                panic!("add_instance: `{}` has no {} component", target.name, kind.name())
            });
        let entity_id = target.id();
        let name = target.name.clone();
        let binding = target
            .entity
            .components
            .instance_binding_mut(kind)
            .unwrap_or_else(|| {
                panic!("add_instance: `{name}` {} component has no mesh binding", kind.name())
            });
        assert!(
            !binding.slot.is_assigned(),
            "add_instance: `{name}` {} component already holds slot {}",
            kind.name(),
            binding.slot.raw()
        );

        let mesh_key = binding.mesh;
        let Some(mesh) = self.meshes.get_mut(mesh_key) else {
            log::debug!("add_instance: `{name}` references a mesh that does not exist");
            return None;
        };

        let slot = mesh.acquire_slot(InstanceOwner { node, kind });
        let instance = MeshInstance::new(entity_id, &world, &payload);
        mesh.write(slot, instance);

        let atlas_slot = self.atlas.allocate(mesh_key, slot);
        self.atlas.write_slot(atlas_slot, &instance);
        mesh.set_atlas_slot(slot, atlas_slot);

        binding.slot = InstanceSlot::from_index(slot);
        binding.dirty = false;
        log::trace!("`{name}` {} instance -> mesh `{}` slot {slot}", kind.name(), mesh.name);
        Some(slot)
    }

    /// Releases the instance held by the component of `kind` on `node`,
    /// compacting the mesh buffer and fixing up the moved instance's owner.
    ///
    /// # Panics
    /// The component must hold a valid slot.
    pub fn remove_instance(&mut self, scene: &mut Scene, node: NodeHandle, kind: ComponentKind) {
        let target = scene
            .get_node_mut(node)
            .unwrap_or_else(|| panic!("remove_instance: {node:?} is not a live node"));
        let name = target.name.clone();
        let binding = target
            .entity
            .components
            .instance_binding_mut(kind)
            .unwrap_or_else(|| {
                panic!("remove_instance: `{name}` has no {} instance binding", kind.name())
            });
        let slot = binding
            .slot
            .index()
            .unwrap_or_else(|| {
                panic!("remove_instance: `{name}` {} component holds no slot", kind.name())
            });
        let mesh_key = binding.mesh;
        binding.slot = InstanceSlot::NONE;
        binding.dirty = false;

        let mesh = self
            .meshes
            .get_mut(mesh_key)
            .unwrap_or_else(|| panic!("remove_instance: `{name}` holds a slot in a removed mesh"));
        let release = mesh.release_slot(slot);

        if let Some(atlas_slot) = release.atlas_slot {
            self.atlas.release(atlas_slot);
        }

        if let Some(moved) = release.moved {
            if let Some(atlas_slot) = mesh.atlas_slot(moved.to) {
                self.atlas.set_owner(atlas_slot, mesh_key, moved.to);
            }
            let moved_binding = scene
                .get_node_mut(moved.owner.node)
                .and_then(|n| n.entity.components.instance_binding_mut(moved.owner.kind));
            match moved_binding {
                Some(b) => {
                    b.slot = InstanceSlot::from_index(moved.to);
                    b.dirty = true;
                }
                None => log::error!(
                    "Mesh `{}` slot {} moved to {} but its owner is gone",
                    mesh.name,
                    moved.from,
                    moved.to
                ),
            }
        }
    }

    /// Rewrites the record of the component of `kind` on `node` from its
    /// current world matrix and component data.
    pub fn update_instance(&mut self, scene: &mut Scene, node: NodeHandle, kind: ComponentKind) {
        let world = scene.world_matrix(node);
        let Some(target) = scene.get_node_mut(node) else {
            log::warn!("update_instance: {node:?} is not a live node");
            return;
        };
        let Some(payload) = InstancePayload::from_node(target, kind) else {
            return;
        };
        let entity_id = target.id();
        let Some(binding) = target.entity.components.instance_binding_mut(kind) else {
            return;
        };
        let Some(slot) = binding.slot.index() else {
            log::debug!("update_instance: `{}` has no {} instance", target.name, kind.name());
            return;
        };
        let Some(mesh) = self.meshes.get_mut(binding.mesh) else {
            return;
        };

        let instance = MeshInstance::new(entity_id, &world, &payload);
        mesh.write(slot, instance);
        if let Some(atlas_slot) = mesh.atlas_slot(slot) {
            self.atlas.write_slot(atlas_slot, &instance);
        }
        binding.dirty = false;
    }

    /// Packs every mesh into the atlas upload array.
    pub fn prepare(&mut self, max_frame_bytes: usize) {
        self.atlas.prepare(&self.meshes, max_frame_bytes);
    }
}
