use rustc_hash::FxHashMap;

use crate::entity::{Entity, EntityType};
use crate::instancing::InstanceOwner;
use crate::instancing::instance::MeshInstance;

/// Marker for a local slot with no atlas slot yet.
const NO_ATLAS_SLOT: i32 = -1;

/// A live instance that compaction moved from the tail into a freed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRemoval {
    pub owner: InstanceOwner,
    pub from: usize,
    pub to: usize,
}

/// Result of [`NbMesh::release_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRelease {
    /// Atlas slot the released instance occupied.
    pub atlas_slot: Option<usize>,
    pub moved: Option<SwapRemoval>,
}

/// One mesh's instance buffer.
///
/// Active instances occupy `[0, instance_count)` with no holes; removal
/// moves the last instance into the freed slot. Capacity grows by a fixed
/// increment and never shrinks.
#[derive(Debug)]
pub struct NbMesh {
    pub entity: Entity,
    pub name: String,

    pub(crate) instance_data: Vec<MeshInstance>,
    pub(crate) instance_count: usize,
    /// Local slot -> owning component.
    pub(crate) component_dict: FxHashMap<usize, InstanceOwner>,
    /// Local slot -> global atlas slot.
    pub(crate) instance_index_buffer: Vec<i32>,

    increment: usize,
}

impl NbMesh {
    /// # Panics
    /// `increment` must be positive.
    #[must_use]
    pub fn new(name: &str, increment: usize) -> Self {
        assert!(increment > 0, "instance buffer increment must be positive");
        Self {
            entity: Entity::new(EntityType::Mesh),
            name: name.to_string(),
            instance_data: Vec::new(),
            instance_count: 0,
            component_dict: FxHashMap::default(),
            instance_index_buffer: Vec::new(),
            increment,
        }
    }

    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.instance_data.len()
    }

    /// The densely packed active records.
    #[must_use]
    pub fn active_instances(&self) -> &[MeshInstance] {
        &self.instance_data[..self.instance_count]
    }

    #[must_use]
    pub fn instance(&self, slot: usize) -> Option<&MeshInstance> {
        self.active_instances().get(slot)
    }

    #[must_use]
    pub fn owner(&self, slot: usize) -> Option<InstanceOwner> {
        self.component_dict.get(&slot).copied()
    }

    #[must_use]
    pub fn atlas_slot(&self, slot: usize) -> Option<usize> {
        let raw = *self.instance_index_buffer.get(slot)?;
        usize::try_from(raw).ok()
    }

    pub(crate) fn set_atlas_slot(&mut self, slot: usize, atlas_slot: usize) {
        self.instance_index_buffer[slot] = atlas_slot as i32;
    }

    /// Claims the next free slot, growing the buffer if full.
    pub fn acquire_slot(&mut self, owner: InstanceOwner) -> usize {
        if self.instance_count == self.instance_data.len() {
            let new_capacity = self.instance_data.len() + self.increment;
            log::trace!("Mesh `{}` instance buffer grows to {new_capacity}", self.name);
            self.instance_data.resize(new_capacity, MeshInstance::default());
            self.instance_index_buffer.resize(new_capacity, NO_ATLAS_SLOT);
        }

        let slot = self.instance_count;
        self.instance_count += 1;
        self.component_dict.insert(slot, owner);
        self.instance_index_buffer[slot] = NO_ATLAS_SLOT;
        slot
    }

    /// # Panics
    /// `slot` must be active.
    pub fn write(&mut self, slot: usize, instance: MeshInstance) {
        assert!(
            slot < self.instance_count,
            "write to inactive slot {slot} of mesh `{}` ({} active)",
            self.name,
            self.instance_count
        );
        self.instance_data[slot] = instance;
    }

    /// Frees `slot`, moving the last active instance into it.
    ///
    /// # Panics
    /// `slot` must be active.
    pub fn release_slot(&mut self, slot: usize) -> SlotRelease {
        assert!(
            slot < self.instance_count,
            "release of inactive slot {slot} of mesh `{}` ({} active)",
            self.name,
            self.instance_count
        );

        let atlas_slot = self.atlas_slot(slot);
        let last = self.instance_count - 1;
        self.component_dict.remove(&slot);

        let moved = if slot == last {
            None
        } else {
            self.instance_data[slot] = self.instance_data[last];
            self.instance_index_buffer[slot] = self.instance_index_buffer[last];
            let owner = self
                .component_dict
                .remove(&last)
                .unwrap_or_else(|| panic!("mesh `{}` slot {last} has no owner", self.name));
            self.component_dict.insert(slot, owner);
            Some(SwapRemoval { owner, from: last, to: slot })
        };

        self.instance_data[last] = MeshInstance::default();
        self.instance_index_buffer[last] = NO_ATLAS_SLOT;
        self.instance_count = last;

        SlotRelease { atlas_slot, moved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ComponentKind, EntityId};
    use crate::scene::NodeHandle;
    use glam::Affine3A;
    use slotmap::SlotMap;

    fn owners(n: usize) -> Vec<InstanceOwner> {
        let mut arena: SlotMap<NodeHandle, ()> = SlotMap::with_key();
        (0..n)
            .map(|_| InstanceOwner { node: arena.insert(()), kind: ComponentKind::Mesh })
            .collect()
    }

    fn tagged(id: u64) -> MeshInstance {
        MeshInstance::new(
            EntityId(id),
            &Affine3A::IDENTITY,
            &crate::instancing::InstancePayload::Joint { joint_index: 0 },
        )
    }

    #[test]
    fn grows_by_increment() {
        let mut mesh = NbMesh::new("cube", 4);
        let owners = owners(5);
        for owner in &owners[..4] {
            mesh.acquire_slot(*owner);
        }
        assert_eq!(mesh.capacity(), 4);
        assert_eq!(mesh.acquire_slot(owners[4]), 4);
        assert_eq!(mesh.capacity(), 8);
        assert_eq!(mesh.instance_count(), 5);
    }

    #[test]
    fn release_moves_last_into_hole() {
        let mut mesh = NbMesh::new("cube", 8);
        let owners = owners(5);
        for (i, owner) in owners.iter().enumerate() {
            let slot = mesh.acquire_slot(*owner);
            mesh.write(slot, tagged(i as u64));
            mesh.set_atlas_slot(slot, 100 + i);
        }

        let release = mesh.release_slot(2);
        assert_eq!(release.atlas_slot, Some(102));
        assert_eq!(release.moved, Some(SwapRemoval { owner: owners[4], from: 4, to: 2 }));
        assert_eq!(mesh.instance_count(), 4);
        assert_eq!(mesh.instance(2).unwrap().entity_id, 4);
        assert_eq!(mesh.owner(2), Some(owners[4]));
        assert_eq!(mesh.atlas_slot(2), Some(104));
        assert_eq!(mesh.owner(4), None);
        assert_eq!(mesh.capacity(), 8);
    }

    #[test]
    fn release_last_moves_nothing() {
        let mut mesh = NbMesh::new("cube", 8);
        let owners = owners(2);
        mesh.acquire_slot(owners[0]);
        mesh.acquire_slot(owners[1]);

        let release = mesh.release_slot(1);
        assert_eq!(release.moved, None);
        assert_eq!(release.atlas_slot, None);
        assert_eq!(mesh.instance_count(), 1);
        assert_eq!(mesh.owner(0), Some(owners[0]));
    }

    #[test]
    #[should_panic(expected = "release of inactive slot")]
    fn release_out_of_range_panics() {
        let mut mesh = NbMesh::new("cube", 8);
        mesh.release_slot(0);
    }
}
