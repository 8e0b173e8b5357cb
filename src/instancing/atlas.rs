//! Global Instance Atlas
//!
//! Two stores live here:
//!
//! - **Slot store**: one persistent slot per live instance across all
//!   meshes, handed out from a free list. Capacity grows by a fixed step once
//!   occupancy crosses a threshold; slots keep their index across growth.
//! - **Packed array**: rebuilt by [`InstanceAtlas::prepare`] each frame.
//!   Every mesh's active instances are copied into one contiguous,
//!   alignment-padded range so the backend can upload once and draw each
//!   mesh from its `(offset, size)` window.

use slotmap::SlotMap;

use crate::backend::RenderBackend;
use crate::instancing::instance::MeshInstance;
use crate::instancing::mesh::NbMesh;
use crate::scene::MeshKey;
use crate::settings::CoreSettings;

/// Back-reference from an atlas slot to the mesh slot it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasSlotOwner {
    pub mesh: MeshKey,
    pub local_slot: usize,
}

/// A mesh's window inside the packed array, in records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRange {
    pub mesh: MeshKey,
    pub offset: usize,
    /// Active instances to draw.
    pub count: usize,
    /// `count` rounded up to the instance alignment.
    pub aligned_size: usize,
}

#[derive(Debug)]
pub struct InstanceAtlas {
    // Slot store
    slots: Vec<MeshInstance>,
    owners: Vec<Option<AtlasSlotOwner>>,
    free_slots: Vec<usize>,
    high_water: usize,
    occupied: usize,
    growth_step: usize,
    growth_threshold: f32,
    reallocations: usize,

    // Per-frame packed array
    packed: Vec<MeshInstance>,
    packed_len: usize,
    packed_growth_factor: f32,
    packed_reallocations: usize,
    alignment: usize,
    ranges: Vec<AtlasRange>,
    skipped: Vec<MeshKey>,
}

impl InstanceAtlas {
    #[must_use]
    pub fn new(settings: &CoreSettings) -> Self {
        let capacity = settings.atlas_initial_capacity;
        Self {
            slots: vec![MeshInstance::default(); capacity],
            owners: vec![None; capacity],
            free_slots: Vec::new(),
            high_water: 0,
            occupied: 0,
            growth_step: settings.atlas_growth_step.max(1),
            growth_threshold: settings.atlas_growth_threshold,
            reallocations: 0,

            packed: vec![MeshInstance::default(); capacity],
            packed_len: 0,
            packed_growth_factor: settings.packed_growth_factor,
            packed_reallocations: 0,
            alignment: settings.instance_alignment.max(1),
            ranges: Vec::new(),
            skipped: Vec::new(),
        }
    }

    // ========================================================================
    // Slot store
    // ========================================================================

    /// Reserves a slot for `(mesh, local_slot)`, reusing freed slots first.
    pub fn allocate(&mut self, mesh: MeshKey, local_slot: usize) -> usize {
        let slot = if let Some(slot) = self.free_slots.pop() {
            slot
        } else {
            if self.high_water == self.slots.len() {
                self.grow();
            }
            let slot = self.high_water;
            self.high_water += 1;
            slot
        };

        self.owners[slot] = Some(AtlasSlotOwner { mesh, local_slot });
        self.occupied += 1;

        if self.occupied as f32 > self.slots.len() as f32 * self.growth_threshold {
            self.grow();
        }
        slot
    }

    /// Returns `slot` to the free list.
    ///
    /// # Panics
    /// `slot` must be allocated.
    pub fn release(&mut self, slot: usize) {
        let owner = self.owners.get_mut(slot).and_then(Option::take);
        assert!(owner.is_some(), "release of unallocated atlas slot {slot}");
        self.slots[slot] = MeshInstance::default();
        self.free_slots.push(slot);
        self.occupied -= 1;
    }

    /// # Panics
    /// `slot` must be allocated.
    pub fn write_slot(&mut self, slot: usize, instance: &MeshInstance) {
        assert!(
            self.owners.get(slot).is_some_and(Option::is_some),
            "write to unallocated atlas slot {slot}"
        );
        self.slots[slot] = *instance;
    }

    /// Re-points an allocated slot after its mesh slot moved.
    pub(crate) fn set_owner(&mut self, slot: usize, mesh: MeshKey, local_slot: usize) {
        if let Some(owner) = self.owners.get_mut(slot).and_then(Option::as_mut) {
            owner.mesh = mesh;
            owner.local_slot = local_slot;
        }
    }

    #[must_use]
    pub fn owner(&self, slot: usize) -> Option<AtlasSlotOwner> {
        self.owners.get(slot).copied().flatten()
    }

    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&MeshInstance> {
        self.owner(slot)?;
        self.slots.get(slot)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.occupied
    }

    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    #[must_use]
    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Times the slot store has grown.
    #[must_use]
    pub fn reallocation_count(&self) -> usize {
        self.reallocations
    }

    fn grow(&mut self) {
        let new_capacity = self.slots.len() + self.growth_step;
        log::info!(
            "Instance atlas grows {} -> {new_capacity} slots ({} occupied)",
            self.slots.len(),
            self.occupied
        );
        self.slots.resize(new_capacity, MeshInstance::default());
        self.owners.resize(new_capacity, None);
        self.reallocations += 1;
    }

    // ========================================================================
    // Per-frame packing
    // ========================================================================

    /// Sync point: the backend must be done reading the previous upload
    /// before the packed array is rewritten.
    pub fn wait_for_gpu<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        backend.wait_for_atlas_idle();
    }

    /// Copies every mesh's active instances into the packed array.
    ///
    /// Ranges are padded to the instance alignment. A mesh whose range would
    /// push the frame past `max_frame_bytes` is skipped for this frame. When
    /// the packed array overflows, it grows and the copy restarts.
    pub fn prepare(&mut self, meshes: &SlotMap<MeshKey, NbMesh>, max_frame_bytes: usize) {
        'pack: loop {
            self.ranges.clear();
            self.skipped.clear();
            let mut offset = 0usize;

            for (key, mesh) in meshes {
                let count = mesh.instance_count();
                if count == 0 {
                    continue;
                }

                let aligned_size = count.div_ceil(self.alignment) * self.alignment;
                let end = offset + aligned_size;
                if end * MeshInstance::SIZE > max_frame_bytes {
                    log::warn!(
                        "Mesh `{}` skipped this frame: {} bytes exceed the {} byte limit",
                        mesh.name,
                        end * MeshInstance::SIZE,
                        max_frame_bytes
                    );
                    self.skipped.push(key);
                    continue;
                }

                if end > self.packed.len() {
                    self.grow_packed(end);
                    continue 'pack;
                }

                self.packed[offset..offset + count].copy_from_slice(mesh.active_instances());
                self.packed[offset + count..end].fill(MeshInstance::default());
                self.ranges.push(AtlasRange {
                    mesh: key,
                    offset,
                    count,
                    aligned_size,
                });
                offset = end;
            }

            self.packed_len = offset;
            break;
        }
    }

    fn grow_packed(&mut self, required: usize) {
        let mut new_len = self.packed.len().max(1);
        while new_len < required {
            let step = ((new_len as f32 * self.packed_growth_factor).ceil() as usize).max(1);
            new_len += step;
        }
        log::debug!("Packed instance array grows {} -> {new_len} records", self.packed.len());
        self.packed.resize(new_len, MeshInstance::default());
        self.packed_reallocations += 1;
    }

    /// Records written by the last [`prepare`](Self::prepare), padding included.
    #[must_use]
    pub fn packed_instances(&self) -> &[MeshInstance] {
        &self.packed[..self.packed_len]
    }

    #[must_use]
    pub fn packed_capacity(&self) -> usize {
        self.packed.len()
    }

    #[must_use]
    pub fn packed_reallocation_count(&self) -> usize {
        self.packed_reallocations
    }

    #[must_use]
    pub fn ranges(&self) -> &[AtlasRange] {
        &self.ranges
    }

    #[must_use]
    pub fn range(&self, mesh: MeshKey) -> Option<&AtlasRange> {
        self.ranges.iter().find(|r| r.mesh == mesh)
    }

    /// Meshes left out of the last frame by the transfer limit.
    #[must_use]
    pub fn skipped(&self) -> &[MeshKey] {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ComponentKind;
    use crate::instancing::InstanceOwner;
    use crate::scene::NodeHandle;

    fn small_settings() -> CoreSettings {
        CoreSettings {
            atlas_initial_capacity: 10,
            atlas_growth_step: 10,
            ..CoreSettings::default()
        }
    }

    fn keys() -> (MeshKey, MeshKey) {
        let mut map: SlotMap<MeshKey, ()> = SlotMap::with_key();
        (map.insert(()), map.insert(()))
    }

    #[test]
    fn free_list_reuses_released_slots() {
        let (mesh, _) = keys();
        let mut atlas = InstanceAtlas::new(&small_settings());
        let a = atlas.allocate(mesh, 0);
        let b = atlas.allocate(mesh, 1);
        atlas.release(a);
        let c = atlas.allocate(mesh, 2);

        assert_eq!(c, a);
        assert_eq!(atlas.high_water_mark(), 2);
        assert_eq!(atlas.owner(b), Some(AtlasSlotOwner { mesh, local_slot: 1 }));
    }

    #[test]
    fn grows_past_threshold_and_keeps_offsets() {
        let (mesh, _) = keys();
        let mut atlas = InstanceAtlas::new(&small_settings());
        let mut marker = MeshInstance::default();
        marker.entity_id = 42;

        let first = atlas.allocate(mesh, 0);
        atlas.write_slot(first, &marker);
        for i in 1..9 {
            atlas.allocate(mesh, i);
        }
        assert_eq!(atlas.capacity(), 10);

        // 10th allocation -> 100% > 90%
        atlas.allocate(mesh, 9);
        assert_eq!(atlas.capacity(), 20);
        assert_eq!(atlas.reallocation_count(), 1);
        assert_eq!(atlas.slot(first).unwrap().entity_id, 42);
    }

    #[test]
    #[should_panic(expected = "release of unallocated atlas slot")]
    fn double_release_panics() {
        let (mesh, _) = keys();
        let mut atlas = InstanceAtlas::new(&small_settings());
        let a = atlas.allocate(mesh, 0);
        atlas.release(a);
        atlas.release(a);
    }

    fn filled_meshes(counts: &[usize]) -> SlotMap<MeshKey, NbMesh> {
        let mut nodes: SlotMap<NodeHandle, ()> = SlotMap::with_key();
        let mut meshes = SlotMap::with_key();
        for (m, &count) in counts.iter().enumerate() {
            let mut mesh = NbMesh::new(&format!("mesh{m}"), 8);
            for i in 0..count {
                let owner = InstanceOwner { node: nodes.insert(()), kind: ComponentKind::Mesh };
                let slot = mesh.acquire_slot(owner);
                let mut record = MeshInstance::default();
                record.entity_id = (m * 100 + i) as u64;
                mesh.write(slot, record);
            }
            meshes.insert(mesh);
        }
        meshes
    }

    #[test]
    fn prepare_packs_aligned_ranges() {
        let meshes = filled_meshes(&[3, 5]);
        let mut atlas = InstanceAtlas::new(&small_settings());
        atlas.prepare(&meshes, usize::MAX);

        let ranges = atlas.ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].offset, ranges[0].count, ranges[0].aligned_size), (0, 3, 4));
        assert_eq!((ranges[1].offset, ranges[1].count, ranges[1].aligned_size), (4, 5, 8));
        assert_eq!(atlas.packed_instances().len(), 12);
        assert_eq!(atlas.packed_instances()[4].entity_id, 100);
        assert_eq!(atlas.packed_instances()[3], MeshInstance::default());
    }

    #[test]
    fn prepare_grows_packed_array_on_overflow() {
        let meshes = filled_meshes(&[8, 8]);
        let mut atlas = InstanceAtlas::new(&small_settings());
        assert_eq!(atlas.packed_capacity(), 10);

        atlas.prepare(&meshes, usize::MAX);
        assert!(atlas.packed_capacity() >= 16);
        assert_eq!(atlas.packed_reallocation_count(), 1);
        assert_eq!(atlas.ranges().len(), 2);
        assert_eq!(atlas.packed_instances()[8].entity_id, 100);
    }

    #[test]
    fn prepare_skips_mesh_over_budget() {
        let meshes = filled_meshes(&[4, 40, 4]);
        let mut atlas = InstanceAtlas::new(&small_settings());
        atlas.prepare(&meshes, 16 * MeshInstance::SIZE);

        assert_eq!(atlas.skipped().len(), 1);
        let drawn: Vec<usize> = atlas.ranges().iter().map(|r| r.count).collect();
        assert_eq!(drawn, vec![4, 4]);
        assert_eq!(atlas.ranges()[1].offset, 4);
    }
}
