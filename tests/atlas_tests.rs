//! Instance Atlas Tests
//!
//! Tests for:
//! - Slot store growth at the occupancy threshold
//! - Entry preservation across growth
//! - Per-frame packing: alignment, overflow growth, transfer limit

use glam::{Affine3A, Vec3, Vec4};
use slotmap::SlotMap;

use nbcore::entity::{ComponentKind, EntityId, EntityRegistry, EntityType};
use nbcore::instancing::{InstanceAtlas, InstanceManager, InstancePayload, MeshInstance};
use nbcore::scene::components::{MeshComponent, MeshStyle};
use nbcore::scene::{MeshKey, Scene};
use nbcore::settings::CoreSettings;

fn mesh_key() -> MeshKey {
    let mut keys: SlotMap<MeshKey, ()> = SlotMap::with_key();
    keys.insert(())
}

fn record(i: usize) -> MeshInstance {
    let payload = InstancePayload::Mesh {
        style: MeshStyle::Standard,
        color: Vec4::new(i as f32, 0.0, 0.0, 1.0),
        bone_remap: [-1; 4],
    };
    let world = Affine3A::from_translation(Vec3::new(i as f32, 0.0, 0.0));
    MeshInstance::new(EntityId(i as u64 + 1), &world, &payload)
}

/// A manager with one mesh per entry of `counts`, each holding that many instances.
fn populated(settings: &CoreSettings, counts: &[usize]) -> (InstanceManager, Vec<MeshKey>) {
    let mut scene = Scene::new();
    let mut registry = EntityRegistry::new();
    let mut manager = InstanceManager::new(settings);
    let mut keys = Vec::new();

    for (m, &count) in counts.iter().enumerate() {
        let key = manager.add_mesh(&mut registry, &format!("mesh{m}"));
        for _ in 0..count {
            let node = scene
                .build_node("n", EntityType::MeshNode)
                .with_component(MeshComponent::new(key))
                .build();
            scene.register_node(&mut registry, node, None);
            manager.add_instance(&mut scene, node, ComponentKind::Mesh);
        }
        keys.push(key);
    }
    (manager, keys)
}

// ============================================================================
// Slot store
// ============================================================================

#[test]
fn crossing_ninety_percent_grows_once_and_preserves_entries() {
    let settings = CoreSettings::default();
    let mut atlas = InstanceAtlas::new(&settings);
    let mesh = mesh_key();
    assert_eq!(atlas.capacity(), 1024);

    let mut before = Vec::new();
    for i in 0..921 {
        let slot = atlas.allocate(mesh, i);
        atlas.write_slot(slot, &record(i));
        before.push((slot, record(i)));
    }
    assert_eq!(atlas.reallocation_count(), 0);
    assert_eq!(atlas.capacity(), 1024);

    let slot = atlas.allocate(mesh, 921);
    atlas.write_slot(slot, &record(921));
    before.push((slot, record(921)));

    assert_eq!(atlas.reallocation_count(), 1);
    assert_eq!(atlas.capacity(), 2048);
    assert_eq!(atlas.occupancy(), 922);
    for (slot, expected) in &before {
        assert_eq!(
            bytemuck::bytes_of(atlas.slot(*slot).unwrap()),
            bytemuck::bytes_of(expected)
        );
    }
}

#[test]
fn released_slots_are_reused_before_new_ones() {
    let settings = CoreSettings::default();
    let mut atlas = InstanceAtlas::new(&settings);
    let mesh = mesh_key();
    let slots: Vec<_> = (0..4).map(|i| atlas.allocate(mesh, i)).collect();

    atlas.release(slots[1]);
    assert!(atlas.slot(slots[1]).is_none());
    assert_eq!(atlas.allocate(mesh, 9), slots[1]);
    assert_eq!(atlas.high_water_mark(), 4);
    assert_eq!(atlas.owner(slots[1]).unwrap().local_slot, 9);
}

#[test]
#[should_panic(expected = "release of unallocated atlas slot")]
fn double_release_panics() {
    let settings = CoreSettings::default();
    let mut atlas = InstanceAtlas::new(&settings);
    let slot = atlas.allocate(mesh_key(), 0);
    atlas.release(slot);
    atlas.release(slot);
}

// ============================================================================
// Packing
// ============================================================================

#[test]
fn ranges_are_aligned_and_padding_is_zeroed() {
    let settings = CoreSettings::default();
    let (mut manager, keys) = populated(&settings, &[3, 5]);
    manager.prepare(settings.max_frame_transfer_bytes);

    let atlas = manager.atlas();
    let first = atlas.range(keys[0]).unwrap();
    let second = atlas.range(keys[1]).unwrap();
    assert_eq!((first.offset, first.count, first.aligned_size), (0, 3, 4));
    assert_eq!((second.offset, second.count, second.aligned_size), (4, 5, 8));
    assert_eq!(atlas.packed_instances().len(), 12);

    let zero = MeshInstance::default();
    assert_eq!(bytemuck::bytes_of(&atlas.packed_instances()[3]), bytemuck::bytes_of(&zero));
    let mesh0 = manager.mesh(keys[0]).unwrap();
    assert_eq!(
        bytemuck::cast_slice::<_, u8>(&atlas.packed_instances()[..3]),
        bytemuck::cast_slice::<_, u8>(mesh0.active_instances())
    );
}

#[test]
fn overflow_grows_packed_array_by_quarter_steps() {
    let settings = CoreSettings {
        atlas_initial_capacity: 8,
        atlas_growth_step: 8,
        ..CoreSettings::default()
    };
    let (mut manager, keys) = populated(&settings, &[8, 8]);
    let before = manager.atlas().packed_capacity();
    manager.prepare(settings.max_frame_transfer_bytes);

    let atlas = manager.atlas();
    assert!(atlas.packed_capacity() >= 16);
    assert!(atlas.packed_capacity() > before);
    assert_eq!(atlas.packed_reallocation_count(), 1);
    assert_eq!(atlas.ranges().len(), keys.len());
    assert!(atlas.skipped().is_empty());
}

#[test]
fn mesh_past_transfer_limit_is_skipped() {
    let settings = CoreSettings::default();
    let (mut manager, keys) = populated(&settings, &[4, 40, 4]);
    manager.prepare(16 * MeshInstance::SIZE);

    let atlas = manager.atlas();
    assert_eq!(atlas.skipped(), &[keys[1]]);
    assert_eq!(atlas.range(keys[0]).unwrap().offset, 0);
    assert_eq!(atlas.range(keys[2]).unwrap().offset, 4);
    assert!(atlas.range(keys[1]).is_none());
    assert_eq!(atlas.packed_instances().len(), 8);
}

#[test]
fn empty_meshes_get_no_range() {
    let settings = CoreSettings::default();
    let (mut manager, keys) = populated(&settings, &[0, 2]);
    manager.prepare(settings.max_frame_transfer_bytes);

    assert!(manager.atlas().range(keys[0]).is_none());
    assert_eq!(manager.atlas().range(keys[1]).unwrap().offset, 0);
}
