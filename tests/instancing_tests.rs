//! Instancing Tests
//!
//! Tests for:
//! - Swap-compaction when an instance is removed from the middle of a mesh
//! - Slot bookkeeping across add/remove cycles
//! - Buffer growth by the configured increment
//! - Mesh style, light and joint instance payloads

use glam::{Vec3, Vec4};

use nbcore::entity::{ComponentKind, EntityRegistry, EntityType};
use nbcore::instancing::InstanceManager;
use nbcore::instancing::instance::{STYLE_JOINT, STYLE_LIGHT, STYLE_LOCATOR};
use nbcore::scene::components::{
    JointComponent, LightComponent, LightKind, MeshComponent, MeshStyle,
};
use nbcore::scene::{MeshKey, NodeHandle, Scene};
use nbcore::settings::CoreSettings;
use nbcore::transform::TransformationSystem;

const EPSILON: f32 = 1e-5;

struct Fixture {
    scene: Scene,
    registry: EntityRegistry,
    transforms: TransformationSystem,
    instances: InstanceManager,
}

impl Fixture {
    fn new(settings: &CoreSettings) -> Self {
        Self {
            scene: Scene::new(),
            registry: EntityRegistry::new(),
            transforms: TransformationSystem::new(settings.tick_interval()),
            instances: InstanceManager::new(settings),
        }
    }

    fn spawn_mesh(&mut self, mesh: MeshKey, x: f32) -> NodeHandle {
        let handle = self
            .scene
            .build_node("instance", EntityType::MeshNode)
            .with_position(x, 0.0, 0.0)
            .with_component(MeshComponent::new(mesh))
            .build();
        self.scene.register_node(&mut self.registry, handle, None);
        self.transforms.register_entity(&self.scene, handle);
        handle
    }

    /// Resolves pending world matrices so instances record real positions.
    fn settle(&mut self) {
        self.transforms.tick(&mut self.scene);
    }

    fn slot_of(&self, node: NodeHandle) -> Option<usize> {
        self.scene.component::<MeshComponent>(node)?.instance.slot().index()
    }
}

// ============================================================================
// Compaction
// ============================================================================

#[test]
fn removing_middle_slot_moves_last_instance_into_it() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let mesh = f.instances.add_mesh(&mut f.registry, "cube");
    let nodes: Vec<_> = (0..5).map(|i| f.spawn_mesh(mesh, i as f32)).collect();
    f.settle();

    for (i, &node) in nodes.iter().enumerate() {
        assert_eq!(f.instances.add_instance(&mut f.scene, node, ComponentKind::Mesh), Some(i));
    }
    let former_last = *f.instances.mesh(mesh).unwrap().instance(4).unwrap();

    f.instances.remove_instance(&mut f.scene, nodes[2], ComponentKind::Mesh);

    let m = f.instances.mesh(mesh).unwrap();
    assert_eq!(m.instance_count(), 4);
    assert_eq!(
        bytemuck::bytes_of(m.instance(2).unwrap()),
        bytemuck::bytes_of(&former_last)
    );
    assert!((m.instance(2).unwrap().world_matrix().w_axis.x - 4.0).abs() < EPSILON);
    assert!(m.instance(4).is_none());

    assert_eq!(f.slot_of(nodes[4]), Some(2));
    assert!(f.scene.component::<MeshComponent>(nodes[4]).unwrap().instance.is_dirty());
    assert_eq!(f.slot_of(nodes[2]), None);
    assert_eq!(m.owner(2).unwrap().node, nodes[4]);
}

#[test]
fn removing_last_slot_moves_nothing() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let mesh = f.instances.add_mesh(&mut f.registry, "cube");
    let a = f.spawn_mesh(mesh, 0.0);
    let b = f.spawn_mesh(mesh, 1.0);
    f.instances.add_instance(&mut f.scene, a, ComponentKind::Mesh);
    f.instances.add_instance(&mut f.scene, b, ComponentKind::Mesh);

    f.instances.remove_instance(&mut f.scene, b, ComponentKind::Mesh);

    assert_eq!(f.slot_of(a), Some(0));
    assert!(!f.scene.component::<MeshComponent>(a).unwrap().instance.is_dirty());
    assert_eq!(f.instances.mesh(mesh).unwrap().instance_count(), 1);
}

#[test]
fn add_then_remove_releases_slot_for_reuse() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let mesh = f.instances.add_mesh(&mut f.registry, "cube");
    let node = f.spawn_mesh(mesh, 0.0);

    let first = f.instances.add_instance(&mut f.scene, node, ComponentKind::Mesh);
    let atlas_slot = f.instances.mesh(mesh).unwrap().atlas_slot(0).unwrap();
    f.instances.remove_instance(&mut f.scene, node, ComponentKind::Mesh);

    assert!(!InstanceManager::has_instance(&f.scene, node, ComponentKind::Mesh));
    assert_eq!(f.instances.atlas().occupancy(), 0);
    assert_eq!(f.instances.atlas().free_slot_count(), 1);

    let second = f.instances.add_instance(&mut f.scene, node, ComponentKind::Mesh);
    assert_eq!(first, second);
    assert_eq!(f.instances.mesh(mesh).unwrap().atlas_slot(0), Some(atlas_slot));
    assert_eq!(f.instances.atlas().free_slot_count(), 0);
}

#[test]
fn buffer_grows_by_increment_and_count_stays_within_capacity() {
    let settings = CoreSettings {
        instance_buffer_increment: 4,
        ..CoreSettings::default()
    };
    let mut f = Fixture::new(&settings);
    let mesh = f.instances.add_mesh(&mut f.registry, "cube");

    for i in 0..9 {
        let node = f.spawn_mesh(mesh, i as f32);
        f.instances.add_instance(&mut f.scene, node, ComponentKind::Mesh);
        let m = f.instances.mesh(mesh).unwrap();
        assert!(m.instance_count() <= m.capacity());
    }

    let m = f.instances.mesh(mesh).unwrap();
    assert_eq!(m.instance_count(), 9);
    assert_eq!(m.capacity(), 12);
}

#[test]
fn update_rewrites_record_from_new_world_matrix() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let mesh = f.instances.add_mesh(&mut f.registry, "cube");
    let node = f.spawn_mesh(mesh, 1.0);
    f.settle();
    f.instances.add_instance(&mut f.scene, node, ComponentKind::Mesh);

    f.transforms.set_entity_location(&mut f.scene, node, Vec3::new(0.0, 7.0, 0.0));
    f.settle();
    f.instances.update_instance(&mut f.scene, node, ComponentKind::Mesh);

    let m = f.instances.mesh(mesh).unwrap();
    let world = m.instance(0).unwrap().world_matrix();
    assert!((world.w_axis.y - 7.0).abs() < EPSILON);

    let atlas_slot = m.atlas_slot(0).unwrap();
    assert_eq!(
        bytemuck::bytes_of(f.instances.atlas().slot(atlas_slot).unwrap()),
        bytemuck::bytes_of(m.instance(0).unwrap())
    );
}

// ============================================================================
// Payloads
// ============================================================================

#[test]
fn light_instance_packs_scaled_color_and_kind() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let proxy = f.instances.add_mesh(&mut f.registry, "light_proxy");
    let kind = LightKind::Point { range: 12.0 };
    let light = LightComponent::new(kind, Vec3::new(1.0, 0.5, 0.25), 2.0).with_proxy_mesh(proxy);
    let node = f
        .scene
        .build_node("lamp", EntityType::LightNode)
        .with_position(0.0, 3.0, 0.0)
        .with_component(light)
        .build();
    f.scene.register_node(&mut f.registry, node, None);

    assert_eq!(f.instances.add_instance(&mut f.scene, node, ComponentKind::Light), Some(0));

    let record = f.instances.mesh(proxy).unwrap().instance(0).unwrap();
    assert!(record.color().abs_diff_eq(Vec4::new(2.0, 1.0, 0.5, 1.0), EPSILON));
    assert!((record.uniform(0).x - 12.0).abs() < EPSILON);
    assert_eq!(record.uniform(0).w, STYLE_LIGHT);
    assert_eq!(record.uniform(1).w, LightKind::Point { range: 12.0 }.code());
}

#[test]
fn joint_gizmo_records_joint_index() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let gizmo = f.instances.add_mesh(&mut f.registry, "joint_gizmo");
    let node = f
        .scene
        .build_node("elbow", EntityType::JointNode)
        .with_component(JointComponent::new(3).with_gizmo_mesh(gizmo))
        .build();
    f.scene.register_node(&mut f.registry, node, None);

    f.instances.add_instance(&mut f.scene, node, ComponentKind::Joint);

    let record = f.instances.mesh(gizmo).unwrap().instance(0).unwrap();
    assert_eq!(record.uniform(0).x, 3.0);
    assert_eq!(record.uniform(0).w, STYLE_JOINT);
}

#[test]
fn locator_style_packs_size_and_color() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let mesh = f.instances.add_mesh(&mut f.registry, "locator");
    let component = MeshComponent::new(mesh)
        .with_style(MeshStyle::Locator { size: 0.5 })
        .with_color(Vec4::new(0.0, 1.0, 0.0, 1.0));
    let node = f
        .scene
        .build_node("marker", EntityType::MeshNode)
        .with_component(component)
        .build();
    f.scene.register_node(&mut f.registry, node, None);

    f.instances.add_instance(&mut f.scene, node, ComponentKind::Mesh);

    let record = f.instances.mesh(mesh).unwrap().instance(0).unwrap();
    assert_eq!(record.uniform(0), Vec4::new(0.5, 0.5, 0.5, STYLE_LOCATOR));
    assert_eq!(record.color(), Vec4::new(0.0, 1.0, 0.0, 1.0));
}

#[test]
fn light_without_proxy_mesh_has_no_instance() {
    let settings = CoreSettings::default();
    let mut f = Fixture::new(&settings);
    let node = f
        .scene
        .build_node("sun", EntityType::LightNode)
        .with_component(LightComponent::new(LightKind::Directional, Vec3::ONE, 1.0))
        .build();
    f.scene.register_node(&mut f.registry, node, None);

    assert!(!InstanceManager::has_instance(&f.scene, node, ComponentKind::Light));
}
