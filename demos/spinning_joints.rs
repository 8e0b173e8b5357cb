use std::time::Duration;

use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};

use nbcore::animation::{AnimationClip, JointBindingData, Skeleton};
use nbcore::entity::EntityType;
use nbcore::instancing::MeshInstance;
use nbcore::scene::components::{JointComponent, MeshComponent};
use nbcore::scene::{MeshKey, NodeHandle, SkeletonKey, TransformState};
use nbcore::utils::Timer;
use nbcore::{CoreSettings, RenderBackend, RenderWorld};

const JOINT_COUNT: usize = 4;
const BONE_LENGTH: f32 = 1.5;
const FRAMES: u64 = 240;
const TILE_COLOR: Vec4 = Vec4::new(0.3, 0.3, 0.35, 1.0);

/// Stands in for a GPU backend: logs what a frame would submit.
#[derive(Default)]
struct LogBackend {
    draws: usize,
}

impl RenderBackend for LogBackend {
    fn wait_for_atlas_idle(&mut self) {}

    fn upload_instance_atlas(&mut self, instances: &[MeshInstance], total_size: usize) {
        log::trace!("upload {} records ({total_size} bytes)", instances.len());
    }

    fn bind_mesh_range(&mut self, mesh: MeshKey, offset: usize, size: usize) {
        log::trace!("bind {mesh:?} [{offset}, {})", offset + size);
    }

    fn draw(&mut self, _mesh: MeshKey, instance_count: usize) {
        self.draws += instance_count;
    }

    fn upload_skinning(&mut self, skeleton: SkeletonKey, joint_matrices: &[Mat4]) {
        if let Some(tip) = joint_matrices.last() {
            log::trace!("{skeleton:?}: tip joint at {:?}", tip.w_axis.truncate());
        }
    }
}

struct App {
    world: RenderWorld,
    arm: NodeHandle,
    timer: Timer,
    backend: LogBackend,
}

impl App {
    fn new() -> nbcore::Result<Self> {
        let settings =
            CoreSettings::from_json_str(r#"{ "tick_rate_hz": 60.0, "instance_alignment": 4 }"#)?;
        let mut world = RenderWorld::new(settings)?;

        let gizmo = world.add_mesh("joint_gizmo");
        let floor = world.add_mesh("floor_tile");

        for x in -2..=2 {
            for z in -2..=2 {
                let tile = world
                    .build_node("tile", EntityType::MeshNode)
                    .with_position(x as f32 * 2.0, 0.0, z as f32 * 2.0)
                    .with_component(MeshComponent::new(floor).with_color(TILE_COLOR))
                    .build();
                world.register_node(tile, None);
            }
        }

        let arm = world
            .build_node("arm", EntityType::GroupNode)
            .with_position(0.0, 0.5, 0.0)
            .build();
        world.register_node(arm, None);

        // A chain of joints, each one bone above its parent
        let mut joints = Vec::with_capacity(JOINT_COUNT);
        let mut bindings = Vec::with_capacity(JOINT_COUNT);
        let mut parent = arm;
        for i in 0..JOINT_COUNT {
            let name = format!("joint{i}");
            let offset = if i == 0 { 0.0 } else { BONE_LENGTH };
            let joint = world
                .build_node(&name, EntityType::JointNode)
                .with_position(0.0, offset, 0.0)
                .with_component(JointComponent::new(i).with_gizmo_mesh(gizmo))
                .build();
            world.register_node(joint, Some(parent));
            bindings.push(JointBindingData::from_bind(Affine3A::from_translation(Vec3::new(
                0.0,
                0.5 + BONE_LENGTH * i as f32,
                0.0,
            ))));
            joints.push((name, joint));
            parent = joint;
        }

        let skeleton = world.add_skeleton(Skeleton::new("arm", joints, bindings));
        world.attach_animation(arm, skeleton);
        world.add_clip(wave_clip(30.0, 31));

        Ok(Self {
            world,
            arm,
            timer: Timer::new(),
            backend: LogBackend::default(),
        })
    }

    fn run(&mut self) {
        self.world.play(self.arm, "wave");

        while self.timer.frame_count < FRAMES {
            std::thread::sleep(Duration::from_millis(4));
            self.timer.tick();

            let ticks = self.world.step(self.timer.dt_seconds());
            let stats = self.world.render_frame(&mut self.backend);

            if self.timer.frame_count % 60 == 0 {
                log::info!(
                    "frame {} ({ticks} ticks): {} meshes, {} instances, {} bytes",
                    self.timer.frame_count,
                    stats.meshes_drawn,
                    stats.instances_drawn,
                    stats.bytes_uploaded
                );
            }
        }

        log::info!(
            "{} frames in {:.2?}, {} simulation ticks, {} instanced draws",
            self.timer.frame_count,
            self.timer.elapsed,
            self.world.clock().tick_count(),
            self.backend.draws
        );
    }
}

/// Every joint bends back and forth around Z, out of phase with its parent.
fn wave_clip(frame_rate: f32, frames: usize) -> AnimationClip {
    let joints = (0..JOINT_COUNT)
        .map(|j| {
            let offset = if j == 0 { 0.0 } else { BONE_LENGTH };
            let poses = (0..frames)
                .map(|f| {
                    let progress = f as f32 / (frames - 1) as f32;
                    let phase = progress * std::f32::consts::TAU + j as f32 * 0.6;
                    TransformState::new(
                        Vec3::new(0.0, offset, 0.0),
                        Quat::from_rotation_z(phase.sin() * 0.35),
                        Vec3::ONE,
                    )
                })
                .collect();
            (format!("joint{j}"), poses)
        })
        .collect();
    AnimationClip::from_poses("wave", frame_rate, joints)
}

fn main() -> nbcore::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut app = App::new()?;
    app.run();

    let tip = app.world.scene.find_by_name("joint3").map(|h| app.world.scene.world_matrix(h));
    if let Some(tip) = tip {
        log::info!("Tip joint rests at {:?}", tip.translation);
    }
    Ok(())
}
