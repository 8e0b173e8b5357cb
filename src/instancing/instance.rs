use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat3, Mat4, Vec3, Vec4};

use crate::entity::{ComponentKind, EntityId};
use crate::scene::components::{JointComponent, LightComponent, LightKind, MeshComponent, MeshStyle};
use crate::scene::node::Node;

pub const INSTANCE_UNIFORM_SLOTS: usize = 4;
pub const INSTANCE_BONE_REMAP: usize = 4;

/// Style codes stored in `uniforms[0].w`.
pub const STYLE_STANDARD: f32 = 0.0;
pub const STYLE_LOCATOR: f32 = 1.0;
pub const STYLE_IMPOSTER: f32 = 2.0;
pub const STYLE_JOINT: f32 = 3.0;
pub const STYLE_LIGHT: f32 = 4.0;

/// GPU-side per-instance record (304 bytes).
///
/// Layout is shared with the shaders; every field is a plain array so the
/// struct has no implicit padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct MeshInstance {
    pub world: [[f32; 4]; 4],
    pub world_inverse: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Kind-specific data, see [`InstancePayload`].
    pub uniforms: [[f32; 4]; INSTANCE_UNIFORM_SLOTS],
    pub bone_remap: [i32; INSTANCE_BONE_REMAP],
    /// Owning entity id, for picking.
    pub entity_id: u64,
    pub _padding: [u32; 2],
}

impl Default for MeshInstance {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl MeshInstance {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Packs an instance record from a world matrix and a kind payload.
    #[must_use]
    pub fn new(entity_id: EntityId, world: &Affine3A, payload: &InstancePayload) -> Self {
        let world_mat = Mat4::from(*world);
        let invertible = world.matrix3.determinant().abs() > f32::EPSILON * f32::EPSILON;
        let (world_inverse, normal) = if invertible {
            let normal = Mat3::from(world.matrix3).inverse().transpose();
            (Mat4::from(world.inverse()), Mat4::from_mat3(normal))
        } else {
            (Mat4::ZERO, Mat4::ZERO)
        };

        let mut instance = Self {
            world: world_mat.to_cols_array_2d(),
            world_inverse: world_inverse.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            entity_id: entity_id.0,
            bone_remap: [-1; INSTANCE_BONE_REMAP],
            ..Self::zeroed()
        };
        payload.write_into(&mut instance, world);
        instance
    }

    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }

    #[must_use]
    pub fn world_inverse_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world_inverse)
    }

    #[must_use]
    pub fn color(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }

    #[must_use]
    pub fn uniform(&self, index: usize) -> Vec4 {
        Vec4::from_array(self.uniforms[index])
    }
}

/// Kind-specific part of an instance record.
///
/// Uniform layout per kind:
///
/// | kind      | `uniforms[0]`                          | `uniforms[1]`      |
/// |-----------|----------------------------------------|--------------------|
/// | Standard  | `(0, 0, 0, STYLE_STANDARD)`            | -                  |
/// | Locator   | `(size, size, size, STYLE_LOCATOR)`    | -                  |
/// | Imposter  | `(w, h, layer, STYLE_IMPOSTER)`        | -                  |
/// | Joint     | `(index, 0, 0, STYLE_JOINT)`           | -                  |
/// | Light     | `(range, cos_in, cos_out, STYLE_LIGHT)`| `(dir, light code)`|
#[derive(Debug, Clone, PartialEq)]
pub enum InstancePayload {
    Mesh {
        style: MeshStyle,
        color: Vec4,
        bone_remap: [i32; INSTANCE_BONE_REMAP],
    },
    Light {
        kind: LightKind,
        color: Vec3,
        intensity: f32,
    },
    Joint {
        joint_index: usize,
    },
}

/// Gizmo tint for joint instances.
const JOINT_COLOR: Vec4 = Vec4::new(1.0, 0.8, 0.2, 1.0);

impl InstancePayload {
    #[must_use]
    pub fn from_mesh(mesh: &MeshComponent) -> Self {
        Self::Mesh {
            style: mesh.style,
            color: mesh.color,
            bone_remap: mesh.bone_remap,
        }
    }

    #[must_use]
    pub fn from_light(light: &LightComponent) -> Self {
        Self::Light {
            kind: light.kind,
            color: light.color,
            intensity: light.intensity,
        }
    }

    #[must_use]
    pub fn from_joint(joint: &JointComponent) -> Self {
        Self::Joint {
            joint_index: joint.joint_index,
        }
    }

    /// Payload of the component of `kind` on `node`, if it owns an instance.
    #[must_use]
    pub fn from_node(node: &Node, kind: ComponentKind) -> Option<Self> {
        let components = &node.entity.components;
        match kind {
            ComponentKind::Mesh => components.get::<MeshComponent>().map(Self::from_mesh),
            ComponentKind::Light => components.get::<LightComponent>().map(Self::from_light),
            ComponentKind::Joint => components.get::<JointComponent>().map(Self::from_joint),
            _ => None,
        }
    }

    fn write_into(&self, instance: &mut MeshInstance, world: &Affine3A) {
        match self {
            Self::Mesh { style, color, bone_remap } => {
                instance.color = color.to_array();
                instance.bone_remap = *bone_remap;
                instance.uniforms[0] = match *style {
                    MeshStyle::Standard => [0.0, 0.0, 0.0, STYLE_STANDARD],
                    MeshStyle::Locator { size } => [size, size, size, STYLE_LOCATOR],
                    MeshStyle::Imposter { size, atlas_layer } => {
                        [size.x, size.y, atlas_layer as f32, STYLE_IMPOSTER]
                    }
                };
            }
            Self::Light { kind, color, intensity } => {
                instance.color = (*color * *intensity).extend(1.0).to_array();
                let (range, cos_inner, cos_outer) = match *kind {
                    LightKind::Directional => (0.0, 1.0, 1.0),
                    LightKind::Point { range } => (range, -1.0, -1.0),
                    LightKind::Spot { range, inner_cone, outer_cone } => {
                        (range, inner_cone.cos(), outer_cone.cos())
                    }
                };
                instance.uniforms[0] = [range, cos_inner, cos_outer, STYLE_LIGHT];
                let direction = world.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
                instance.uniforms[1] = direction.extend(kind.code()).to_array();
            }
            Self::Joint { joint_index } => {
                instance.color = JOINT_COLOR.to_array();
                instance.uniforms[0] = [*joint_index as f32, 0.0, 0.0, STYLE_JOINT];
            }
        }
    }
}
