//! Capability component payloads attached to scene nodes.

use glam::{Vec2, Vec3, Vec4};

use crate::animation::playback::ClipPlayback;
use crate::instancing::InstanceBinding;
use crate::scene::transform::TransformData;
use crate::scene::{MeshKey, SkeletonKey};

/// Spatial data. Nodes without one inherit their parent's world matrix.
#[derive(Debug, Clone, Default)]
pub struct TransformComponent {
    pub data: TransformData,
    /// Opt into the interpolated, double-buffered controller path.
    pub controllable: bool,
}

impl TransformComponent {
    #[must_use]
    pub fn new(data: TransformData) -> Self {
        Self {
            data,
            controllable: false,
        }
    }

    #[must_use]
    pub fn controllable(mut self) -> Self {
        self.controllable = true;
        self
    }
}

/// How a mesh instance packs its generic uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshStyle {
    Standard,
    /// Editor locator gizmo drawn at the node origin.
    Locator { size: f32 },
    /// Camera-facing billboard standing in for distant geometry.
    Imposter { size: Vec2, atlas_layer: u32 },
}

#[derive(Debug, Clone)]
pub struct MeshComponent {
    pub instance: InstanceBinding,
    pub style: MeshStyle,
    pub color: Vec4,
    /// Skinned meshes remap their first bones through these joint indices.
    pub bone_remap: [i32; 4],
}

impl MeshComponent {
    #[must_use]
    pub fn new(mesh: MeshKey) -> Self {
        Self {
            instance: InstanceBinding::new(mesh),
            style: MeshStyle::Standard,
            color: Vec4::ONE,
            bone_remap: [-1; 4],
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: MeshStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point { range: f32 },
    Spot { range: f32, inner_cone: f32, outer_cone: f32 },
}

impl LightKind {
    #[must_use]
    pub fn code(self) -> f32 {
        match self {
            Self::Directional => 0.0,
            Self::Point { .. } => 1.0,
            Self::Spot { .. } => 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LightComponent {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Optional proxy mesh (light volume or editor icon).
    pub instance: Option<InstanceBinding>,
}

impl LightComponent {
    #[must_use]
    pub fn new(kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            instance: None,
        }
    }

    #[must_use]
    pub fn with_proxy_mesh(mut self, mesh: MeshKey) -> Self {
        self.instance = Some(InstanceBinding::new(mesh));
        self
    }
}

/// Marks a node as a skeleton joint.
#[derive(Debug, Clone)]
pub struct JointComponent {
    pub joint_index: usize,
    pub skeleton: Option<SkeletonKey>,
    /// Optional gizmo mesh for skeleton display.
    pub instance: Option<InstanceBinding>,
}

impl JointComponent {
    #[must_use]
    pub fn new(joint_index: usize) -> Self {
        Self {
            joint_index,
            skeleton: None,
            instance: None,
        }
    }

    #[must_use]
    pub fn with_gizmo_mesh(mut self, mesh: MeshKey) -> Self {
        self.instance = Some(InstanceBinding::new(mesh));
        self
    }
}

/// Drives a skeleton with a set of clips.
#[derive(Debug, Clone)]
pub struct AnimationComponent {
    pub skeleton: SkeletonKey,
    pub clips: Vec<ClipPlayback>,
}

impl AnimationComponent {
    #[must_use]
    pub fn new(skeleton: SkeletonKey) -> Self {
        Self {
            skeleton,
            clips: Vec::new(),
        }
    }
}

/// Root of an imported model.
#[derive(Debug, Clone)]
pub struct SceneComponent {
    pub label: String,
    pub source: Option<String>,
}

impl SceneComponent {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            source: None,
        }
    }
}
