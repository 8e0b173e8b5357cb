use glam::{Affine3A, Mat4};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::entity::{Entity, EntityType};
use crate::scene::{Node, NodeHandle};

/// Bind-pose data of one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointBindingData {
    /// Joint world matrix in the bind pose.
    pub bind: Affine3A,
    /// Takes mesh-space vertices into joint-local space.
    pub inverse_bind: Affine3A,
}

impl JointBindingData {
    #[must_use]
    pub fn from_bind(bind: Affine3A) -> Self {
        Self {
            bind,
            inverse_bind: bind.inverse(),
        }
    }
}

/// Ordered joint list; `joints[i]` is joint `i` in the skinning shader.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub entity: Entity,
    pub name: String,

    pub joints: Vec<NodeHandle>,
    joint_names: FxHashMap<String, usize>,
    bindings: Vec<JointBindingData>,

    // Refreshed every render update, then handed to the backend
    pub(crate) joint_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// # Panics
    /// Every joint needs exactly one binding.
    #[must_use]
    pub fn new(
        name: &str,
        joints: Vec<(String, NodeHandle)>,
        bindings: Vec<JointBindingData>,
    ) -> Self {
        assert_eq!(
            joints.len(),
            bindings.len(),
            "skeleton `{name}` has {} joints but {} bindings",
            joints.len(),
            bindings.len()
        );

        let joint_names = joints
            .iter()
            .enumerate()
            .map(|(i, (n, _))| (n.clone(), i))
            .collect();
        let count = joints.len();

        Self {
            entity: Entity::new(EntityType::Skeleton),
            name: name.to_string(),
            joints: joints.into_iter().map(|(_, h)| h).collect(),
            joint_names,
            bindings,
            joint_matrices: vec![Mat4::IDENTITY; count],
        }
    }

    #[inline]
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_names.get(name).copied()
    }

    #[must_use]
    pub fn joint_node(&self, name: &str) -> Option<NodeHandle> {
        self.joint_index(name).map(|i| self.joints[i])
    }

    #[must_use]
    pub fn binding(&self, index: usize) -> Option<&JointBindingData> {
        self.bindings.get(index)
    }

    #[must_use]
    pub fn joint_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Recomputes the skinning matrix of every joint from its world matrix.
    ///
    /// Column-vector convention: `world * inverse_bind` takes a bind-pose
    /// vertex into joint space, then out to the joint's current pose.
    pub fn compute_joint_matrices(&mut self, nodes: &SlotMap<NodeHandle, Node>) {
        for (i, &joint) in self.joints.iter().enumerate() {
            let world = nodes.get(joint).and_then(Node::transform).map(|t| t.world_matrix);
            let Some(world) = world else {
                continue;
            };
            self.joint_matrices[i] = Mat4::from(world * self.bindings[i].inverse_bind);
        }
    }
}
