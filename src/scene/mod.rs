//! Scene Graph Module
//!
//! Hierarchy and capability data for every object in the world:
//! - [`Node`]: an entity with parent/child links
//! - [`TransformData`]: local TRS and cached matrices
//! - [`components`]: Transform, Mesh, Light, Joint, Animation, Scene payloads
//! - [`Scene`]: the node arena

pub mod components;
pub mod node;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod transform;

pub use components::{
    AnimationComponent, JointComponent, LightComponent, LightKind, MeshComponent, MeshStyle,
    SceneComponent, TransformComponent,
};
pub use node::Node;
pub use scene::{NodeBuilder, Scene};
pub use transform::{TransformData, TransformState};

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct MeshKey;
    pub struct SkeletonKey;
    pub struct ClipKey;
}
