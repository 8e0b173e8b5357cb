//! # nb-core
//!
//! Runtime core of a real-time 3D scene renderer: entity registry, scene
//! graph, fixed-step transform simulation with render-rate interpolation,
//! instanced mesh storage packed into a global atlas, and skeletal animation.
//!
//! The GPU side lives behind [`RenderBackend`]; everything here is CPU data
//! preparation.
//!
//! ## Module Overview
//!
//! - [`entity`]: ids, types and the component store
//! - [`scene`]: node arena, hierarchy and capability components
//! - [`transform`]: transform controllers and world-matrix propagation
//! - [`instancing`]: per-mesh instance buffers and the instance atlas
//! - [`animation`]: keyframe clips, skeletons and playback
//! - [`world`]: [`RenderWorld`], the frame loop tying it all together

pub mod animation;
pub mod backend;
pub mod entity;
pub mod errors;
pub mod instancing;
pub mod scene;
pub mod settings;
pub mod transform;
pub mod utils;
pub mod world;

pub use backend::{FrameStats, RenderBackend};
pub use errors::{CoreError, Result};
pub use settings::CoreSettings;
pub use world::RenderWorld;

pub mod prelude {
    pub use crate::animation::{
        AnimationClip, JointBindingData, JointTrack, KeyframeTrack, LoopMode, Skeleton,
    };
    pub use crate::backend::{FrameStats, RenderBackend};
    pub use crate::entity::{EntityId, EntityType};
    pub use crate::instancing::MeshInstance;
    pub use crate::scene::{
        JointComponent, LightComponent, LightKind, MeshComponent, MeshKey, MeshStyle, NodeHandle,
        TransformData, TransformState,
    };
    pub use crate::settings::CoreSettings;
    pub use crate::world::RenderWorld;
}
