//! Skeletal Animation Module
//!
//! - [`tracks`]: keyframe tracks with a sequential-access cursor
//! - [`clip`]: per-joint TRS tracks grouped into a frame-based clip
//! - [`playback`]: per-node clip time, speed and loop mode
//! - [`skeleton`]: joint list, bind data and skinning matrices
//! - [`system`]: drives playbacks into joint transform controllers

pub mod clip;
pub mod playback;
pub mod skeleton;
pub mod system;
pub mod tracks;
pub mod values;

pub use clip::{AnimationClip, JointCursor, JointTrack};
pub use playback::{ClipPlayback, LoopMode};
pub use skeleton::{JointBindingData, Skeleton};
pub use system::AnimationSystem;
pub use tracks::{InterpolationMode, KeyframeCursor, KeyframeTrack};
pub use values::Interpolatable;
