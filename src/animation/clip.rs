use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::animation::playback::LoopMode;
use crate::animation::tracks::{KeyframeCursor, KeyframeTrack};
use crate::scene::transform::TransformState;

/// TRS channels for one joint, addressed by joint name.
#[derive(Debug, Clone)]
pub struct JointTrack {
    pub joint_name: String,
    pub translation: Option<KeyframeTrack<Vec3>>,
    pub rotation: Option<KeyframeTrack<Quat>>,
    pub scale: Option<KeyframeTrack<Vec3>>,
}

/// Cursors for the three channels of a [`JointTrack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JointCursor {
    pub translation: KeyframeCursor,
    pub rotation: KeyframeCursor,
    pub scale: KeyframeCursor,
}

impl JointTrack {
    #[must_use]
    pub fn new(joint_name: &str) -> Self {
        Self {
            joint_name: joint_name.to_string(),
            translation: None,
            rotation: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn with_translation(mut self, track: KeyframeTrack<Vec3>) -> Self {
        self.translation = Some(track);
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, track: KeyframeTrack<Quat>) -> Self {
        self.rotation = Some(track);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, track: KeyframeTrack<Vec3>) -> Self {
        self.scale = Some(track);
        self
    }

    /// Overwrites the animated channels of `base` with their values at `time`.
    pub fn sample_into(&self, time: f32, cursor: &mut JointCursor, base: &mut TransformState) {
        if let Some(track) = &self.translation {
            base.position = track.sample_with_cursor(time, &mut cursor.translation);
        }
        if let Some(track) = &self.rotation {
            base.rotation = track.sample_with_cursor(time, &mut cursor.rotation);
        }
        if let Some(track) = &self.scale {
            base.scale = track.sample_with_cursor(time, &mut cursor.scale);
        }
    }

    fn end_time(&self) -> f32 {
        [
            self.translation.as_ref().map(KeyframeTrack::end_time),
            self.rotation.as_ref().map(KeyframeTrack::end_time),
            self.scale.as_ref().map(KeyframeTrack::end_time),
        ]
        .into_iter()
        .flatten()
        .fold(0.0, f32::max)
    }
}

/// Frame-based keyframe animation for a skeleton.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub frame_rate: f32,
    pub frame_count: usize,
    pub loop_mode: LoopMode,
    pub tracks: Vec<JointTrack>,
    track_index: FxHashMap<String, usize>,
}

impl AnimationClip {
    /// # Panics
    /// `frame_rate` must be positive.
    #[must_use]
    pub fn new(name: &str, frame_rate: f32, tracks: Vec<JointTrack>) -> Self {
        assert!(frame_rate > 0.0, "clip `{name}` needs a positive frame rate");
        let end = tracks.iter().map(JointTrack::end_time).fold(0.0, f32::max);
        let frame_count = ((end * frame_rate).round() as usize + 1).max(1);
        let track_index = tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.joint_name.clone(), i))
            .collect();

        Self {
            name: name.to_string(),
            frame_rate,
            frame_count,
            loop_mode: LoopMode::Loop,
            tracks,
            track_index,
        }
    }

    /// Builds a clip from per-joint poses, one pose per frame.
    #[must_use]
    pub fn from_poses(
        name: &str,
        frame_rate: f32,
        joints: Vec<(String, Vec<TransformState>)>,
    ) -> Self {
        let tracks = joints
            .into_iter()
            .map(|(joint, poses)| {
                let translations = poses.iter().map(|p| p.position).collect();
                let rotations = poses.iter().map(|p| p.rotation).collect();
                let scales = poses.iter().map(|p| p.scale).collect();
                JointTrack::new(&joint)
                    .with_translation(KeyframeTrack::from_frames(translations, frame_rate))
                    .with_rotation(KeyframeTrack::from_frames(rotations, frame_rate))
                    .with_scale(KeyframeTrack::from_frames(scales, frame_rate))
            })
            .collect();
        Self::new(name, frame_rate, tracks)
    }

    #[must_use]
    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    /// Length of one pass through the clip in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / f64::from(self.frame_rate)
    }

    #[must_use]
    pub fn track(&self, joint_name: &str) -> Option<&JointTrack> {
        self.track_index.get(joint_name).map(|&i| &self.tracks[i])
    }
}
