use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::animation::clip::{AnimationClip, JointCursor};
use crate::animation::playback::ClipPlayback;
use crate::entity::{Entity, EntityHandle, EntityRegistry, EntityType};
use crate::errors::{CoreError, Result};
use crate::scene::components::AnimationComponent;
use crate::scene::{ClipKey, NodeHandle, Scene};
use crate::transform::TransformationSystem;

#[derive(Debug)]
struct ClipEntry {
    entity: Entity,
    clip: Arc<AnimationClip>,
}

/// Skeletal animation system.
///
/// Each simulation tick, playing clips advance and their sampled poses are
/// pushed into the joints' transform controllers as future states, so joint
/// motion is interpolated at render rate like any other dynamic entity.
/// After the render-rate transform update, [`update_skinning`](Self::update_skinning)
/// refreshes every skeleton's joint matrices.
#[derive(Debug, Default)]
pub struct AnimationSystem {
    clips: SlotMap<ClipKey, ClipEntry>,
    clip_names: FxHashMap<String, ClipKey>,
    animated: Vec<NodeHandle>,
}

impl AnimationSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Clip library
    // ========================================================================

    pub fn add_clip(&mut self, registry: &mut EntityRegistry, clip: AnimationClip) -> ClipKey {
        let name = clip.name.clone();
        let key = self.clips.insert(ClipEntry {
            entity: Entity::new(EntityType::AnimationClip),
            clip: Arc::new(clip),
        });
        if let Some(entry) = self.clips.get_mut(key) {
            registry.register(&mut entry.entity, EntityHandle::Clip(key));
        }
        if self.clip_names.insert(name.clone(), key).is_some() {
            log::warn!("Animation clip `{name}` replaces an earlier clip of the same name");
        }
        key
    }

    pub fn remove_clip(
        &mut self,
        registry: &mut EntityRegistry,
        key: ClipKey,
    ) -> Option<Arc<AnimationClip>> {
        let mut entry = self.clips.remove(key)?;
        registry.unregister(&mut entry.entity);
        if self.clip_names.get(&entry.clip.name) == Some(&key) {
            self.clip_names.remove(&entry.clip.name);
        }
        Some(entry.clip)
    }

    #[must_use]
    pub fn clip(&self, key: ClipKey) -> Option<&Arc<AnimationClip>> {
        self.clips.get(key).map(|e| &e.clip)
    }

    #[must_use]
    pub fn find_clip(&self, name: &str) -> Option<ClipKey> {
        self.clip_names.get(name).copied()
    }

    #[must_use]
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    // ========================================================================
    // Animated nodes
    // ========================================================================

    /// Registers a node carrying an [`AnimationComponent`] and promotes its
    /// skeleton's joints to controllable transforms.
    ///
    /// # Panics
    /// The node must carry an `AnimationComponent`.
    pub fn register(
        &mut self,
        scene: &mut Scene,
        transforms: &mut TransformationSystem,
        node: NodeHandle,
    ) -> bool {
        let skeleton_key = scene
            .component::<AnimationComponent>(node)
            .unwrap_or_else(|| {
                panic!("animation register: `{}` has no Animation component", scene.name_of(node))
            })
            .skeleton;

        if self.animated.contains(&node) {
            log::debug!(
                "`{}` is already registered with the animation system",
                scene.name_of(node)
            );
            return false;
        }

        let Some(skeleton) = scene.skeletons.get(skeleton_key) else {
            log::warn!("`{}` animates a skeleton that does not exist", scene.name_of(node));
            return false;
        };
        let joints = skeleton.joints.clone();
        for joint in joints {
            if !transforms.make_controllable(scene, joint) {
                log::debug!("Joint `{}` has no registered transform yet", scene.name_of(joint));
            }
        }

        self.animated.push(node);
        true
    }

    pub fn unregister(&mut self, node: NodeHandle) -> bool {
        let Some(pos) = self.animated.iter().position(|&n| n == node) else {
            return false;
        };
        self.animated.swap_remove(pos);
        true
    }

    #[must_use]
    pub fn is_registered(&self, node: NodeHandle) -> bool {
        self.animated.contains(&node)
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Starts (or resumes) the clip named `clip` on `node`, attaching it
    /// from the clip library on first use.
    pub fn play(&mut self, scene: &mut Scene, node: NodeHandle, clip: &str) -> Result<()> {
        let library_clip = self
            .find_clip(clip)
            .and_then(|key| self.clips.get(key).map(|entry| (key, entry)));
        let component = Self::animation_mut(scene, node)?;

        let index = match component.clips.iter().position(|p| p.name == clip) {
            Some(index) => index,
            None => {
                let (key, entry) =
                    library_clip.ok_or_else(|| CoreError::ClipNotFound(clip.to_string()))?;
                component.clips.push(ClipPlayback::new(
                    key,
                    clip,
                    entry.clip.loop_mode,
                    entry.clip.tracks.len(),
                ));
                component.clips.len() - 1
            }
        };

        let playback = &mut component.clips[index];
        if let Some(entry) = self.clips.get(playback.clip)
            && playback.is_finished(entry.clip.duration())
        {
            playback.rewind();
        }
        playback.playing = true;
        Ok(())
    }

    /// Stops the clip and rewinds it to the first frame.
    pub fn stop(&mut self, scene: &mut Scene, node: NodeHandle, clip: &str) -> Result<()> {
        let playback = Self::playback_mut(scene, node, clip)?;
        playback.playing = false;
        playback.rewind();
        Ok(())
    }

    /// Halts the clip where it is.
    pub fn pause(&mut self, scene: &mut Scene, node: NodeHandle, clip: &str) -> Result<()> {
        Self::playback_mut(scene, node, clip)?.playing = false;
        Ok(())
    }

    pub fn set_speed(
        &mut self,
        scene: &mut Scene,
        node: NodeHandle,
        clip: &str,
        speed: f32,
    ) -> Result<()> {
        Self::playback_mut(scene, node, clip)?.speed = speed;
        Ok(())
    }

    #[must_use]
    pub fn is_playing(&self, scene: &Scene, node: NodeHandle, clip: &str) -> bool {
        Self::playback(scene, node, clip).is_some_and(|p| p.playing)
    }

    /// Frame index shown for `clip` on `node`.
    #[must_use]
    pub fn current_frame(&self, scene: &Scene, node: NodeHandle, clip: &str) -> Option<usize> {
        let playback = Self::playback(scene, node, clip)?;
        let entry = self.clips.get(playback.clip)?;
        Some(playback.current_frame(entry.clip.frame_rate, entry.clip.frame_count))
    }

    fn playback<'a>(scene: &'a Scene, node: NodeHandle, clip: &str) -> Option<&'a ClipPlayback> {
        scene
            .component::<AnimationComponent>(node)?
            .clips
            .iter()
            .find(|p| p.name == clip)
    }

    fn animation_mut(scene: &mut Scene, node: NodeHandle) -> Result<&mut AnimationComponent> {
        if !scene.contains(node) {
            return Err(CoreError::NodeNotFound(format!("{node:?}")));
        }
        let name = scene.name_of(node).to_string();
        scene
            .component_mut::<AnimationComponent>(node)
            .ok_or(CoreError::MissingComponent {
                node: name,
                component: "Animation",
            })
    }

    fn playback_mut<'a>(
        scene: &'a mut Scene,
        node: NodeHandle,
        clip: &str,
    ) -> Result<&'a mut ClipPlayback> {
        Self::animation_mut(scene, node)?
            .clips
            .iter_mut()
            .find(|p| p.name == clip)
            .ok_or_else(|| CoreError::ClipNotFound(clip.to_string()))
    }

    // ========================================================================
    // Per-tick update
    // ========================================================================

    /// Advances every playing clip and writes the sampled joint poses as
    /// future states. Joints named by a track but missing from the skeleton
    /// are skipped.
    pub fn tick(&mut self, dt: f32, scene: &mut Scene, transforms: &mut TransformationSystem) {
        for &node in &self.animated {
            let Some(component) = scene.component_mut::<AnimationComponent>(node) else {
                continue;
            };
            let skeleton_key = component.skeleton;
            let mut playbacks = std::mem::take(&mut component.clips);

            if let Some(skeleton) = scene.skeletons.get(skeleton_key) {
                for playback in &mut playbacks {
                    let Some(entry) = self.clips.get(playback.clip) else {
                        continue;
                    };
                    let clip = &entry.clip;
                    let duration = clip.duration();
                    playback.advance(dt, duration);
                    if !playback.playing {
                        continue;
                    }

                    let time = playback.sample_time(duration) as f32;
                    playback.cursors.resize(clip.tracks.len(), JointCursor::default());
                    for (track, cursor) in clip.tracks.iter().zip(playback.cursors.iter_mut()) {
                        let Some(joint) = skeleton.joint_node(&track.joint_name) else {
                            continue;
                        };
                        let Some(controller) = transforms.controller(joint) else {
                            continue;
                        };
                        let mut pose = *controller.future();
                        track.sample_into(time, cursor, &mut pose);
                        transforms.add_future_state(
                            joint,
                            pose.position,
                            pose.rotation,
                            pose.scale,
                        );
                    }
                }
            }

            if let Some(component) = scene.component_mut::<AnimationComponent>(node) {
                component.clips = playbacks;
            }
        }
    }

    /// Recomputes every skeleton's joint matrices from current world matrices.
    pub fn update_skinning(scene: &mut Scene) {
        let Scene { nodes, skeletons, .. } = scene;
        for (_, skeleton) in skeletons.iter_mut() {
            skeleton.compute_joint_matrices(nodes);
        }
    }
}
