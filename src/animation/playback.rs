use crate::animation::clip::JointCursor;
use crate::scene::ClipKey;

/// Guards frame indexing against `time * rate` landing a hair below an integer.
const FRAME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play to the end and hold the last frame.
    Once,
    Loop,
    /// Alternate forward and backward passes.
    PingPong,
}

/// Playback state of one clip on one animated node.
#[derive(Debug, Clone)]
pub struct ClipPlayback {
    pub clip: ClipKey,
    pub name: String,
    /// Seconds into the clip. Kept in f64 so long-running loops stay exact.
    pub time: f64,
    pub speed: f32,
    pub loop_mode: LoopMode,
    pub playing: bool,
    pub(crate) cursors: Vec<JointCursor>,
}

impl ClipPlayback {
    #[must_use]
    pub fn new(clip: ClipKey, name: &str, loop_mode: LoopMode, track_count: usize) -> Self {
        Self {
            clip,
            name: name.to_string(),
            time: 0.0,
            speed: 1.0,
            loop_mode,
            playing: false,
            cursors: vec![JointCursor::default(); track_count],
        }
    }

    /// Advances time by `dt * speed` and applies the loop mode.
    pub fn advance(&mut self, dt: f32, duration: f64) {
        if !self.playing || duration <= 0.0 {
            return;
        }

        self.time += f64::from(dt) * f64::from(self.speed);
        self.time = match self.loop_mode {
            LoopMode::Once => self.time.clamp(0.0, duration),
            LoopMode::Loop => self.time.rem_euclid(duration),
            LoopMode::PingPong => self.time.rem_euclid(duration * 2.0),
        };
    }

    /// Time at which tracks are sampled.
    #[must_use]
    pub fn sample_time(&self, duration: f64) -> f64 {
        match self.loop_mode {
            LoopMode::PingPong if self.time > duration => duration * 2.0 - self.time,
            _ => self.time,
        }
    }

    /// Index of the frame being shown.
    #[must_use]
    pub fn current_frame(&self, frame_rate: f32, frame_count: usize) -> usize {
        if frame_count == 0 {
            return 0;
        }
        let duration = frame_count as f64 / f64::from(frame_rate);
        let frames = self.sample_time(duration) * f64::from(frame_rate);
        let frame = (frames + FRAME_EPSILON).floor() as usize;
        match self.loop_mode {
            LoopMode::Loop => frame % frame_count,
            LoopMode::Once | LoopMode::PingPong => frame.min(frame_count - 1),
        }
    }

    /// A one-shot clip that reached its end.
    #[must_use]
    pub fn is_finished(&self, duration: f64) -> bool {
        self.loop_mode == LoopMode::Once && self.time >= duration
    }

    pub fn rewind(&mut self) {
        self.time = 0.0;
        self.cursors.fill(JointCursor::default());
    }
}
