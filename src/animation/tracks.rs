use crate::animation::values::Interpolatable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Linear,
    Step,
    /// Values are stored as `[in_tangent, value, out_tangent]` per keyframe.
    CubicSpline,
}

/// How far the cursor scans linearly before falling back to binary search.
const MAX_SCAN_OFFSET: usize = 3;

/// Remembers the last keyframe interval so sequential playback samples in O(1).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolatable> {
    pub(crate) times: Vec<f32>,
    pub(crate) values: Vec<T>,
    pub(crate) interpolation: InterpolationMode,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    /// # Panics
    /// The track must have at least one keyframe, and `values` must match
    /// `times` (three values per keyframe for cubic splines).
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: InterpolationMode) -> Self {
        assert!(!times.is_empty(), "keyframe track needs at least one keyframe");
        let expected = match interpolation {
            InterpolationMode::CubicSpline => times.len() * 3,
            _ => times.len(),
        };
        assert_eq!(
            values.len(),
            expected,
            "keyframe track has {} values for {} keyframes",
            values.len(),
            times.len()
        );
        Self {
            times,
            values,
            interpolation,
        }
    }

    /// One keyframe per frame at `frame_rate`, linear in between.
    #[must_use]
    pub fn from_frames(values: Vec<T>, frame_rate: f32) -> Self {
        let times = (0..values.len()).map(|i| i as f32 / frame_rate).collect();
        Self::new(times, values, InterpolationMode::Linear)
    }

    #[must_use]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    /// Time of the last keyframe.
    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn sample(&self, time: f32) -> T {
        let next_idx = self.times.partition_point(|&t| t <= time);
        self.sample_at_frame(next_idx.saturating_sub(1), time)
    }

    /// Samples using `cursor` as a hint, updating it.
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> T {
        let len = self.times.len();
        if len == 1 {
            return self.value_at(0);
        }

        let i = cursor.last_index.min(len - 1);
        let found = if time >= self.times[i] {
            // Forward: playback or fast-forward
            let mut res = None;
            for idx in i..=(i + MAX_SCAN_OFFSET) {
                if idx >= len - 1 {
                    res = Some(len - 1);
                    break;
                }
                if time < self.times[idx + 1] {
                    res = Some(idx);
                    break;
                }
            }
            res
        } else {
            // Backward: reverse playback or loop wrap
            (i.saturating_sub(MAX_SCAN_OFFSET)..i)
                .rev()
                .find(|&idx| time >= self.times[idx])
        };

        let index = found.unwrap_or_else(|| {
            self.times
                .partition_point(|&t| t <= time)
                .saturating_sub(1)
        });
        cursor.last_index = index;
        self.sample_at_frame(index, time)
    }

    /// For cubic splines the value sits between its two tangents.
    fn value_at(&self, index: usize) -> T {
        match self.interpolation {
            InterpolationMode::CubicSpline => self.values[index * 3 + 1],
            _ => self.values[index],
        }
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> T {
        let len = self.times.len();
        if index >= len - 1 {
            return self.value_at(len - 1);
        }
        if time <= self.times[0] {
            return self.value_at(0);
        }

        let next_idx = index + 1;
        let t0 = self.times[index];
        let t1 = self.times[next_idx];
        let dt = t1 - t0;
        let t = if dt > 1e-6 { ((time - t0) / dt).clamp(0.0, 1.0) } else { 0.0 };

        match self.interpolation {
            InterpolationMode::Step => self.value_at(index),
            InterpolationMode::Linear => {
                T::interpolate_linear(self.value_at(index), self.value_at(next_idx), t)
            }
            InterpolationMode::CubicSpline => {
                let v0 = self.values[index * 3 + 1];
                let out_tangent0 = self.values[index * 3 + 2];
                let in_tangent1 = self.values[next_idx * 3];
                let v1 = self.values[next_idx * 3 + 1];
                T::interpolate_cubic(v0, out_tangent0, in_tangent1, v1, t, dt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> KeyframeTrack<f32> {
        KeyframeTrack::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![0.0, 10.0, 20.0, 30.0],
            InterpolationMode::Linear,
        )
    }

    #[test]
    fn linear_sample_and_clamp() {
        let track = ramp();
        assert!((track.sample(0.5) - 5.0).abs() < 1e-5);
        assert!((track.sample(-1.0) - 0.0).abs() < 1e-5);
        assert!((track.sample(10.0) - 30.0).abs() < 1e-5);
    }

    #[test]
    fn step_holds_value() {
        let track = KeyframeTrack::new(vec![0.0, 1.0], vec![1.0, 2.0], InterpolationMode::Step);
        assert!((track.sample(0.99) - 1.0).abs() < f32::EPSILON);
        assert!((track.sample(1.0) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cursor_matches_binary_search() {
        let track = ramp();
        let mut cursor = KeyframeCursor::default();
        for &time in &[0.1, 0.7, 1.2, 2.9, 0.3, 2.5, 0.0, 3.5] {
            let expected = track.sample(time);
            let got = track.sample_with_cursor(time, &mut cursor);
            assert!((expected - got).abs() < 1e-5, "t={time}: {expected} vs {got}");
        }
    }

    #[test]
    fn from_frames_spaces_by_rate() {
        let track = KeyframeTrack::from_frames(vec![0.0_f32, 1.0, 2.0], 10.0);
        assert_eq!(track.times(), &[0.0, 0.1, 0.2]);
        assert!((track.sample(0.05) - 0.5).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "at least one keyframe")]
    fn empty_track_panics() {
        let _ = KeyframeTrack::<f32>::new(Vec::new(), Vec::new(), InterpolationMode::Linear);
    }
}
