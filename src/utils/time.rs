use std::time::{Duration, Instant};

/// Timer for tracking frame timing and elapsed time.
pub struct Timer {
    start_time: Instant,
    last_update: Instant,
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Creates a new timer starting from now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Samples the wall clock; call once per rendered frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_update;
        self.elapsed = now - self.start_time;
        self.last_update = now;
        self.frame_count += 1;
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

/// Fixed-timestep accumulator.
///
/// Frame time goes in, a whole number of simulation ticks comes out. The
/// remainder carries to the next frame. At most `max_steps` ticks run per
/// frame; older backlog is dropped so a stall cannot snowball.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    interval: f32,
    accumulator: f32,
    max_steps: u32,
    tick_count: u64,
    sim_time: f64,
}

impl FixedStepClock {
    /// # Panics
    /// `interval` must be positive.
    #[must_use]
    pub fn new(interval: f32, max_steps: u32) -> Self {
        assert!(interval > 0.0, "tick interval must be positive, got {interval}");
        Self {
            interval,
            accumulator: 0.0,
            max_steps: max_steps.max(1),
            tick_count: 0,
            sim_time: 0.0,
        }
    }

    /// Adds `frame_dt` and returns the number of ticks to run now.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt.max(0.0);

        let mut steps = 0;
        while self.accumulator >= self.interval && steps < self.max_steps {
            self.accumulator -= self.interval;
            steps += 1;
        }

        if self.accumulator >= self.interval {
            let dropped = (self.accumulator / self.interval).floor();
            log::debug!("Simulation behind by {dropped} ticks; dropping backlog");
            self.accumulator %= self.interval;
        }

        self.tick_count += u64::from(steps);
        self.sim_time += f64::from(steps) * f64::from(self.interval);
        steps
    }

    /// Fraction of the next tick already elapsed, in `[0, 1)`.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.interval
    }

    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated seconds.
    #[must_use]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }
}
