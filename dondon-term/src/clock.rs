use std::time::{Duration, Instant};

use circular_queue::CircularQueue;
use dondon_core::clock::PlaybackClock;
use dondon_core::timing::Timestamp;

/// Playback clock driven by the monotonic system clock.
///
/// There's no audio output, so wall time is the playback position.
#[derive(Debug, Clone)]
pub struct WallClock {
    /// Position at `started`.
    base: Timestamp,
    started: Instant,
    paused: bool,
}

impl WallClock {
    pub fn new(position: Timestamp) -> Self {
        Self {
            base: position,
            started: Instant::now(),
            paused: false,
        }
    }

    pub fn new_paused(position: Timestamp) -> Self {
        Self {
            paused: true,
            ..Self::new(position)
        }
    }

    fn position_at(&self, now: Instant) -> Timestamp {
        if self.paused {
            return self.base;
        }

        let passed = now.saturating_duration_since(self.started);
        Timestamp::from_secs_f64(self.base.as_secs_f64() + passed.as_secs_f64())
    }
}

impl PlaybackClock for WallClock {
    fn elapsed(&self) -> Timestamp {
        self.position_at(Instant::now())
    }

    fn seek(&mut self, position: Timestamp) {
        self.base = position;
        self.started = Instant::now();
    }

    fn pause(&mut self) {
        if !self.paused {
            self.base = self.elapsed();
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        if self.paused {
            self.started = Instant::now();
            self.paused = false;
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Frame time statistics for the FPS counter.
pub struct FrameClock {
    last_frame: Option<Instant>,
    frame_times: CircularQueue<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_frame: None,
            frame_times: CircularQueue::with_capacity(10),
        }
    }

    pub fn frame(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_frame {
            self.frame_times.push(now - last);
        }
        self.last_frame = Some(now);
    }

    /// Exponentially smoothed frames per second, newest frame first.
    pub fn fps(&self) -> Option<f32> {
        let mut iter = self.frame_times.iter();
        let mut fps = 1. / iter.next()?.as_secs_f32();
        for frame_time in iter {
            fps = 0.8 * fps + 0.2 / frame_time.as_secs_f32();
        }
        Some(fps)
    }
}
