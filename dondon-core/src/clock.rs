//! The playback clock interface.
use crate::timing::Timestamp;

/// A source of the current playback position.
///
/// Usually backed by the audio output. Reading the position never blocks.
pub trait PlaybackClock {
    /// Returns the current playback position.
    fn elapsed(&self) -> Timestamp;

    /// Moves the playback position to `position`.
    fn seek(&mut self, position: Timestamp);

    /// Pauses playback. Does nothing if already paused.
    fn pause(&mut self);

    /// Resumes playback. Does nothing if not paused.
    fn resume(&mut self);

    /// Returns `true` if playback is paused.
    fn is_paused(&self) -> bool;

    /// Pauses if playing, resumes if paused.
    fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }
}

/// A clock that only moves when told to.
///
/// Useful for tests and for driving the engine from recorded input.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ManualClock {
    position: Timestamp,
    paused: bool,
}

impl ManualClock {
    /// Creates a `ManualClock` at `position`.
    #[inline]
    pub fn new(position: Timestamp) -> Self {
        Self {
            position,
            paused: false,
        }
    }

    /// Moves the clock to `position` unless paused.
    #[inline]
    pub fn advance_to(&mut self, position: Timestamp) {
        if !self.paused {
            self.position = position;
        }
    }
}

impl PlaybackClock for ManualClock {
    fn elapsed(&self) -> Timestamp {
        self.position
    }

    fn seek(&mut self, position: Timestamp) {
        self.position = position;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = ManualClock::default();
        clock.toggle_pause();
        assert!(clock.is_paused());
        clock.advance_to(Timestamp::from_millis(100));
        assert_eq!(clock.elapsed(), Timestamp::zero());

        clock.seek(Timestamp::from_millis(50));
        assert_eq!(clock.elapsed(), Timestamp::from_millis(50));

        clock.toggle_pause();
        clock.advance_to(Timestamp::from_millis(100));
        assert_eq!(clock.elapsed(), Timestamp::from_millis(100));
    }
}
