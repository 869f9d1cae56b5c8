//! Notes that have been hit and are flying towards the hit target.
use alloc::collections::VecDeque;

use crate::{
    chart::NoteFlags,
    timing::{Timestamp, TimestampDifference},
};

/// Default duration of the flight animation.
pub const DEFAULT_FLIGHT_DURATION: TimestampDifference = TimestampDifference(30_000);

/// A note that has been hit.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct InFlightNote {
    /// Timestamp of the hit.
    pub timestamp: Timestamp,
    /// Flags of the note that was hit.
    pub flags: NoteFlags,
}

/// A note together with its flight progress, returned from [`InFlight::iter()`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyingNote {
    /// Flags of the note.
    pub flags: NoteFlags,
    /// Flight progress in `[0, 1)`, where `0` is the moment of the hit.
    pub progress: f64,
}

/// FIFO queue of notes in flight.
///
/// Notes are pushed in hit order and every note flies for the same duration, so the front entry
/// is always the first one to expire.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InFlight {
    entries: VecDeque<InFlightNote>,
    flight_duration: TimestampDifference,
}

impl InFlight {
    /// Creates an empty queue with the given flight duration.
    ///
    /// # Panics
    ///
    /// Panics if `flight_duration` is not positive.
    pub fn new(flight_duration: TimestampDifference) -> Self {
        assert!(flight_duration > TimestampDifference::zero());

        Self {
            entries: VecDeque::new(),
            flight_duration,
        }
    }

    /// Returns the flight duration.
    #[inline]
    pub fn flight_duration(&self) -> TimestampDifference {
        self.flight_duration
    }

    /// Adds a note hit at `timestamp`.
    ///
    /// `timestamp` must not be earlier than the timestamp of the last pushed note.
    #[inline]
    pub fn push(&mut self, timestamp: Timestamp, flags: NoteFlags) {
        debug_assert!(self.entries.back().map_or(true, |x| x.timestamp <= timestamp));
        self.entries.push_back(InFlightNote { timestamp, flags });
    }

    /// Removes the notes which have finished flying by `now` and returns how many were removed.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let mut removed = 0;
        while let Some(front) = self.entries.front() {
            if now.saturating_difference(front.timestamp) <= self.flight_duration {
                break;
            }

            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Returns the notes in flight from oldest to newest, with their progress at `now`.
    pub fn iter(&self, now: Timestamp) -> impl Iterator<Item = FlyingNote> + '_ {
        let duration = self.flight_duration.as_secs_f64();
        self.entries.iter().map(move |entry| FlyingNote {
            flags: entry.flags,
            progress: now.saturating_difference(entry.timestamp).as_secs_f64() / duration,
        })
    }

    /// Returns the number of notes in flight.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no notes are in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all notes.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new(DEFAULT_FLIGHT_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    #[test]
    fn sweep_evicts_only_expired() {
        let mut queue = InFlight::default();
        queue.push(Timestamp::from_millis(0), NoteFlags::DON);
        queue.push(Timestamp::from_millis(1000), NoteFlags::KAT);
        queue.push(Timestamp::from_millis(2000), NoteFlags::BIG_DON);

        assert_eq!(queue.sweep(Timestamp::from_millis(350)), 1);
        assert_eq!(queue.len(), 2);

        let flags: Vec<_> = queue
            .iter(Timestamp::from_millis(350))
            .map(|x| x.flags)
            .collect();
        assert_eq!(flags, [NoteFlags::KAT, NoteFlags::BIG_DON]);
    }

    #[test]
    fn sweep_keeps_entry_at_exact_duration() {
        let mut queue = InFlight::default();
        queue.push(Timestamp::zero(), NoteFlags::DON);

        assert_eq!(queue.sweep(Timestamp::from_millis(300)), 0);
        assert_eq!(queue.sweep(Timestamp::from_milli_hundredths(30_001)), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn progress() {
        let mut queue = InFlight::default();
        queue.push(Timestamp::from_millis(1000), NoteFlags::DON);

        let progress: Vec<_> = queue
            .iter(Timestamp::from_millis(1150))
            .map(|x| x.progress)
            .collect();
        assert_eq!(progress, [0.5]);
    }

    proptest! {
        #[test]
        fn sweep_is_idempotent(
            mut hits in proptest::collection::vec(0..1_000_000i32, 0..50),
            now in 0..1_100_000i32,
        ) {
            hits.sort_unstable();

            let mut queue = InFlight::default();
            for t in hits {
                queue.push(Timestamp(t), NoteFlags::DON);
            }

            let now = Timestamp(now);
            queue.sweep(now);
            let first: Vec<_> = queue.iter(now).collect();
            queue.sweep(now);
            let second: Vec<_> = queue.iter(now).collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn visible_progress_is_below_one(
            mut hits in proptest::collection::vec(0..1_000_000i32, 0..50),
            now in 1_000_000..1_100_000i32,
        ) {
            hits.sort_unstable();

            let mut queue = InFlight::default();
            for t in hits {
                queue.push(Timestamp(t), NoteFlags::DON);
            }

            let now = Timestamp(now);
            queue.sweep(now);
            for note in queue.iter(now) {
                prop_assert!((0. ..=1.).contains(&note.progress));
            }
        }
    }
}
