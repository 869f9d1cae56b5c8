//! Functionality related to managing the game state: judgement, score and combo.
use alloc::{sync::Arc, vec::Vec};

use circular_queue::CircularQueue;

use crate::{
    chart::{Chart, NoteColor},
    in_flight::{FlyingNote, InFlight},
    timing::{Timestamp, TimestampDifference},
};

/// Delay between the last note and the end of the session.
pub const END_SCREEN_DELAY: TimestampDifference = TimestampDifference(100_000);

/// Score awarded for a perfect hit.
pub const PERFECT_SCORE: u64 = 300;
/// Score awarded for an ok hit.
pub const OK_SCORE: u64 = 100;

/// Number of recent hits kept in [`GameState::last_hits`].
pub const LAST_HITS_CAPACITY: usize = 32;

/// Widths of the judgement windows.
///
/// Each window is centered on the note, so a note can be hit up to half of the window width
/// early or late.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct HitWindows {
    /// Full width of the perfect window.
    pub perfect: TimestampDifference,
    /// Full width of the ok window. Inputs outside of it don't judge the note.
    pub ok: TimestampDifference,
}

impl Default for HitWindows {
    fn default() -> Self {
        Self {
            perfect: TimestampDifference::from_millis(50),
            ok: TimestampDifference::from_millis(140),
        }
    }
}

impl HitWindows {
    /// Returns `true` if both windows are positive and the perfect window fits in the ok one.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.perfect > TimestampDifference::zero() && self.perfect <= self.ok
    }
}

/// Side of the drum an input came from.
///
/// Purely cosmetic: it does not affect judgement.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum DrumSide {
    /// Left side.
    Left,
    /// Right side.
    Right,
}

/// A drum input.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Input {
    /// Which surface was hit.
    pub color: NoteColor,
    /// Which side was hit.
    pub side: DrumSide,
}

impl Input {
    /// Bit set for [`NoteColor::Kat`] in the packed representation.
    pub const COLOR_KAT: u8 = 0b01;
    /// Bit set for [`DrumSide::Right`] in the packed representation.
    pub const SIDE_RIGHT: u8 = 0b10;

    /// Creates a new `Input`.
    #[inline]
    pub fn new(color: NoteColor, side: DrumSide) -> Self {
        Self { color, side }
    }

    /// Unpacks an input from its 2-bit type. Returns `None` if other bits are set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !(Self::COLOR_KAT | Self::SIDE_RIGHT) != 0 {
            return None;
        }

        let color = if bits & Self::COLOR_KAT != 0 {
            NoteColor::Kat
        } else {
            NoteColor::Don
        };
        let side = if bits & Self::SIDE_RIGHT != 0 {
            DrumSide::Right
        } else {
            DrumSide::Left
        };
        Some(Self { color, side })
    }
}

/// Judgement tier of a hit.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum HitGrade {
    /// Within the perfect window.
    Perfect,
    /// Within the ok window but outside of the perfect window.
    Ok,
}

/// Information about a hit.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Hit {
    /// Timestamp of the hit.
    pub timestamp: Timestamp,
    /// Difference between the actual hit and the perfect timing. Negative when early.
    pub difference: TimestampDifference,
    /// Judgement tier.
    pub grade: HitGrade,
}

/// Reason a note was missed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MissCause {
    /// The note was hit in time, but with the wrong color.
    WrongColor,
    /// The hit window of the note has passed without an input.
    Passed,
}

/// Kind of a judgement event.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EventKind {
    /// The note was hit.
    Hit(Hit),
    /// The note was missed.
    Miss(MissCause),
}

/// A note was judged.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Event {
    /// Index of the note in the chart.
    pub note: usize,
    /// What happened.
    pub kind: EventKind,
}

/// Letter rank derived from the accuracy.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Rank {
    /// 100% accuracy.
    X,
    /// At least 95%.
    S,
    /// At least 90%.
    A,
    /// At least 80%.
    B,
    /// At least 70%.
    C,
    /// Below 70%.
    D,
}

/// Running statistics of a play session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Statistics {
    /// Total score.
    pub score: u64,
    /// Number of consecutive hits since the last miss.
    pub combo: u32,
    /// Largest combo reached.
    pub max_combo: u32,
    /// Number of perfect hits.
    pub perfect_count: u32,
    /// Number of ok hits.
    pub ok_count: u32,
    /// Number of misses.
    pub miss_count: u32,
    /// Weighted accuracy in `[0, 1]` per judged note; zero before the first judgement.
    ///
    /// Notes skipped by a seek are not judged and don't count.
    pub accuracy: f64,
}

impl Statistics {
    /// Weight of a perfect hit in the accuracy.
    pub const PERFECT_WEIGHT: f64 = 1.;
    /// Weight of an ok hit in the accuracy.
    pub const OK_WEIGHT: f64 = 0.5;
    /// Weight of a miss in the accuracy.
    pub const MISS_WEIGHT: f64 = 0.;

    /// Returns the number of judged notes.
    #[inline]
    pub fn judged(&self) -> u32 {
        self.perfect_count + self.ok_count + self.miss_count
    }

    /// Returns the rank for the current accuracy, or `None` if nothing was judged yet.
    pub fn rank(&self) -> Option<Rank> {
        if self.judged() == 0 {
            return None;
        }

        let rank = if self.miss_count == 0 && self.ok_count == 0 {
            Rank::X
        } else if self.accuracy >= 0.95 {
            Rank::S
        } else if self.accuracy >= 0.9 {
            Rank::A
        } else if self.accuracy >= 0.8 {
            Rank::B
        } else if self.accuracy >= 0.7 {
            Rank::C
        } else {
            Rank::D
        };
        Some(rank)
    }

    fn record_hit(&mut self, grade: HitGrade) {
        match grade {
            HitGrade::Perfect => {
                self.perfect_count += 1;
                self.score += PERFECT_SCORE;
            }
            HitGrade::Ok => {
                self.ok_count += 1;
                self.score += OK_SCORE;
            }
        }

        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.recompute_accuracy();
    }

    fn record_miss(&mut self) {
        self.miss_count += 1;
        self.combo = 0;
        self.recompute_accuracy();
    }

    fn recompute_accuracy(&mut self) {
        let judged = self.judged();
        if judged == 0 {
            self.accuracy = 0.;
            return;
        }

        let weighted = Self::PERFECT_WEIGHT * f64::from(self.perfect_count)
            + Self::OK_WEIGHT * f64::from(self.ok_count)
            + Self::MISS_WEIGHT * f64::from(self.miss_count);
        self.accuracy = weighted / f64::from(judged);
    }
}

/// Result of [`GameState::judge()`].
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    /// Notes judged this frame, in judgement order.
    pub events: Vec<Event>,
    /// Every input of this frame, including the ones that didn't judge anything.
    ///
    /// Drives drum sounds and animations.
    pub feedback: Vec<Input>,
    /// Statistics after this frame.
    pub stats: Statistics,
    /// Whether the session has ended.
    pub finished: bool,
}

/// An error returned from [`GameState::new()`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GameStateCreationError {
    /// The perfect window is not positive or wider than the ok window.
    InvalidHitWindows(HitWindows),
}

impl core::fmt::Display for GameStateCreationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidHitWindows(windows) => write!(
                f,
                "invalid hit windows: perfect {} ms, ok {} ms",
                windows.perfect.into_milli_hundredths() / 100,
                windows.ok.into_milli_hundredths() / 100,
            ),
        }
    }
}

/// State of a play session.
#[derive(Debug, Clone)]
pub struct GameState {
    /// The chart being played.
    ///
    /// Stored in an [`Arc`] so it doesn't have to be cloned.
    pub chart: Arc<Chart>,
    /// Judgement windows.
    pub hit_windows: HitWindows,
    /// Notes that were hit and are still flying.
    pub in_flight: InFlight,
    /// Contains a number of last hits.
    ///
    /// Useful for implementing an error bar.
    pub last_hits: CircularQueue<Hit>,
    /// Index of the next note to be judged.
    cursor: usize,
    stats: Statistics,
    finished: bool,
}

impl GameState {
    /// Creates a new `GameState` given a chart and hit windows.
    pub fn new(
        chart: impl Into<Arc<Chart>>,
        hit_windows: HitWindows,
    ) -> Result<Self, GameStateCreationError> {
        if !hit_windows.is_valid() {
            return Err(GameStateCreationError::InvalidHitWindows(hit_windows));
        }

        Ok(Self {
            chart: chart.into(),
            hit_windows,
            in_flight: InFlight::default(),
            last_hits: CircularQueue::with_capacity(LAST_HITS_CAPACITY),
            cursor: 0,
            stats: Statistics::default(),
            finished: false,
        })
    }

    /// Returns the index of the next note to be judged.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the current statistics.
    #[inline]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Returns `true` if the session has ended.
    ///
    /// A session over an empty chart never ends on its own.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns `true` if there are notes left to judge.
    #[inline]
    pub fn has_active_notes(&self) -> bool {
        self.cursor < self.chart.len()
    }

    /// Returns the timestamp at which the session ends, or `None` for an empty chart.
    #[inline]
    pub fn end_timestamp(&self) -> Option<Timestamp> {
        self.chart
            .last_timestamp()
            .map(|last| last.saturating_add(END_SCREEN_DELAY))
    }

    /// Judges one frame.
    ///
    /// `timestamp` is the current playback position, and `inputs` are the drum inputs received
    /// since the previous frame, in order. Inputs are judged one after another against the
    /// advancing cursor, then every note whose hit window has passed is missed.
    pub fn judge(&mut self, timestamp: Timestamp, inputs: &[Input]) -> Judgement {
        let mut events = Vec::new();

        if !self.finished {
            for &input in inputs {
                if let Some(event) = self.judge_input(timestamp, input) {
                    events.push(event);
                }
            }

            self.miss_passed(timestamp, &mut events);

            if let Some(end) = self.end_timestamp() {
                if timestamp >= end {
                    self.finished = true;
                }
            }
        }

        Judgement {
            events,
            feedback: inputs.to_vec(),
            stats: self.stats,
            finished: self.finished,
        }
    }

    /// Judges a single input against the note at the cursor.
    fn judge_input(&mut self, timestamp: Timestamp, input: Input) -> Option<Event> {
        let note = *self.chart.get(self.cursor)?;

        let difference = timestamp.saturating_difference(note.timestamp);
        if difference.abs() > self.hit_windows.ok.half() {
            // Too far from the note, the input doesn't consume it.
            return None;
        }

        let index = self.cursor;
        self.cursor += 1;

        if input.color != note.flags.color {
            self.stats.record_miss();
            return Some(Event {
                note: index,
                kind: EventKind::Miss(MissCause::WrongColor),
            });
        }

        let grade = if difference.abs() <= self.hit_windows.perfect.half() {
            HitGrade::Perfect
        } else {
            HitGrade::Ok
        };
        self.stats.record_hit(grade);

        let hit = Hit {
            timestamp,
            difference,
            grade,
        };
        self.last_hits.push(hit);
        self.in_flight.push(timestamp, note.flags);

        Some(Event {
            note: index,
            kind: EventKind::Hit(hit),
        })
    }

    /// Misses every note at the cursor whose hit window has fully passed.
    fn miss_passed(&mut self, timestamp: Timestamp, events: &mut Vec<Event>) {
        let half_ok = self.hit_windows.ok.half();

        while let Some(note) = self.chart.get(self.cursor) {
            if timestamp.saturating_difference(note.timestamp) <= half_ok {
                break;
            }

            events.push(Event {
                note: self.cursor,
                kind: EventKind::Miss(MissCause::Passed),
            });
            self.cursor += 1;
            self.stats.record_miss();
        }
    }

    /// Removes finished in-flight notes and returns the ones still flying at `now`.
    pub fn sweep_in_flight(&mut self, now: Timestamp) -> impl Iterator<Item = FlyingNote> + '_ {
        self.in_flight.sweep(now);
        self.in_flight.iter(now)
    }

    /// Moves the cursor for playback restarted at `timestamp`.
    ///
    /// The cursor is placed at the first note that can still be hit at `timestamp`. Notes in
    /// flight are dropped; statistics are kept.
    pub fn seek(&mut self, timestamp: Timestamp) {
        let half_ok = self.hit_windows.ok.half();
        self.cursor = self
            .chart
            .notes()
            .partition_point(|note| timestamp.saturating_difference(note.timestamp) > half_ok);
        self.in_flight.clear();
        self.finished = self.end_timestamp().is_some_and(|end| timestamp >= end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{arbitrary_sorted_notes, ChartMeta, Note, NoteFlags};
    use alloc::vec;
    use proptest::prelude::*;

    const DON: Input = Input {
        color: NoteColor::Don,
        side: DrumSide::Left,
    };
    const KAT: Input = Input {
        color: NoteColor::Kat,
        side: DrumSide::Right,
    };

    fn state(notes: &[(i32, NoteFlags)]) -> GameState {
        let notes = notes
            .iter()
            .map(|&(millis, flags)| Note::new(Timestamp::from_millis(millis), flags))
            .collect();
        let chart = Chart::from_notes(ChartMeta::default(), notes).unwrap();
        GameState::new(chart, HitWindows::default()).unwrap()
    }

    fn ms(millis: i32) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn perfect_hit_at_note_time() {
        let mut state = state(&[(1000, NoteFlags::DON)]);
        let judgement = state.judge(ms(1000), &[DON]);

        assert_eq!(
            judgement.events,
            [Event {
                note: 0,
                kind: EventKind::Hit(Hit {
                    timestamp: ms(1000),
                    difference: TimestampDifference::zero(),
                    grade: HitGrade::Perfect,
                }),
            }]
        );
        assert_eq!(judgement.stats.score, 300);
        assert_eq!(judgement.stats.combo, 1);
        assert_eq!(judgement.stats.perfect_count, 1);
        assert_eq!(judgement.stats.accuracy, 1.);
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.in_flight.len(), 1);
    }

    #[test]
    fn wrong_color_is_a_miss() {
        let mut state = state(&[(1000, NoteFlags::DON)]);
        let judgement = state.judge(ms(1000), &[KAT]);

        assert_eq!(
            judgement.events,
            [Event {
                note: 0,
                kind: EventKind::Miss(MissCause::WrongColor),
            }]
        );
        assert_eq!(judgement.stats.miss_count, 1);
        assert_eq!(judgement.stats.combo, 0);
        assert_eq!(judgement.stats.score, 0);
        assert_eq!(state.cursor(), 1);
        assert!(state.in_flight.is_empty());
        assert!(state.last_hits.is_empty());
    }

    #[test]
    fn note_without_input_is_missed_after_window() {
        let mut state = state(&[(1000, NoteFlags::DON)]);

        let judgement = state.judge(ms(1070), &[]);
        assert!(judgement.events.is_empty());
        assert_eq!(state.cursor(), 0);

        let judgement = state.judge(Timestamp::from_milli_hundredths(107_001), &[]);
        assert_eq!(
            judgement.events,
            [Event {
                note: 0,
                kind: EventKind::Miss(MissCause::Passed),
            }]
        );
        assert_eq!(judgement.stats.miss_count, 1);
        assert_eq!(state.cursor(), 1);
    }

    #[test]
    fn window_edges_are_inclusive() {
        // Exactly half of the ok window away still judges the note: a hit needs
        // `|difference| <= ok/2` and a passive miss needs `difference > ok/2`.
        let mut early = state(&[(1000, NoteFlags::DON)]);
        let judgement = early.judge(ms(930), &[DON]);
        assert_eq!(judgement.stats.ok_count, 1);

        let mut late = state(&[(1000, NoteFlags::DON)]);
        let judgement = late.judge(ms(1070), &[DON]);
        assert_eq!(judgement.stats.ok_count, 1);
        assert_eq!(late.cursor(), 1);

        // One unit further is ignored and doesn't consume the note.
        let mut too_early = state(&[(1000, NoteFlags::DON)]);
        let judgement = too_early.judge(Timestamp::from_milli_hundredths(92_999), &[DON]);
        assert!(judgement.events.is_empty());
        assert_eq!(judgement.feedback, [DON]);
        assert_eq!(too_early.cursor(), 0);
    }

    #[test]
    fn perfect_window_edges() {
        let mut state = state(&[(1000, NoteFlags::DON), (2000, NoteFlags::DON)]);

        let judgement = state.judge(ms(1025), &[DON]);
        assert_eq!(judgement.stats.perfect_count, 1);

        let judgement = state.judge(Timestamp::from_milli_hundredths(197_499), &[DON]);
        assert_eq!(judgement.stats.ok_count, 1);
        assert_eq!(judgement.stats.score, 400);
        assert_eq!(judgement.stats.accuracy, 0.75);
    }

    #[test]
    fn inputs_in_one_frame_are_sequential() {
        let mut state = state(&[(1000, NoteFlags::DON), (1050, NoteFlags::KAT)]);
        let judgement = state.judge(ms(1020), &[DON, KAT]);

        assert_eq!(judgement.events.len(), 2);
        assert!(matches!(
            judgement.events[0].kind,
            EventKind::Hit(Hit {
                grade: HitGrade::Perfect,
                ..
            })
        ));
        assert!(matches!(
            judgement.events[1],
            Event {
                note: 1,
                kind: EventKind::Hit(Hit {
                    grade: HitGrade::Perfect,
                    ..
                }),
            }
        ));
        assert_eq!(judgement.stats.combo, 2);
        assert_eq!(state.cursor(), 2);
    }

    #[test]
    fn hit_note_is_not_swept_in_the_same_frame() {
        let mut state = state(&[(1000, NoteFlags::DON), (1010, NoteFlags::DON)]);
        // The first note is hit late; the second one is still in its window.
        let judgement = state.judge(ms(1070), &[DON]);

        assert_eq!(judgement.events.len(), 1);
        assert_eq!(judgement.stats.miss_count, 0);
        assert_eq!(state.cursor(), 1);
    }

    #[test]
    fn long_frame_misses_every_passed_note() {
        let mut state = state(&[
            (1000, NoteFlags::DON),
            (1100, NoteFlags::KAT),
            (1200, NoteFlags::DON),
        ]);
        let judgement = state.judge(ms(1250), &[]);

        assert_eq!(judgement.events.len(), 2);
        assert_eq!(judgement.stats.miss_count, 2);
        assert_eq!(state.cursor(), 2);
    }

    #[test]
    fn combo_resets_on_miss() {
        let mut state = state(&[
            (1000, NoteFlags::DON),
            (2000, NoteFlags::DON),
            (3000, NoteFlags::DON),
        ]);
        state.judge(ms(1000), &[DON]);
        state.judge(ms(2000), &[DON]);
        assert_eq!(state.stats().combo, 2);

        state.judge(ms(3000), &[KAT]);
        assert_eq!(state.stats().combo, 0);
        assert_eq!(state.stats().max_combo, 2);
        assert_eq!(state.stats().rank(), Some(Rank::D));
    }

    #[test]
    fn session_ends_after_delay() {
        let mut state = state(&[(1000, NoteFlags::DON)]);
        assert!(!state.judge(ms(1999), &[]).finished);
        assert!(state.judge(ms(2000), &[]).finished);
        assert!(state.is_finished());

        // Nothing is judged after the end.
        let stats = *state.stats();
        let judgement = state.judge(ms(2100), &[DON]);
        assert!(judgement.events.is_empty());
        assert_eq!(judgement.stats, stats);
    }

    #[test]
    fn empty_chart() {
        let mut state = state(&[]);
        let judgement = state.judge(ms(1_000_000), &[DON, KAT]);

        assert!(judgement.events.is_empty());
        assert!(!judgement.finished);
        assert_eq!(judgement.stats, Statistics::default());
        assert_eq!(judgement.stats.rank(), None);
        assert_eq!(state.end_timestamp(), None);
    }

    #[test]
    fn inputs_after_last_note_are_ignored() {
        let mut state = state(&[(1000, NoteFlags::DON)]);
        state.judge(ms(1000), &[DON]);
        let judgement = state.judge(ms(1010), &[DON]);

        assert!(judgement.events.is_empty());
        assert_eq!(judgement.feedback, [DON]);
        assert!(!state.has_active_notes());
    }

    #[test]
    fn last_hits_and_in_flight() {
        let mut state = state(&[(1000, NoteFlags::BIG_DON), (2000, NoteFlags::KAT)]);
        state.judge(ms(990), &[DON]);
        state.judge(ms(2030), &[KAT]);

        let mut hits = CircularQueue::with_capacity(LAST_HITS_CAPACITY);
        hits.push(Hit {
            timestamp: ms(990),
            difference: TimestampDifference::from_millis(-10),
            grade: HitGrade::Perfect,
        });
        hits.push(Hit {
            timestamp: ms(2030),
            difference: TimestampDifference::from_millis(30),
            grade: HitGrade::Ok,
        });
        assert_eq!(state.last_hits, hits);

        let flying: Vec<_> = state.sweep_in_flight(ms(2100)).map(|x| x.flags).collect();
        assert_eq!(flying, [NoteFlags::KAT]);
    }

    #[test]
    fn notes_skipped_by_seek_dont_count_towards_accuracy() {
        let mut state = state(&[
            (1000, NoteFlags::DON),
            (2000, NoteFlags::DON),
            (3000, NoteFlags::DON),
        ]);
        state.seek(ms(2500));
        assert_eq!(state.cursor(), 2);

        let judgement = state.judge(ms(3000), &[DON]);
        assert_eq!(judgement.stats.judged(), 1);
        assert_eq!(judgement.stats.accuracy, 1.);
    }

    #[test]
    fn seek_moves_cursor_and_keeps_stats() {
        let mut state = state(&[
            (1000, NoteFlags::DON),
            (2000, NoteFlags::DON),
            (3000, NoteFlags::DON),
        ]);
        state.judge(ms(1000), &[DON]);
        state.judge(ms(2500), &[]);
        assert_eq!(state.cursor(), 2);

        state.seek(ms(1500));
        assert_eq!(state.cursor(), 1);
        assert!(state.in_flight.is_empty());
        assert_eq!(state.stats().score, 300);
        assert_eq!(state.stats().miss_count, 1);

        state.seek(ms(2070));
        assert_eq!(state.cursor(), 1);
        state.seek(Timestamp::from_milli_hundredths(207_001));
        assert_eq!(state.cursor(), 2);

        state.seek(ms(5000));
        assert!(state.is_finished());
        state.seek(ms(0));
        assert!(!state.is_finished());
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn invalid_hit_windows() {
        let chart = Chart::new(ChartMeta::default());
        let windows = HitWindows {
            perfect: TimestampDifference::from_millis(150),
            ok: TimestampDifference::from_millis(140),
        };
        assert_eq!(
            GameState::new(chart, windows).unwrap_err(),
            GameStateCreationError::InvalidHitWindows(windows)
        );
    }

    #[test]
    fn input_bits() {
        assert_eq!(Input::from_bits(0), Some(Input::new(NoteColor::Don, DrumSide::Left)));
        assert_eq!(Input::from_bits(1), Some(Input::new(NoteColor::Kat, DrumSide::Left)));
        assert_eq!(Input::from_bits(2), Some(Input::new(NoteColor::Don, DrumSide::Right)));
        assert_eq!(Input::from_bits(3), Some(Input::new(NoteColor::Kat, DrumSide::Right)));
        assert_eq!(Input::from_bits(4), None);
    }

    #[test]
    fn ranks() {
        let stats = |perfect_count, ok_count, miss_count| {
            let mut stats = Statistics {
                perfect_count,
                ok_count,
                miss_count,
                ..Statistics::default()
            };
            stats.recompute_accuracy();
            stats
        };

        assert_eq!(stats(10, 0, 0).rank(), Some(Rank::X));
        assert_eq!(stats(19, 1, 0).rank(), Some(Rank::S));
        assert_eq!(stats(8, 2, 0).rank(), Some(Rank::A));
        assert_eq!(stats(6, 4, 0).rank(), Some(Rank::B));
        assert_eq!(stats(7, 0, 3).rank(), Some(Rank::C));
        assert_eq!(stats(1, 0, 1).rank(), Some(Rank::D));
    }

    fn chart_with_frames() -> impl Strategy<Value = (Chart, Vec<(i32, Vec<Input>)>)> {
        let input = (any::<bool>(), any::<bool>()).prop_map(|(kat, right)| Input {
            color: if kat { NoteColor::Kat } else { NoteColor::Don },
            side: if right { DrumSide::Right } else { DrumSide::Left },
        });
        (
            arbitrary_sorted_notes(100),
            proptest::collection::vec(
                (0..20_000i32, proptest::collection::vec(input, 0..4)),
                0..100,
            ),
        )
            .prop_map(|(notes, mut frames)| {
                // Frame timestamps are monotonically non-decreasing within a session.
                frames.sort_unstable_by_key(|(t, _)| *t);
                let frames = frames
                    .into_iter()
                    .map(|(t, inputs)| (t * 500, inputs))
                    .collect();
                (Chart::from_notes(ChartMeta::default(), notes).unwrap(), frames)
            })
    }

    proptest! {
        #[test]
        fn judgement_is_monotonic((chart, frames) in chart_with_frames()) {
            let mut state = GameState::new(chart, HitWindows::default()).unwrap();
            let mut previous = *state.stats();
            let mut cursor = state.cursor();

            for (t, inputs) in frames {
                let judgement = state.judge(Timestamp(t), &inputs);

                prop_assert!(state.cursor() >= cursor);
                prop_assert!(judgement.stats.score >= previous.score);
                prop_assert!(judgement.stats.perfect_count >= previous.perfect_count);
                prop_assert!(judgement.stats.ok_count >= previous.ok_count);
                prop_assert!(judgement.stats.miss_count >= previous.miss_count);
                prop_assert!((0. ..=1.).contains(&judgement.stats.accuracy));
                prop_assert_eq!(judgement.stats.judged() as usize, state.cursor());
                prop_assert_eq!(judgement.events.len(), state.cursor() - cursor);

                previous = judgement.stats;
                cursor = state.cursor();
            }
        }

        #[test]
        fn every_note_is_judged_exactly_once(notes in arbitrary_sorted_notes(100)) {
            let chart = Chart::from_notes(ChartMeta::default(), notes).unwrap();
            let len = chart.len();
            let end = chart.last_timestamp().map(|t| t + END_SCREEN_DELAY);
            let mut state = GameState::new(chart, HitWindows::default()).unwrap();

            let mut judged = vec![0; len];
            for t in (-100_000..11_000_000).step_by(1_700) {
                let inputs = if t % 3 == 0 { &[DON][..] } else { &[KAT][..] };
                for event in state.judge(Timestamp(t), inputs).events {
                    judged[event.note] += 1;
                }
            }

            prop_assert!(judged.iter().all(|&x| x == 1));
            prop_assert_eq!(state.is_finished(), end.is_some());
        }
    }
}
