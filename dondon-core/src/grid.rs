//! The editor beat grid: snapping, seeking and collision detection.
use core::ops::Range;

use crate::{
    chart::{Chart, ChartMeta},
    timing::{round_to_i64, Timestamp},
};

/// Number of grid subdivisions per beat.
pub const SUBDIVISIONS: i64 = 4;

/// Number of beats per measure.
pub const BEATS_PER_MEASURE: i64 = 4;

/// A beat grid derived from a BPM and an offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatGrid {
    bpm: f64,
    offset: Timestamp,
}

/// An error returned when the BPM is not a positive finite number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidBpm(pub f64);

impl core::fmt::Display for InvalidBpm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid BPM {}, must be positive and finite", self.0)
    }
}

/// Kind of a grid line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum GridLineKind {
    /// First beat of a measure.
    Measure,
    /// A beat.
    Beat,
    /// A subdivision between beats.
    Quarter,
}

/// A grid line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct GridLine {
    /// Grid index of the line; zero is at the grid offset.
    pub index: i64,
    /// Timestamp of the line.
    pub timestamp: Timestamp,
    /// Kind of the line.
    pub kind: GridLineKind,
}

impl BeatGrid {
    /// Creates a new `BeatGrid`.
    pub fn new(bpm: f64, offset: Timestamp) -> Result<Self, InvalidBpm> {
        if !(bpm.is_finite() && bpm > 0.) {
            return Err(InvalidBpm(bpm));
        }

        Ok(Self { bpm, offset })
    }

    /// Creates a `BeatGrid` from chart metadata.
    #[inline]
    pub fn from_meta(meta: &ChartMeta) -> Result<Self, InvalidBpm> {
        Self::new(meta.bpm, meta.offset)
    }

    /// Returns the BPM.
    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Returns the offset.
    #[inline]
    pub fn offset(&self) -> Timestamp {
        self.offset
    }

    /// Returns the distance between adjacent grid lines, in seconds.
    #[inline]
    pub fn quarter_interval(&self) -> f64 {
        60. / self.bpm / SUBDIVISIONS as f64
    }

    /// Returns the distance, in seconds, under which two notes are considered colliding.
    #[inline]
    pub fn collision_range(&self) -> f64 {
        self.quarter_interval() / 2.
    }

    /// Returns the index of the grid line nearest to `timestamp`.
    #[inline]
    pub fn index_at(&self, timestamp: Timestamp) -> i64 {
        let since_offset = timestamp.as_secs_f64() - self.offset.as_secs_f64();
        round_to_i64(since_offset / self.quarter_interval())
    }

    /// Returns the timestamp of the grid line with the given index.
    #[inline]
    pub fn timestamp_at(&self, index: i64) -> Timestamp {
        Timestamp::from_secs_f64(self.offset.as_secs_f64() + index as f64 * self.quarter_interval())
    }

    /// Snaps `timestamp` to the nearest grid line.
    #[inline]
    pub fn snap(&self, timestamp: Timestamp) -> Timestamp {
        self.timestamp_at(self.index_at(timestamp))
    }

    /// Computes the position `steps` grid lines back from the line nearest to `current`.
    ///
    /// Positive steps move backwards in time, matching a scroll wheel rolled up.
    #[inline]
    pub fn seek(&self, current: Timestamp, steps: i64) -> Timestamp {
        self.timestamp_at(self.index_at(current).saturating_sub(steps))
    }

    /// Returns the index of a note within [`collision_range()`](Self::collision_range) of
    /// `timestamp`, if any.
    pub fn collision(&self, chart: &Chart, timestamp: Timestamp) -> Option<usize> {
        let range = self.collision_range();
        let collides = |index: usize| {
            chart
                .get(index)
                .filter(|note| {
                    let distance = note.timestamp.saturating_difference(timestamp).abs();
                    distance.as_secs_f64() < range
                })
                .is_some()
        };

        // Only the nearest note on either side can be the closest one.
        let index = chart.lower_bound(timestamp);
        if collides(index) {
            return Some(index);
        }
        if index > 0 && collides(index - 1) {
            return Some(index - 1);
        }
        None
    }

    /// Returns the grid lines within `range`.
    pub fn lines(&self, range: Range<Timestamp>) -> GridLines {
        let mut first = self.index_at(range.start);
        if self.timestamp_at(first) < range.start {
            first += 1;
        }

        GridLines {
            grid: *self,
            next: first,
            end: range.end,
        }
    }

    fn line_kind(index: i64) -> GridLineKind {
        if index.rem_euclid(SUBDIVISIONS * BEATS_PER_MEASURE) == 0 {
            GridLineKind::Measure
        } else if index.rem_euclid(SUBDIVISIONS) == 0 {
            GridLineKind::Beat
        } else {
            GridLineKind::Quarter
        }
    }
}

/// Iterator over grid lines, returned from [`BeatGrid::lines()`].
#[derive(Debug, Clone)]
pub struct GridLines {
    grid: BeatGrid,
    next: i64,
    end: Timestamp,
}

impl Iterator for GridLines {
    type Item = GridLine;

    fn next(&mut self) -> Option<Self::Item> {
        let timestamp = self.grid.timestamp_at(self.next);
        if timestamp >= self.end {
            return None;
        }

        let line = GridLine {
            index: self.next,
            timestamp,
            kind: BeatGrid::line_kind(self.next),
        };
        self.next += 1;
        Some(line)
    }
}
