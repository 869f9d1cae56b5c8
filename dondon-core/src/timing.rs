//! Types and utilities related to timing.
use core::{
    convert::TryFrom,
    ops::{Add, Neg, Sub},
    time::Duration,
};

#[cfg(test)]
use proptest_derive::Arbitrary;

/// A point in time.
///
/// Timestamps are represented as `i32`s in <sup>1</sup>⁄<sub>100</sub>ths of a millisecond. This
/// gives a range of roughly ±5.9 hours, and exact comparisons against hit window boundaries.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct Timestamp(pub i32);

/// Difference between two [`Timestamp`]s.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct TimestampDifference(pub i32);

/// Error returned when converting a value that doesn't fit into a [`Timestamp`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TryFromTimestampError;

impl core::fmt::Display for TryFromTimestampError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("value out of timestamp range")
    }
}

/// Units per second.
const UNITS_PER_SEC: f64 = 100_000.;

/// Rounds half away from zero. `f64::round()` is not available in `core`.
///
/// NaN rounds to zero; out of range values saturate.
#[inline]
pub(crate) fn round_to_i64(value: f64) -> i64 {
    if value >= 0. {
        (value + 0.5) as i64
    } else {
        (value - 0.5) as i64
    }
}

#[inline]
fn saturating_from_f64(value: f64) -> i32 {
    round_to_i64(value).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl Timestamp {
    /// Returns the zero timestamp.
    #[inline]
    pub fn zero() -> Self {
        Self(0)
    }

    /// Creates a `Timestamp` from milliseconds.
    ///
    /// # Panics
    ///
    /// Panics if the value doesn't fit.
    #[inline]
    pub fn from_millis(millis: i32) -> Self {
        Self(millis.checked_mul(100).unwrap())
    }

    /// Creates a `Timestamp` from <sup>1</sup>⁄<sub>100</sub>ths of a millisecond.
    #[inline]
    pub fn from_milli_hundredths(milli_hundredths: i32) -> Self {
        Self(milli_hundredths)
    }

    /// Creates a `Timestamp` from seconds, rounding to the nearest representable value and
    /// saturating at the bounds.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(saturating_from_f64(secs * UNITS_PER_SEC))
    }

    /// Creates a `Timestamp` from seconds, rounding to the nearest representable value.
    ///
    /// Returns `None` if `secs` is not finite or doesn't fit.
    #[inline]
    pub fn checked_from_secs_f64(secs: f64) -> Option<Self> {
        let units = secs * UNITS_PER_SEC;
        if !units.is_finite() {
            return None;
        }
        i32::try_from(round_to_i64(units)).ok().map(Self)
    }

    /// Returns the timestamp in <sup>1</sup>⁄<sub>100</sub>ths of a millisecond.
    #[inline]
    pub fn into_milli_hundredths(self) -> i32 {
        self.0
    }

    /// Returns the timestamp in whole milliseconds, truncating.
    #[inline]
    pub fn as_millis(self) -> i32 {
        self.0 / 100
    }

    /// Returns the timestamp in seconds.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.0) / UNITS_PER_SEC
    }

    /// Saturating addition.
    #[inline]
    pub fn saturating_add(self, other: TimestampDifference) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    #[inline]
    pub fn saturating_sub(self, other: TimestampDifference) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Returns `self - other`, saturating at the numeric bounds.
    #[inline]
    pub fn saturating_difference(self, other: Timestamp) -> TimestampDifference {
        TimestampDifference(self.0.saturating_sub(other.0))
    }
}

impl TimestampDifference {
    /// Returns the zero difference.
    #[inline]
    pub fn zero() -> Self {
        Self(0)
    }

    /// Creates a `TimestampDifference` from milliseconds.
    ///
    /// # Panics
    ///
    /// Panics if the value doesn't fit.
    #[inline]
    pub fn from_millis(millis: i32) -> Self {
        Self(millis.checked_mul(100).unwrap())
    }

    /// Creates a `TimestampDifference` from <sup>1</sup>⁄<sub>100</sub>ths of a millisecond.
    #[inline]
    pub fn from_milli_hundredths(milli_hundredths: i32) -> Self {
        Self(milli_hundredths)
    }

    /// Creates a `TimestampDifference` from seconds, rounding and saturating.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(saturating_from_f64(secs * UNITS_PER_SEC))
    }

    /// Returns the difference in <sup>1</sup>⁄<sub>100</sub>ths of a millisecond.
    #[inline]
    pub fn into_milli_hundredths(self) -> i32 {
        self.0
    }

    /// Returns the difference in seconds.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.0) / UNITS_PER_SEC
    }

    /// Returns the absolute value, saturating at `i32::MAX`.
    #[inline]
    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Returns half of this difference, rounded towards zero.
    #[inline]
    pub fn half(self) -> Self {
        Self(self.0 / 2)
    }

    /// Saturating addition.
    #[inline]
    pub fn saturating_add(self, other: TimestampDifference) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    #[inline]
    pub fn saturating_sub(self, other: TimestampDifference) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = TimestampDifference;

    #[inline]
    fn sub(self, other: Timestamp) -> Self::Output {
        TimestampDifference(self.0 - other.0)
    }
}

impl Add<TimestampDifference> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, other: TimestampDifference) -> Self::Output {
        Timestamp(self.0 + other.0)
    }
}

impl Sub<TimestampDifference> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn sub(self, other: TimestampDifference) -> Self::Output {
        Timestamp(self.0 - other.0)
    }
}

impl Add<TimestampDifference> for TimestampDifference {
    type Output = TimestampDifference;

    #[inline]
    fn add(self, other: TimestampDifference) -> Self::Output {
        TimestampDifference(self.0 + other.0)
    }
}

impl Sub<TimestampDifference> for TimestampDifference {
    type Output = TimestampDifference;

    #[inline]
    fn sub(self, other: TimestampDifference) -> Self::Output {
        TimestampDifference(self.0 - other.0)
    }
}

impl Neg for TimestampDifference {
    type Output = TimestampDifference;

    #[inline]
    fn neg(self) -> Self::Output {
        TimestampDifference(-self.0)
    }
}

impl TryFrom<Duration> for Timestamp {
    type Error = TryFromTimestampError;

    #[inline]
    fn try_from(duration: Duration) -> Result<Self, Self::Error> {
        let units = duration
            .as_secs()
            .checked_mul(100_000)
            .and_then(|x| x.checked_add(u64::from(duration.subsec_nanos() / 10_000)))
            .ok_or(TryFromTimestampError)?;
        i32::try_from(units)
            .map(Timestamp)
            .map_err(|_| TryFromTimestampError)
    }
}

impl TryFrom<Timestamp> for Duration {
    type Error = TryFromTimestampError;

    #[inline]
    fn try_from(timestamp: Timestamp) -> Result<Self, Self::Error> {
        let units = u64::try_from(timestamp.0).map_err(|_| TryFromTimestampError)?;
        Ok(Duration::new(
            units / 100_000,
            (units % 100_000) as u32 * 10_000,
        ))
    }
}
