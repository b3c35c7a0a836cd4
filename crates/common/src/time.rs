//! Media time utilities.
//!
//! Timeline arithmetic is done on integer nanoseconds so that durations
//! compose exactly: a merge is the `max` of its children and a concat is
//! their sum, with no floating point drift.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A non-negative point or span on a media timeline, in nanoseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MediaTime(u64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * NANOS_PER_SEC)
    }

    /// Convert seconds to media time. Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * NANOS_PER_SEC as f64).round() as u64)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MediaTime) -> Option<MediaTime> {
        self.0.checked_add(other.0).map(MediaTime)
    }

    pub fn saturating_add(self, other: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_sub(other.0))
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: MediaTime) -> MediaTime {
        self.saturating_add(rhs)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// A half-open span `[start, start + duration)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: MediaTime,
    pub duration: MediaTime,
}

impl TimeRange {
    pub const EMPTY: TimeRange = TimeRange {
        start: MediaTime::ZERO,
        duration: MediaTime::ZERO,
    };

    pub const fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// Range starting at zero.
    pub const fn from_zero(duration: MediaTime) -> Self {
        Self {
            start: MediaTime::ZERO,
            duration,
        }
    }

    pub fn end(&self) -> MediaTime {
        self.start.saturating_add(self.duration)
    }

    /// End time, or `None` when it does not fit in the time representation.
    pub fn checked_end(&self) -> Option<MediaTime> {
        self.start.checked_add(self.duration)
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_zero()
    }

    pub fn contains(&self, t: MediaTime) -> bool {
        t >= self.start && t < self.end()
    }

    /// The same span moved later by `offset`.
    pub fn shifted(&self, offset: MediaTime) -> TimeRange {
        TimeRange {
            start: self.start.saturating_add(offset),
            duration: self.duration,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
