//! Value sources: the wall clock as Swatch Internet Time, and a manual source.
//!
//! A day has 1000 beats. Beats are counted from midnight in Biel Mean Time
//! (UTC+1, no daylight saving), so `@000.0` is 23:00 UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use parking_lot::RwLock;

use crate::errors::ParseBeatTimeError;

/// Offset of Biel Mean Time from UTC.
pub const BMT_OFFSET_SECS: i64 = 3600;

/// Seconds in one beat-time day.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Highest tenth-of-a-beat value in a day (`999.9`).
pub const MAX_TENTHS: u16 = 9_999;

/// Produces the current value served to clients.
///
/// Implementations must never return an empty string: the empty string is
/// the "nothing observed yet" sentinel of [`crate::ChangeTracker`].
pub trait ValueSource: Send + Sync {
    /// Current value.
    fn now(&self) -> String;
}

/// A point in Swatch Internet Time, precise to a tenth of a beat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeatTime {
    date: NaiveDate,
    tenths: u16,
}

impl BeatTime {
    /// Build from a BMT calendar date and a tenth-of-a-beat count.
    ///
    /// Returns `None` if `tenths` exceeds [`MAX_TENTHS`].
    pub fn new(date: NaiveDate, tenths: u16) -> Option<Self> {
        (tenths <= MAX_TENTHS).then_some(Self { date, tenths })
    }

    /// Convert a UTC instant. Sub-second precision is dropped and the beat
    /// count is truncated, never rounded up past `999.9`.
    ///
    /// Instants within an hour of the end of chrono's range saturate to
    /// its last representable moment.
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        let bmt = at
            .naive_utc()
            .checked_add_signed(TimeDelta::seconds(BMT_OFFSET_SECS))
            .unwrap_or(NaiveDateTime::MAX);
        let elapsed = bmt.num_seconds_from_midnight();
        // elapsed < 86_400, so the quotient is at most 9_999.
        let tenths = u16::try_from(elapsed * 10_000 / SECONDS_PER_DAY).unwrap_or(MAX_TENTHS);
        Self {
            date: bmt.date(),
            tenths,
        }
    }

    /// Calendar date in Biel Mean Time.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Beat count in tenths (`0..=9999`).
    pub fn tenths(&self) -> u16 {
        self.tenths
    }

    /// Beat count as a fraction (`0.0..=999.9`).
    pub fn beats(&self) -> f64 {
        f64::from(self.tenths) / 10.0
    }
}

impl fmt::Display for BeatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{}",
            self.date.format("%Y-%m-%d"),
            self.tenths / 10,
            self.tenths % 10
        )
    }
}

impl FromStr for BeatTime {
    type Err = ParseBeatTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date_part, beat_part) = s
            .split_once('@')
            .ok_or_else(|| ParseBeatTimeError::MissingSeparator(s.to_string()))?;

        if date_part.len() != 10 {
            return Err(ParseBeatTimeError::InvalidDate(date_part.to_string()));
        }
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| ParseBeatTimeError::InvalidDate(date_part.to_string()))?;

        let invalid_beats = || ParseBeatTimeError::InvalidBeats(beat_part.to_string());
        let (whole, frac) = beat_part.split_once('.').ok_or_else(invalid_beats)?;
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || whole.len() > 3 || frac.len() != 1 || !all_digits(frac) {
            return Err(invalid_beats());
        }
        let whole: u16 = whole.parse().map_err(|_| invalid_beats())?;
        let frac: u16 = frac.parse().map_err(|_| invalid_beats())?;

        Self::new(date, whole * 10 + frac).ok_or_else(invalid_beats)
    }
}

/// The wall clock, rendered as [`BeatTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BeatClock;

impl ValueSource for BeatClock {
    fn now(&self) -> String {
        BeatTime::from_utc(Utc::now()).to_string()
    }
}

/// A source whose value is set by hand.
#[derive(Debug)]
pub struct ManualSource {
    value: RwLock<String>,
}

impl ManualSource {
    /// Create a source that reports `initial` until changed.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(initial.into()),
        }
    }

    /// Replace the reported value.
    pub fn set(&self, value: impl Into<String>) {
        *self.value.write() = value.into();
    }
}

impl ValueSource for ManualSource {
    fn now(&self) -> String {
        self.value.read().clone()
    }
}
