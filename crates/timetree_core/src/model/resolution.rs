//! Resolution ladder.
//!
//! # Responsibility
//! - Define the seven fixed time granularities, coarsest to finest.
//! - Extract the calendar field each level binds.
//!
//! # Invariants
//! - Declaration order is the ladder order (`Year < Month < ... < Millisecond`).
//! - Every level except `Millisecond` has exactly one child level.

use crate::model::time::{TimeError, TimeResult, TimezoneId};
use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Time granularity of one tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl Resolution {
    /// All levels in ladder order.
    pub const LADDER: [Resolution; 7] = [
        Resolution::Year,
        Resolution::Month,
        Resolution::Day,
        Resolution::Hour,
        Resolution::Minute,
        Resolution::Second,
        Resolution::Millisecond,
    ];

    /// Zero-based depth below the root (`Year` is 0).
    pub fn depth(self) -> usize {
        match self {
            Self::Year => 0,
            Self::Month => 1,
            Self::Day => 2,
            Self::Hour => 3,
            Self::Minute => 4,
            Self::Second => 5,
            Self::Millisecond => 6,
        }
    }

    /// Next finer level, or `None` at `Millisecond`.
    pub fn child_level(self) -> Option<Resolution> {
        match self {
            Self::Year => Some(Self::Month),
            Self::Month => Some(Self::Day),
            Self::Day => Some(Self::Hour),
            Self::Hour => Some(Self::Minute),
            Self::Minute => Some(Self::Second),
            Self::Second => Some(Self::Millisecond),
            Self::Millisecond => None,
        }
    }

    /// Levels from `Year` down to and including `self`.
    pub fn path_levels(self) -> &'static [Resolution] {
        &Self::LADDER[..=self.depth()]
    }

    /// Stable lowercase name used by the request layer.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        }
    }

    /// Extracts this level's calendar unit for `epoch_millis` seen in `timezone`.
    ///
    /// Month is 1-12, day is 1-31, hour 0-23, millisecond 0-999.
    pub fn field_value(self, epoch_millis: i64, timezone: TimezoneId) -> TimeResult<i64> {
        let local = DateTime::from_timestamp_millis(epoch_millis)
            .ok_or(TimeError::OutOfRange(epoch_millis))?
            .with_timezone(&timezone.tz());
        Ok(self.field_of(&local))
    }

    pub(crate) fn field_of(self, local: &DateTime<Tz>) -> i64 {
        match self {
            Self::Year => i64::from(local.year()),
            Self::Month => i64::from(local.month()),
            Self::Day => i64::from(local.day()),
            Self::Hour => i64::from(local.hour()),
            Self::Minute => i64::from(local.minute()),
            Self::Second => i64::from(local.second()),
            Self::Millisecond => i64::from(local.timestamp_subsec_millis()),
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = TimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Day),
            "hour" => Ok(Self::Hour),
            "minute" => Ok(Self::Minute),
            "second" => Ok(Self::Second),
            "millisecond" => Ok(Self::Millisecond),
            other => Err(TimeError::UnknownResolution(other.to_string())),
        }
    }
}
