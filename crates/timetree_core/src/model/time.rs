//! Time value model.
//!
//! # Responsibility
//! - Represent one point in time at a declared timezone and resolution.
//! - Provide calendar-aware truncation and successor arithmetic.
//!
//! # Invariants
//! - `epoch_millis` is always representable as a calendar date.
//! - Values are immutable; derivations return new instances.
//! - Ordering between two values is only meaningful when `compatible`.

use crate::model::resolution::Resolution;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MINUTES_PER_DAY: i64 = 24 * 60;
const MAX_SKIPPED_DAYS: usize = 2;

pub type TimeResult<T> = Result<T, TimeError>;

/// Errors from time value construction and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Timezone name is not a known IANA identifier.
    UnknownTimezone(String),
    /// Resolution name is not one of the seven ladder levels.
    UnknownResolution(String),
    /// Direction name is not `incoming|outgoing|both`.
    UnknownDirection(String),
    /// Instant cannot be represented as a calendar date.
    OutOfRange(i64),
    /// Unit values do not form a valid calendar instant.
    InvalidUnitPath(String),
}

impl Display for TimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTimezone(name) => write!(f, "unknown timezone `{name}`"),
            Self::UnknownResolution(name) => write!(
                f,
                "unknown resolution `{name}`; expected year|month|day|hour|minute|second|millisecond"
            ),
            Self::UnknownDirection(name) => write!(
                f,
                "unknown direction `{name}`; expected incoming|outgoing|both"
            ),
            Self::OutOfRange(millis) => write!(f, "epoch millis {millis} is out of calendar range"),
            Self::InvalidUnitPath(message) => write!(f, "invalid unit path: {message}"),
        }
    }
}

impl Error for TimeError {}

/// IANA timezone identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimezoneId(Tz);

impl TimezoneId {
    pub fn utc() -> Self {
        Self(Tz::UTC)
    }

    /// Parses an IANA name such as `Europe/London`.
    pub fn parse(name: &str) -> TimeResult<Self> {
        name.trim()
            .parse::<Tz>()
            .map(Self)
            .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        self.0.name()
    }

    pub(crate) fn tz(self) -> Tz {
        self.0
    }
}

impl Default for TimezoneId {
    fn default() -> Self {
        Self::utc()
    }
}

impl Display for TimezoneId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimezoneId {
    type Err = TimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for TimezoneId {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<TimezoneId> for String {
    fn from(value: TimezoneId) -> Self {
        value.name().to_string()
    }
}

/// One point in time at a timezone and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeValue {
    epoch_millis: i64,
    timezone: TimezoneId,
    resolution: Resolution,
}

impl TimeValue {
    /// Creates a time value.
    ///
    /// # Errors
    /// - `OutOfRange` when `epoch_millis` has no calendar representation.
    pub fn new(
        epoch_millis: i64,
        timezone: TimezoneId,
        resolution: Resolution,
    ) -> TimeResult<Self> {
        if DateTime::from_timestamp_millis(epoch_millis).is_none() {
            return Err(TimeError::OutOfRange(epoch_millis));
        }
        Ok(Self {
            epoch_millis,
            timezone,
            resolution,
        })
    }

    /// Day resolution in UTC, the request-layer default.
    pub fn day_utc(epoch_millis: i64) -> TimeResult<Self> {
        Self::new(epoch_millis, TimezoneId::utc(), Resolution::Day)
    }

    /// Current wall-clock time.
    pub fn now(timezone: TimezoneId, resolution: Resolution) -> Self {
        Self {
            epoch_millis: Utc::now().timestamp_millis(),
            timezone,
            resolution,
        }
    }

    pub fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }

    pub fn timezone(&self) -> TimezoneId {
        self.timezone
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn with_resolution(&self, resolution: Resolution) -> Self {
        Self { resolution, ..*self }
    }

    pub fn with_timezone(&self, timezone: TimezoneId) -> Self {
        Self { timezone, ..*self }
    }

    /// Whether range operations between `self` and `other` are valid.
    pub fn compatible(&self, other: &TimeValue) -> bool {
        self.timezone == other.timezone && self.resolution == other.resolution
    }

    /// Calendar unit of this value at `level`.
    pub fn field(&self, level: Resolution) -> i64 {
        level.field_of(&self.local())
    }

    /// Unit values from `Year` down to this value's resolution.
    pub fn unit_path(&self) -> Vec<i64> {
        let local = self.local();
        self.resolution
            .path_levels()
            .iter()
            .map(|level| level.field_of(&local))
            .collect()
    }

    /// Compares calendar units at this value's resolution.
    ///
    /// Two values inside the same unit compare equal even if their millis differ.
    pub fn cmp_units(&self, other: &TimeValue) -> Ordering {
        self.unit_path().cmp(&other.unit_path())
    }

    /// Start of the unit containing this value.
    pub fn truncated(&self) -> TimeResult<Self> {
        let local = self.local();
        let field = |level: Resolution| level.field_of(&local);
        let epoch_millis = match self.resolution {
            Resolution::Year => self.start_of_date(field(Resolution::Year), 1, 1)?,
            Resolution::Month => {
                self.start_of_date(field(Resolution::Year), field(Resolution::Month), 1)?
            }
            Resolution::Day => self.start_of_date(
                field(Resolution::Year),
                field(Resolution::Month),
                field(Resolution::Day),
            )?,
            Resolution::Hour => {
                self.epoch_millis
                    - field(Resolution::Minute) * MILLIS_PER_MINUTE
                    - field(Resolution::Second) * MILLIS_PER_SECOND
                    - field(Resolution::Millisecond)
            }
            Resolution::Minute => {
                self.epoch_millis
                    - field(Resolution::Second) * MILLIS_PER_SECOND
                    - field(Resolution::Millisecond)
            }
            Resolution::Second => self.epoch_millis - field(Resolution::Millisecond),
            Resolution::Millisecond => self.epoch_millis,
        };
        Self::new(epoch_millis, self.timezone, self.resolution)
    }

    /// Start of the next unit at this value's resolution.
    ///
    /// Calendar levels step in local time (variable month lengths, year
    /// rollover, DST-shifted midnights). Sub-day levels step in elapsed time
    /// from the truncated instant, so a repeated DST hour yields the same
    /// local hour twice.
    pub fn successor(&self) -> TimeResult<Self> {
        let start = self.truncated()?;
        let local = start.local();
        let year = Resolution::Year.field_of(&local);
        let month = Resolution::Month.field_of(&local);
        let epoch_millis = match self.resolution {
            Resolution::Year => self.start_of_date(year + 1, 1, 1)?,
            Resolution::Month if month == 12 => self.start_of_date(year + 1, 1, 1)?,
            Resolution::Month => self.start_of_date(year, month + 1, 1)?,
            Resolution::Day => {
                let next = local
                    .date_naive()
                    .succ_opt()
                    .ok_or(TimeError::OutOfRange(self.epoch_millis))?;
                self.start_of_naive_date(next)?
            }
            Resolution::Hour => checked_step(start.epoch_millis, MILLIS_PER_HOUR)?,
            Resolution::Minute => checked_step(start.epoch_millis, MILLIS_PER_MINUTE)?,
            Resolution::Second => checked_step(start.epoch_millis, MILLIS_PER_SECOND)?,
            Resolution::Millisecond => checked_step(start.epoch_millis, 1)?,
        };
        Self::new(epoch_millis, self.timezone, self.resolution)
    }

    /// Rebuilds the start of the unit described by `unit_path`.
    ///
    /// The path holds one unit value per level from `Year` down; its length
    /// selects the resolution.
    pub fn from_unit_path(unit_path: &[i64], timezone: TimezoneId) -> TimeResult<Self> {
        let resolution = unit_path
            .len()
            .checked_sub(1)
            .and_then(|depth| Resolution::LADDER.get(depth).copied())
            .ok_or_else(|| {
                TimeError::InvalidUnitPath(format!("expected 1..=7 units, got {}", unit_path.len()))
            })?;
        let unit = |depth: usize, default: i64| unit_path.get(depth).copied().unwrap_or(default);

        let date = naive_date(unit(0, 1970), unit(1, 1), unit(2, 1))?;
        let naive = to_u32(unit(3, 0))
            .zip(to_u32(unit(4, 0)))
            .zip(to_u32(unit(5, 0)))
            .zip(to_u32(unit(6, 0)))
            .and_then(|(((hour, minute), second), milli)| {
                date.and_hms_milli_opt(hour, minute, second, milli)
            })
            .ok_or_else(|| TimeError::InvalidUnitPath(format!("{unit_path:?}")))?;

        let epoch_millis = resolve_local(timezone.tz(), naive)
            .ok_or_else(|| TimeError::InvalidUnitPath(format!("{unit_path:?}")))?;
        Self::new(epoch_millis, timezone, resolution)
    }

    fn local(&self) -> DateTime<Tz> {
        match DateTime::from_timestamp_millis(self.epoch_millis) {
            Some(utc) => utc.with_timezone(&self.timezone.tz()),
            None => unreachable!("constructors reject unrepresentable epoch millis"),
        }
    }

    fn start_of_date(&self, year: i64, month: i64, day: i64) -> TimeResult<i64> {
        self.start_of_naive_date(naive_date(year, month, day)?)
    }

    /// Start of `date`, or of the next date that exists locally. A zone
    /// moving across the date line skips a whole calendar day.
    fn start_of_naive_date(&self, date: NaiveDate) -> TimeResult<i64> {
        let mut candidate = date;
        for _ in 0..=MAX_SKIPPED_DAYS {
            let midnight = candidate.and_time(NaiveTime::MIN);
            if let Some(millis) = resolve_local(self.timezone.tz(), midnight) {
                return Ok(millis);
            }
            candidate = candidate
                .succ_opt()
                .ok_or(TimeError::OutOfRange(self.epoch_millis))?;
        }
        Err(TimeError::OutOfRange(self.epoch_millis))
    }
}

impl Display for TimeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}[{}]",
            self.epoch_millis, self.timezone, self.resolution
        )
    }
}

/// Earliest instant of a local wall-clock time, or the first valid minute
/// after it when the wall-clock time falls into a DST gap.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<i64> {
    let mut candidate = naive;
    for _ in 0..MINUTES_PER_DAY {
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return Some(resolved.timestamp_millis());
        }
        candidate = candidate.checked_add_signed(Duration::minutes(1))?;
    }
    None
}

fn naive_date(year: i64, month: i64, day: i64) -> TimeResult<NaiveDate> {
    i32::try_from(year)
        .ok()
        .zip(to_u32(month))
        .zip(to_u32(day))
        .and_then(|((year, month), day)| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(|| TimeError::InvalidUnitPath(format!("no date {year}-{month}-{day}")))
}

fn to_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

fn checked_step(epoch_millis: i64, step: i64) -> TimeResult<i64> {
    epoch_millis
        .checked_add(step)
        .ok_or(TimeError::OutOfRange(epoch_millis))
}

#[cfg(test)]
mod tests {
    use super::{TimeError, TimeValue, TimezoneId};
    use crate::model::resolution::Resolution;

    // 2015-07-30T00:00:00Z
    const JULY_30_MS: i64 = 1_438_214_400_000;
    const DAY_MS: i64 = 86_400_000;

    fn utc(millis: i64, resolution: Resolution) -> TimeValue {
        TimeValue::new(millis, TimezoneId::utc(), resolution).unwrap()
    }

    #[test]
    fn day_successor_rolls_over_month_end() {
        let july_31 = utc(JULY_30_MS + DAY_MS + 5_000, Resolution::Day);
        let next = july_31.successor().unwrap();
        assert_eq!(next.unit_path(), vec![2015, 8, 1]);
        assert_eq!(next.epoch_millis(), JULY_30_MS + 2 * DAY_MS);
    }

    #[test]
    fn month_successor_handles_year_boundary_and_short_months() {
        // 2015-12-15T00:00:00Z
        let december = utc(1_450_137_600_000, Resolution::Month);
        assert_eq!(december.successor().unwrap().unit_path(), vec![2016, 1]);

        // 2016-01-31T12:00:00Z
        let january = utc(1_454_241_600_000, Resolution::Month);
        let february = january.successor().unwrap();
        assert_eq!(february.unit_path(), vec![2016, 2]);
        assert_eq!(february.successor().unwrap().unit_path(), vec![2016, 3]);
    }

    #[test]
    fn leap_day_is_followed_by_march_first() {
        // 2016-02-28T10:00:00Z
        let feb_28 = utc(1_456_653_600_000, Resolution::Day);
        let feb_29 = feb_28.successor().unwrap();
        assert_eq!(feb_29.unit_path(), vec![2016, 2, 29]);
        assert_eq!(feb_29.successor().unwrap().unit_path(), vec![2016, 3, 1]);
    }

    #[test]
    fn hour_successor_skips_missing_dst_hour() {
        let new_york = TimezoneId::parse("America/New_York").unwrap();
        // 2015-03-08T06:30:00Z is 01:30 EST, one hour before clocks jump to 03:00.
        let before_gap = TimeValue::new(1_425_796_200_000, new_york, Resolution::Hour).unwrap();
        assert_eq!(before_gap.field(Resolution::Hour), 1);
        let after_gap = before_gap.successor().unwrap();
        assert_eq!(after_gap.unit_path(), vec![2015, 3, 8, 3]);
    }

    #[test]
    fn day_successor_on_dst_day_lands_on_local_midnight() {
        let new_york = TimezoneId::parse("America/New_York").unwrap();
        // 2015-03-08T12:00:00Z, the spring-forward day in New York.
        let dst_day = TimeValue::new(1_425_816_000_000, new_york, Resolution::Day).unwrap();
        let next = dst_day.successor().unwrap();
        assert_eq!(next.unit_path(), vec![2015, 3, 9]);
        assert_eq!(next.field(Resolution::Hour), 0);
        // 2015-03-09T04:00:00Z is local midnight under EDT.
        assert_eq!(next.epoch_millis(), 1_425_873_600_000);
    }

    #[test]
    fn day_successor_skips_a_missing_local_date() {
        // Apia skipped 2011-12-30 when it moved west of the date line.
        let apia = TimezoneId::parse("Pacific/Apia").unwrap();
        let dec_29 = TimeValue::new(1_325_160_000_000, apia, Resolution::Day).unwrap();
        assert_eq!(dec_29.unit_path(), vec![2011, 12, 29]);

        let next = dec_29.successor().unwrap();
        assert_eq!(next.unit_path(), vec![2011, 12, 31]);
        // 2011-12-31T00:00 at UTC+14.
        assert_eq!(next.epoch_millis(), 1_325_239_200_000);
    }

    #[test]
    fn truncated_drops_finer_units() {
        let value = utc(JULY_30_MS + 3 * 3_600_000 + 17 * 60_000 + 999, Resolution::Hour);
        assert_eq!(
            value.truncated().unwrap().epoch_millis(),
            JULY_30_MS + 3 * 3_600_000
        );
    }

    #[test]
    fn cmp_units_ignores_sub_unit_millis() {
        let morning = utc(JULY_30_MS + 1_000, Resolution::Day);
        let evening = utc(JULY_30_MS + 20 * 3_600_000, Resolution::Day);
        assert_eq!(morning.cmp_units(&evening), std::cmp::Ordering::Equal);
        assert!(morning.epoch_millis() < evening.epoch_millis());
    }

    #[test]
    fn compatible_requires_same_timezone_and_resolution() {
        let day = utc(JULY_30_MS, Resolution::Day);
        assert!(day.compatible(&day.with_resolution(Resolution::Day)));
        assert!(!day.compatible(&day.with_resolution(Resolution::Hour)));
        let london = TimezoneId::parse("Europe/London").unwrap();
        assert!(!day.compatible(&day.with_timezone(london)));
    }

    #[test]
    fn from_unit_path_rebuilds_unit_start() {
        let rebuilt = TimeValue::from_unit_path(&[2015, 7, 30], TimezoneId::utc()).unwrap();
        assert_eq!(rebuilt.epoch_millis(), JULY_30_MS);
        assert_eq!(rebuilt.resolution(), Resolution::Day);

        let err = TimeValue::from_unit_path(&[2015, 2, 30], TimezoneId::utc()).unwrap_err();
        assert!(matches!(err, TimeError::InvalidUnitPath(_)));
    }

    #[test]
    fn rejects_unknown_timezone_and_out_of_range_millis() {
        assert!(matches!(
            TimezoneId::parse("Mars/Olympus"),
            Err(TimeError::UnknownTimezone(_))
        ));
        assert!(matches!(
            TimeValue::day_utc(i64::MAX),
            Err(TimeError::OutOfRange(_))
        ));
    }

    #[test]
    fn timezone_parses_from_str() {
        let berlin: TimezoneId = " Europe/Berlin ".parse().unwrap();
        assert_eq!(berlin.name(), "Europe/Berlin");
        assert!("Nowhere".parse::<TimezoneId>().is_err());
    }

    #[test]
    fn timezone_serializes_as_iana_name() {
        let value = utc(JULY_30_MS, Resolution::Day);
        let json = serde_json::to_value(value).unwrap();
        assert_eq!(json["timezone"], "UTC");
        assert_eq!(json["resolution"], "day");
        assert_eq!(json["epoch_millis"], JULY_30_MS);
    }
}
