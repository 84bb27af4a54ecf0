//! Injectable clock and calendar helpers
//!
//! "Today" decides carnet due dates and the month every installment falls in,
//! so it is never read from ambient global time inside the engine. Services
//! receive a [`Clock`]; production wires a [`SystemClock`] bound to the
//! institute's timezone and tests wire a [`FixedClock`].

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Timezone wrapper for the institute's local calendar
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Parses an IANA timezone name such as `America/Lima`
    pub fn parse(name: &str) -> Option<Self> {
        Tz::from_str(name).ok().map(Timezone)
    }

    /// Returns the calendar date of a UTC instant in this timezone
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }
}

impl std::fmt::Display for Timezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.name())
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Source of the current instant and the institute-local date
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;

    /// The timezone "today" is evaluated in
    fn timezone(&self) -> Timezone;

    /// Today's date in the clock's timezone
    fn today(&self) -> NaiveDate {
        self.timezone().local_date(self.now())
    }
}

/// Wall-clock time evaluated in a fixed timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Timezone,
}

impl SystemClock {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Timezone {
        self.timezone
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    timezone: Timezone,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, timezone: Timezone) -> Self {
        Self { now, timezone }
    }

    /// A clock frozen at noon UTC of the given date
    pub fn at_date(date: NaiveDate) -> Self {
        // Midnight plus twelve hours stays inside the same day for every date
        let noon = date.and_time(NaiveTime::default()).and_utc() + TimeDelta::hours(12);
        Self::new(noon, Timezone::default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn timezone(&self) -> Timezone {
        self.timezone
    }
}

/// Number of days in the given month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = first.and_then(|d| d.checked_add_months(Months::new(1)));
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 31,
    }
}

/// The date `months_ahead` months after `from`, on `day`
///
/// When the target month is shorter than `day` the date clamps to that
/// month's last day, so day 30 lands on Feb 28 (or 29) rather than rolling
/// into March.
pub fn monthly_date(from: NaiveDate, months_ahead: u32, day: u32) -> Option<NaiveDate> {
    let first = from.with_day(1)?.checked_add_months(Months::new(months_ahead))?;
    let day = day.clamp(1, days_in_month(first.year(), first.month()));
    first.with_day(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_today() {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_fixed_clock_at_date_is_noon_utc() {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());

        let last = FixedClock::at_date(NaiveDate::MAX);
        assert_eq!(last.now().date_naive(), NaiveDate::MAX);
    }

    #[test]
    fn test_today_respects_timezone() {
        // 03:00 UTC on the 1st is still the previous evening in Lima
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        let clock = FixedClock::new(now, Timezone::new(chrono_tz::America::Lima));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_monthly_date_clamps_short_months() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(monthly_date(jan, 0, 30), NaiveDate::from_ymd_opt(2025, 1, 30));
        assert_eq!(monthly_date(jan, 1, 30), NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(monthly_date(jan, 2, 30), NaiveDate::from_ymd_opt(2025, 3, 30));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
    }
}
