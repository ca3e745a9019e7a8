//! Calendar-aware time arithmetic
//!
//! Business rules express instants relative to "now" or to a policy's
//! effective time ("1 day after", "1 year after") and snap results to a
//! configured granularity ("correct to day"). This module implements both,
//! plus the whole-year distance used for insured-age checks.

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Granularity of a truncation or the unit of a relative duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl TimeUnit {
    /// Truncates `dt` so every component finer than `self` is zeroed.
    ///
    /// `Second` leaves the instant untouched; `Day` yields local midnight;
    /// `Year` yields January 1st midnight. Idempotent.
    pub fn correct_to(self, dt: DateTime<Utc>) -> DateTime<Utc> {
        // with_* on in-range constants cannot fail
        match self {
            TimeUnit::Second => dt,
            TimeUnit::Minute => dt.with_second(0).unwrap().with_nanosecond(0).unwrap(),
            TimeUnit::Hour => TimeUnit::Minute.correct_to(dt).with_minute(0).unwrap(),
            TimeUnit::Day => TimeUnit::Hour.correct_to(dt).with_hour(0).unwrap(),
            TimeUnit::Month => TimeUnit::Day.correct_to(dt).with_day(1).unwrap(),
            TimeUnit::Year => TimeUnit::Month.correct_to(dt).with_month(1).unwrap(),
        }
    }
}

/// Direction of a relative duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeDirection {
    Before,
    After,
}

/// An offset from a base instant, e.g. "30 days after" or "1 year before"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeDuration {
    pub relative: RelativeDirection,
    pub unit: TimeUnit,
    pub amount: u32,
}

impl RelativeDuration {
    pub fn after(amount: u32, unit: TimeUnit) -> Self {
        Self { relative: RelativeDirection::After, unit, amount }
    }

    pub fn before(amount: u32, unit: TimeUnit) -> Self {
        Self { relative: RelativeDirection::Before, unit, amount }
    }

    /// Applies the offset to `base`.
    ///
    /// Month and year offsets are calendar-aware (Jan 31 + 1 month = Feb 28/29);
    /// finer units are exact durations.
    pub fn apply(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        let forward = self.relative == RelativeDirection::After;
        match self.unit {
            TimeUnit::Second | TimeUnit::Minute | TimeUnit::Hour | TimeUnit::Day => {
                let secs = match self.unit {
                    TimeUnit::Second => 1,
                    TimeUnit::Minute => 60,
                    TimeUnit::Hour => 3_600,
                    _ => 86_400,
                };
                let delta = Duration::seconds(i64::from(self.amount) * secs);
                if forward { base + delta } else { base - delta }
            }
            TimeUnit::Month | TimeUnit::Year => {
                let months = match self.unit {
                    TimeUnit::Year => self.amount * 12,
                    _ => self.amount,
                };
                if forward {
                    base + Months::new(months)
                } else {
                    base - Months::new(months)
                }
            }
        }
    }
}

/// Whole calendar years between two instants, direction-agnostic.
///
/// The count increments only once the anniversary of the earlier instant has
/// been reached. Callers treat the result as an age; inputs after the
/// reference still produce a positive count.
pub fn whole_years_between(reference: DateTime<Utc>, birth: DateTime<Utc>) -> u32 {
    let (earlier, later) = if birth <= reference {
        (birth, reference)
    } else {
        (reference, birth)
    };
    let mut years = later.year() - earlier.year();
    // Month arithmetic clamps Feb 29 to Feb 28 in non-leap years, which
    // would age a leap-day birth one day early. Compare the anniversary by
    // calendar position instead.
    let before_anniversary = (later.month(), later.day(), later.time())
        < (earlier.month(), earlier.day(), earlier.time());
    if years > 0 && before_anniversary {
        years -= 1;
    }
    years.max(0) as u32
}

/// Whole days between two instants, direction-agnostic.
pub fn whole_days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (b - a).num_days().abs()
}
