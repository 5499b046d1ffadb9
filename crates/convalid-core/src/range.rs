use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Days looked back from the end date when no start date is given.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Longest range a request may ask for (one leap year).
pub const MAX_RANGE_DAYS: i64 = 366;

/// Inclusive calendar range. `start <= end` holds for every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Fill in missing bounds: `end` defaults to `today`, `start` to
    /// [`DEFAULT_LOOKBACK_DAYS`] before `end`. Ranges longer than
    /// [`MAX_RANGE_DAYS`] are rejected.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, CoreError> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_signed(Duration::days(DEFAULT_LOOKBACK_DAYS))
                .ok_or_else(|| CoreError::MalformedDate {
                    field: "end_date",
                    value: end.to_string(),
                })?,
        };
        let range = Self::new(start, end)?;
        if range.num_days() > MAX_RANGE_DAYS {
            return Err(CoreError::RangeTooLong {
                days: range.num_days(),
                max: MAX_RANGE_DAYS,
            });
        }
        Ok(range)
    }

    /// Parses optional `YYYY-MM-DD` strings, then [`DateRange::resolve`]s.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, CoreError> {
        let start = start
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s, "start_date"))
            .transpose()?;
        let end = end
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s, "end_date"))
            .transpose()?;
        Self::resolve(start, end, today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, always at least 1.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date from `start` to `end`, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

pub fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| CoreError::MalformedDate {
        field,
        value: raw.to_string(),
    })
}
