//! Half-open calendar-date intervals.
//!
//! Every date range in this crate is `[start, end)`: the start day is
//! included, the end day is not. Adjacent intervals share an endpoint
//! without sharing a day, so splits and merges never double-count.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate};

use crate::constants::sampling;
use crate::errors::HarvestError;
use crate::types::Year;

/// Half-open `[start, end)` span of calendar dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateInterval {
    /// Builds an interval; `start` must precede `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, HarvestError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(HarvestError::Configuration(format!(
                "interval start {start} must precede end {end}"
            )))
        }
    }

    /// Calendar year `[Jan 1, Jan 1 of the next year)`.
    pub fn year(year: Year) -> Result<Self, HarvestError> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1);
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1);
        match (start, end) {
            (Some(start), Some(end)) => Ok(Self { start, end }),
            _ => Err(HarvestError::Configuration(format!(
                "year {year} is outside the supported calendar range"
            ))),
        }
    }

    /// First day inside the interval.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day after the interval.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days spanned.
    pub fn width_days(&self) -> u64 {
        (self.end - self.start).num_days() as u64
    }

    /// Splits at the day midpoint. The second half starts exactly where the
    /// first ends; their union is the whole interval. `None` once the
    /// interval has collapsed to a single day.
    pub fn split(&self) -> Option<(Self, Self)> {
        let width = self.width_days();
        if width < 2 {
            return None;
        }
        let mid = self.start.checked_add_days(Days::new(width / 2))?;
        Some((
            Self {
                start: self.start,
                end: mid,
            },
            Self {
                start: mid,
                end: self.end,
            },
        ))
    }

    /// True when `date` falls inside the interval.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// True when the two intervals share at least one day.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Seven-day windows covering the interval, chronologically. The last
    /// window keeps its full seven days even when that runs past `end`.
    pub fn weeks(&self) -> Vec<Self> {
        let mut weeks = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let Some(week_end) = cursor.checked_add_days(Days::new(sampling::WEEK_DAYS)) else {
                break;
            };
            weeks.push(Self {
                start: cursor,
                end: week_end,
            });
            cursor = week_end;
        }
        weeks
    }

    /// The inclusive `"YYYYMMDD YYYYMMDD"` publication-date window CQL
    /// expects; the exclusive end renders as its preceding day.
    pub fn cql_window(&self) -> String {
        let last = self.end.pred_opt().unwrap_or(self.start);
        format!(
            "{} {}",
            self.start.format("%Y%m%d"),
            last.format("%Y%m%d")
        )
    }

    /// Year of the first day; used to bucket an interval's ids.
    pub fn start_year(&self) -> Year {
        self.start.year()
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_rejects_reversed_and_empty_ranges() {
        assert!(matches!(
            DateInterval::new(date(2003, 5, 1), date(2003, 5, 1)),
            Err(HarvestError::Configuration(_))
        ));
        assert!(matches!(
            DateInterval::new(date(2003, 5, 2), date(2003, 5, 1)),
            Err(HarvestError::Configuration(_))
        ));
    }

    #[test]
    fn split_halves_meet_exactly() {
        let interval = DateInterval::new(date(2003, 1, 1), date(2004, 1, 1)).unwrap();
        let (first, second) = interval.split().unwrap();
        assert_eq!(first.start(), interval.start());
        assert_eq!(first.end(), second.start());
        assert_eq!(second.end(), interval.end());
        assert_eq!(
            first.width_days() + second.width_days(),
            interval.width_days()
        );
    }

    #[test]
    fn single_day_interval_does_not_split() {
        let interval = DateInterval::new(date(2003, 1, 1), date(2003, 1, 2)).unwrap();
        assert!(interval.split().is_none());
    }

    #[test]
    fn year_interval_covers_leap_years() {
        let interval = DateInterval::year(2004).unwrap();
        assert_eq!(interval.width_days(), 366);
        assert!(interval.contains(date(2004, 2, 29)));
        assert!(!interval.contains(date(2005, 1, 1)));
    }

    #[test]
    fn weeks_tile_the_year_and_last_week_overruns() {
        let weeks = DateInterval::year(2003).unwrap().weeks();
        assert_eq!(weeks.len(), 53);
        for pair in weeks.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
        let last = weeks.last().unwrap();
        assert_eq!(last.width_days(), 7);
        assert!(last.end() > date(2004, 1, 1));
    }

    #[test]
    fn cql_window_renders_inclusive_end() {
        let interval = DateInterval::new(date(2003, 1, 1), date(2003, 1, 8)).unwrap();
        assert_eq!(interval.cql_window(), "20030101 20030107");
    }

    #[test]
    fn adjacent_weeks_share_no_cql_day() {
        let weeks = DateInterval::year(2003).unwrap().weeks();
        let first_end = weeks[0].cql_window().split(' ').nth(1).unwrap().to_string();
        let second_start = weeks[1].cql_window().split(' ').next().unwrap().to_string();
        assert!(first_end < second_start);
    }

    #[test]
    fn overlap_is_exclusive_of_endpoints() {
        let a = DateInterval::new(date(2003, 1, 1), date(2003, 2, 1)).unwrap();
        let b = DateInterval::new(date(2003, 2, 1), date(2003, 3, 1)).unwrap();
        let c = DateInterval::new(date(2003, 1, 20), date(2003, 2, 10)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }
}
