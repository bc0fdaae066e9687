//! Time bucketing of raw edge dates.
//!
//! A bucket run is a list of boundaries `b0 < b1 < ... < bn`; bucket `i`
//! covers `[b_i, b_{i+1})`. The last boundary only closes the final bucket
//! and never becomes a timestamp of its own.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::builder::NetworkError;

/// Granularity of the timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeGranularity {
    /// One bucket per day.
    #[default]
    Day,
    /// Seven-day buckets starting at the first date.
    Week,
    /// Calendar months.
    Month,
    /// Calendar years.
    Year,
}

impl TimeGranularity {
    /// Label format of a bucket start.
    pub fn label_format(&self) -> &'static str {
        match self {
            Self::Year => "%Y",
            Self::Month => "%Y-%m",
            Self::Day | Self::Week => "%Y-%m-%d",
        }
    }
}

/// Consecutive time buckets covering an extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBuckets {
    granularity: TimeGranularity,
    boundaries: Vec<NaiveDate>,
}

impl TimeBuckets {
    /// Buckets covering `[start, end]` at `granularity`.
    pub fn new(granularity: TimeGranularity, start: NaiveDate, end: NaiveDate) -> Result<Self, NetworkError> {
        if start > end {
            return Err(NetworkError::InvalidExtents { start, end });
        }
        let invalid = || NetworkError::InvalidExtents { start, end };

        let boundaries = match granularity {
            TimeGranularity::Year => (start.year()..=end.year() + 1)
                .map(|year| NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid))
                .collect::<Result<Vec<_>, _>>()?,
            TimeGranularity::Month => {
                let first = start.with_day(1).ok_or_else(invalid)?;
                let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
                (0..=months as u32 + 1)
                    .map(|idx| first.checked_add_months(Months::new(idx)).ok_or_else(invalid))
                    .collect::<Result<Vec<_>, _>>()?
            }
            TimeGranularity::Week => {
                let weeks = (end - start).num_days() / 7;
                (0..=weeks + 1)
                    .map(|idx| start.checked_add_signed(Duration::days(7 * idx)).ok_or_else(invalid))
                    .collect::<Result<Vec<_>, _>>()?
            }
            TimeGranularity::Day => {
                let days = (end - start).num_days();
                (0..=days + 1)
                    .map(|idx| start.checked_add_signed(Duration::days(idx)).ok_or_else(invalid))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            granularity,
            boundaries,
        })
    }

    /// Number of buckets (the closing boundary excluded).
    pub fn len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Whether there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket containing `date`.
    pub fn bucket_of(&self, date: NaiveDate) -> Option<usize> {
        let first = *self.boundaries.first()?;
        let last = *self.boundaries.last()?;
        if date < first || date >= last {
            return None;
        }
        Some(self.boundaries.partition_point(|b| *b <= date) - 1)
    }

    /// Display label of a bucket.
    pub fn label(&self, bucket: usize) -> String {
        self.boundaries[bucket]
            .format(self.granularity.label_format())
            .to_string()
    }

    /// Labels of every bucket.
    pub fn labels(&self) -> Vec<String> {
        (0..self.len()).map(|b| self.label(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_year_buckets() {
        let buckets = TimeBuckets::new(TimeGranularity::Year, d(2022, 3, 4), d(2023, 11, 1)).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.labels(), vec!["2022", "2023"]);
        assert_eq!(buckets.bucket_of(d(2022, 1, 1)), Some(0));
        assert_eq!(buckets.bucket_of(d(2023, 12, 31)), Some(1));
        assert_eq!(buckets.bucket_of(d(2024, 1, 1)), None);
    }

    #[test]
    fn test_month_buckets_cross_year() {
        let buckets = TimeBuckets::new(TimeGranularity::Month, d(2022, 11, 15), d(2023, 1, 2)).unwrap();
        assert_eq!(buckets.labels(), vec!["2022-11", "2022-12", "2023-01"]);
        assert_eq!(buckets.bucket_of(d(2022, 12, 31)), Some(1));
    }

    #[test]
    fn test_week_buckets() {
        let buckets = TimeBuckets::new(TimeGranularity::Week, d(2022, 1, 1), d(2022, 1, 15)).unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets.bucket_of(d(2022, 1, 7)), Some(0));
        assert_eq!(buckets.bucket_of(d(2022, 1, 8)), Some(1));
        assert_eq!(buckets.bucket_of(d(2022, 1, 15)), Some(2));
    }

    #[test]
    fn test_day_buckets() {
        let buckets = TimeBuckets::new(TimeGranularity::Day, d(2022, 1, 30), d(2022, 2, 1)).unwrap();
        assert_eq!(buckets.labels(), vec!["2022-01-30", "2022-01-31", "2022-02-01"]);
    }

    #[test]
    fn test_inverted_extents_rejected() {
        let result = TimeBuckets::new(TimeGranularity::Day, d(2022, 2, 1), d(2022, 1, 1));
        assert!(matches!(result, Err(NetworkError::InvalidExtents { .. })));
    }
}
