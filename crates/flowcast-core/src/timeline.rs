//! Model timeline and period groupings
//!
//! A [`Timeline`] is the fixed sequence of monthly periods every array in a
//! model is aligned to. It also knows where years start (for the `_Y`
//! accumulators), how to derive the `T.` time constants, and how to group
//! months into coarser display periods.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Names of the time constants derived from a timeline (`T.<name>`)
pub const TIME_CONSTANTS: [&str; 6] = ["DiM", "DiY", "DiQ", "MiY", "MiQ", "QiY"];

/// A single monthly period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    /// Calendar month, 1-based
    pub month: u32,
}

impl Period {
    /// Create a period, validating the month
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidTimeline(format!("month {} out of range", month)));
        }
        Ok(Self { year, month })
    }

    /// The period after this one
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Calendar quarter, 1-based
    pub fn quarter(self) -> u32 {
        (self.month - 1) / 3 + 1
    }

    /// Number of days in this month
    pub fn days_in_month(self) -> u32 {
        days_in_month(self.year, self.month)
    }

    /// Short label such as `Jan 2025`
    pub fn label(self) -> String {
        format!("{} {}", MONTH_ABBR[(self.month - 1) as usize], self.year)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(start), Some(end)) => end.signed_duration_since(start).num_days() as u32,
        _ => 30,
    }
}

fn days_in_year(year: i32) -> u32 {
    match NaiveDate::from_ymd_opt(year, 12, 31) {
        Some(date) => date.ordinal(),
        None => 365,
    }
}

/// How months are grouped for display and totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Monthly,
    Quarterly,
    Annual,
    /// Fiscal years ending in `end_month`, labelled by the calendar year they end in
    FiscalYear { end_month: u32 },
}

/// An ordered set of monthly indices shown as one display period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodGroup {
    pub label: String,
    pub indices: Vec<usize>,
}

impl PeriodGroup {
    pub fn new(label: impl Into<String>, indices: Vec<usize>) -> Self {
        Self {
            label: label.into(),
            indices,
        }
    }
}

/// Fixed-length ordered sequence of monthly periods
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Timeline {
    periods: Vec<Period>,
}

impl Timeline {
    /// Consecutive months starting at `start_year`/`start_month`
    ///
    /// # Examples
    /// ```
    /// use flowcast_core::Timeline;
    ///
    /// let timeline = Timeline::monthly(2024, 11, 4).unwrap();
    /// assert_eq!(timeline.len(), 4);
    /// assert_eq!(timeline.years(), vec![2024, 2024, 2025, 2025]);
    /// assert!(timeline.is_year_start(2));
    /// ```
    pub fn monthly(start_year: i32, start_month: u32, count: usize) -> Result<Self> {
        let mut period = Period::new(start_year, start_month)?;
        let mut periods = Vec::with_capacity(count);
        for _ in 0..count {
            periods.push(period);
            period = period.next();
        }
        Ok(Self { periods })
    }

    /// Build from explicit periods, which must be strictly increasing
    pub fn from_periods(periods: Vec<Period>) -> Result<Self> {
        for period in &periods {
            Period::new(period.year, period.month)?;
        }
        for pair in periods.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::InvalidTimeline(format!(
                    "periods out of order: {} then {}",
                    pair[0].label(),
                    pair[1].label()
                )));
            }
        }
        Ok(Self { periods })
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn period(&self, index: usize) -> Option<Period> {
        self.periods.get(index).copied()
    }

    /// Calendar year of every period
    pub fn years(&self) -> Vec<i32> {
        self.periods.iter().map(|p| p.year).collect()
    }

    /// Calendar month (1-based) of every period
    pub fn months(&self) -> Vec<u32> {
        self.periods.iter().map(|p| p.month).collect()
    }

    /// Whether period `index` opens a new year for the `_Y` accumulators
    pub fn is_year_start(&self, index: usize) -> bool {
        match index {
            0 => true,
            i => match (self.periods.get(i - 1), self.periods.get(i)) {
                (Some(prev), Some(cur)) => cur.year != prev.year,
                _ => false,
            },
        }
    }

    /// Values of a `T.` time constant, or `None` for an unknown name
    pub fn time_constant(&self, name: &str) -> Option<Vec<f64>> {
        let value: fn(&Period) -> f64 = match name {
            "DiM" => |p| p.days_in_month() as f64,
            "DiY" => |p| days_in_year(p.year) as f64,
            "DiQ" => |p| {
                let first = (p.quarter() - 1) * 3 + 1;
                (first..first + 3)
                    .map(|m| days_in_month(p.year, m))
                    .sum::<u32>() as f64
            },
            "MiY" => |_| 12.0,
            "MiQ" => |_| 3.0,
            "QiY" => |_| 4.0,
            _ => return None,
        };
        Some(self.periods.iter().map(value).collect())
    }

    /// Group consecutive months into display periods
    pub fn groupings(&self, granularity: Granularity) -> Vec<PeriodGroup> {
        let mut groups: Vec<PeriodGroup> = Vec::new();
        let mut current_key: Option<(i32, u32)> = None;

        for (index, period) in self.periods.iter().enumerate() {
            let (key, label) = match granularity {
                Granularity::Monthly => ((period.year, period.month), period.label()),
                Granularity::Quarterly => (
                    (period.year, period.quarter()),
                    format!("Q{} {}", period.quarter(), period.year),
                ),
                Granularity::Annual => ((period.year, 0), period.year.to_string()),
                Granularity::FiscalYear { end_month } => {
                    let fy = if period.month > end_month {
                        period.year + 1
                    } else {
                        period.year
                    };
                    ((fy, 0), format!("FY{}", fy))
                }
            };

            match groups.last_mut() {
                Some(group) if current_key == Some(key) => group.indices.push(index),
                _ => {
                    groups.push(PeriodGroup::new(label, vec![index]));
                    current_key = Some(key);
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_monthly_rolls_over_year() {
        let timeline = Timeline::monthly(2024, 11, 3).unwrap();
        assert_eq!(timeline.months(), vec![11, 12, 1]);
        assert_eq!(timeline.years(), vec![2024, 2024, 2025]);
        assert!(Timeline::monthly(2024, 13, 3).is_err());
    }

    #[test]
    fn test_year_starts() {
        let timeline = Timeline::monthly(2024, 11, 15).unwrap();
        let starts: Vec<usize> = (0..timeline.len())
            .filter(|&i| timeline.is_year_start(i))
            .collect();
        assert_eq!(starts, vec![0, 2, 14]);
    }

    #[test]
    fn test_time_constants() {
        let timeline = Timeline::monthly(2024, 1, 3).unwrap();
        assert_eq!(timeline.time_constant("DiM").unwrap(), vec![31.0, 29.0, 31.0]);
        assert_eq!(timeline.time_constant("DiY").unwrap(), vec![366.0; 3]);
        assert_eq!(timeline.time_constant("DiQ").unwrap(), vec![91.0; 3]);
        assert_eq!(timeline.time_constant("MiY").unwrap(), vec![12.0; 3]);
        assert!(timeline.time_constant("Bogus").is_none());
    }

    #[test]
    fn test_quarterly_groupings() {
        let timeline = Timeline::monthly(2025, 2, 6).unwrap();
        let groups = timeline.groupings(Granularity::Quarterly);
        assert_eq!(
            groups,
            vec![
                PeriodGroup::new("Q1 2025", vec![0, 1]),
                PeriodGroup::new("Q2 2025", vec![2, 3, 4]),
                PeriodGroup::new("Q3 2025", vec![5]),
            ]
        );
    }

    #[test]
    fn test_fiscal_year_groupings() {
        let timeline = Timeline::monthly(2025, 5, 4).unwrap();
        let groups = timeline.groupings(Granularity::FiscalYear { end_month: 6 });
        assert_eq!(
            groups,
            vec![
                PeriodGroup::new("FY2025", vec![0, 1]),
                PeriodGroup::new("FY2026", vec![2, 3]),
            ]
        );
    }

    #[test]
    fn test_from_periods_requires_order() {
        let a = Period::new(2025, 3).unwrap();
        let b = Period::new(2025, 2).unwrap();
        assert!(Timeline::from_periods(vec![a, b]).is_err());
        assert!(Timeline::from_periods(vec![b, a]).is_ok());
    }
}
