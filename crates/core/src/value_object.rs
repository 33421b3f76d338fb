//! Value objects: equality by value, not identity.

use core::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// holding the same attributes are the same value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A calendar month (`YYYY-MM`), the granularity forecasts are produced at.
///
/// Ordered chronologically (year first, then month).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl ValueObject for YearMonth {}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ForecastError> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::invalid_value(
                "month",
                0,
                format!("{year}-{month}"),
            ));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> NaiveDate {
        // `month` is validated to 1..=12, and day 1 exists in every month.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// The month `n` months later (`n == 0` returns `self`).
    pub fn plus_months(&self, n: u32) -> Self {
        let shifted = self
            .first_day()
            .checked_add_months(Months::new(n))
            .unwrap_or(NaiveDate::MAX);
        Self::from_date(shifted)
    }
}

impl core::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ForecastError::invalid_value("Target Month", 0, s);
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = y.parse::<i32>().map_err(|_| invalid())?;
        let month = m.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_months_rolls_over_year() {
        let ym = YearMonth::new(2024, 11).unwrap();
        assert_eq!(ym.plus_months(1), YearMonth::new(2024, 12).unwrap());
        assert_eq!(ym.plus_months(2), YearMonth::new(2025, 1).unwrap());
        assert_eq!(ym.plus_months(0), ym);
    }

    #[test]
    fn first_day_is_day_one() {
        let ym = YearMonth::from_date(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(ym.first_day(), NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
    }

    #[test]
    fn display_and_parse_agree() {
        let ym = YearMonth::new(2025, 3).unwrap();
        assert_eq!(ym.to_string(), "2025-03");
        assert_eq!("2025-03".parse::<YearMonth>().unwrap(), ym);
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert!(YearMonth::new(2025, 13).is_err());
        assert!("2025-00".parse::<YearMonth>().is_err());
        assert!("garbage".parse::<YearMonth>().is_err());
    }

    #[test]
    fn orders_chronologically() {
        let a = YearMonth::new(2024, 12).unwrap();
        let b = YearMonth::new(2025, 1).unwrap();
        assert!(a < b);
    }
}
