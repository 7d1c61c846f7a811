//! Polish weekday names and the little date arithmetic the planner needs.
//!
//! Dates travel as `YYYY-MM-DD` strings everywhere outside this crate. They
//! are parsed exactly once, at the boundary, with [`parse_date`].

use std::{fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── DayName ─────────────────────────────────────────────────────────────────

/// A weekday as it is spelled in plans and ledger entries.
///
/// Variants are declared Monday-first, so the derived `Ord` sorts plan days in
/// school-week order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DayName {
  #[serde(rename = "Poniedziałek")]
  Poniedzialek,
  #[serde(rename = "Wtorek")]
  Wtorek,
  #[serde(rename = "Środa")]
  Sroda,
  #[serde(rename = "Czwartek")]
  Czwartek,
  #[serde(rename = "Piątek")]
  Piatek,
  #[serde(rename = "Sobota")]
  Sobota,
  #[serde(rename = "Niedziela")]
  Niedziela,
}

impl DayName {
  /// Monday through Friday.
  pub const SCHOOL_DAYS: [DayName; 5] = [
    DayName::Poniedzialek,
    DayName::Wtorek,
    DayName::Sroda,
    DayName::Czwartek,
    DayName::Piatek,
  ];

  pub fn of(date: NaiveDate) -> Self {
    match date.weekday() {
      Weekday::Mon => Self::Poniedzialek,
      Weekday::Tue => Self::Wtorek,
      Weekday::Wed => Self::Sroda,
      Weekday::Thu => Self::Czwartek,
      Weekday::Fri => Self::Piatek,
      Weekday::Sat => Self::Sobota,
      Weekday::Sun => Self::Niedziela,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Poniedzialek => "Poniedziałek",
      Self::Wtorek => "Wtorek",
      Self::Sroda => "Środa",
      Self::Czwartek => "Czwartek",
      Self::Piatek => "Piątek",
      Self::Sobota => "Sobota",
      Self::Niedziela => "Niedziela",
    }
  }

  pub fn is_school_day(self) -> bool {
    !matches!(self, Self::Sobota | Self::Niedziela)
  }
}

impl fmt::Display for DayName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DayName {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    [
      Self::Poniedzialek,
      Self::Wtorek,
      Self::Sroda,
      Self::Czwartek,
      Self::Piatek,
      Self::Sobota,
      Self::Niedziela,
    ]
    .into_iter()
    .find(|d| d.as_str() == s)
    .ok_or_else(|| Error::UnknownDayName(s.to_owned()))
  }
}

// ─── Dates ───────────────────────────────────────────────────────────────────

/// Parse a canonical `YYYY-MM-DD` date. Anything else is rejected, including
/// dates without zero padding, because lexicographic comparison of stored
/// date strings relies on it.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
  if s.len() != 10 {
    return Err(Error::InvalidDate(s.to_owned()));
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|_| Error::InvalidDate(s.to_owned()))
}

/// Monday of the week containing `date`.
pub fn week_monday(date: NaiveDate) -> NaiveDate {
  date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// The five school days of the week starting at `monday`.
pub fn school_week(monday: NaiveDate) -> impl Iterator<Item = NaiveDate> {
  monday.iter_days().take(5)
}

/// The planner's look-ahead window for `today`.
///
/// On a weekday the window runs from today through Friday. On Saturday or
/// Sunday it is the whole of next week, Monday through Friday.
pub fn planning_window(today: NaiveDate) -> Vec<NaiveDate> {
  let this_monday = week_monday(today);
  let this_friday = this_monday + Days::new(4);

  let start = if !DayName::of(today).is_school_day() || today > this_friday {
    this_monday + Days::new(7)
  } else {
    today
  };
  let end = week_monday(start) + Days::new(4);

  start
    .iter_days()
    .take_while(|d| *d <= end)
    .filter(|d| DayName::of(*d).is_school_day())
    .collect()
}
