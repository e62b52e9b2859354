use jiff::{civil::Date, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Age of a patient at some date, expressed in completed units.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Age {
    months: i32,
    days: i32,
    years: i32,
}

impl Age {
    /// Age on `target` for someone born on `dob`, or None if `target` precedes `dob`.
    ///
    /// Months and years are completed calendar units: a month only counts once the
    /// day-of-month of the birth date has been reached, a year only once the birth
    /// anniversary has been reached.
    pub fn at(dob: Date, target: Date) -> Option<Self> {
        let days = (target - dob).get_days();
        if days < 0 {
            return None;
        }

        let mut years = i32::from(target.year()) - i32::from(dob.year());
        if (target.month(), target.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }

        let mut months = (i32::from(target.year()) - i32::from(dob.year())) * 12
            + (i32::from(target.month()) - i32::from(dob.month()));
        if target.day() < dob.day() {
            months -= 1;
        }

        Some(Self {
            months: months.max(0),
            days,
            years: years.max(0),
        })
    }

    pub fn months(&self) -> i32 {
        self.months
    }

    pub fn days(&self) -> i32 {
        self.days
    }

    pub fn years(&self) -> i32 {
        self.years
    }

    // Short human label used for the administered listing.
    pub fn label(&self) -> String {
        if self.months < 1 {
            if self.days < 7 {
                return format!("{} days old", self.days);
            }
            let (weeks, rest) = (self.days / 7, self.days % 7);
            if rest == 0 {
                format!("{weeks} weeks old")
            } else {
                format!("{weeks} weeks {rest} days old")
            }
        } else if self.months < 72 {
            format!("{} months old", self.months)
        } else {
            format!("{} years old", self.years)
        }
    }
}

pub fn add_days(date: Date, days: i64) -> Date {
    shift(date, Span::new().try_days(days), days >= 0)
}

// Calendar month addition, clamped to the last day of the resulting month.
pub fn add_months(date: Date, months: i64) -> Date {
    shift(date, Span::new().try_months(months), months >= 0)
}

// Calendar year addition; 29 Feb lands on 28 Feb in non-leap years.
pub fn add_years(date: Date, years: i64) -> Date {
    shift(date, Span::new().try_years(years), years >= 0)
}

// Spans too large to represent saturate like the addition itself.
fn shift(date: Date, span: Result<Span, jiff::Error>, forward: bool) -> Date {
    match span {
        Ok(span) => date.saturating_add(span),
        Err(_) if forward => Date::MAX,
        Err(_) => Date::MIN,
    }
}

pub fn days_between(from: Date, to: Date) -> i32 {
    (to - from).get_days()
}

pub fn parse_date(text: &str) -> Option<Date> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    Date::strptime(DATE_FORMAT, &cleaned).ok()
}

pub fn format_date(date: Date) -> String {
    date.strftime(DATE_FORMAT).to_string()
}

/// A minimum age requirement. Only one unit is authoritative per requirement.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum AgeThreshold {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl AgeThreshold {
    // First date on which someone born on `dob` satisfies the threshold.
    pub fn reached_on(&self, dob: Date) -> Date {
        match *self {
            Self::Days(n) => add_days(dob, i64::from(n)),
            Self::Weeks(n) => add_days(dob, i64::from(n) * 7),
            Self::Months(n) => add_months(dob, i64::from(n)),
            Self::Years(n) => add_years(dob, i64::from(n)),
        }
    }

    pub fn is_met(&self, dob: Date, on: Date) -> bool {
        on >= self.reached_on(dob)
    }
}

impl fmt::Display for AgeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Days(n) if n >= 60 => write!(f, "more than {} months", n / 30),
            Self::Days(n) => write!(f, "{n} days"),
            Self::Weeks(n) => write!(f, "{n} weeks"),
            Self::Months(n) => write!(f, "{n} months"),
            Self::Years(n) => write!(f, "{n} years"),
        }
    }
}

// Render an interval in the largest unit that keeps it readable.
pub fn describe_interval(days: u32) -> String {
    if days >= 365 * 2 {
        format!("{} years", days / 365)
    } else if days >= 30 * 2 {
        format!("{} months", days / 30)
    } else if days >= 7 * 2 {
        format!("{} weeks", days / 7)
    } else {
        format!("{days} days")
    }
}
