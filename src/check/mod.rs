//! Per-kind rule checkers.
//!
//! Every checker is a pure function of one rule, the patient's dose index and the
//! patient context. Checkers never fail: problems become tagged items.

mod banded;
mod courses;
mod cumulative;
mod equivalence;
mod range;
mod seasonal;
mod series;
mod switch;

pub(crate) use series::{check_series, SeriesSubject};

use crate::{
    age::{Age, AgeThreshold},
    outcome::{EligibleDate, MissingItem, StatusTag},
    records::{DoseIndex, PatientContext},
    registry::{CompiledRule, Registry},
    rules::RuleKind,
};
use jiff::civil::Date;

/// Everything a checker may read during one evaluation.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub registry: &'a Registry,
    pub index: &'a DoseIndex,
    pub patient: &'a PatientContext,
}

pub(crate) trait Checker {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem>;
}

impl RuleKind {
    fn checker(&self) -> &dyn Checker {
        match self {
            Self::SingleSeries(plan) => plan,
            Self::SingleDose(single) => single,
            Self::AgeBanded(banded) => banded,
            Self::Cumulative(group) => group,
            Self::Courses(group) => group,
            Self::AgeRangeCourses(group) => group,
            Self::Equivalence(group) => group,
            Self::Seasonal(group) => group,
        }
    }
}

impl CompiledRule {
    /// Run the checker matching this rule's kind.
    pub fn check(&self, cx: &Context<'_>) -> Vec<MissingItem> {
        self.kind().checker().check(self, cx)
    }
}

/// Whether the patient is old enough today, and if not, from when.
pub(crate) struct AgeStatus {
    pub message: String,
    pub earliest: EligibleDate,
    pub tags: Vec<StatusTag>,
}

impl AgeStatus {
    pub fn is_error(&self) -> bool {
        self.tags.iter().any(StatusTag::is_error)
    }

    pub fn is_eligible(&self) -> bool {
        self.tags.contains(&StatusTag::Eligible)
    }
}

pub(crate) fn age_status(patient: &PatientContext, min_age: Option<AgeThreshold>) -> AgeStatus {
    let Some(dob) = patient.dob() else {
        return AgeStatus {
            message: "No date of birth to check age".to_owned(),
            earliest: EligibleDate::Undetermined,
            tags: vec![StatusTag::ErrorDob],
        };
    };
    if patient.current_age().is_none() {
        return AgeStatus {
            message: "Reference date precedes date of birth".to_owned(),
            earliest: EligibleDate::Undetermined,
            tags: vec![StatusTag::ErrorAgeCalculation],
        };
    }
    if let Some(threshold) = min_age {
        let reached = threshold.reached_on(dob);
        if patient.reference() < reached {
            return AgeStatus {
                message: format!("Needs to be {threshold} old"),
                earliest: EligibleDate::On(reached),
                tags: vec![StatusTag::TooYoung],
            };
        }
    }
    AgeStatus {
        message: "Age eligible".to_owned(),
        earliest: EligibleDate::On(patient.reference()),
        tags: vec![StatusTag::Eligible],
    }
}

/// Result of validating the age at the first dose of a series.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum FirstDose {
    // Also returned when there is no date of birth to check against.
    Valid,
    BeforeBirth,
    TooEarly(String),
}

pub(crate) fn first_dose_check(
    patient: &PatientContext,
    first: Date,
    min_age: Option<AgeThreshold>,
) -> FirstDose {
    let Some(dob) = patient.dob() else {
        return FirstDose::Valid;
    };
    let Some(age) = Age::at(dob, first) else {
        return FirstDose::BeforeBirth;
    };
    match min_age {
        Some(threshold) if !threshold.is_met(dob, first) => FirstDose::TooEarly(format!(
            "Dose 1 given too early (needs {threshold}, was {} days old)",
            age.days()
        )),
        _ => FirstDose::Valid,
    }
}

impl FirstDose {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The single diagnostic for an invalid first dose; `consequence` says what to do next.
    pub fn into_item(self, label: &str, consequence: &str) -> Option<MissingItem> {
        match self {
            Self::Valid => None,
            Self::BeforeBirth => Some(
                MissingItem::new(
                    label,
                    format!(
                        "{label} - Cannot compute age at dose 1 (dose date precedes date of birth). {consequence}"
                    ),
                )
                .undetermined()
                .tags([StatusTag::ErrorAgeCalculation]),
            ),
            Self::TooEarly(detail) => Some(
                MissingItem::new(label, format!("{label} - {detail}. {consequence}"))
                    .undetermined()
                    .tags([
                        StatusTag::ErrorAgeFirstDose,
                        StatusTag::TooEarly,
                        StatusTag::SeriesRestartNeeded,
                    ]),
            ),
        }
    }
}

pub(crate) fn restart_note(doses: u32) -> String {
    format!("{doses} valid doses are needed; consider restarting the series per schedule.")
}

pub(crate) fn config_error(label: &str, missing: &str) -> MissingItem {
    MissingItem::new(label, format!("{label} - Configuration error: no {missing} defined."))
        .undetermined()
        .tags([StatusTag::ErrorConfig])
}

pub(crate) fn dose_count(records: &[impl Sized]) -> u32 {
    u32::try_from(records.len()).unwrap_or(u32::MAX)
}
