use crate::age::AgeThreshold;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The operator-replaceable rule table, as stored in RON.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RuleTable {
    pub version: String,
    // Products that are expected even though no rule claims them.
    #[serde(default)]
    pub standard_vaccines: Vec<String>,
    #[serde(default)]
    pub pneumococcal: Option<ProductFamilies>,
    pub rules: Vec<RuleDefinition>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RuleDefinition {
    pub key: String,
    pub display: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub live: bool,
    // Antigens this rule protects against, for coverage transfer.
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub covered_by: Option<AntigenCoverage>,
    pub kind: RuleKind,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum RuleKind {
    SingleSeries(SeriesPlan),
    SingleDose(SingleDose),
    AgeBanded(BandedSeries),
    Cumulative(CumulativeGroup),
    Courses(CourseGroup),
    AgeRangeCourses(AgeRangeGroup),
    Equivalence(EquivalenceGroup),
    Seasonal(SeasonalGroup),
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleSeries(_) => "single-series",
            Self::SingleDose(_) => "single-dose-min-age",
            Self::AgeBanded(_) => "age-dependent-series",
            Self::Cumulative(_) => "cumulative-unique-group",
            Self::Courses(_) => "interchangeable-course-group",
            Self::AgeRangeCourses(_) => "interchangeable-course-group-age-range",
            Self::Equivalence(_) => "antigen-equivalence-group",
            Self::Seasonal(_) => "seasonal-group",
        }
    }
}

/// Dosing contract for one series.
///
/// `intervals[n]` is the minimum number of days between dose `n` and dose `n + 1`
/// (1-based doses), so the first entry is always empty.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SeriesPlan {
    pub doses: u32,
    #[serde(default)]
    pub intervals: Vec<Option<u32>>,
    #[serde(default)]
    pub min_age: Option<AgeThreshold>,
    // Keyed by 1-based dose number.
    #[serde(default)]
    pub overrides: BTreeMap<u32, DoseOverride>,
    #[serde(default)]
    pub booster: Option<BoosterPolicy>,
}

impl SeriesPlan {
    pub fn interval_before(&self, dose_number: u32) -> Option<u32> {
        let index = usize::try_from(dose_number.checked_sub(1)?).ok()?;
        self.intervals.get(index).copied().flatten()
    }

    pub(crate) fn with_min_age_fallback(&self, fallback: Option<AgeThreshold>) -> Self {
        let mut plan = self.clone();
        if plan.min_age.is_none() {
            plan.min_age = fallback;
        }
        plan
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DoseOverride {
    // Inclusive lower bound, exclusive upper bound.
    #[serde(default)]
    pub alternative_age_years: Option<(u32, u32)>,
    #[serde(default)]
    pub min_absolute_age_months: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BoosterPolicy {
    pub every_years: u32,
    #[serde(default)]
    pub after_dose: Option<u32>,
    #[serde(default)]
    pub max_age_years: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SingleDose {
    #[serde(default)]
    pub min_age: Option<AgeThreshold>,
}

impl SingleDose {
    pub fn plan(&self) -> SeriesPlan {
        SeriesPlan {
            doses: 1,
            intervals: vec![None],
            min_age: self.min_age,
            ..SeriesPlan::default()
        }
    }
}

/// A schedule selected by the patient's age (in completed months) at the first dose.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AgeBand {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub min_months: Option<u32>,
    // Inclusive.
    #[serde(default)]
    pub max_months: Option<u32>,
    pub plan: SeriesPlan,
}

impl AgeBand {
    pub fn contains(&self, months: i32) -> bool {
        let above = self.min_months.is_none_or(|min| i64::from(months) >= i64::from(min));
        let below = self.max_months.is_none_or(|max| i64::from(months) <= i64::from(max));
        above && below
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BandedSeries {
    #[serde(default)]
    pub min_age: Option<AgeThreshold>,
    #[serde(default)]
    pub bands: Vec<AgeBand>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CumulativeGroup {
    pub doses: u32,
    #[serde(default)]
    pub min_age: Option<AgeThreshold>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Course {
    pub display: String,
    pub names: Vec<String>,
    #[serde(default)]
    pub live: bool,
    pub plan: SeriesPlan,
    #[serde(default)]
    pub max_start_years: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CourseGroup {
    #[serde(default)]
    pub min_age: Option<AgeThreshold>,
    #[serde(default)]
    pub max_start_months: Option<u32>,
    #[serde(default)]
    pub max_completion_months: Option<u32>,
    #[serde(default)]
    pub courses: Vec<Course>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AgeRangeGroup {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub switch: Option<ProductSwitch>,
}

/// Live/inactivated protocol switching inside one course group.
///
/// `inactivated` and `completion` name courses by their `display`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProductSwitch {
    pub inactivated: String,
    pub completion: String,
    #[serde(default = "default_full_inactivated_doses")]
    pub full_inactivated_doses: u32,
    #[serde(default = "default_switch_after_first_days")]
    pub switch_after_first_days: u32,
    #[serde(default = "default_switch_after_second_years")]
    pub switch_after_second_years: u32,
}

fn default_full_inactivated_doses() -> u32 {
    3
}

fn default_switch_after_first_days() -> u32 {
    30
}

fn default_switch_after_second_years() -> u32 {
    1
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EquivalenceGroup {
    // Member product lines, each with their raw names.
    pub members: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub min_age: Option<AgeThreshold>,
    #[serde(default)]
    pub regimens: Vec<AgeBand>,
    #[serde(default)]
    pub monovalent: Option<MonovalentFollowUp>,
}

/// Follow-up owed by a member line once a monovalent product of another rule was given.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MonovalentFollowUp {
    pub rule: String,
    pub member: String,
    pub after_years: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SeasonalGroup {
    pub keywords: Vec<String>,
    #[serde(default = "default_seasonal_min_age")]
    pub min_age: AgeThreshold,
    #[serde(default = "default_second_dose_below_years")]
    pub second_dose_below_years: u32,
    #[serde(default = "default_second_dose_interval_days")]
    pub second_dose_interval_days: u32,
    #[serde(default = "default_annual_after_days")]
    pub annual_after_days: u32,
}

fn default_seasonal_min_age() -> AgeThreshold {
    AgeThreshold::Months(6)
}

fn default_second_dose_below_years() -> u32 {
    9
}

fn default_second_dose_interval_days() -> u32 {
    28
}

fn default_annual_after_days() -> u32 {
    365 - 30
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AntigenCoverage {
    pub antigen: String,
    pub min_age_months: u32,
}

/// Pneumococcal product lines, by rule key.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProductFamilies {
    pub polysaccharide: String,
    pub conjugates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_lookup() {
        let plan = SeriesPlan {
            doses: 4,
            intervals: vec![None, Some(30), Some(30), Some(360)],
            ..SeriesPlan::default()
        };
        assert_eq!(plan.interval_before(1), None);
        assert_eq!(plan.interval_before(2), Some(30));
        assert_eq!(plan.interval_before(4), Some(360));
        assert_eq!(plan.interval_before(5), None);
        assert_eq!(plan.interval_before(0), None);
    }

    #[test]
    fn test_band_bounds_are_inclusive() {
        let band = AgeBand {
            label: None,
            min_months: Some(7),
            max_months: Some(11),
            plan: SeriesPlan::default(),
        };
        assert!(!band.contains(6));
        assert!(band.contains(7));
        assert!(band.contains(11));
        assert!(!band.contains(12));
    }

    #[test]
    fn test_min_age_fallback_keeps_own() {
        let plan = SeriesPlan {
            min_age: Some(AgeThreshold::Months(2)),
            ..SeriesPlan::default()
        };
        let merged = plan.with_min_age_fallback(Some(AgeThreshold::Weeks(6)));
        assert_eq!(merged.min_age, Some(AgeThreshold::Months(2)));
        let merged = SeriesPlan::default().with_min_age_fallback(Some(AgeThreshold::Weeks(6)));
        assert_eq!(merged.min_age, Some(AgeThreshold::Weeks(6)));
    }
}
