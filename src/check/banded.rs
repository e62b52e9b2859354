use super::{check_series, config_error, first_dose_check, restart_note, Checker, Context, SeriesSubject};
use crate::{
    age::AgeThreshold,
    outcome::{MissingItem, StatusTag},
    records::AdministeredDose,
    registry::CompiledRule,
    rules::{AgeBand, BandedSeries, SeriesPlan},
};

impl Checker for BandedSeries {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let records = cx.index.matching(rule.names());
        let bands = Bands {
            label: rule.display(),
            live: rule.is_live(),
            min_age: self.min_age,
            bands: &self.bands,
            kind: "age bands",
            floor_first: false,
        };
        bands.check(&records, cx)
    }
}

/// A family of schedules picked by the patient's age at the first dose.
pub(super) struct Bands<'a> {
    pub label: &'a str,
    pub live: bool,
    pub min_age: Option<AgeThreshold>,
    pub bands: &'a [AgeBand],
    // Used in the configuration error when no bands are defined.
    pub kind: &'a str,
    // Validate dose 1 against `min_age` before picking a band, and let bands inherit
    // it. Otherwise `min_age` only decides between restart and no-matching-band.
    pub floor_first: bool,
}

impl Bands<'_> {
    pub fn check(&self, records: &[&AdministeredDose], cx: &Context<'_>) -> Vec<MissingItem> {
        let error = |description: String, tag: StatusTag| {
            MissingItem::new(self.label, description)
                .undetermined()
                .tags([tag])
                .live(self.live)
        };

        let Some(first) = records.first() else {
            let Some(opening) = self.bands.first() else {
                return vec![config_error(self.label, self.kind).live(self.live)];
            };
            let plan = SeriesPlan {
                doses: opening.plan.doses,
                min_age: self.min_age,
                ..SeriesPlan::default()
            };
            return check_series(&SeriesSubject::new(self.label, &plan, self.live), records, cx);
        };

        if cx.patient.dob().is_none() {
            return vec![error(
                format!("{} - No date of birth; cannot pick a schedule.", self.label),
                StatusTag::ErrorDob,
            )];
        }
        let Some(age) = cx.patient.age_at(first.date()) else {
            return vec![error(
                format!(
                    "{} - Cannot compute age at dose 1 (dose date precedes date of birth).",
                    self.label
                ),
                StatusTag::ErrorAgeCalculation,
            )];
        };

        let doses = self.bands.first().map_or(1, |band| band.plan.doses);
        let restart = || {
            first_dose_check(cx.patient, first.date(), self.min_age)
                .into_item(self.label, &restart_note(doses))
                .map(|problem| problem.live(self.live))
        };
        if self.floor_first {
            if let Some(problem) = restart() {
                return vec![problem];
            }
        }
        if self.bands.is_empty() {
            return vec![config_error(self.label, self.kind).live(self.live)];
        }

        let Some(band) = select_band(self.bands, age.months()) else {
            if let Some(problem) = restart() {
                return vec![problem];
            }
            return vec![error(
                format!(
                    "{} - No schedule for a first dose at {} months.",
                    self.label,
                    age.months()
                ),
                StatusTag::ErrorNoMatchingRule,
            )];
        };

        let plan = if self.floor_first {
            band.plan.with_min_age_fallback(self.min_age)
        } else {
            band.plan.clone()
        };
        let label = match &band.label {
            Some(name) => format!("{} ({name})", self.label),
            None => format!(
                "{} (schedule for first dose at {} months)",
                self.label,
                age.months()
            ),
        };
        check_series(&SeriesSubject::new(label, &plan, self.live), records, cx)
    }
}

fn select_band(bands: &[AgeBand], months: i32) -> Option<&AgeBand> {
    bands.iter().find(|band| band.contains(months))
}
