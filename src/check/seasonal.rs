use super::{age_status, first_dose_check, Checker, Context};
use crate::{
    age::{add_days, add_years, days_between, describe_interval},
    outcome::{MissingItem, StatusTag},
    registry::CompiledRule,
    rules::SeasonalGroup,
};

impl Checker for SeasonalGroup {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let label = rule.display();
        let item = |description: String| MissingItem::new(label, description).live(rule.is_live());
        let patient = cx.patient;
        let reference = patient.reference();

        // Seasonal products are renamed every year; match on keywords, not canonical names.
        let records = cx.index.matching_keywords(&self.keywords);

        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            let status = age_status(patient, Some(self.min_age));
            let mut tags = status.tags.clone();
            if status.is_error() {
                tags.insert(0, StatusTag::ErrorInitialCheck);
            }
            return vec![item(format!(
                "{label} (not yet administered; a first season under {} years may need 2 doses, then yearly). {}",
                self.second_dose_below_years, status.message
            ))
            .eligible(status.earliest)
            .tags(tags)];
        };

        if let Some(problem) = first_dose_check(patient, first.date(), Some(self.min_age)).into_item(
            label,
            &format!(
                "Restart at the right age (2 doses in a first season under {} years, then yearly).",
                self.second_dose_below_years
            ),
        ) {
            return vec![problem.live(rule.is_live())];
        }

        let mut items = Vec::new();
        let first_under_limit = patient
            .age_at(first.date())
            .is_some_and(|age| i64::from(age.years()) < i64::from(self.second_dose_below_years));
        if first_under_limit && records.len() == 1 {
            let second = add_days(first.date(), i64::from(self.second_dose_interval_days));
            items.push(
                item(format!(
                    "{label} - Dose 2 needed {} after dose 1 (first season under {} years), then yearly.",
                    describe_interval(self.second_dose_interval_days),
                    self.second_dose_below_years
                ))
                .on(second.max(reference))
                .tags([StatusTag::Due, StatusTag::FluSecondDose]),
            );
        }

        let since_last = days_between(last.date(), reference);
        if i64::from(since_last) > i64::from(self.annual_after_days) {
            items.push(
                item(format!(
                    "{label} - Yearly dose needed (last dose more than {} months ago).",
                    since_last / 30
                ))
                .on(add_years(last.date(), 1).max(reference))
                .tags([StatusTag::Due, StatusTag::FluAnnual]),
            );
        }
        items
    }
}
