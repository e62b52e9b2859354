use super::{
    age_status, check_series, config_error, first_dose_check, switch, Checker, Context, SeriesSubject,
};
use crate::{
    age::format_date,
    outcome::{EligibleDate, MissingItem, StatusTag},
    registry::CompiledRule,
    rules::{AgeRangeGroup, Course},
};
use itertools::Itertools;
use jiff::civil::Date;
use std::collections::BTreeSet;

impl Checker for AgeRangeGroup {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let label = rule.display();
        let live = rule.is_live() || self.courses.iter().any(|course| course.live);
        if self.courses.is_empty() {
            return vec![config_error(label, "courses").live(live)];
        }

        let mut items = Vec::new();
        let mut skipped = BTreeSet::new();
        if let Some(switch) = &self.switch {
            let outcome = switch::coordinate(rule, self, switch, cx);
            if outcome.settled {
                return outcome.items;
            }
            items = outcome.items;
            skipped = outcome.skip;
        }

        let patient = cx.patient;
        let current = patient.current_age();
        let mut diagnostics = Vec::new();
        let mut options: Vec<(String, Date)> = Vec::new();
        let mut upcoming: Option<Date> = None;
        let mut any_doses = false;

        for (index, course) in self.courses.iter().enumerate() {
            if skipped.contains(&index) {
                continue;
            }
            let Some(names) = rule.course_names(index) else {
                continue;
            };
            let records = cx.index.matching(names);
            let course_label = format!("{label} - {}", course.display);
            let course_live = course.live || rule.is_live();

            let status = age_status(patient, course.plan.min_age);
            let below_ceiling = course.max_start_years.is_none_or(|limit| {
                current.is_some_and(|age| i64::from(age.years()) < i64::from(limit))
            });
            match status.earliest {
                EligibleDate::On(date) if status.is_eligible() && below_ceiling && records.is_empty() => {
                    options.push((describe_option(course, date), date));
                }
                EligibleDate::On(date) if status.tags.contains(&StatusTag::TooYoung) => {
                    upcoming = Some(upcoming.map_or(date, |known| known.min(date)));
                }
                _ => {}
            }

            let Some(first) = records.first() else {
                continue;
            };
            any_doses = true;

            if patient.dob().is_none() {
                diagnostics.push(
                    MissingItem::new(
                        &course_label,
                        format!("{course_label} - Cannot validate the age at dose 1 without a date of birth."),
                    )
                    .undetermined()
                    .tags([StatusTag::ErrorDob])
                    .live(course_live),
                );
                continue;
            }
            if let Some(problem) = first_dose_check(patient, first.date(), course.plan.min_age)
                .into_item(&course_label, "Consider restarting this course.")
            {
                diagnostics.push(problem.live(course_live));
                continue;
            }
            if let (Some(limit), Some(age)) = (course.max_start_years, patient.age_at(first.date())) {
                if i64::from(age.years()) >= i64::from(limit) {
                    diagnostics.push(
                        MissingItem::new(
                            &course_label,
                            format!(
                                "{course_label} - Dose 1 given after the latest starting age for this course ({limit} years)."
                            ),
                        )
                        .undetermined()
                        .tags([StatusTag::ErrorAgeFirstDose, StatusTag::TooOldAtFirstDose])
                        .live(course_live),
                    );
                    continue;
                }
            }

            let outstanding = check_series(
                &SeriesSubject::new(&course_label, &course.plan, course_live),
                &records,
                cx,
            );
            if outstanding.is_empty() {
                log::debug!("{label} completed with {}", course.display);
                return items;
            }
            diagnostics.extend(outstanding);
        }

        if !diagnostics.is_empty() {
            items.extend(diagnostics);
        } else if any_doses {
            items.push(
                MissingItem::new(
                    label,
                    format!("{label} - Administered doses match no course within its allowed ages."),
                )
                .undetermined()
                .tags([StatusTag::ErrorAmbiguousCourse])
                .live(live),
            );
        } else if let Some(earliest) = options.iter().map(|(_, date)| *date).min() {
            let texts = options.iter().map(|(text, _)| text).join(" OR ");
            items.push(
                MissingItem::new(label, format!("{label}: not yet administered. Options: {texts}."))
                    .on(earliest)
                    .tags([StatusTag::Due, StatusTag::MultipleOptions])
                    .live(live),
            );
        } else if let Some(date) = upcoming {
            items.push(
                MissingItem::new(
                    label,
                    format!("{label}: not yet administered. Too young for every course."),
                )
                .on(date)
                .tags([StatusTag::TooYoung])
                .live(live),
            );
        } else if patient.dob().is_none() {
            items.push(
                MissingItem::new(
                    label,
                    format!("{label}: not yet administered. A date of birth is needed to suggest a course."),
                )
                .undetermined()
                .tags([StatusTag::ErrorDob])
                .live(live),
            );
        } else {
            items.push(
                MissingItem::new(
                    label,
                    format!("{label}: no course can be started at the current age."),
                )
                .tags([StatusTag::Info, StatusTag::NoEligibleOption])
                .live(live),
            );
        }
        items
    }
}

fn describe_option(course: &Course, earliest: Date) -> String {
    let from = course
        .plan
        .min_age
        .map(|threshold| format!("from {threshold}"))
        .unwrap_or_else(|| "any age".to_owned());
    let until = course
        .max_start_years
        .map(|years| format!(" to under {years} years"))
        .unwrap_or_default();
    format!(
        "{} ({} doses, {from}{until}; earliest {})",
        course.display,
        course.plan.doses,
        format_date(earliest)
    )
}

#[cfg(test)]
mod tests {
    use crate::check::testing::{builtin, dose, Fixture};
    use crate::outcome::{EligibleDate, StatusTag};
    use anyhow::Result;
    use jiff::civil::date;

    #[test]
    fn test_options_when_nothing_given() -> Result<()> {
        let fixture = Fixture::new(builtin(), Some(date(2022, 1, 1)), date(2024, 6, 1), []);
        let items = fixture.check("HepA");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status_tags(), &[StatusTag::Due, StatusTag::MultipleOptions]);
        assert_eq!(items[0].date(), Some(date(2024, 6, 1)));
        assert!(items[0].description().contains("Avaxim 80U / Twinrix"));
        assert!(items[0].description().contains("HAVAX"));
        Ok(())
    }

    #[test]
    fn test_youngest_upcoming_date_when_too_young() -> Result<()> {
        let fixture = Fixture::new(builtin(), Some(date(2024, 1, 1)), date(2024, 6, 1), []);
        let items = fixture.check("HepA");
        assert_eq!(items[0].status_tags(), &[StatusTag::TooYoung]);
        assert_eq!(items[0].date(), Some(date(2025, 1, 1)));
        Ok(())
    }

    #[test]
    fn test_no_option_past_every_ceiling() -> Result<()> {
        let fixture = Fixture::new(builtin(), Some(date(2000, 1, 1)), date(2024, 6, 1), []);
        let items = fixture.check("HepA");
        assert_eq!(items[0].status_tags(), &[StatusTag::Info, StatusTag::NoEligibleOption]);
        assert_eq!(items[0].eligible_date(), EligibleDate::NotApplicable);
        Ok(())
    }

    #[test]
    fn test_course_window_checked_per_course() -> Result<()> {
        // HAVAX starts from 24 months; the group's other course would allow 12.
        let fixture = Fixture::new(
            builtin(),
            Some(date(2022, 1, 1)),
            date(2024, 6, 1),
            [dose("HAVAX", date(2023, 3, 1))],
        );
        let items = fixture.check("HepA");
        assert_eq!(items.len(), 1);
        assert!(items[0].has_tag(StatusTag::ErrorAgeFirstDose));
        assert!(items[0].label().ends_with("HAVAX"));
        Ok(())
    }

    #[test]
    fn test_started_after_ceiling() -> Result<()> {
        let fixture = Fixture::new(
            builtin(),
            Some(date(2000, 1, 1)),
            date(2024, 6, 1),
            [dose("Avaxim 80U", date(2020, 1, 1))],
        );
        let items = fixture.check("HepA");
        assert_eq!(
            items[0].status_tags(),
            &[StatusTag::ErrorAgeFirstDose, StatusTag::TooOldAtFirstDose]
        );
        Ok(())
    }

    #[test]
    fn test_started_course_reports_next_dose() -> Result<()> {
        let fixture = Fixture::new(
            builtin(),
            Some(date(2020, 1, 1)),
            date(2024, 2, 1),
            [dose("Twinrix", date(2024, 1, 1))],
        );
        let items = fixture.check("HepA");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date(), Some(date(2024, 6, 29)));

        let fixture = Fixture::new(
            builtin(),
            Some(date(2020, 1, 1)),
            date(2025, 2, 1),
            [dose("Twinrix", date(2024, 1, 1)), dose("Avaxim 80U", date(2024, 7, 1))],
        );
        assert!(fixture.check("HepA").is_empty());
        Ok(())
    }
}
