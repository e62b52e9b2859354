use super::{age_status, check_series, config_error, first_dose_check, Checker, Context, SeriesSubject};
use crate::{
    outcome::{MissingItem, StatusTag},
    registry::CompiledRule,
    rules::CourseGroup,
};
use itertools::Itertools;

impl Checker for CourseGroup {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let label = rule.display();
        let live = rule.is_live() || self.courses.iter().any(|course| course.live);
        if self.courses.is_empty() {
            return vec![config_error(label, "courses").live(live)];
        }

        let group_records = cx.index.matching(rule.names());
        let age = cx.patient.current_age();

        let Some(first) = group_records.first() else {
            if let (Some(limit), Some(age)) = (self.max_start_months, age) {
                if i64::from(age.months()) >= i64::from(limit) {
                    return vec![MissingItem::new(
                        label,
                        format!(
                            "{label} - Too old to start (must start before {limit} months, now {} months).",
                            age.months()
                        ),
                    )
                    .tags([StatusTag::TooOldToStart])
                    .live(live)];
                }
            }
            let status = age_status(cx.patient, self.min_age);
            let mut tags = status.tags.clone();
            if status.is_error() {
                tags.insert(0, StatusTag::ErrorInitialCheck);
            }
            let options = self.courses.iter().map(|course| course.display.as_str()).join(" / ");
            return vec![MissingItem::new(
                label,
                format!("{label}: {options} (not yet administered). {}", status.message),
            )
            .eligible(status.earliest)
            .tags(tags)
            .live(live)];
        };

        if let Some(problem) = first_dose_check(cx.patient, first.date(), self.min_age)
            .into_item(label, "Consider restarting with a single product per schedule.")
        {
            return vec![problem.live(live)];
        }

        let completion_limit = self
            .max_completion_months
            .filter(|limit| age.is_some_and(|age| i64::from(age.months()) > i64::from(*limit)));

        let mut diagnostics = Vec::new();
        let mut started = Vec::new();
        for (index, course) in self.courses.iter().enumerate() {
            let Some(names) = rule.course_names(index) else {
                continue;
            };
            let records = cx.index.matching(names);
            if records.is_empty() {
                continue;
            }
            started.push(course.display.as_str());

            let plan = course.plan.with_min_age_fallback(self.min_age);
            let course_live = course.live || rule.is_live();
            let subject = SeriesSubject::new(format!("{label} ({})", course.display), &plan, course_live);
            let items = check_series(&subject, &records, cx);
            if items.is_empty() {
                log::debug!("{label} completed with {}", course.display);
                return Vec::new();
            }

            diagnostics.extend(items.into_iter().map(|item| match completion_limit {
                Some(limit) if item.has_tag(StatusTag::Due) => MissingItem::new(
                    item.label(),
                    format!(
                        "{} - Too old to complete the course (over {limit} months).",
                        subject.label
                    ),
                )
                .tags([StatusTag::Info, StatusTag::TooOldToComplete])
                .live(course_live),
                _ => item,
            }));
        }

        if diagnostics.is_empty() {
            return vec![MissingItem::new(
                label,
                format!("{label} - Doses given but no single course could be evaluated."),
            )
            .undetermined()
            .tags([StatusTag::ErrorAmbiguousCourse])
            .live(live)];
        }
        if started.len() > 1 {
            diagnostics.push(
                MissingItem::new(
                    label,
                    format!(
                        "{label} - Doses from more than one product were given ({}); the courses are not interchangeable.",
                        started.iter().join(", ")
                    ),
                )
                .tags([StatusTag::ErrorInterchange])
                .live(live),
            );
        }
        diagnostics
    }
}
