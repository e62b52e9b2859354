//! Live/inactivated product switching inside an age-range course group.
//!
//! The rules here are clinical judgment encoded as fixed comparisons, not a general
//! pattern: keep them exactly as they are unless the schedule owners say otherwise.

use super::Context;
use crate::{
    age::{add_days, add_years, describe_interval},
    outcome::{MissingItem, StatusTag},
    records::AdministeredDose,
    registry::CompiledRule,
    rules::{AgeRangeGroup, Course, ProductSwitch},
};
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub(super) struct SwitchOutcome {
    pub items: Vec<MissingItem>,
    // Course indices whose ordinary checking is superseded.
    pub skip: BTreeSet<usize>,
    // The group needs nothing beyond `items`.
    pub settled: bool,
}

pub(super) fn coordinate(
    rule: &CompiledRule,
    group: &AgeRangeGroup,
    switch: &ProductSwitch,
    cx: &Context<'_>,
) -> SwitchOutcome {
    let label = rule.display();
    let position = |display: &str| group.courses.iter().position(|course| course.display == display);
    let (Some(inactivated_at), Some(completion_at)) =
        (position(&switch.inactivated), position(&switch.completion))
    else {
        return SwitchOutcome::default();
    };
    let records_of = |index: usize| {
        rule.course_names(index)
            .map(|names| cx.index.matching(names))
            .unwrap_or_default()
    };

    let inactivated = records_of(inactivated_at);
    let (Some(first_inactivated), Some(last_inactivated)) = (inactivated.first(), inactivated.last())
    else {
        return SwitchOutcome::default();
    };
    let inactivated_course = &group.courses[inactivated_at];
    let completion_course = &group.courses[completion_at];

    let live: Vec<(&Course, Vec<&AdministeredDose>)> = group
        .courses
        .iter()
        .enumerate()
        .filter(|(index, course)| course.live && *index != inactivated_at)
        .map(|(index, course)| (course, records_of(index)))
        .filter(|(_, records)| !records.is_empty())
        .collect();

    let given = u32::try_from(inactivated.len()).unwrap_or(u32::MAX);
    if given >= switch.full_inactivated_doses && !live.is_empty() {
        log::debug!("{label}: complete with {given} inactivated doses and a live dose");
        return SwitchOutcome {
            settled: true,
            ..SwitchOutcome::default()
        };
    }

    let mut outcome = SwitchOutcome::default();
    for (course, records) in &live {
        let first_live = records[0].date();
        if first_live > last_inactivated.date() {
            outcome.items.push(
                MissingItem::new(
                    label,
                    format!(
                        "{label} - Switched from {} to {}; follow the {} schedule from now on.",
                        inactivated_course.display, course.display, course.display
                    ),
                )
                .tags([StatusTag::Info, StatusTag::ProtocolSwitch])
                .live(course.live),
            );
        } else if first_live < first_inactivated.date() {
            outcome.items.push(
                MissingItem::new(
                    label,
                    format!(
                        "{label} - Started with {}; {} should not follow. Complete the {} schedule.",
                        course.display, inactivated_course.display, course.display
                    ),
                )
                .tags([StatusTag::ErrorInterchange, StatusTag::ProtocolSwitch])
                .live(course.live),
            );
        } else {
            continue;
        }
        outcome.skip.insert(inactivated_at);
        break;
    }
    if !live.is_empty() {
        return outcome;
    }

    if given >= switch.full_inactivated_doses {
        outcome.items.extend(booster_option(
            label,
            inactivated_course,
            completion_course,
            last_inactivated.date(),
            cx,
        ));
        outcome.skip.extend([inactivated_at, completion_at]);
        outcome.settled = true;
        return outcome;
    }

    let (date, description) = if given == 1 {
        (
            add_days(
                first_inactivated.date(),
                i64::from(switch.switch_after_first_days),
            ),
            format!(
                "{label} - Option: after 1 dose of {}, switch to {} ({} doses), first dose {} after.",
                inactivated_course.display,
                completion_course.display,
                completion_course.plan.doses,
                describe_interval(switch.switch_after_first_days)
            ),
        )
    } else {
        (
            add_years(
                last_inactivated.date(),
                i64::from(switch.switch_after_second_years),
            ),
            format!(
                "{label} - Option: after {given} doses of {}, a single dose of {} {} year(s) later completes the schedule.",
                inactivated_course.display,
                completion_course.display,
                switch.switch_after_second_years
            ),
        )
    };
    outcome.items.push(
        MissingItem::new(
            format!(
                "{label} ({} -> {})",
                inactivated_course.display, completion_course.display
            ),
            description,
        )
        .on(date.max(cx.patient.reference()))
        .tags([StatusTag::Info, StatusTag::AlternativeCourse])
        .live(completion_course.live),
    );
    outcome
}

fn booster_option(
    label: &str,
    inactivated: &Course,
    completion: &Course,
    last_dose: jiff::civil::Date,
    cx: &Context<'_>,
) -> Option<MissingItem> {
    let policy = inactivated.plan.booster.as_ref()?;
    let due = add_years(last_dose, i64::from(policy.every_years));
    if let (Some(limit), Some(age)) = (policy.max_age_years, cx.patient.age_at(due)) {
        if i64::from(age.years()) >= i64::from(limit) {
            return None;
        }
    }

    let reference = cx.patient.reference();
    let (date, tags) = if reference < due {
        (due, [StatusTag::Info, StatusTag::BoosterUpcoming])
    } else {
        (reference, [StatusTag::Due, StatusTag::BoosterDue])
    };
    let limit = policy
        .max_age_years
        .map(|years| format!(" until age {years}"))
        .unwrap_or_default();
    Some(
        MissingItem::new(
            label,
            format!(
                "{label} - Booster needed: {} every {} years{limit}, or a single dose of {} to complete.",
                inactivated.display, policy.every_years, completion.display
            ),
        )
        .on(date)
        .tags(tags),
    )
}
