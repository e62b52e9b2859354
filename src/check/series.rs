use super::{age_status, dose_count, first_dose_check, restart_note, Checker, Context};
use crate::{
    age::{add_days, add_months, add_years, describe_interval},
    outcome::{MissingItem, StatusTag},
    records::{AdministeredDose, PatientContext},
    registry::CompiledRule,
    rules::{AntigenCoverage, SeriesPlan, SingleDose},
};
use itertools::Itertools;

/// One series under evaluation: the plan plus how its items are labelled.
pub(crate) struct SeriesSubject<'a> {
    pub label: String,
    pub plan: &'a SeriesPlan,
    pub live: bool,
    // Set only for rules whose protection another rule can provide.
    pub coverage: Option<(&'a str, &'a AntigenCoverage)>,
}

impl<'a> SeriesSubject<'a> {
    pub fn new(label: impl Into<String>, plan: &'a SeriesPlan, live: bool) -> Self {
        Self {
            label: label.into(),
            plan,
            live,
            coverage: None,
        }
    }

    fn item(&self, description: String) -> MissingItem {
        MissingItem::new(&self.label, description).live(self.live)
    }
}

impl Checker for SeriesPlan {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let records = cx.index.matching(rule.names());
        check_series(&subject_for(rule, self), &records, cx)
    }
}

impl Checker for SingleDose {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let plan = self.plan();
        let records = cx.index.matching(rule.names());
        check_series(&subject_for(rule, &plan), &records, cx)
    }
}

fn subject_for<'a>(rule: &'a CompiledRule, plan: &'a SeriesPlan) -> SeriesSubject<'a> {
    let mut subject = SeriesSubject::new(rule.display(), plan, rule.is_live());
    subject.coverage = rule
        .definition()
        .covered_by
        .as_ref()
        .map(|coverage| (rule.key(), coverage));
    subject
}

/// Evaluate one series against its date-ascending dose records.
pub(crate) fn check_series(
    subject: &SeriesSubject<'_>,
    records: &[&AdministeredDose],
    cx: &Context<'_>,
) -> Vec<MissingItem> {
    let plan = subject.plan;
    let patient = cx.patient;
    let given = dose_count(records);

    if plan.doses > 0 && given >= plan.doses {
        return booster(subject, records, patient).into_iter().collect();
    }

    if let Some((own_key, coverage)) = subject.coverage {
        if let Some(provider) = covering_rule(cx, own_key, coverage) {
            if records.is_empty() {
                return vec![subject
                    .item(format!(
                        "{} - {} protection may already be covered by {}.",
                        subject.label, coverage.antigen, provider
                    ))
                    .tags([StatusTag::Info, StatusTag::CoverageByOther])];
            }
            return Vec::new();
        }
    }

    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        if plan.doses == 0 {
            return Vec::new();
        }
        let status = age_status(patient, plan.min_age);
        let mut tags = status.tags.clone();
        if status.is_error() {
            tags.insert(0, StatusTag::ErrorInitialCheck);
        }
        return vec![subject
            .item(format!(
                "{} (not yet administered - needs {} doses). {}",
                subject.label, plan.doses, status.message
            ))
            .eligible(status.earliest)
            .tags(tags)];
    };

    if let Some(problem) = first_dose_check(patient, first.date(), plan.min_age)
        .into_item(&subject.label, &restart_note(plan.doses))
    {
        return vec![problem.live(subject.live)];
    }

    let next = given + 1;
    let mut conditions = Vec::new();

    let by_interval = plan.interval_before(next).map(|days| {
        conditions.push(format!(
            "Dose {next} at least {} after dose {given}",
            describe_interval(days)
        ));
        add_days(last.date(), i64::from(days))
    });

    let mut by_alternative = None;
    let mut by_absolute = None;
    if let (Some(rule), Some(dob)) = (plan.overrides.get(&next), patient.dob()) {
        if let Some((from, until)) = rule.alternative_age_years {
            by_alternative = Some(add_years(dob, i64::from(from)));
            conditions.push(format!("OR when aged {from}-{} years", until.saturating_sub(1)));
        }
        if let Some(months) = rule.min_absolute_age_months {
            by_absolute = Some(add_months(dob, i64::from(months)));
            conditions.push(format!("and at least {months} months old"));
        }
    }

    let mut earliest = match (by_interval, by_absolute) {
        (Some(interval), Some(absolute)) => Some(interval.max(absolute)),
        (interval, absolute) => interval.or(absolute),
    };
    if let Some(alternative) = by_alternative {
        let effective = by_absolute.map_or(alternative, |absolute| alternative.max(absolute));
        if earliest.is_none_or(|date| effective < date) {
            earliest = Some(effective);
        }
    }
    // Nothing constrains the next dose: it is due now.
    let earliest = earliest.map_or(patient.reference(), |date| date.max(patient.reference()));

    let remaining = plan.doses - given;
    let detail = if conditions.is_empty() {
        format!("Dose {next}")
    } else {
        conditions.into_iter().join(" ")
    };
    vec![subject
        .item(format!(
            "{} - {remaining} more dose(s) needed. {detail}.",
            subject.label
        ))
        .on(earliest)
        .tags([StatusTag::Due])]
}

fn booster(
    subject: &SeriesSubject<'_>,
    records: &[&AdministeredDose],
    patient: &PatientContext,
) -> Option<MissingItem> {
    let plan = subject.plan;
    let policy = plan.booster.as_ref()?;
    if policy.every_years == 0 || dose_count(records) < policy.after_dose.unwrap_or(plan.doses) {
        return None;
    }
    let due = add_years(records.last()?.date(), i64::from(policy.every_years));
    if let (Some(limit), Some(age)) = (policy.max_age_years, patient.age_at(due)) {
        if i64::from(age.years()) >= i64::from(limit) {
            return None;
        }
    }

    let item = if patient.reference() >= due {
        subject
            .item(format!(
                "{} - Booster every {} years needed (now due).",
                subject.label, policy.every_years
            ))
            .on(patient.reference())
            .tags([StatusTag::Due, StatusTag::BoosterDue])
    } else {
        subject
            .item(format!(
                "{} - Booster every {} years needed.",
                subject.label, policy.every_years
            ))
            .on(due)
            .tags([StatusTag::Info, StatusTag::BoosterUpcoming])
    };
    Some(item)
}

// Display name of another rule whose dose, given at a qualifying age, already protects
// against the subject's antigen.
fn covering_rule(cx: &Context<'_>, own_key: &str, coverage: &AntigenCoverage) -> Option<String> {
    cx.registry
        .providers_of(&coverage.antigen)
        .filter(|provider| provider.key() != own_key)
        .find(|provider| {
            cx.index.matching(provider.names()).iter().any(|dose| {
                cx.patient
                    .age_at(dose.date())
                    .is_some_and(|age| i64::from(age.months()) >= i64::from(coverage.min_age_months))
            })
        })
        .map(|provider| provider.display().to_owned())
}
