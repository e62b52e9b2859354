use super::{banded::Bands, Checker, Context};
use crate::{
    age::add_years,
    outcome::{MissingItem, StatusTag},
    registry::CompiledRule,
    rules::{EquivalenceGroup, MonovalentFollowUp},
};

impl Checker for EquivalenceGroup {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        if let Some(follow_up) = &self.monovalent {
            if let Some(outcome) = monovalent_follow_up(rule, follow_up, cx) {
                return outcome;
            }
        }

        // Every member counts towards one shared dose sequence.
        let records = cx.index.matching(rule.names());
        let regimens = Bands {
            label: rule.display(),
            live: rule.is_live(),
            min_age: self.min_age,
            bands: &self.regimens,
            kind: "regimens",
            floor_first: true,
        };
        regimens.check(&records, cx)
    }
}

// After a monovalent dose from another rule, a single dose of the follow-up member is
// topped up once more. None leaves the group to its ordinary regimens.
fn monovalent_follow_up(
    rule: &CompiledRule,
    follow_up: &MonovalentFollowUp,
    cx: &Context<'_>,
) -> Option<Vec<MissingItem>> {
    let monovalent = cx.registry.rule(&follow_up.rule)?;
    if cx.index.matching(monovalent.names()).is_empty() {
        return None;
    }
    let member = cx.index.matching(rule.member_names(&follow_up.member)?);
    match member.as_slice() {
        [] => None,
        [only] => {
            let label = rule.display();
            let due = add_years(only.date(), i64::from(follow_up.after_years));
            let reference = cx.patient.reference();
            let item = MissingItem::new(
                label,
                format!(
                    "{label} - Follow-up dose needed {} years after the first {} dose ({} + {} schedule).",
                    follow_up.after_years,
                    follow_up.member,
                    monovalent.display(),
                    follow_up.member
                ),
            )
            .live(rule.is_live());
            let item = if reference < due {
                item.on(due).tags([StatusTag::Info, StatusTag::BoosterUpcoming])
            } else {
                item.on(reference).tags([StatusTag::Due, StatusTag::BoosterDue])
            };
            Some(vec![item])
        }
        _ => Some(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use crate::check::testing::{builtin, dose, Fixture};
    use crate::outcome::{EligibleDate, StatusTag};
    use anyhow::Result;
    use jiff::civil::date;

    #[test]
    fn test_members_share_one_sequence() -> Result<()> {
        // First dose at 13 months: two-dose regimen, second dose 90 days later.
        let fixture = Fixture::new(
            builtin(),
            Some(date(2023, 1, 1)),
            date(2024, 2, 15),
            [dose("MMR-II", date(2024, 2, 10))],
        );
        let items = fixture.check("MMR_Group");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date(), Some(date(2024, 5, 10)));
        assert!(items[0].is_live());

        let fixture = Fixture::new(
            builtin(),
            Some(date(2023, 1, 1)),
            date(2024, 8, 15),
            [dose("MMR-II", date(2024, 2, 10)), dose("Priorix", date(2024, 6, 1))],
        );
        assert!(fixture.check("MMR_Group").is_empty());
        Ok(())
    }

    #[test]
    fn test_three_dose_regimen_alternative_age() -> Result<()> {
        // Started at 9 months; dose 3 falls due at age 4 before 1095 days pass.
        let fixture = Fixture::new(
            builtin(),
            Some(date(2021, 1, 1)),
            date(2024, 6, 1),
            [dose("Priorix", date(2021, 10, 5)), dose("Priorix", date(2024, 3, 1))],
        );
        let items = fixture.check("MMR_Group");
        assert_eq!(items[0].date(), Some(date(2025, 1, 1)));
        assert!(items[0].label().contains("3-dose schedule"));
        Ok(())
    }

    #[test]
    fn test_follow_up_after_monovalent() -> Result<()> {
        let fixture = Fixture::new(
            builtin(),
            Some(date(2020, 1, 1)),
            date(2022, 1, 1),
            [dose("MVVAC", date(2020, 10, 1)), dose("MMR-II", date(2021, 1, 15))],
        );
        let items = fixture.check("MMR_Group");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date(), Some(date(2024, 1, 15)));
        assert_eq!(
            items[0].status_tags(),
            &[StatusTag::Info, StatusTag::BoosterUpcoming]
        );

        let fixture = Fixture::new(
            builtin(),
            Some(date(2020, 1, 1)),
            date(2025, 1, 1),
            [
                dose("MVVAC", date(2020, 10, 1)),
                dose("MMR-II", date(2021, 1, 15)),
                dose("MMR-II", date(2024, 1, 20)),
            ],
        );
        assert!(fixture.check("MMR_Group").is_empty());
        Ok(())
    }

    #[test]
    fn test_unstarted_group() -> Result<()> {
        let fixture = Fixture::new(builtin(), Some(date(2024, 1, 1)), date(2024, 5, 1), []);
        let items = fixture.check("MMR_Group");
        assert!(items[0].description().contains("needs 3 doses"));
        assert_eq!(items[0].status_tags(), &[StatusTag::TooYoung]);
        assert_eq!(items[0].date(), Some(date(2024, 10, 1)));
        Ok(())
    }

    #[test]
    fn test_group_floor() -> Result<()> {
        let fixture = Fixture::new(
            builtin(),
            Some(date(2024, 1, 1)),
            date(2024, 12, 1),
            [dose("Priorix", date(2024, 7, 1))],
        );
        let items = fixture.check("MMR_Group");
        assert_eq!(items.len(), 1);
        assert!(items[0].has_tag(StatusTag::SeriesRestartNeeded));
        assert_eq!(items[0].eligible_date(), EligibleDate::Undetermined);
        Ok(())
    }
}
