use super::{check_series, dose_count, first_dose_check, restart_note, Checker, Context, SeriesSubject};
use crate::{
    outcome::{MissingItem, StatusTag},
    registry::CompiledRule,
    rules::{CumulativeGroup, SeriesPlan},
};

impl Checker for CumulativeGroup {
    fn check(&self, rule: &CompiledRule, cx: &Context<'_>) -> Vec<MissingItem> {
        let records = cx.index.matching(rule.names());
        let given = dose_count(&records);
        if given >= self.doses {
            return Vec::new();
        }

        let Some(first) = records.first() else {
            let plan = SeriesPlan {
                doses: self.doses,
                min_age: self.min_age,
                ..SeriesPlan::default()
            };
            return check_series(
                &SeriesSubject::new(rule.display(), &plan, rule.is_live()),
                &records,
                cx,
            );
        };

        if let Some(problem) = first_dose_check(cx.patient, first.date(), self.min_age)
            .into_item(rule.display(), &restart_note(self.doses))
        {
            return vec![problem.live(rule.is_live())];
        }

        vec![MissingItem::new(
            rule.display(),
            format!(
                "{} - Needs {} more dose(s) (given {given}/{}).",
                rule.display(),
                self.doses - given,
                self.doses
            ),
        )
        .on(cx.patient.reference())
        .tags([StatusTag::Due])
        .live(rule.is_live())]
    }
}

#[cfg(test)]
mod tests {
    use crate::check::testing::{dose, Fixture};
    use crate::outcome::StatusTag;
    use crate::registry::Registry;
    use anyhow::Result;
    use jiff::civil::date;

    fn registry() -> Result<Registry> {
        Ok(Registry::from_ron_str(
            r#"(
                version: "t",
                rules: [(
                    key: "HepB",
                    display: "Hepatitis B",
                    names: ["Engerix-B", "Euvax B"],
                    kind: Cumulative((doses: 3, min_age: Some(Days(0)))),
                )],
            )"#,
        )?)
    }

    #[test]
    fn test_mixed_products_count_together() -> Result<()> {
        let fixture = Fixture::new(
            registry()?,
            Some(date(2024, 1, 1)),
            date(2024, 6, 1),
            [dose("Engerix-B", date(2024, 1, 2)), dose("Euvax B", date(2024, 2, 2))],
        );
        let items = fixture.check("HepB");
        assert_eq!(items.len(), 1);
        assert!(items[0].description().contains("(given 2/3)"));
        assert_eq!(items[0].date(), Some(date(2024, 6, 1)));
        assert_eq!(items[0].status_tags(), &[StatusTag::Due]);

        let fixture = Fixture::new(
            registry()?,
            Some(date(2024, 1, 1)),
            date(2024, 6, 1),
            [
                dose("Engerix-B", date(2024, 1, 2)),
                dose("Euvax B", date(2024, 2, 2)),
                dose("Euvax B", date(2024, 3, 2)),
            ],
        );
        assert!(fixture.check("HepB").is_empty());
        Ok(())
    }

    #[test]
    fn test_unstarted_group() -> Result<()> {
        let fixture = Fixture::new(registry()?, Some(date(2024, 1, 1)), date(2024, 6, 1), []);
        let items = fixture.check("HepB");
        assert!(items[0].description().contains("not yet administered"));
        assert_eq!(items[0].status_tags(), &[StatusTag::Eligible]);
        Ok(())
    }
}
