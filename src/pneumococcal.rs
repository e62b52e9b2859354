//! Product-line exclusivity across the pneumococcal rules.
//!
//! Runs before the ordinary dispatch and decides which of the family rules still get
//! their own checker.

use crate::{
    check::Context,
    outcome::{MissingItem, StatusTag},
    registry::CompiledRule,
};
use itertools::Itertools;
use std::collections::BTreeSet;

const POLYSACCHARIDE_FROM_YEARS: i32 = 2;
const COMPLETE_SERIES_DOSES: usize = 4;
const BOOSTER_SWAP_DOSES: usize = 3;

#[derive(Debug, Default)]
pub struct FamilyPlan {
    pub items: Vec<MissingItem>,
    // Rule keys the dispatcher must not run.
    pub skip: BTreeSet<String>,
}

pub fn coordinate(cx: &Context<'_>) -> FamilyPlan {
    let mut plan = FamilyPlan::default();
    let Some(families) = cx.registry.pneumococcal() else {
        return plan;
    };
    let Some(polysaccharide) = cx.registry.rule(&families.polysaccharide) else {
        return plan;
    };
    let every_key = || {
        std::iter::once(families.polysaccharide.clone()).chain(families.conjugates.iter().cloned())
    };

    if !cx.index.matching(polysaccharide.names()).is_empty() {
        log::debug!("{} given; pneumococcal rules satisfied", polysaccharide.key());
        plan.skip.extend(every_key());
        return plan;
    }

    let active: Vec<(&CompiledRule, usize)> = families
        .conjugates
        .iter()
        .filter_map(|key| cx.registry.rule(key))
        .map(|rule| (rule, cx.index.matching(rule.names()).len()))
        .filter(|(_, given)| *given > 0)
        .collect();

    if active.len() > 1 {
        let label = "Pneumococcal";
        plan.items.push(
            MissingItem::new(
                label,
                format!(
                    "{label} - Doses from more than one conjugate product line were given ({}); check the schedule.",
                    active.iter().map(|(rule, _)| rule.display()).join(", ")
                ),
            )
            .tags([StatusTag::ErrorInterchange, StatusTag::PneumoMixed]),
        );
        plan.skip.extend(every_key());
        return plan;
    }
    if active.iter().any(|(_, given)| *given >= COMPLETE_SERIES_DOSES) {
        plan.skip.extend(every_key());
        return plan;
    }

    let Some(&(primary, given)) = active.first() else {
        return plan;
    };
    let old_enough = cx
        .patient
        .current_age()
        .is_some_and(|age| age.years() >= POLYSACCHARIDE_FROM_YEARS);
    let offer = |tag: StatusTag, description: String| {
        MissingItem::new(polysaccharide.display(), description)
            .on(cx.patient.reference())
            .tags([StatusTag::Info, tag])
            .live(polysaccharide.is_live())
    };

    if old_enough && given < BOOSTER_SWAP_DOSES {
        plan.items.push(offer(
            StatusTag::AlternativeCompletion,
            format!(
                "{} - One dose completes pneumococcal protection (aged {POLYSACCHARIDE_FROM_YEARS} or over with fewer than {BOOSTER_SWAP_DOSES} doses of {}).",
                polysaccharide.display(),
                primary.display()
            ),
        ));
        plan.skip.extend(every_key());
        return plan;
    }
    if old_enough && given == BOOSTER_SWAP_DOSES && !primary.check(cx).is_empty() {
        plan.items.push(offer(
            StatusTag::AlternativeBooster,
            format!(
                "{} - One dose may replace dose 4 of {} (aged {POLYSACCHARIDE_FROM_YEARS} or over).",
                polysaccharide.display(),
                primary.display()
            ),
        ));
        plan.skip.extend(every_key());
        return plan;
    }

    plan.skip
        .extend(every_key().filter(|key| key.as_str() != primary.key()));
    plan
}
