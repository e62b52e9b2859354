use crate::{
    canonical::canonical_name,
    check::Context,
    outcome::{MissingItem, StatusTag},
    pneumococcal,
};
use std::collections::BTreeSet;

/// Run every rule in registry order, then report unclaimed standard vaccines.
pub fn dispatch(cx: &Context<'_>) -> Vec<MissingItem> {
    let plan = pneumococcal::coordinate(cx);
    let mut items = plan.items;
    let mut claimed: BTreeSet<&str> = BTreeSet::new();

    for rule in cx.registry.rules() {
        claimed.extend(rule.names().iter().map(String::as_str));
        if plan.skip.contains(rule.key()) {
            log::debug!("{}: handled by the pneumococcal coordinator", rule.key());
            continue;
        }
        let found = rule.check(cx);
        log::debug!(
            "{} ({}): {} item(s)",
            rule.key(),
            rule.kind().name(),
            found.len()
        );
        items.extend(found);
    }

    for name in cx.registry.standard_vaccines() {
        let canonical = canonical_name(name);
        if claimed.contains(canonical.as_str()) || cx.index.has_any(&canonical) {
            continue;
        }
        items.push(
            MissingItem::new(name.as_str(), format!("{name} (never administered)"))
                .on(cx.patient.reference())
                .tags([StatusTag::Due, StatusTag::StandardUnadministered])
                .live(cx.registry.is_live_name(&canonical)),
        );
    }
    items
}
