use crate::{
    age::add_days, outcome::MissingItem, records::DoseIndex, registry::Registry,
    settings::EngineSettings,
};
use jiff::civil::Date;

/// Push every dated item past the global spacing floors, then sort for display.
///
/// An item's date becomes the latest of its own date, the reference date, the most
/// recent dose plus the general spacing and, for live items only, the most recent
/// live dose plus the live spacing.
pub fn apply_spacing(
    mut items: Vec<MissingItem>,
    index: &DoseIndex,
    registry: &Registry,
    reference: Date,
    settings: &EngineSettings,
) -> Vec<MissingItem> {
    let doses = index.all();
    let any_floor = doses
        .last()
        .map(|dose| add_days(dose.date(), i64::from(settings.min_spacing_days)));
    let live_floor = doses
        .iter()
        .rev()
        .find(|dose| registry.is_live_name(dose.canonical()))
        .map(|dose| add_days(dose.date(), i64::from(settings.live_spacing_days)));

    for item in &mut items {
        let Some(original) = item.date() else {
            continue;
        };
        let mut date = original.max(reference);
        if let Some(floor) = any_floor {
            date = date.max(floor);
        }
        if item.is_live() {
            if let Some(floor) = live_floor {
                date = date.max(floor);
            }
        }
        if date != original {
            log::debug!("{}: moved from {original} to {date}", item.label());
            item.set_date(date);
        }
    }

    items.sort_by(MissingItem::display_order);
    items
}
