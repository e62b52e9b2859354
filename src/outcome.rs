use crate::age::format_date;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Semantic classification attached to a missing item.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    Due,
    Info,
    Eligible,
    TooYoung,
    TooEarly,
    TooOldToStart,
    TooOldToComplete,
    TooOldAtFirstDose,
    BoosterDue,
    BoosterUpcoming,
    SeriesRestartNeeded,
    CoverageByOther,
    AlternativeCompletion,
    AlternativeBooster,
    AlternativeCourse,
    MultipleOptions,
    NoEligibleOption,
    ProtocolSwitch,
    PneumoMixed,
    FluSecondDose,
    FluAnnual,
    StandardUnadministered,
    ErrorDob,
    ErrorAgeCalculation,
    ErrorAgeFirstDose,
    ErrorConfig,
    ErrorNoMatchingRule,
    ErrorInterchange,
    ErrorAmbiguousCourse,
    ErrorInitialCheck,
}

impl StatusTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Info => "info",
            Self::Eligible => "eligible",
            Self::TooYoung => "too_young",
            Self::TooEarly => "too_early",
            Self::TooOldToStart => "too_old_to_start",
            Self::TooOldToComplete => "too_old_to_complete",
            Self::TooOldAtFirstDose => "too_old_at_first_dose",
            Self::BoosterDue => "booster_due",
            Self::BoosterUpcoming => "booster_upcoming",
            Self::SeriesRestartNeeded => "series_restart_needed",
            Self::CoverageByOther => "coverage_by_other",
            Self::AlternativeCompletion => "alternative_completion",
            Self::AlternativeBooster => "alternative_booster",
            Self::AlternativeCourse => "alternative_course",
            Self::MultipleOptions => "multiple_options",
            Self::NoEligibleOption => "no_eligible_option",
            Self::ProtocolSwitch => "protocol_switch",
            Self::PneumoMixed => "pneumo_mixed",
            Self::FluSecondDose => "flu_second_dose",
            Self::FluAnnual => "flu_annual",
            Self::StandardUnadministered => "standard_unadministered",
            Self::ErrorDob => "error_dob",
            Self::ErrorAgeCalculation => "error_age_calculation",
            Self::ErrorAgeFirstDose => "error_age_first_dose",
            Self::ErrorConfig => "error_config",
            Self::ErrorNoMatchingRule => "error_no_matching_rule",
            Self::ErrorInterchange => "error_interchange",
            Self::ErrorAmbiguousCourse => "error_ambiguous_course",
            Self::ErrorInitialCheck => "error_initial_check",
        }
    }

    pub fn is_error(&self) -> bool {
        self.as_str().starts_with("error")
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping of a tag set, for presentation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Urgency {
    Due,
    Warning,
    Info,
    Error,
    Normal,
}

impl Urgency {
    pub fn of(tags: &[StatusTag]) -> Self {
        use StatusTag as T;
        let any = |wanted: &[StatusTag]| tags.iter().any(|tag| wanted.contains(tag));
        if any(&[T::Due, T::FluSecondDose, T::FluAnnual, T::MultipleOptions]) {
            Self::Due
        } else if any(&[
            T::TooYoung,
            T::ErrorAgeFirstDose,
            T::TooEarly,
            T::SeriesRestartNeeded,
            T::TooOldToStart,
            T::TooOldAtFirstDose,
        ]) {
            Self::Warning
        } else if any(&[T::Info, T::CoverageByOther, T::NoEligibleOption]) {
            Self::Info
        } else if tags.iter().any(StatusTag::is_error) {
            Self::Error
        } else {
            Self::Normal
        }
    }
}

/// When the next dose of an outstanding item may be given.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum EligibleDate {
    On(Date),
    // Advisory only; nothing to schedule.
    NotApplicable,
    // A date should exist but cannot be computed; see the status tags.
    Undetermined,
}

impl EligibleDate {
    pub fn date(&self) -> Option<Date> {
        match self {
            Self::On(date) => Some(*date),
            Self::NotApplicable | Self::Undetermined => None,
        }
    }
}

impl From<Option<Date>> for EligibleDate {
    fn from(date: Option<Date>) -> Self {
        date.map_or(Self::Undetermined, Self::On)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct MissingItem {
    label: String,
    description: String,
    eligible: EligibleDate,
    tags: Vec<StatusTag>,
    live: bool,
}

impl MissingItem {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            eligible: EligibleDate::NotApplicable,
            tags: Vec::new(),
            live: false,
        }
    }

    pub fn eligible(mut self, eligible: impl Into<EligibleDate>) -> Self {
        self.eligible = eligible.into();
        self
    }

    pub fn on(self, date: Date) -> Self {
        self.eligible(EligibleDate::On(date))
    }

    pub fn undetermined(self) -> Self {
        self.eligible(EligibleDate::Undetermined)
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = StatusTag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn eligible_date(&self) -> EligibleDate {
        self.eligible
    }

    pub fn date(&self) -> Option<Date> {
        self.eligible.date()
    }

    pub fn status_tags(&self) -> &[StatusTag] {
        &self.tags
    }

    pub fn has_tag(&self, tag: StatusTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn urgency(&self) -> Urgency {
        Urgency::of(&self.tags)
    }

    pub(crate) fn set_date(&mut self, date: Date) {
        self.eligible = EligibleDate::On(date);
    }

    // Output ordering: dated items first by date, then by description.
    pub fn display_order(&self, other: &Self) -> Ordering {
        let by_date = match (self.date(), other.date()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date
            .then_with(|| {
                self.description
                    .to_lowercase()
                    .cmp(&other.description.to_lowercase())
            })
            .then_with(|| self.description.cmp(&other.description))
    }

    pub fn to_view(&self) -> MissingItemView {
        MissingItemView {
            description: self.description.clone(),
            eligible_date_display: self.date().map(format_date).unwrap_or_default(),
            status_tags: self.tags.iter().map(|tag| tag.as_str().to_owned()).collect(),
            canonical_label: self.label.clone(),
        }
    }
}

/// Flattened item handed to presentation and export collaborators.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct MissingItemView {
    pub description: String,
    pub eligible_date_display: String,
    pub status_tags: Vec<String>,
    pub canonical_label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_urgency_precedence() {
        assert_eq!(Urgency::of(&[StatusTag::Due, StatusTag::TooYoung]), Urgency::Due);
        assert_eq!(
            Urgency::of(&[StatusTag::ErrorAgeFirstDose, StatusTag::SeriesRestartNeeded]),
            Urgency::Warning
        );
        assert_eq!(
            Urgency::of(&[StatusTag::Info, StatusTag::ErrorInterchange]),
            Urgency::Info
        );
        assert_eq!(Urgency::of(&[StatusTag::ErrorConfig]), Urgency::Error);
        assert_eq!(Urgency::of(&[StatusTag::Eligible]), Urgency::Normal);
    }

    #[test]
    fn test_display_order_puts_undated_last() {
        let mut items = vec![
            MissingItem::new("c", "zeta").undetermined(),
            MissingItem::new("b", "Beta").on(date(2025, 3, 1)),
            MissingItem::new("a", "alpha").on(date(2025, 3, 1)),
            MissingItem::new("d", "early").on(date(2025, 1, 1)),
        ];
        items.sort_by(MissingItem::display_order);
        let order: Vec<_> = items.iter().map(MissingItem::label).collect();
        assert_eq!(order, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_view_formats_date_and_tags() {
        let view = MissingItem::new("Varivax", "Varivax - 1 more dose needed.")
            .on(date(2025, 7, 4))
            .tags([StatusTag::Due])
            .to_view();
        assert_eq!(view.eligible_date_display, "04/07/2025");
        assert_eq!(view.status_tags, vec!["due".to_owned()]);
        assert_eq!(view.canonical_label, "Varivax");

        let view = MissingItem::new("x", "y").undetermined().to_view();
        assert_eq!(view.eligible_date_display, "");
    }
}
