use crate::{
    age::{format_date, parse_date, Age},
    canonical::canonical_name,
};
use itertools::Itertools;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row of dose history as produced by the history-fetch collaborator.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DoseInput {
    pub product_name: String,
    pub dose_ordinal: String,
    pub date: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PatientInput {
    pub name: String,
    pub date_of_birth: String,
}

// A parsed dose. The reported ordinal is kept for display only; sequence position
// always comes from date order.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct AdministeredDose {
    product: String,
    canonical: String,
    ordinal: u32,
    ordinal_display: String,
    date: Date,
    date_display: String,
}

impl AdministeredDose {
    pub fn new(product: &str, ordinal_display: &str, date: Date) -> Self {
        Self {
            product: product.to_owned(),
            canonical: canonical_name(product),
            ordinal: ordinal_display.trim().parse().unwrap_or(0),
            ordinal_display: ordinal_display.to_owned(),
            date,
            date_display: format_date(date),
        }
    }

    // None when the row carries no product, no date or an unreadable date.
    pub fn parse(input: &DoseInput) -> Option<Self> {
        if input.product_name.trim().is_empty() || input.date.trim().is_empty() {
            return None;
        }
        let Some(date) = parse_date(&input.date) else {
            log::warn!(
                "skipping {} dose with unreadable date {:?}",
                input.product_name,
                input.date
            );
            return None;
        };
        let mut dose = Self::new(&input.product_name, &input.dose_ordinal, date);
        dose.date_display = input.date.clone();
        Some(dose)
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn ordinal_display(&self) -> &str {
        &self.ordinal_display
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn date_display(&self) -> &str {
        &self.date_display
    }
}

/// Administered doses grouped by canonical name, each group date-ascending.
#[derive(Clone, Debug, Default)]
pub struct DoseIndex {
    groups: BTreeMap<String, Vec<AdministeredDose>>,
}

impl DoseIndex {
    pub fn new(doses: impl IntoIterator<Item = AdministeredDose>) -> Self {
        let mut groups: BTreeMap<String, Vec<AdministeredDose>> = BTreeMap::new();
        for dose in doses {
            groups.entry(dose.canonical.clone()).or_default().push(dose);
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.product.cmp(&b.product)));
        }
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn has_any(&self, canonical: &str) -> bool {
        self.groups.get(canonical).is_some_and(|group| !group.is_empty())
    }

    /// All doses whose canonical name is in `names`, date-ascending.
    pub fn matching(&self, names: &BTreeSet<String>) -> Vec<&AdministeredDose> {
        names
            .iter()
            .filter_map(|name| self.groups.get(name))
            .flatten()
            .sorted_by(|a, b| a.date.cmp(&b.date).then_with(|| a.product.cmp(&b.product)))
            .collect()
    }

    /// Doses whose raw product name contains any of `keywords`, ignoring case.
    ///
    /// Seasonal products are renamed every year, so canonical matching is not
    /// enough for them.
    pub fn matching_keywords(&self, keywords: &[String]) -> Vec<&AdministeredDose> {
        let keywords = keywords.iter().map(|k| k.to_lowercase()).collect_vec();
        self.all()
            .into_iter()
            .filter(|dose| {
                let product = dose.product.to_lowercase();
                keywords.iter().any(|keyword| product.contains(keyword.as_str()))
            })
            .collect()
    }

    pub fn all(&self) -> Vec<&AdministeredDose> {
        self.groups
            .values()
            .flatten()
            .sorted_by(|a, b| a.date.cmp(&b.date).then_with(|| a.product.cmp(&b.product)))
            .collect()
    }
}

/// Fixed facts about the patient for one evaluation run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PatientContext {
    dob: Option<Date>,
    reference: Date,
}

impl PatientContext {
    pub fn new(dob: Option<Date>, reference: Date) -> Self {
        Self { dob, reference }
    }

    pub fn dob(&self) -> Option<Date> {
        self.dob
    }

    pub fn reference(&self) -> Date {
        self.reference
    }

    pub fn age_at(&self, date: Date) -> Option<Age> {
        Age::at(self.dob?, date)
    }

    pub fn current_age(&self) -> Option<Age> {
        self.age_at(self.reference)
    }
}
