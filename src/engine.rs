use crate::{
    age::{parse_date, Age},
    check::Context,
    dispatch::dispatch,
    outcome::{MissingItem, MissingItemView},
    records::{AdministeredDose, DoseIndex, DoseInput, PatientContext, PatientInput},
    registry::Registry,
    settings::EngineSettings,
    spacing::apply_spacing,
};
use anyhow::{bail, Result};
use itertools::Itertools;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// One administered dose as listed back to the caller.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct AdministeredView {
    pub name: String,
    pub dose: String,
    pub date: String,
    // Empty when the date of birth is unknown.
    pub age: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Evaluation {
    pub patient_name: String,
    pub patient_dob: String,
    pub administered: Vec<AdministeredView>,
    pub missing: Vec<MissingItem>,
    pub error: Option<String>,
}

impl Evaluation {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn views(&self) -> Vec<MissingItemView> {
        self.missing.iter().map(MissingItem::to_view).collect()
    }
}

/// Evaluate one patient's history against `registry` as of `reference`.
///
/// Never fails: an unexpected failure of the pass is reported in
/// [`Evaluation::error`] with whatever patient details were available.
pub fn evaluate(
    registry: &Registry,
    patient: &PatientInput,
    doses: &[DoseInput],
    reference: Date,
    settings: &EngineSettings,
) -> Evaluation {
    let mut evaluation = Evaluation {
        patient_name: patient.name.trim().to_owned(),
        patient_dob: patient.date_of_birth.trim().to_owned(),
        ..Evaluation::default()
    };
    match run(registry, patient, doses, reference, settings) {
        Ok((administered, missing)) => {
            evaluation.administered = administered;
            evaluation.missing = missing;
        }
        Err(err) => {
            log::error!("evaluation of {:?} failed: {err:#}", evaluation.patient_name);
            evaluation.error = Some(format!("{err:#}"));
        }
    }
    evaluation
}

fn run(
    registry: &Registry,
    patient: &PatientInput,
    doses: &[DoseInput],
    reference: Date,
    settings: &EngineSettings,
) -> Result<(Vec<AdministeredView>, Vec<MissingItem>)> {
    if registry.is_empty() {
        bail!("rule table {} defines no rules", registry.version());
    }

    let dob = parse_date(&patient.date_of_birth);
    if dob.is_none() && !patient.date_of_birth.trim().is_empty() {
        log::warn!(
            "unreadable date of birth {:?}; age checks are disabled",
            patient.date_of_birth
        );
    }

    let parsed = doses.iter().filter_map(AdministeredDose::parse).collect_vec();
    let administered = parsed
        .iter()
        .sorted_by(|a, b| a.date().cmp(&b.date()).then_with(|| a.product().cmp(b.product())))
        .map(|dose| AdministeredView {
            name: dose.product().to_owned(),
            dose: dose.ordinal_display().to_owned(),
            date: dose.date_display().to_owned(),
            age: dob
                .and_then(|dob| Age::at(dob, dose.date()))
                .map(|age| age.label())
                .unwrap_or_default(),
        })
        .collect_vec();

    let index = DoseIndex::new(parsed);
    let context = PatientContext::new(dob, reference);
    let cx = Context {
        registry,
        index: &index,
        patient: &context,
    };
    let missing = apply_spacing(dispatch(&cx), &index, registry, reference, settings);

    log::info!(
        "evaluated {} dose(s) against rule table {}: {} outstanding item(s)",
        administered.len(),
        registry.version(),
        missing.len()
    );
    Ok((administered, missing))
}
