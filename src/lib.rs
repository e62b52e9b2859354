#![warn(clippy::all, rust_2018_idioms)]

mod age;
mod canonical;
mod check;
mod dispatch;
mod engine;
mod outcome;
mod pneumococcal;
mod records;
mod registry;
mod rules;
mod settings;
mod spacing;

pub use age::{add_days, add_months, add_years, format_date, parse_date, Age, AgeThreshold, DATE_FORMAT};
pub use canonical::canonical_name;
pub use check::Context;
pub use dispatch::dispatch;
pub use engine::{evaluate, AdministeredView, Evaluation};
pub use outcome::{EligibleDate, MissingItem, MissingItemView, StatusTag, Urgency};
pub use records::{AdministeredDose, DoseIndex, DoseInput, PatientContext, PatientInput};
pub use registry::{CompiledRule, Registry, RegistryError};
pub use rules::{
    AgeBand, AgeRangeGroup, AntigenCoverage, BandedSeries, BoosterPolicy, Course, CourseGroup,
    CumulativeGroup, DoseOverride, EquivalenceGroup, MonovalentFollowUp, ProductFamilies,
    ProductSwitch, RuleDefinition, RuleKind, RuleTable, SeasonalGroup, SeriesPlan, SingleDose,
};
pub use settings::EngineSettings;
pub use spacing::apply_spacing;
