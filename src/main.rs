#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use serde::Deserialize;
use std::{env, fs, path::PathBuf};
use vaccine_compliance::{
    evaluate, format_date, parse_date, DoseInput, EngineSettings, PatientInput, Registry,
};

const USAGE: &str = "usage: vaccine-check <history.ron> [--rules <rules.ron>] [--settings <settings.ron>] [--today dd/mm/yyyy] [--ron]";

// A saved patient history: who, and what they were given.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct History {
    patient: PatientInput,
    doses: Vec<DoseInput>,
}

#[derive(Debug, Default)]
struct Args {
    history: PathBuf,
    rules: Option<PathBuf>,
    settings: Option<PathBuf>,
    today: Option<String>,
    ron: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        let mut history = None;
        while let Some(arg) = args.next() {
            let mut value = || args.next().with_context(|| format!("{arg} needs a value\n{USAGE}"));
            match arg.as_str() {
                "--rules" => parsed.rules = Some(value()?.into()),
                "--settings" => parsed.settings = Some(value()?.into()),
                "--today" => parsed.today = Some(value()?),
                "--ron" => parsed.ron = true,
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                _ if history.is_some() => bail!("more than one history file given\n{USAGE}"),
                _ => history = Some(PathBuf::from(&arg)),
            }
        }
        parsed.history = history.context(USAGE)?;
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse(env::args().skip(1))?;

    let registry = match &args.rules {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading rule table {}", path.display()))?;
            Registry::from_ron_str(&text)
                .with_context(|| format!("loading rule table {}", path.display()))?
        }
        None => Registry::builtin()?,
    };
    let settings = match &args.settings {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };
    let reference = match &args.today {
        Some(text) => parse_date(text)
            .with_context(|| format!("--today {text:?} is not a dd/mm/yyyy date"))?,
        None => settings.reference_today()?,
    };

    let text = fs::read_to_string(&args.history)
        .with_context(|| format!("reading history {}", args.history.display()))?;
    let history: History = ron::from_str(&text)
        .with_context(|| format!("parsing history {}", args.history.display()))?;

    let evaluation = evaluate(
        &registry,
        &history.patient,
        &history.doses,
        reference,
        &settings,
    );
    if let Some(error) = &evaluation.error {
        bail!("evaluation failed: {error}");
    }

    if args.ron {
        println!(
            "{}",
            ron::ser::to_string_pretty(&evaluation.views(), ron::ser::PrettyConfig::default())?
        );
        return Ok(());
    }

    println!(
        "{} (born {}), as of {}",
        evaluation.patient_name,
        evaluation.patient_dob,
        format_date(reference)
    );
    println!("\nAdministered:");
    for dose in &evaluation.administered {
        println!("  {}  {} (dose {}) at {}", dose.date, dose.name, dose.dose, dose.age);
    }
    println!("\nOutstanding:");
    for item in &evaluation.missing {
        let view = item.to_view();
        println!(
            "  {:>10}  {:<8} {}  [{}]",
            view.eligible_date_display,
            format!("{:?}", item.urgency()),
            view.description,
            view.status_tags.iter().join(", ")
        );
    }
    Ok(())
}
