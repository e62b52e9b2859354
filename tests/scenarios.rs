use anyhow::Result;
use jiff::civil::{date, Date};
use vaccine_compliance::{
    apply_spacing, evaluate, AdministeredDose, DoseIndex, DoseInput, EngineSettings, Evaluation,
    MissingItem, PatientInput, Registry, StatusTag,
};

fn patient(dob: &str) -> PatientInput {
    PatientInput {
        name: "Test Patient".to_owned(),
        date_of_birth: dob.to_owned(),
    }
}

fn row(product: &str, ordinal: &str, when: &str) -> DoseInput {
    DoseInput {
        product_name: product.to_owned(),
        dose_ordinal: ordinal.to_owned(),
        date: when.to_owned(),
    }
}

fn run(registry: &Registry, dob: &str, doses: &[DoseInput], reference: Date) -> Evaluation {
    let evaluation = evaluate(registry, &patient(dob), doses, reference, &EngineSettings::default());
    assert!(evaluation.is_ok(), "{:?}", evaluation.error);
    evaluation
}

fn labelled<'a>(evaluation: &'a Evaluation, prefix: &str) -> Vec<&'a MissingItem> {
    evaluation
        .missing
        .iter()
        .filter(|item| item.label().starts_with(prefix))
        .collect()
}

#[test]
fn test_first_dose_below_minimum_age() -> Result<()> {
    let registry = Registry::from_ron_str(
        r#"(
            version: "t",
            rules: [(
                key: "Late", display: "Late starter", names: ["Latevax"],
                kind: SingleSeries((doses: 2, intervals: [None, Some(90)], min_age: Some(Days(1095)))),
            )],
        )"#,
    )?;
    let evaluation = run(&registry, "01/01/2024", &[row("Latevax", "1", "01/01/2024")], date(2024, 6, 1));
    assert_eq!(evaluation.missing.len(), 1);
    let item = &evaluation.missing[0];
    assert_eq!(
        item.status_tags(),
        &[StatusTag::ErrorAgeFirstDose, StatusTag::TooEarly, StatusTag::SeriesRestartNeeded]
    );
    assert_eq!(item.date(), None);
    assert!(item.description().contains("was 0 days old"));
    Ok(())
}

#[test]
fn test_banded_series_uses_band_of_first_dose() -> Result<()> {
    let registry = Registry::from_ron_str(
        r#"(
            version: "t",
            rules: [(
                key: "Six", display: "6-in-1", names: ["Hexaxim"],
                kind: AgeBanded((
                    min_age: Some(Weeks(6)),
                    bands: [
                        (label: Some("infant"), max_months: Some(11),
                         plan: (doses: 4, intervals: [None, Some(30), Some(30), Some(180)])),
                        (label: Some("catch-up"), min_months: Some(12),
                         plan: (doses: 3, intervals: [None, Some(30), Some(180)])),
                    ],
                )),
            )],
        )"#,
    )?;
    let doses = [row("Hexaxim", "1", "10/01/2029"), row("Hexaxim", "2", "15/02/2029")];
    let evaluation = run(&registry, "01/01/2020", &doses, date(2029, 6, 1));
    assert_eq!(evaluation.missing.len(), 1);
    let item = &evaluation.missing[0];
    assert!(item.label().contains("catch-up"), "{}", item.label());
    assert_eq!(item.date(), Some(date(2029, 8, 14)));
    assert_eq!(item.status_tags(), &[StatusTag::Due]);
    Ok(())
}

#[test]
fn test_fourth_infant_dose_uses_last_interval() -> Result<()> {
    let registry = Registry::from_ron_str(
        r#"(
            version: "t",
            rules: [(
                key: "Six", display: "6-in-1", names: ["Infanrix Hexa"],
                kind: AgeBanded((
                    min_age: Some(Weeks(6)),
                    bands: [
                        (label: Some("infant"), max_months: Some(11),
                         plan: (doses: 4, intervals: [None, Some(30), Some(30), Some(180)])),
                    ],
                )),
            )],
        )"#,
    )?;
    let doses = [
        row("Infanrix Hexa", "1", "01/03/2020"),
        row("Infanrix Hexa", "2", "01/04/2020"),
        row("Infanrix Hexa", "3", "01/05/2020"),
    ];
    let evaluation = run(&registry, "01/01/2020", &doses, date(2020, 6, 1));
    assert_eq!(evaluation.missing.len(), 1);
    let item = &evaluation.missing[0];
    assert_eq!(item.label(), "6-in-1 (infant)");
    assert!(item.description().contains("1 more dose(s)"));
    assert_eq!(item.date(), Some(date(2020, 10, 28)));

    // Long overdue: due as of the reference date.
    let evaluation = run(&registry, "01/01/2020", &doses, date(2029, 6, 1));
    assert_eq!(evaluation.missing[0].date(), Some(date(2029, 6, 1)));
    Ok(())
}

#[test]
fn test_mixed_rotavirus_products() -> Result<()> {
    let registry = Registry::builtin()?;
    let doses = [row("Rotarix 1.5ml", "1", "15/02/2024"), row("Rotavin", "1", "20/03/2024")];
    let evaluation = run(&registry, "01/01/2024", &doses, date(2024, 4, 1));
    let rota = labelled(&evaluation, "Rotavirus");

    assert!(rota.iter().any(|item| item.has_tag(StatusTag::ErrorInterchange)));
    let due = rota
        .iter()
        .filter(|item| item.has_tag(StatusTag::Due))
        .map(|item| (item.label(), item.date()))
        .collect::<Vec<_>>();
    // Both courses are live, so both are held 28 days after the last live dose.
    assert_eq!(
        due,
        vec![
            ("Rotavirus (Rotarix/ROTARIXTM)", Some(date(2024, 4, 17))),
            ("Rotavirus (Rotavin/Rotavin-M1)", Some(date(2024, 4, 19))),
        ]
    );
    Ok(())
}

#[test]
fn test_completed_course_silences_group() -> Result<()> {
    let registry = Registry::builtin()?;
    let doses = [row("Rotarix 1.5ml", "1", "15/02/2024"), row("ROTARIXTM", "2", "20/03/2024")];
    let evaluation = run(&registry, "01/01/2024", &doses, date(2024, 6, 1));
    assert!(labelled(&evaluation, "Rotavirus").is_empty());
    Ok(())
}

#[test]
fn test_flu_second_dose_for_young_child() -> Result<()> {
    let registry = Registry::builtin()?;
    let doses = [row("Vaxigrip Tetra 0.5ml", "1", "01/10/2024")];
    let evaluation = run(&registry, "01/01/2017", &doses, date(2024, 10, 21));
    let flu = labelled(&evaluation, "Influenza");
    assert_eq!(flu.len(), 1);
    assert!(flu[0].has_tag(StatusTag::FluSecondDose));
    assert_eq!(flu[0].date(), Some(date(2024, 10, 29)));
    Ok(())
}

#[test]
fn test_flu_yearly_dose_from_nine() -> Result<()> {
    let registry = Registry::builtin()?;
    let doses = [row("Influvac Tetra 2024/2025", "1", "01/10/2024")];
    let evaluation = run(&registry, "01/01/2014", &doses, date(2025, 9, 6));
    let flu = labelled(&evaluation, "Influenza");
    assert_eq!(flu.len(), 1);
    assert!(!flu[0].has_tag(StatusTag::FluSecondDose));
    assert!(flu[0].has_tag(StatusTag::FluAnnual));
    assert_eq!(flu[0].date(), Some(date(2025, 10, 1)));
    Ok(())
}

#[test]
fn test_live_spacing_boundary() -> Result<()> {
    let registry = Registry::builtin()?;
    let index = DoseIndex::new([
        AdministeredDose::new("Hexaxim", "1", date(2025, 2, 19)),
        AdministeredDose::new("Varivax", "1", date(2025, 3, 1)),
    ]);
    let items = vec![
        MissingItem::new("live", "live item").on(date(2025, 3, 10)).live(true),
        MissingItem::new("plain", "plain item").on(date(2025, 3, 10)),
        MissingItem::new("late", "late live item").on(date(2025, 4, 2)).live(true),
    ];
    let items = apply_spacing(items, &index, &registry, date(2025, 3, 5), &EngineSettings::default());
    let dates = items
        .iter()
        .map(|item| (item.label(), item.date()))
        .collect::<Vec<_>>();
    assert_eq!(
        dates,
        vec![
            ("plain", Some(date(2025, 3, 15))),
            ("live", Some(date(2025, 3, 29))),
            ("late", Some(date(2025, 4, 2))),
        ]
    );
    Ok(())
}

fn busy_history() -> Vec<DoseInput> {
    vec![
        row("Hexaxim", "1", "15/03/2023"),
        row("Hexaxim", "2", "15/04/2023"),
        row("Rotarix 1.5ml", "1", "15/03/2023"),
        row("Prevenar 13", "1", "15/03/2023"),
        row("Varivax", "1", "10/02/2024"),
        row("Jevax (Lọ 1 liều 1ml)", "1", "01/03/2024"),
        row("Vaxigrip Tetra 0.5ml", "1", "01/10/2024"),
    ]
}

#[test]
fn test_evaluation_is_repeatable() -> Result<()> {
    let registry = Registry::builtin()?;
    let history = busy_history();
    let first = run(&registry, "01/01/2023", &history, date(2025, 1, 15));
    let second = run(&registry, "01/01/2023", &history, date(2025, 1, 15));
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_output_respects_floors_and_order() -> Result<()> {
    let registry = Registry::builtin()?;
    let reference = date(2025, 1, 15);
    let evaluation = run(&registry, "01/01/2023", &busy_history(), reference);
    let last_dose = date(2024, 10, 1);
    let last_live = date(2024, 2, 10);

    for item in &evaluation.missing {
        let Some(on) = item.date() else {
            continue;
        };
        assert!(on >= reference, "{} dated before the reference", item.label());
        assert!(on >= last_dose.saturating_add(jiff::Span::new().days(14)));
        if item.is_live() {
            assert!(on >= last_live.saturating_add(jiff::Span::new().days(28)));
        }
    }

    let dated = evaluation
        .missing
        .iter()
        .take_while(|item| item.date().is_some())
        .count();
    assert!(evaluation.missing[dated..].iter().all(|item| item.date().is_none()));
    assert!(evaluation.missing[..dated]
        .windows(2)
        .all(|pair| pair[0].date() <= pair[1].date()));
    Ok(())
}

#[test]
fn test_unreadable_rows_are_skipped() -> Result<()> {
    let registry = Registry::builtin()?;
    let doses = [row("Varivax", "1", "yesterday"), row("", "1", "01/01/2024")];
    let evaluation = run(&registry, "01/01/2020", &doses, date(2025, 1, 1));
    assert!(evaluation.administered.is_empty());
    let varivax = labelled(&evaluation, "Varivax");
    assert_eq!(varivax.len(), 1);
    assert!(varivax[0].description().contains("not yet administered"));
    Ok(())
}
