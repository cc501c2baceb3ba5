use anyhow::Result;
use chrono::NaiveDate;
use encounter_revenue_kpis::*;
use std::collections::BTreeMap;
use std::fs;

fn practice_month_csv() -> &'static str {
    "encounter_date,cpt_code,duration_min,clinician\n\
     2024-01-05,90834,50,ak\n\
     2024-01-20,H0038,47,ak\n\
     2024-01-22,H0038G,90,jb\n\
     2024-01-29,H0004,45,jb\n\
     2024-02-01,90837,58,ak\n\
     2024-02-14,H0038,abc,jb\n\
     2024-02-15,X9999,30,jb\n\
     02/28/2024,T1012,20,ak\n\
     pending,90834,50,ak\n\
     2024-04-03,H0001,75,jb\n"
}

fn month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

#[test]
fn test_two_row_reference_scenario() -> Result<()> {
    let table = EncounterTable::from_records(vec![
        EncounterRecord::new("2024-01-05", "90834", 50.0),
        EncounterRecord::new("2024-01-20", "H0038", 47.0),
    ]);

    let report = compute_revenue(&table, "FY24", &default_time_based_codes())?;

    assert_eq!(report.monthly_total.len(), 1);
    let jan = &report.monthly_total[0];
    assert_eq!(jan.month, month(2024, 1));
    assert_eq!(jan.encounters, 2);
    assert_eq!(jan.total_units, 4);
    assert!((jan.revenue - 189.50).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_csv_pipeline_with_degraded_rows() -> Result<()> {
    let table = read_encounter_csv(practice_month_csv().as_bytes())?;
    let engine = KpiEngine::new(EngineConfig::default())?;
    let report = engine.compute_revenue(&table)?;

    // "pending" is dropped; everything else survives
    assert_eq!(report.encounters.len(), 9);
    assert_eq!(report.diagnostics.input_rows, 10);
    assert_eq!(report.diagnostics.dropped_dates.count, 1);
    assert_eq!(report.diagnostics.dropped_dates.samples[0].value, "pending");
    assert_eq!(report.diagnostics.zeroed_durations.count, 1);
    assert_eq!(report.diagnostics.unmapped_code_rows.get("X9999"), Some(&1));

    let months: Vec<NaiveDate> = report.monthly_total.iter().map(|r| r.month).collect();
    // March has no encounters and must not appear
    assert_eq!(months, vec![month(2024, 1), month(2024, 2), month(2024, 4)]);

    let jan = &report.monthly_total[0];
    // 90834 (1) + H0038 47min (3) + H0038G per encounter (1) + H0004 45min (3)
    assert_eq!(jan.total_units, 8);
    let expected_jan = 110.0 + 3.0 * 26.5 + 6.5 + 3.0 * 29.5;
    assert!((jan.revenue - expected_jan).abs() < 1e-9);
    assert!((jan.client_hours - (50.0 + 47.0 + 90.0 + 45.0) / 60.0).abs() < 1e-9);

    let feb = &report.monthly_total[1];
    assert_eq!(feb.encounters, 4);
    // 90837 (1) + H0038 bad duration (0) + X9999 (1) + T1012 (1)
    assert_eq!(feb.total_units, 3);
    assert!((feb.revenue - (142.0 + 52.5)).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_units_and_revenue_never_negative() -> Result<()> {
    let table = EncounterTable::from_records(vec![
        EncounterRecord::new("2024-05-01", "H0038", -45.0),
        EncounterRecord::new("2024-05-02", "H0004", 0.0),
        EncounterRecord::new("2024-05-03", "90832", -10.0),
        EncounterRecord::new("2024-05-04", "UNKNOWN", 100.0),
    ]);

    let report = compute_revenue(&table, "FY23", &default_time_based_codes())?;
    for row in &report.encounters {
        assert!(row.revenue >= 0.0, "{:?}", row);
        assert!(row.rate >= 0.0, "{:?}", row);
    }
    assert_eq!(report.encounters[0].units, 0);
    assert_eq!(report.encounters[2].units, 1);
    assert_eq!(report.diagnostics.negative_durations.count, 2);
    Ok(())
}

#[test]
fn test_by_code_rollup_sums_to_totals() -> Result<()> {
    let table = read_encounter_csv(practice_month_csv().as_bytes())?;
    let report = compute_revenue(&table, "FY24", &default_time_based_codes())?;

    let mut by_month: BTreeMap<NaiveDate, (f64, usize, u64)> = BTreeMap::new();
    for row in &report.monthly_by_code {
        let entry = by_month.entry(row.month).or_default();
        entry.0 += row.revenue;
        entry.1 += row.encounters;
        entry.2 += row.total_units;
    }

    assert_eq!(by_month.len(), report.monthly_total.len());
    for total in &report.monthly_total {
        let (revenue, encounters, units) = by_month[&total.month];
        assert!((revenue - total.revenue).abs() < 1e-9);
        assert_eq!(encounters, total.encounters);
        assert_eq!(units, total.total_units);
    }

    let keys: Vec<(NaiveDate, String)> = report
        .monthly_by_code
        .iter()
        .map(|r| (r.month, r.cpt_code.clone()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(keys, sorted);
    Ok(())
}

#[test]
fn test_compute_revenue_is_idempotent() -> Result<()> {
    let table = read_encounter_csv(practice_month_csv().as_bytes())?;
    let rates = get_rates("FY24")?;

    let first = compute_revenue(&table, &rates, &default_time_based_codes())?;
    let second = compute_revenue(&table, &rates, &default_time_based_codes())?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_missing_cpt_code_column() {
    let table = read_encounter_csv("encounter_date,duration_min\n2024-01-05,50\n".as_bytes())
        .unwrap();
    match compute_revenue(&table, "FY24", &default_time_based_codes()) {
        Err(KpiError::MissingColumns(cols)) => assert_eq!(cols, vec!["cpt_code"]),
        other => panic!("expected MissingColumns, got {:?}", other),
    }
}

#[test]
fn test_fiscal_year_selection() {
    assert_eq!(get_rates("FY25").unwrap(), get_rates("FY24").unwrap());
    assert!(matches!(
        get_rates("FY99"),
        Err(KpiError::UnknownFiscalYear { .. })
    ));

    let table = EncounterTable::from_records(vec![EncounterRecord::new(
        "2024-01-05",
        "90834",
        50.0,
    )]);
    let fy23 = compute_revenue(&table, "FY23", &default_time_based_codes()).unwrap();
    let fy25 = compute_revenue(&table, "FY25", &default_time_based_codes()).unwrap();
    assert_eq!(fy23.total_revenue(), 100.0);
    assert_eq!(fy25.total_revenue(), 110.0);
}

#[test]
fn test_engine_with_external_rate_catalog() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let catalog_path = dir.path().join("rates.json");
    fs::write(
        &catalog_path,
        r#"{
            "version": "2025-07-01",
            "fiscal_years": {
                "FY26": { "90834": 118.0, "H0038": 28.0 }
            }
        }"#,
    )?;

    let config = EngineConfig::from_json(&format!(
        r#"{{"fiscal_year": "FY26", "rate_catalog_path": {:?}, "fte_hours_per_month": 120}}"#,
        catalog_path.to_string_lossy()
    ))?;
    let engine = KpiEngine::new(config)?;
    assert_eq!(engine.catalog().version(), "2025-07-01");

    let table = EncounterTable::from_records(vec![
        EncounterRecord::new("2025-08-04", "90834", 60.0),
        EncounterRecord::new("2025-08-05", "H0038", 60.0),
    ]);
    let report = engine.compute_revenue(&table)?;
    let aug = &report.monthly_total[0];
    assert!((aug.revenue - (118.0 + 4.0 * 28.0)).abs() < 1e-9);
    assert!((aug.utilization_rate - 2.0 / 120.0).abs() < 1e-12);

    assert!(matches!(
        engine.compute_revenue_for_year(&table, "FY24"),
        Err(KpiError::UnknownFiscalYear { .. })
    ));
    Ok(())
}

#[test]
fn test_kpi_path_matches_revenue_path() -> Result<()> {
    let engine = KpiEngine::new(EngineConfig::default())?;
    let table = read_encounter_csv(practice_month_csv().as_bytes())?;
    let revenue_report = engine.compute_revenue(&table)?;

    // Feed the enriched rows back through the KPI path as a precomputed-revenue table
    let json = serde_json::to_string(&revenue_report.encounters)?;
    let enriched_table = read_encounter_json(&json)?;
    let kpis = engine.compute_monthly_kpis(&enriched_table)?;

    let expected = revenue_report.monthly_kpis();
    assert_eq!(kpis.monthly.len(), expected.len());
    for (actual, expected) in kpis.monthly.iter().zip(&expected) {
        assert_eq!(actual.month, expected.month);
        assert_eq!(actual.encounters, expected.encounters);
        assert!((actual.revenue - expected.revenue).abs() < 1e-9);
        assert!((actual.client_hours - expected.client_hours).abs() < 1e-9);
        assert!((actual.utilization_rate - expected.utilization_rate).abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn test_reports_written_for_revenue_run() -> Result<()> {
    let engine = KpiEngine::new(EngineConfig::default())?;
    let table = read_encounter_csv(practice_month_csv().as_bytes())?;
    let report = engine.compute_revenue(&table)?;

    let dir = tempfile::tempdir()?;
    let config = TrendReportConfig::new(dir.path())
        .with_revenue_goal(250.0)
        .with_utilization_goal(0.02);
    let paths = engine.write_reports(&report, &config)?;

    assert_eq!(paths.len(), 4);
    for path in &paths {
        assert!(path.exists(), "{} missing", path.display());
    }

    let utilization = fs::read_to_string(dir.path().join("utilization_trends.csv"))?;
    assert!(utilization.starts_with("month,value,goal\n"));
    assert_eq!(utilization.lines().count(), 1 + report.monthly_total.len());

    let markdown = TrendReporter::new(&report.monthly_kpis()).to_markdown(&config);
    assert!(markdown.contains("Revenue goal: 250.00"));
    Ok(())
}
