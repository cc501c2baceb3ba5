//! Trend hand-off for reporting collaborators.
//!
//! Writes one CSV series per tracked KPI (revenue, client hours, utilization, encounter
//! volume) plus a Markdown summary. Goals are passed per call; nothing here keeps state
//! between reports.

use crate::error::Result;
use crate::schema::MonthlyKpiRow;
use crate::utils::format_ratio;
use csv::Writer;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendMetric {
    Revenue,
    ClientHours,
    Utilization,
    EncounterVolume,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 4] = [
        TrendMetric::Revenue,
        TrendMetric::ClientHours,
        TrendMetric::Utilization,
        TrendMetric::EncounterVolume,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            TrendMetric::Revenue => "revenue_trends.csv",
            TrendMetric::ClientHours => "client_hours_trends.csv",
            TrendMetric::Utilization => "utilization_trends.csv",
            TrendMetric::EncounterVolume => "encounter_volume_trends.csv",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TrendMetric::Revenue => "Monthly Revenue",
            TrendMetric::ClientHours => "Monthly Client Hours",
            TrendMetric::Utilization => "Monthly Utilization",
            TrendMetric::EncounterVolume => "Monthly Encounter Volume",
        }
    }

    pub fn value(&self, row: &MonthlyKpiRow) -> f64 {
        match self {
            TrendMetric::Revenue => row.revenue,
            TrendMetric::ClientHours => row.client_hours,
            TrendMetric::Utilization => row.utilization_rate,
            TrendMetric::EncounterVolume => row.encounters as f64,
        }
    }

    fn precision(&self) -> usize {
        match self {
            TrendMetric::Revenue | TrendMetric::ClientHours => 2,
            TrendMetric::Utilization => 4,
            TrendMetric::EncounterVolume => 0,
        }
    }

    fn goal(&self, config: &TrendReportConfig) -> Option<f64> {
        match self {
            TrendMetric::Revenue => config.revenue_goal,
            TrendMetric::Utilization => config.utilization_goal,
            TrendMetric::ClientHours | TrendMetric::EncounterVolume => None,
        }
    }
}

/// Per-call report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReportConfig {
    pub out_dir: PathBuf,
    /// Monthly revenue target in currency units
    #[serde(default)]
    pub revenue_goal: Option<f64>,
    /// Target utilization as a ratio (0.75 = 75%)
    #[serde(default)]
    pub utilization_goal: Option<f64>,
}

impl TrendReportConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            revenue_goal: None,
            utilization_goal: None,
        }
    }

    pub fn with_revenue_goal(mut self, goal: f64) -> Self {
        self.revenue_goal = Some(goal);
        self
    }

    pub fn with_utilization_goal(mut self, goal: f64) -> Self {
        self.utilization_goal = Some(goal);
        self
    }
}

pub struct TrendReporter<'a> {
    kpis: &'a [MonthlyKpiRow],
}

impl<'a> TrendReporter<'a> {
    pub fn new(kpis: &'a [MonthlyKpiRow]) -> Self {
        Self { kpis }
    }

    /// Writes all four trend series into `config.out_dir`, creating it if needed.
    /// Returns the written paths in [`TrendMetric::ALL`] order.
    pub fn write_all(&self, config: &TrendReportConfig) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&config.out_dir)?;

        let mut written = Vec::with_capacity(TrendMetric::ALL.len());
        for metric in TrendMetric::ALL {
            written.push(self.write_series(metric, config)?);
        }

        info!(
            "Wrote {} trend series for {} months to {}",
            written.len(),
            self.kpis.len(),
            config.out_dir.display()
        );

        Ok(written)
    }

    pub fn write_series(&self, metric: TrendMetric, config: &TrendReportConfig) -> Result<PathBuf> {
        let path = config.out_dir.join(metric.file_name());
        let goal = metric.goal(config);

        let mut writer = Writer::from_path(&path)?;
        if goal.is_some() {
            writer.write_record(["month", "value", "goal"])?;
        } else {
            writer.write_record(["month", "value"])?;
        }

        for row in self.kpis {
            let month = row.month.format("%Y-%m-%d").to_string();
            let value = format_ratio(metric.value(row), metric.precision());
            match goal {
                Some(goal) => {
                    let goal = format_ratio(goal, metric.precision());
                    writer.write_record([month, value, goal])?;
                }
                None => writer.write_record([month, value])?,
            }
        }
        writer.flush()?;

        Ok(path)
    }

    /// Markdown KPI table. Undefined ratios render as `N/A`.
    pub fn to_markdown(&self, config: &TrendReportConfig) -> String {
        let mut output = String::new();

        output.push_str("# Monthly KPIs\n\n");
        output.push_str(
            "| Month | Encounters | Client Hours | Revenue | Revenue / Hour | Revenue / Encounter | Utilization |\n",
        );
        output.push_str("|---|---:|---:|---:|---:|---:|---:|\n");

        for row in self.kpis {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                row.month.format("%Y-%m"),
                row.encounters,
                format_ratio(row.client_hours, 2),
                format_ratio(row.revenue, 2),
                format_ratio(row.revenue_per_hour, 2),
                format_ratio(row.revenue_per_encounter, 2),
                format_utilization(row.utilization_rate),
            ));
        }

        if let Some(goal) = config.revenue_goal {
            let met = self.kpis.iter().filter(|r| r.revenue >= goal).count();
            output.push_str(&format!(
                "\nRevenue goal: {:.2} (met in {} of {} months)\n",
                goal,
                met,
                self.kpis.len()
            ));
        }

        if let Some(goal) = config.utilization_goal {
            let met = self
                .kpis
                .iter()
                .filter(|r| r.utilization_rate >= goal)
                .count();
            output.push_str(&format!(
                "\nUtilization goal: {} (met in {} of {} months)\n",
                format_utilization(goal),
                met,
                self.kpis.len()
            ));
        }

        output
    }
}

fn format_utilization(rate: f64) -> String {
    if rate.is_finite() {
        format!("{:.1}%", rate * 100.0)
    } else {
        "N/A".to_string()
    }
}

pub fn write_trend_reports(
    kpis: &[MonthlyKpiRow],
    config: &TrendReportConfig,
) -> Result<Vec<PathBuf>> {
    TrendReporter::new(kpis).write_all(config)
}
