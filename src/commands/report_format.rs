use crate::domain::distribution::Forecast;
use crate::domain::replenishing_consolidation::ReplenishingConsolidation;
use crate::services::project_consolidation_job::BatchReport;
use crate::services::throughput_forecast::ForecastReport;

pub fn format_forecast_report(report: &ForecastReport) -> String {
    let mut lines = Vec::new();
    lines.push("Forecast Report".to_string());
    lines.push(format!("Data source: {}", report.data_source));
    lines.push(format!("Trials: {}", report.trials));
    lines.push(format!("Backlog: {}", report.backlog));
    lines.push(format!("History periods: {}", report.history_periods));
    lines.push(String::new());

    match &report.forecast {
        Forecast::Available(summary) => {
            lines.push("Percentile | Weeks".to_string());
            lines.push("-----------|------".to_string());
            lines.push(format!("Min | {}", summary.weeks_min));
            lines.push(format!("P50 | {:.2}", summary.weeks_p50));
            lines.push(format!("P80 | {:.2}", summary.weeks_p80));
            lines.push(format!("Max | {}", summary.weeks_max));
            lines.push(format!("Std dev: {:.2}", summary.weeks_std_dev));
            if let Some(weeks) = report.weeks_to_deadline {
                lines.push(format!(
                    "Odds to finish within {weeks:.1} weeks: {:.0}%",
                    summary.odds_to_deadline * 100.0
                ));
            }
        }
        Forecast::Unavailable { reason } => {
            lines.push(format!("Forecast unavailable: {}", reason.describe()));
        }
    }

    lines.join("\n")
}

pub fn format_batch_report(report: &BatchReport) -> String {
    let mut lines = Vec::new();
    for (project_id, run) in &report.succeeded {
        lines.push(format!(
            "Project {project_id}: {} weeks consolidated ({} new, {} updated)",
            run.weeks, run.inserted, run.updated
        ));
    }
    for (project_id, err) in &report.failed {
        lines.push(format!("Project {project_id}: failed: {err}"));
    }
    lines.push(format!(
        "{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    ));
    lines.join("\n")
}

pub fn format_replenishing_table(rows: &[ReplenishingConsolidation]) -> String {
    let mut lines = Vec::new();
    lines.push("Project | Backlog | Weeks left | Pressure | Relative % | WIP | P80 weeks | Happiness".to_string());
    lines.push("--------|---------|------------|----------|------------|-----|-----------|----------".to_string());
    for row in rows {
        let p80 = match row.monte_carlo.weeks_p80() {
            Some(weeks) => format!("{weeks:.2}"),
            None => "n/a".to_string(),
        };
        lines.push(format!(
            "{} | {} | {:.2} | {:.2} | {:.1} | {}/{} | {} | {:.2}",
            row.project_id,
            row.remaining_backlog,
            row.weeks_to_deadline,
            row.flow_pressure,
            row.relative_flow_pressure,
            row.work_in_progress,
            row.max_work_in_progress,
            p80,
            row.customer_happiness
        ));
    }
    lines.join("\n")
}
