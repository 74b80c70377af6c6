use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::distribution::{Forecast, HistogramBin};
use crate::domain::ids::{DemandId, ProjectId};

/// Weekly snapshot of a project's flow metrics, keyed by
/// `(project_id, consolidation_date)`. A rerun for the same key replaces it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectConsolidation {
    pub project_id: ProjectId,
    pub consolidation_date: NaiveDate,
    pub last_data_in_week: bool,
    pub last_data_in_month: bool,
    pub last_data_in_year: bool,

    pub wip_limit: u32,
    pub current_wip: f64,

    pub demands_ids: Vec<DemandId>,
    pub demands_finished_ids: Vec<DemandId>,
    pub demands_finished_in_week_ids: Vec<DemandId>,
    pub demands_in_wip_ids: Vec<DemandId>,

    pub project_scope: u32,
    pub remaining_backlog: u32,
    pub project_aging: i64,

    pub project_throughput: u32,
    pub project_throughput_data: Vec<u32>,
    pub team_throughput_data: Vec<u32>,
    pub product_throughput_data: Vec<u32>,

    pub demands_lead_times: Vec<f64>,
    pub lead_time_min: f64,
    pub lead_time_max: f64,
    pub lead_time_average: f64,
    pub lead_time_std_dev: f64,
    pub lead_time_p25: f64,
    pub lead_time_p75: f64,
    pub lead_time_p80: f64,
    pub lead_time_p80_in_week: f64,
    pub lead_time_histogram: Vec<HistogramBin>,

    pub bugs_opened: u32,
    pub bugs_closed: u32,
    pub flow_pressure: f64,

    pub project_monte_carlo: Forecast,
    pub team_monte_carlo: Forecast,
    pub product_monte_carlo: Forecast,
}

impl ProjectConsolidation {
    pub fn key(&self) -> (ProjectId, NaiveDate) {
        (self.project_id, self.consolidation_date)
    }

    pub fn delivered(&self) -> usize {
        self.demands_finished_ids.len()
    }

    /// Share of the scope already delivered, `0.0` for an empty scope.
    pub fn percentage_complete(&self) -> f64 {
        if self.project_scope == 0 {
            return 0.0;
        }
        self.delivered() as f64 / self.project_scope as f64
    }
}
