use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::distribution::Forecast;
use crate::domain::ids::{ProjectId, TeamId};

/// Inputs for a team's replenishing meeting, one row per active project.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplenishingConsolidation {
    pub project_id: ProjectId,
    pub team_id: TeamId,
    pub consolidation_date: NaiveDate,
    pub remaining_backlog: u32,
    pub weeks_to_deadline: f64,
    pub flow_pressure: f64,
    /// Percentage of the team's summed flow pressure.
    pub relative_flow_pressure: f64,
    pub work_in_progress: u32,
    pub max_work_in_progress: u32,
    pub qty_selected_last_week: u32,
    pub lead_time_p80: f64,
    pub project_throughput_data: Vec<u32>,
    pub monte_carlo: Forecast,
    pub customer_happiness: f64,
    pub project_based_risks_to_deadline: f64,
}

impl ReplenishingConsolidation {
    pub fn key(&self) -> (ProjectId, NaiveDate) {
        (self.project_id, self.consolidation_date)
    }
}
