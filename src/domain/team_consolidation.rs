use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::ids::TeamId;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamConsolidation {
    pub team_id: TeamId,
    pub consolidation_date: NaiveDate,
    pub last_data_in_week: bool,
    pub last_data_in_month: bool,
    pub last_data_in_year: bool,
    pub wip_limit: u32,
    pub average_wip: f64,
    pub qty_demands_created: u32,
    pub qty_demands_finished: u32,
    pub throughput_in_week: u32,
    pub team_throughput_data: Vec<u32>,
    pub lead_time_p80: f64,
    pub lead_time_p80_in_week: f64,
}

impl TeamConsolidation {
    pub fn key(&self) -> (TeamId, NaiveDate) {
        (self.team_id, self.consolidation_date)
    }
}
