use chrono::NaiveDateTime;

use crate::domain::ids::{DemandId, ProjectId, StageId};

/// A pipeline step. Stages are ordered ascending from upstream to downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub order: i32,
    pub project_ids: Vec<ProjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub demand_id: DemandId,
    pub stage_id: StageId,
    pub last_time_in: NaiveDateTime,
    pub last_time_out: Option<NaiveDateTime>,
}
