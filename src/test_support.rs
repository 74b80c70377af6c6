use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::demand::{ClassOfService, Demand, DemandType};
use crate::domain::ids::{DemandId, ProductId, ProjectId, StageId, TeamId};
use crate::domain::project::{Product, Project, Team};
use crate::domain::project_consolidation::ProjectConsolidation;
use crate::domain::replenishing_consolidation::ReplenishingConsolidation;
use crate::domain::stage::{Stage, Transition};
use crate::domain::team_consolidation::TeamConsolidation;
use crate::services::consolidation_config::ConsolidationConfig;
use crate::services::consolidation_store::{
    ConsolidationStore, InMemoryConsolidationStore, StoreError, UpsertOutcome,
};
use crate::services::flow_repository::FlowDataSet;
use crate::services::statistics_service::ThroughputSampler;

// A ThroughputSampler that always draws the same historical period
pub struct FixedIndexSampler(pub usize);

impl ThroughputSampler for FixedIndexSampler {
    fn pick_index(&mut self, len: usize) -> usize {
        self.0.min(len - 1)
    }
}

pub fn on_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
    on_date(year, month, day).and_hms_opt(0, 0, 0).unwrap()
}

pub fn build_demand(id: u64, created: NaiveDateTime) -> Demand {
    Demand {
        id: DemandId(id),
        external_id: format!("FC-{id}"),
        project_id: ProjectId(1),
        team_id: TeamId(1),
        product_id: Some(ProductId(1)),
        demand_type: DemandType::Feature,
        class_of_service: ClassOfService::Standard,
        created_date: created,
        commitment_date: None,
        end_date: None,
        discarded_at: None,
    }
}

pub fn build_finished_demand(id: u64, committed: NaiveDateTime, done: NaiveDateTime) -> Demand {
    let mut demand = build_demand(id, committed);
    demand.commitment_date = Some(committed);
    demand.end_date = Some(done);
    demand
}

pub fn build_stage(id: u64, name: &str, order: i32) -> Stage {
    Stage {
        id: StageId(id),
        name: name.to_string(),
        order,
        project_ids: vec![ProjectId(1)],
    }
}

pub fn build_transition(demand_id: u64, stage_id: u64, last_time_in: NaiveDateTime) -> Transition {
    Transition {
        demand_id: DemandId(demand_id),
        stage_id: StageId(stage_id),
        last_time_in,
        last_time_out: None,
    }
}

pub fn build_project(id: u64, start: NaiveDate, end: NaiveDate) -> Project {
    Project {
        id: ProjectId(id),
        name: format!("Project {id}"),
        start_date: start,
        end_date: end,
        max_work_in_progress: 2,
        initial_scope: 0,
        team_id: TeamId(1),
        product_id: Some(ProductId(1)),
    }
}

pub fn build_team(id: u64, max_work_in_progress: u32) -> Team {
    Team {
        id: TeamId(id),
        name: format!("Team {id}"),
        max_work_in_progress,
    }
}

/// Project 1 (2024-01-01..2024-01-21) with three demands finishing in weeks
/// 1, 2 and 2, owned by team 1 and product 1.
pub fn three_week_data_set() -> FlowDataSet {
    FlowDataSet {
        projects: vec![build_project(1, on_date(2024, 1, 1), on_date(2024, 1, 21))],
        teams: vec![build_team(1, 4)],
        products: vec![Product {
            id: ProductId(1),
            name: "Product 1".to_string(),
        }],
        stages: Vec::new(),
        demands: vec![
            build_finished_demand(1, at(2024, 1, 1), at(2024, 1, 4)),
            build_finished_demand(2, at(2024, 1, 2), at(2024, 1, 9)),
            build_finished_demand(3, at(2024, 1, 3), at(2024, 1, 12)),
            build_demand(4, at(2024, 1, 3)),
        ],
        transitions: Vec::new(),
    }
}

/// Small, reproducible settings for job tests.
pub fn seeded_config() -> ConsolidationConfig {
    ConsolidationConfig {
        trials: 50,
        seed: Some(7),
        ..ConsolidationConfig::default()
    }
}

pub fn build_team_consolidation(team_id: u64, date: NaiveDate) -> TeamConsolidation {
    TeamConsolidation {
        team_id: TeamId(team_id),
        consolidation_date: date,
        last_data_in_week: true,
        last_data_in_month: false,
        last_data_in_year: false,
        wip_limit: 4,
        average_wip: 1.5,
        qty_demands_created: 3,
        qty_demands_finished: 1,
        throughput_in_week: 1,
        team_throughput_data: vec![1],
        lead_time_p80: 3.0,
        lead_time_p80_in_week: 3.0,
    }
}

/// An in-memory store whose first `conflicts` upserts report a concurrent write.
pub struct ConflictingStore {
    inner: InMemoryConsolidationStore,
    conflicts: u32,
}

impl ConflictingStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryConsolidationStore::new(),
            conflicts,
        }
    }

    fn conflict(&mut self, key: String) -> Result<(), StoreError> {
        if self.conflicts > 0 {
            self.conflicts -= 1;
            return Err(StoreError::Conflict { key });
        }
        Ok(())
    }
}

impl ConsolidationStore for ConflictingStore {
    fn upsert_project(&mut self, row: ProjectConsolidation) -> Result<UpsertOutcome, StoreError> {
        self.conflict(format!("{:?}", row.key()))?;
        self.inner.upsert_project(row)
    }

    fn upsert_team(&mut self, row: TeamConsolidation) -> Result<UpsertOutcome, StoreError> {
        self.conflict(format!("{:?}", row.key()))?;
        self.inner.upsert_team(row)
    }

    fn upsert_replenishing(
        &mut self,
        row: ReplenishingConsolidation,
    ) -> Result<UpsertOutcome, StoreError> {
        self.conflict(format!("{:?}", row.key()))?;
        self.inner.upsert_replenishing(row)
    }

    fn project_consolidations(&self, id: ProjectId) -> Vec<ProjectConsolidation> {
        self.inner.project_consolidations(id)
    }

    fn team_consolidations(&self, id: TeamId) -> Vec<TeamConsolidation> {
        self.inner.team_consolidations(id)
    }

    fn replenishing_consolidations(&self, team: TeamId) -> Vec<ReplenishingConsolidation> {
        self.inner.replenishing_consolidations(team)
    }
}
