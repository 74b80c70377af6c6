use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::ids::{ProjectId, TeamId};
use crate::domain::project_consolidation::ProjectConsolidation;
use crate::domain::replenishing_consolidation::ReplenishingConsolidation;
use crate::domain::team_consolidation::TeamConsolidation;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot {key} was modified concurrently")]
    Conflict { key: String },
    #[error("failed to access snapshot store {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse snapshot store {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("snapshot store contains {kind} {key} more than once")]
    DuplicateKey { kind: &'static str, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Persistence for weekly snapshots. Rows are unique per `(id, date)`; an
/// upsert on an existing key replaces the row atomically.
pub trait ConsolidationStore {
    fn upsert_project(&mut self, row: ProjectConsolidation) -> Result<UpsertOutcome, StoreError>;
    fn upsert_team(&mut self, row: TeamConsolidation) -> Result<UpsertOutcome, StoreError>;
    fn upsert_replenishing(
        &mut self,
        row: ReplenishingConsolidation,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Snapshots of a project, oldest first.
    fn project_consolidations(&self, id: ProjectId) -> Vec<ProjectConsolidation>;
    fn team_consolidations(&self, id: TeamId) -> Vec<TeamConsolidation>;
    fn replenishing_consolidations(&self, team: TeamId) -> Vec<ReplenishingConsolidation>;
}

/// The snapshot tables, keyed so iteration runs by id then date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidationTables {
    pub projects: BTreeMap<(ProjectId, NaiveDate), ProjectConsolidation>,
    pub teams: BTreeMap<(TeamId, NaiveDate), TeamConsolidation>,
    pub replenishing: BTreeMap<(ProjectId, NaiveDate), ReplenishingConsolidation>,
}

impl ConsolidationTables {
    pub fn upsert_project(&mut self, row: ProjectConsolidation) -> UpsertOutcome {
        outcome(self.projects.insert(row.key(), row).is_some())
    }

    pub fn upsert_team(&mut self, row: TeamConsolidation) -> UpsertOutcome {
        outcome(self.teams.insert(row.key(), row).is_some())
    }

    pub fn upsert_replenishing(&mut self, row: ReplenishingConsolidation) -> UpsertOutcome {
        outcome(self.replenishing.insert(row.key(), row).is_some())
    }

    pub fn project_consolidations(&self, id: ProjectId) -> Vec<ProjectConsolidation> {
        self.projects
            .range((id, NaiveDate::MIN)..=(id, NaiveDate::MAX))
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn team_consolidations(&self, id: TeamId) -> Vec<TeamConsolidation> {
        self.teams
            .range((id, NaiveDate::MIN)..=(id, NaiveDate::MAX))
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn replenishing_consolidations(&self, team: TeamId) -> Vec<ReplenishingConsolidation> {
        let mut rows: Vec<ReplenishingConsolidation> = self
            .replenishing
            .values()
            .filter(|row| row.team_id == team)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.consolidation_date, row.project_id));
        rows
    }
}

fn outcome(replaced: bool) -> UpsertOutcome {
    if replaced {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryConsolidationStore {
    tables: ConsolidationTables,
}

impl InMemoryConsolidationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsolidationStore for InMemoryConsolidationStore {
    fn upsert_project(&mut self, row: ProjectConsolidation) -> Result<UpsertOutcome, StoreError> {
        Ok(self.tables.upsert_project(row))
    }

    fn upsert_team(&mut self, row: TeamConsolidation) -> Result<UpsertOutcome, StoreError> {
        Ok(self.tables.upsert_team(row))
    }

    fn upsert_replenishing(
        &mut self,
        row: ReplenishingConsolidation,
    ) -> Result<UpsertOutcome, StoreError> {
        Ok(self.tables.upsert_replenishing(row))
    }

    fn project_consolidations(&self, id: ProjectId) -> Vec<ProjectConsolidation> {
        self.tables.project_consolidations(id)
    }

    fn team_consolidations(&self, id: TeamId) -> Vec<TeamConsolidation> {
        self.tables.team_consolidations(id)
    }

    fn replenishing_consolidations(&self, team: TeamId) -> Vec<ReplenishingConsolidation> {
        self.tables.replenishing_consolidations(team)
    }
}
