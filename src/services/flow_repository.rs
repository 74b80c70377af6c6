use std::collections::HashSet;

use thiserror::Error;

use crate::domain::demand::Demand;
use crate::domain::ids::{DemandId, ProductId, ProjectId, TeamId};
use crate::domain::project::{Product, Project, Team};
use crate::domain::stage::{Stage, Transition};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),
    #[error("team {0} not found")]
    TeamNotFound(TeamId),
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
}

/// Read-only access to the persisted flow records the consolidations are
/// computed from.
pub trait FlowRepository {
    fn projects(&self) -> Result<Vec<Project>, RepositoryError>;
    fn find_project(&self, id: ProjectId) -> Result<Project, RepositoryError>;
    fn projects_for_team(&self, id: TeamId) -> Result<Vec<Project>, RepositoryError>;
    fn find_team(&self, id: TeamId) -> Result<Team, RepositoryError>;
    fn find_product(&self, id: ProductId) -> Result<Product, RepositoryError>;
    fn demands_for_project(&self, id: ProjectId) -> Result<Vec<Demand>, RepositoryError>;
    fn demands_for_team(&self, id: TeamId) -> Result<Vec<Demand>, RepositoryError>;
    fn demands_for_product(&self, id: ProductId) -> Result<Vec<Demand>, RepositoryError>;
    fn demands_by_ids(&self, ids: &[DemandId]) -> Result<Vec<Demand>, RepositoryError>;
    fn stages_for_project(&self, id: ProjectId) -> Result<Vec<Stage>, RepositoryError>;
    fn transitions_for_demands(&self, ids: &[DemandId]) -> Result<Vec<Transition>, RepositoryError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowDataSet {
    pub projects: Vec<Project>,
    pub teams: Vec<Team>,
    pub products: Vec<Product>,
    pub stages: Vec<Stage>,
    pub demands: Vec<Demand>,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFlowRepository {
    data: FlowDataSet,
}

impl InMemoryFlowRepository {
    pub fn new(data: FlowDataSet) -> Self {
        Self { data }
    }

    fn select_demands(&self, predicate: impl Fn(&Demand) -> bool) -> Vec<Demand> {
        let mut demands: Vec<Demand> = self
            .data
            .demands
            .iter()
            .filter(|demand| predicate(demand))
            .cloned()
            .collect();
        demands.sort_by_key(|demand| demand.id);
        demands
    }
}

impl FlowRepository for InMemoryFlowRepository {
    fn projects(&self) -> Result<Vec<Project>, RepositoryError> {
        let mut projects = self.data.projects.clone();
        projects.sort_by_key(|project| project.id);
        Ok(projects)
    }

    fn find_project(&self, id: ProjectId) -> Result<Project, RepositoryError> {
        self.data
            .projects
            .iter()
            .find(|project| project.id == id)
            .cloned()
            .ok_or(RepositoryError::ProjectNotFound(id))
    }

    fn projects_for_team(&self, id: TeamId) -> Result<Vec<Project>, RepositoryError> {
        let mut projects: Vec<Project> = self
            .data
            .projects
            .iter()
            .filter(|project| project.team_id == id)
            .cloned()
            .collect();
        projects.sort_by_key(|project| project.id);
        Ok(projects)
    }

    fn find_team(&self, id: TeamId) -> Result<Team, RepositoryError> {
        self.data
            .teams
            .iter()
            .find(|team| team.id == id)
            .cloned()
            .ok_or(RepositoryError::TeamNotFound(id))
    }

    fn find_product(&self, id: ProductId) -> Result<Product, RepositoryError> {
        self.data
            .products
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or(RepositoryError::ProductNotFound(id))
    }

    fn demands_for_project(&self, id: ProjectId) -> Result<Vec<Demand>, RepositoryError> {
        Ok(self.select_demands(|demand| demand.project_id == id))
    }

    fn demands_for_team(&self, id: TeamId) -> Result<Vec<Demand>, RepositoryError> {
        Ok(self.select_demands(|demand| demand.team_id == id))
    }

    fn demands_for_product(&self, id: ProductId) -> Result<Vec<Demand>, RepositoryError> {
        Ok(self.select_demands(|demand| demand.product_id == Some(id)))
    }

    fn demands_by_ids(&self, ids: &[DemandId]) -> Result<Vec<Demand>, RepositoryError> {
        let wanted: HashSet<DemandId> = ids.iter().copied().collect();
        Ok(self.select_demands(|demand| wanted.contains(&demand.id)))
    }

    fn stages_for_project(&self, id: ProjectId) -> Result<Vec<Stage>, RepositoryError> {
        Ok(self
            .data
            .stages
            .iter()
            .filter(|stage| stage.project_ids.contains(&id))
            .cloned()
            .collect())
    }

    fn transitions_for_demands(&self, ids: &[DemandId]) -> Result<Vec<Transition>, RepositoryError> {
        let wanted: HashSet<DemandId> = ids.iter().copied().collect();
        Ok(self
            .data
            .transitions
            .iter()
            .filter(|transition| wanted.contains(&transition.demand_id))
            .cloned()
            .collect())
    }
}
