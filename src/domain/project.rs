use chrono::NaiveDate;

use crate::domain::ids::{ProductId, ProjectId, TeamId};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_work_in_progress: u32,
    /// Demands expected but not yet registered as records.
    pub initial_scope: u32,
    pub team_id: TeamId,
    pub product_id: Option<ProductId>,
}

impl Project {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub max_work_in_progress: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}
