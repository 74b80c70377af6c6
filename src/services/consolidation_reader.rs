use std::cell::OnceCell;

use serde::Serialize;

use crate::domain::demand::{ClassOfService, Demand, DemandType};
use crate::domain::project_consolidation::ProjectConsolidation;
use crate::services::flow_repository::{FlowRepository, RepositoryError};
use crate::services::statistics_service::percentile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandFilter {
    All,
    Type(DemandType),
    Class(ClassOfService),
}

impl DemandFilter {
    pub fn matches(&self, demand: &Demand) -> bool {
        match self {
            DemandFilter::All => true,
            DemandFilter::Type(demand_type) => demand.demand_type == *demand_type,
            DemandFilter::Class(class) => demand.class_of_service == *class,
        }
    }
}

/// Lead time p80 of a snapshot's finished demands, split by type and class.
/// Groups without finished demands are left out.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LeadTimeBreakdown {
    pub overall: f64,
    pub by_demand_type: Vec<(DemandType, f64)>,
    pub by_class_of_service: Vec<(ClassOfService, f64)>,
}

/// Derived lead-time views over a stored snapshot. The finished demands are
/// fetched on first use and reused afterwards; the snapshot is never changed.
pub struct ConsolidationReader<'a> {
    snapshot: &'a ProjectConsolidation,
    repository: &'a dyn FlowRepository,
    finished: OnceCell<Vec<Demand>>,
}

impl<'a> ConsolidationReader<'a> {
    pub fn new(snapshot: &'a ProjectConsolidation, repository: &'a dyn FlowRepository) -> Self {
        Self {
            snapshot,
            repository,
            finished: OnceCell::new(),
        }
    }

    pub fn snapshot(&self) -> &ProjectConsolidation {
        self.snapshot
    }

    pub fn finished_demands(&self) -> Result<&[Demand], RepositoryError> {
        if let Some(demands) = self.finished.get() {
            return Ok(demands);
        }
        let fetched = self
            .repository
            .demands_by_ids(&self.snapshot.demands_finished_ids)?;
        Ok(self.finished.get_or_init(|| fetched))
    }

    pub fn lead_times(&self, filter: DemandFilter) -> Result<Vec<f64>, RepositoryError> {
        Ok(self
            .finished_demands()?
            .iter()
            .filter(|demand| filter.matches(demand))
            .filter_map(Demand::leadtime_days)
            .collect())
    }

    pub fn lead_time_percentile(
        &self,
        percentile_rank: f64,
        filter: DemandFilter,
    ) -> Result<f64, RepositoryError> {
        Ok(percentile(percentile_rank, &self.lead_times(filter)?))
    }

    pub fn lead_time_p80(&self, filter: DemandFilter) -> Result<f64, RepositoryError> {
        self.lead_time_percentile(80.0, filter)
    }

    pub fn lead_time_breakdown(&self) -> Result<LeadTimeBreakdown, RepositoryError> {
        let mut by_demand_type = Vec::new();
        for demand_type in DemandType::ALL {
            let lead_times = self.lead_times(DemandFilter::Type(demand_type))?;
            if !lead_times.is_empty() {
                by_demand_type.push((demand_type, percentile(80.0, &lead_times)));
            }
        }
        let mut by_class_of_service = Vec::new();
        for class in ClassOfService::ALL {
            let lead_times = self.lead_times(DemandFilter::Class(class))?;
            if !lead_times.is_empty() {
                by_class_of_service.push((class, percentile(80.0, &lead_times)));
            }
        }
        Ok(LeadTimeBreakdown {
            overall: self.lead_time_p80(DemandFilter::All)?,
            by_demand_type,
            by_class_of_service,
        })
    }
}
