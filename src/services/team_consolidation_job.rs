use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::demand::Demand;
use crate::domain::ids::TeamId;
use crate::domain::project::Team;
use crate::domain::team_consolidation::TeamConsolidation;
use crate::services::consolidation_config::ConsolidationConfig;
use crate::services::consolidation_job::{
    CancellationToken, ConsolidationError, ConsolidationRun, upsert_with_retry,
};
use crate::services::consolidation_store::ConsolidationStore;
use crate::services::demand_queries;
use crate::services::flow_repository::FlowRepository;
use crate::services::statistics_service::percentile;
use crate::services::time_service::{
    WeekWalk, WeekWindow, beginning_of_day, beginning_of_week, end_of_day, end_of_week,
    weeks_between,
};
use crate::services::work_item_flow::{Periodicity, throughput_per_period};

/// Weekly team snapshots, from the earliest start among the team's projects
/// up to the week of `today`.
pub struct TeamConsolidationJob<'a> {
    repository: &'a dyn FlowRepository,
    store: &'a mut dyn ConsolidationStore,
    config: &'a ConsolidationConfig,
    cancellation: CancellationToken,
}

impl<'a> TeamConsolidationJob<'a> {
    pub fn new(
        repository: &'a dyn FlowRepository,
        store: &'a mut dyn ConsolidationStore,
        config: &'a ConsolidationConfig,
    ) -> Self {
        Self {
            repository,
            store,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn run(
        &mut self,
        team_id: TeamId,
        today: NaiveDate,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        let team = self.repository.find_team(team_id)?;
        let projects = self.repository.projects_for_team(team_id)?;
        let Some(first_start) = projects.iter().map(|project| project.start_date).min() else {
            info!(team_id = %team_id, "team has no projects, nothing to consolidate");
            return Ok(ConsolidationRun::default());
        };
        let demands = self.repository.demands_for_team(team_id)?;

        let walk = WeekWalk::new(beginning_of_week(first_start), end_of_week(today));
        let weeks = walk.remaining();
        if weeks > self.config.max_weeks {
            return Err(ConsolidationError::TooManyPeriods {
                owner: format!("team {team_id}"),
                weeks,
                max_weeks: self.config.max_weeks,
            });
        }
        info!(team_id = %team_id, weeks, "consolidating team");

        let mut run = ConsolidationRun::default();
        for window in walk {
            if self.cancellation.is_cancelled() {
                return Err(ConsolidationError::Cancelled {
                    completed_weeks: run.weeks,
                });
            }
            let row = build_team_consolidation(&team, &demands, first_start, &window);
            debug!(
                team_id = %team_id,
                consolidation_date = %window.end_of_week,
                "upserting team consolidation"
            );
            let store = &mut *self.store;
            let outcome =
                upsert_with_retry(self.config.upsert_retries, || store.upsert_team(row.clone()))?;
            run.record(outcome);
        }
        Ok(run)
    }
}

pub fn build_team_consolidation(
    team: &Team,
    demands: &[Demand],
    first_start: NaiveDate,
    window: &WeekWindow,
) -> TeamConsolidation {
    let week_start = beginning_of_day(window.beginning_of_week);
    let instant = end_of_day(window.end_of_week);

    let known = demand_queries::known_until(demands, instant);
    let created_in_week = known
        .iter()
        .filter(|demand| demand.created_date >= week_start)
        .count() as u32;
    let finished = demand_queries::finished_until(&known, instant);
    let finished_in_week = demand_queries::finished_between(&known, week_start, instant);

    let boundaries = weeks_between(Some(first_start), Some(window.end_of_week));
    let team_throughput_data = throughput_per_period(demands, &boundaries, Periodicity::Week);

    TeamConsolidation {
        team_id: team.id,
        consolidation_date: window.end_of_week,
        last_data_in_week: true,
        last_data_in_month: window.is_last_in_month(),
        last_data_in_year: window.is_last_in_year(),
        wip_limit: team.max_work_in_progress,
        average_wip: demand_queries::average_wip_in_week(&known, window),
        qty_demands_created: created_in_week,
        qty_demands_finished: finished.len() as u32,
        throughput_in_week: finished_in_week.len() as u32,
        team_throughput_data,
        lead_time_p80: percentile(80.0, &demand_queries::lead_times(&finished)),
        lead_time_p80_in_week: percentile(80.0, &demand_queries::lead_times(&finished_in_week)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::consolidation_store::InMemoryConsolidationStore;
    use crate::services::flow_repository::{InMemoryFlowRepository, RepositoryError};
    use crate::test_support::{build_team, on_date, seeded_config, three_week_data_set};

    #[test]
    fn team_weeks_follow_throughput_and_wip() {
        let repository = InMemoryFlowRepository::new(three_week_data_set());
        let mut store = InMemoryConsolidationStore::new();
        let config = seeded_config();

        let run = TeamConsolidationJob::new(&repository, &mut store, &config)
            .run(TeamId(1), on_date(2024, 1, 14))
            .unwrap();
        assert_eq!(run.weeks, 2);

        let rows = store.team_consolidations(TeamId(1));
        assert_eq!(rows[0].qty_demands_created, 4);
        assert_eq!(rows[0].throughput_in_week, 1);
        assert_eq!(rows[1].qty_demands_created, 0);
        assert_eq!(rows[1].qty_demands_finished, 3);
        assert_eq!(rows[1].team_throughput_data, vec![1, 2]);
        assert_eq!(rows[1].wip_limit, 4);
        assert!(rows[1].lead_time_p80 > rows[0].lead_time_p80);
    }

    #[test]
    fn team_without_projects_writes_nothing() {
        let mut data = three_week_data_set();
        data.teams.push(build_team(2, 3));
        let repository = InMemoryFlowRepository::new(data);
        let mut store = InMemoryConsolidationStore::new();
        let config = seeded_config();

        let run = TeamConsolidationJob::new(&repository, &mut store, &config)
            .run(TeamId(2), on_date(2024, 1, 14))
            .unwrap();
        assert_eq!(run, ConsolidationRun::default());
    }

    #[test]
    fn unknown_team_is_reported() {
        let repository = InMemoryFlowRepository::new(three_week_data_set());
        let mut store = InMemoryConsolidationStore::new();
        let config = seeded_config();

        let err = TeamConsolidationJob::new(&repository, &mut store, &config)
            .run(TeamId(5), on_date(2024, 1, 14))
            .unwrap_err();
        assert!(matches!(
            err,
            ConsolidationError::Repository(RepositoryError::TeamNotFound(TeamId(5)))
        ));
    }
}
