use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::domain::demand::Demand;
use crate::domain::distribution::Forecast;
use crate::domain::ids::TeamId;
use crate::domain::project::Project;
use crate::domain::replenishing_consolidation::ReplenishingConsolidation;
use crate::services::consolidation_config::ConsolidationConfig;
use crate::services::consolidation_job::{
    ConsolidationError, ConsolidationRun, upsert_with_retry, week_sampler,
};
use crate::services::consolidation_store::ConsolidationStore;
use crate::services::demand_queries;
use crate::services::flow_repository::FlowRepository;
use crate::services::project_consolidation_job::{flow_pressure, weeks_to_deadline};
use crate::services::statistics_service::{ThroughputSampler, percentile, run_montecarlo};
use crate::services::time_service::{beginning_of_day, beginning_of_week, end_of_day, weeks_between};
use crate::services::work_item_flow::{Periodicity, throughput_per_period};

/// Builds the replenishing view of a team at `today`: one row per project
/// active on that day.
pub struct ReplenishingConsolidationJob<'a> {
    repository: &'a dyn FlowRepository,
    store: &'a mut dyn ConsolidationStore,
    config: &'a ConsolidationConfig,
}

impl<'a> ReplenishingConsolidationJob<'a> {
    pub fn new(
        repository: &'a dyn FlowRepository,
        store: &'a mut dyn ConsolidationStore,
        config: &'a ConsolidationConfig,
    ) -> Self {
        Self {
            repository,
            store,
            config,
        }
    }

    pub fn run(
        &mut self,
        team_id: TeamId,
        today: NaiveDate,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        self.repository.find_team(team_id)?;
        let active: Vec<Project> = self
            .repository
            .projects_for_team(team_id)?
            .into_iter()
            .filter(|project| project.is_active_on(today))
            .collect();
        info!(team_id = %team_id, projects = active.len(), "replenishing consolidation");

        let mut rows = Vec::with_capacity(active.len());
        for project in &active {
            let demands = self.repository.demands_for_project(project.id)?;
            let mut sampler = week_sampler(self.config.seed, project.id.0, today);
            rows.push(build_replenishing_row(
                project,
                &demands,
                today,
                self.config,
                &mut sampler,
            ));
        }
        apply_relative_flow_pressure(&mut rows);

        let mut run = ConsolidationRun::default();
        for row in rows {
            debug!(
                project_id = %row.project_id,
                flow_pressure = row.flow_pressure,
                "upserting replenishing consolidation"
            );
            let store = &mut *self.store;
            let outcome = upsert_with_retry(self.config.upsert_retries, || {
                store.upsert_replenishing(row.clone())
            })?;
            run.record(outcome);
        }
        Ok(run)
    }
}

pub fn build_replenishing_row(
    project: &Project,
    demands: &[Demand],
    today: NaiveDate,
    config: &ConsolidationConfig,
    sampler: &mut dyn ThroughputSampler,
) -> ReplenishingConsolidation {
    let instant = end_of_day(today);
    let known = demand_queries::known_until(demands, instant);
    let finished = demand_queries::finished_until(&known, instant);
    let remaining_backlog =
        demand_queries::remaining_backlog(&known, project.initial_scope, instant);
    let weeks_to_deadline = weeks_to_deadline(project, today);

    let this_week = beginning_of_day(beginning_of_week(today));
    let qty_selected_last_week = demand_queries::committed_between(
        &known,
        this_week - Duration::weeks(1),
        this_week - Duration::seconds(1),
    );

    let delivered: Vec<Demand> = finished.iter().map(|demand| (*demand).clone()).collect();
    let boundaries = weeks_between(Some(project.start_date), Some(today));
    let throughput = throughput_per_period(&delivered, &boundaries, Periodicity::Week);
    let samples = demand_queries::last_periods(&throughput, config.throughput_window);
    let monte_carlo = run_montecarlo(
        remaining_backlog as f64,
        &samples,
        config.trials,
        config.max_periods,
        sampler,
    )
    .summarize(weeks_to_deadline);
    let project_throughput_data: Vec<u32> =
        demand_queries::last_periods(&throughput, config.replenishing_throughput_window)
            .into_iter()
            .map(|value| value as u32)
            .collect();

    ReplenishingConsolidation {
        project_id: project.id,
        team_id: project.team_id,
        consolidation_date: today,
        remaining_backlog,
        weeks_to_deadline,
        flow_pressure: flow_pressure(remaining_backlog, weeks_to_deadline),
        relative_flow_pressure: 0.0,
        work_in_progress: demand_queries::in_wip_at(&known, instant).len() as u32,
        max_work_in_progress: project.max_work_in_progress,
        qty_selected_last_week,
        lead_time_p80: percentile(80.0, &demand_queries::lead_times(&finished)),
        project_throughput_data,
        customer_happiness: customer_happiness(weeks_to_deadline, &monte_carlo),
        project_based_risks_to_deadline: risk_to_deadline(&monte_carlo),
        monte_carlo,
    }
}

/// Weeks left over the forecast p80; above 1 the deadline looks safe.
pub fn customer_happiness(weeks_to_deadline: f64, forecast: &Forecast) -> f64 {
    match forecast.weeks_p80() {
        Some(p80) if p80 > 0.0 => weeks_to_deadline / p80,
        _ => 0.0,
    }
}

/// Share of trials missing the deadline; an unavailable forecast is full risk.
pub fn risk_to_deadline(forecast: &Forecast) -> f64 {
    forecast
        .summary()
        .map_or(1.0, |summary| 1.0 - summary.odds_to_deadline)
}

/// Each row's flow pressure as a percentage of the rows' total.
pub fn apply_relative_flow_pressure(rows: &mut [ReplenishingConsolidation]) {
    let total: f64 = rows.iter().map(|row| row.flow_pressure).sum();
    for row in rows.iter_mut() {
        row.relative_flow_pressure = if total > 0.0 {
            row.flow_pressure / total * 100.0
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::distribution::{MonteCarloSummary, UnavailableReason};
    use crate::domain::ids::ProjectId;
    use crate::services::consolidation_store::InMemoryConsolidationStore;
    use crate::services::flow_repository::{FlowDataSet, InMemoryFlowRepository};
    use crate::test_support::{
        FixedIndexSampler, at, build_demand, build_project, on_date, seeded_config,
        three_week_data_set,
    };

    fn two_project_data() -> FlowDataSet {
        let mut data = three_week_data_set();
        data.projects.push(build_project(2, on_date(2024, 1, 1), on_date(2024, 2, 25)));
        for id in 20..24 {
            let mut demand = build_demand(id, at(2024, 1, 2));
            demand.project_id = ProjectId(2);
            data.demands.push(demand);
        }
        data.projects.push(build_project(3, on_date(2024, 3, 1), on_date(2024, 4, 1)));
        data
    }

    #[test]
    fn only_active_projects_get_rows_and_pressure_sums_to_hundred() {
        let repository = InMemoryFlowRepository::new(two_project_data());
        let mut store = InMemoryConsolidationStore::new();
        let config = seeded_config();

        let run = ReplenishingConsolidationJob::new(&repository, &mut store, &config)
            .run(TeamId(1), on_date(2024, 1, 10))
            .unwrap();
        assert_eq!(run.weeks, 2);

        let rows = store.replenishing_consolidations(TeamId(1));
        let projects: Vec<ProjectId> = rows.iter().map(|row| row.project_id).collect();
        assert_eq!(projects, vec![ProjectId(1), ProjectId(2)]);

        let total: f64 = rows.iter().map(|row| row.relative_flow_pressure).sum();
        assert!((total - 100.0).abs() < 1e-9);

        let first = &rows[0];
        assert_eq!(first.remaining_backlog, 2);
        assert_eq!(first.qty_selected_last_week, 3);
        assert_eq!(first.work_in_progress, 1);
        // Demand 3 finishes after today and is not counted yet.
        assert_eq!(first.project_throughput_data, vec![1, 1]);
        assert_eq!(first.weeks_to_deadline, 11.0 / 7.0);
    }

    #[test]
    fn no_active_projects_write_nothing() {
        let repository = InMemoryFlowRepository::new(three_week_data_set());
        let mut store = InMemoryConsolidationStore::new();
        let config = seeded_config();

        let run = ReplenishingConsolidationJob::new(&repository, &mut store, &config)
            .run(TeamId(1), on_date(2024, 3, 1))
            .unwrap();
        assert_eq!(run, ConsolidationRun::default());
        assert!(store.replenishing_consolidations(TeamId(1)).is_empty());
    }

    #[test]
    fn zero_total_pressure_gives_zero_relative_pressure() {
        let project = build_project(1, on_date(2024, 1, 1), on_date(2024, 1, 21));
        let config = seeded_config();
        let mut sampler = FixedIndexSampler(0);
        let mut rows = vec![build_replenishing_row(
            &project,
            &[],
            on_date(2024, 1, 10),
            &config,
            &mut sampler,
        )];
        apply_relative_flow_pressure(&mut rows);

        assert_eq!(rows[0].flow_pressure, 0.0);
        assert_eq!(rows[0].relative_flow_pressure, 0.0);
        assert_eq!(rows[0].monte_carlo.summary().map(|s| s.weeks_max), Some(0));
    }

    #[test]
    fn happiness_and_risk_degrade_for_unavailable_forecasts() {
        let unavailable = Forecast::Unavailable {
            reason: UnavailableReason::NoThroughputHistory,
        };
        assert_eq!(customer_happiness(4.0, &unavailable), 0.0);
        assert_eq!(risk_to_deadline(&unavailable), 1.0);

        let available = Forecast::Available(MonteCarloSummary {
            weeks_min: 1,
            weeks_max: 3,
            weeks_p50: 2.0,
            weeks_p80: 2.0,
            weeks_std_dev: 0.5,
            odds_to_deadline: 0.75,
        });
        assert_eq!(customer_happiness(4.0, &available), 2.0);
        assert_eq!(risk_to_deadline(&available), 0.25);
    }
}
