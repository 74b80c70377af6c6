use chrono::NaiveDate;
use tracing::{debug, error, info};

use crate::domain::demand::Demand;
use crate::domain::distribution::{Forecast, UnavailableReason};
use crate::domain::ids::ProjectId;
use crate::domain::project::{Project, Team};
use crate::domain::project_consolidation::ProjectConsolidation;
use crate::services::consolidation_config::ConsolidationConfig;
use crate::services::consolidation_job::{
    CancellationToken, ConsolidationError, ConsolidationRun, upsert_with_retry, week_sampler,
};
use crate::services::consolidation_store::ConsolidationStore;
use crate::services::demand_queries;
use crate::services::flow_repository::FlowRepository;
use crate::services::statistics_service::{
    ThroughputSampler, histogram_bins, mean, percentile, run_montecarlo, standard_deviation,
};
use crate::services::time_service::{
    WeekWalk, WeekWindow, beginning_of_day, beginning_of_week, end_of_day, end_of_week,
    weeks_between,
};
use crate::services::work_item_flow::{Periodicity, throughput_per_period};

/// Outcome of consolidating several projects; one failing project does not
/// stop the others.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(ProjectId, ConsolidationRun)>,
    pub failed: Vec<(ProjectId, ConsolidationError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Walks a project week by week from its start up to the current week and
/// upserts one [`ProjectConsolidation`] per week.
pub struct ProjectConsolidationJob<'a> {
    repository: &'a dyn FlowRepository,
    store: &'a mut dyn ConsolidationStore,
    config: &'a ConsolidationConfig,
    cancellation: CancellationToken,
}

impl<'a> ProjectConsolidationJob<'a> {
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
        project_id: ProjectId,
        today: NaiveDate,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        let project = self.repository.find_project(project_id)?;
        let team = self.repository.find_team(project.team_id)?;
        let project_demands = self.repository.demands_for_project(project.id)?;
        let team_demands = self.repository.demands_for_team(team.id)?;
        let product_demands = match project.product_id {
            Some(product_id) => Some(self.repository.demands_for_product(product_id)?),
            None => None,
        };

        let end_date = project.end_date.min(end_of_week(today));
        let walk = WeekWalk::new(beginning_of_week(project.start_date), end_date);
        let weeks = walk.remaining();
        if weeks > self.config.max_weeks {
            return Err(ConsolidationError::TooManyPeriods {
                owner: format!("project {project_id}"),
                weeks,
                max_weeks: self.config.max_weeks,
            });
        }
        info!(project_id = %project_id, weeks, "consolidating project");

        let demands = ProjectDemands {
            project: &project_demands,
            team: &team_demands,
            product: product_demands.as_deref(),
        };
        let mut run = ConsolidationRun::default();
        for window in walk {
            if self.cancellation.is_cancelled() {
                return Err(ConsolidationError::Cancelled {
                    completed_weeks: run.weeks,
                });
            }

            let mut sampler = week_sampler(self.config.seed, project_id.0, window.end_of_week);
            let row = build_project_consolidation(
                &project,
                &team,
                &demands,
                &window,
                self.config,
                &mut sampler,
            );
            debug!(
                project_id = %project_id,
                consolidation_date = %window.end_of_week,
                remaining_backlog = row.remaining_backlog,
                "upserting project consolidation"
            );
            let store = &mut *self.store;
            let outcome = upsert_with_retry(self.config.upsert_retries, || {
                store.upsert_project(row.clone())
            })?;
            run.record(outcome);
        }

        info!(
            project_id = %project_id,
            inserted = run.inserted,
            updated = run.updated,
            "project consolidated"
        );
        Ok(run)
    }

    /// Consolidates every project in `project_ids`, collecting failures.
    pub fn consolidate_projects(&mut self, project_ids: &[ProjectId], today: NaiveDate) -> BatchReport {
        let mut report = BatchReport::default();
        for project_id in project_ids {
            match self.run(*project_id, today) {
                Ok(run) => report.succeeded.push((*project_id, run)),
                Err(err) => {
                    error!(project_id = %project_id, error = %err, "project consolidation failed");
                    report.failed.push((*project_id, err));
                }
            }
        }
        report
    }
}

pub struct ProjectDemands<'a> {
    pub project: &'a [Demand],
    pub team: &'a [Demand],
    /// `None` when the project belongs to no product.
    pub product: Option<&'a [Demand]>,
}

/// Scales team throughput to the project's share of the team's WIP limit.
pub fn team_share(project: &Project, team: &Team) -> f64 {
    if project.max_work_in_progress == 0 || team.max_work_in_progress == 0 {
        return 1.0;
    }
    project.max_work_in_progress as f64 / team.max_work_in_progress as f64
}

/// Weeks between the consolidation date and the project's deadline.
pub fn weeks_to_deadline(project: &Project, consolidation_date: NaiveDate) -> f64 {
    let days = (project.end_date - consolidation_date).num_days().max(0);
    days as f64 / 7.0
}

pub fn flow_pressure(remaining_backlog: u32, weeks_to_deadline: f64) -> f64 {
    if weeks_to_deadline <= 0.0 {
        return remaining_backlog as f64;
    }
    remaining_backlog as f64 / weeks_to_deadline
}

/// Computes the snapshot for one week. Reads nothing but its arguments.
pub fn build_project_consolidation(
    project: &Project,
    team: &Team,
    demands: &ProjectDemands<'_>,
    window: &WeekWindow,
    config: &ConsolidationConfig,
    sampler: &mut dyn ThroughputSampler,
) -> ProjectConsolidation {
    let consolidation_date = window.end_of_week;
    let week_start = beginning_of_day(window.beginning_of_week);
    let instant = end_of_day(consolidation_date);

    let known = demand_queries::known_until(demands.project, instant);
    let finished = demand_queries::finished_until(&known, instant);
    let finished_in_week = demand_queries::finished_between(&known, week_start, instant);
    let in_wip = demand_queries::in_wip_at(&known, instant);

    let boundaries = weeks_between(Some(project.start_date), Some(consolidation_date));
    let project_throughput_data =
        throughput_per_period(demands.project, &boundaries, Periodicity::Week);
    let team_throughput_data = throughput_per_period(demands.team, &boundaries, Periodicity::Week);
    let product_throughput_data = match demands.product {
        Some(product) => throughput_per_period(product, &boundaries, Periodicity::Week),
        None => Vec::new(),
    };

    let remaining_backlog =
        demand_queries::remaining_backlog(&known, project.initial_scope, instant);
    let weeks_to_deadline = weeks_to_deadline(project, consolidation_date);

    let lead_times = demand_queries::lead_times(&finished);
    let lead_times_in_week = demand_queries::lead_times(&finished_in_week);

    let window_size = config.throughput_window;
    let share = team_share(project, team);
    let project_samples = demand_queries::last_periods(&project_throughput_data, window_size);
    let team_samples: Vec<f64> = demand_queries::last_periods(&team_throughput_data, window_size)
        .into_iter()
        .map(|value| value * share)
        .collect();
    let product_samples = demand_queries::last_periods(&product_throughput_data, window_size);

    let mut forecast = |samples: &[f64]| -> Forecast {
        run_montecarlo(
            remaining_backlog as f64,
            samples,
            config.trials,
            config.max_periods,
            &mut *sampler,
        )
        .summarize(weeks_to_deadline)
    };
    let project_monte_carlo = forecast(&project_samples);
    let team_monte_carlo = forecast(&team_samples);
    let product_monte_carlo = match demands.product {
        Some(_) => forecast(&product_samples),
        None => Forecast::Unavailable {
            reason: UnavailableReason::NoThroughputHistory,
        },
    };

    ProjectConsolidation {
        project_id: project.id,
        consolidation_date,
        last_data_in_week: true,
        last_data_in_month: window.is_last_in_month(),
        last_data_in_year: window.is_last_in_year(),
        wip_limit: project.max_work_in_progress,
        current_wip: demand_queries::average_wip_in_week(&known, window),
        demands_ids: demand_queries::ids(&known),
        demands_finished_ids: demand_queries::ids(&finished),
        demands_finished_in_week_ids: demand_queries::ids(&finished_in_week),
        demands_in_wip_ids: demand_queries::ids(&in_wip),
        project_scope: project.initial_scope + known.len() as u32,
        remaining_backlog,
        project_aging: (consolidation_date - project.start_date).num_days().max(0),
        project_throughput: project_throughput_data.last().copied().unwrap_or(0),
        project_throughput_data,
        team_throughput_data,
        product_throughput_data,
        lead_time_min: percentile(0.0, &lead_times),
        lead_time_max: percentile(100.0, &lead_times),
        lead_time_average: mean(&lead_times),
        lead_time_std_dev: standard_deviation(&lead_times),
        lead_time_p25: percentile(25.0, &lead_times),
        lead_time_p75: percentile(75.0, &lead_times),
        lead_time_p80: percentile(80.0, &lead_times),
        lead_time_p80_in_week: percentile(80.0, &lead_times_in_week),
        lead_time_histogram: histogram_bins(&lead_times),
        demands_lead_times: lead_times,
        bugs_opened: demand_queries::bugs_opened(&known),
        bugs_closed: demand_queries::bugs_closed(&known, instant),
        flow_pressure: flow_pressure(remaining_backlog, weeks_to_deadline),
        project_monte_carlo,
        team_monte_carlo,
        product_monte_carlo,
    }
}
