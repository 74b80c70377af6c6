use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::demand::Demand;
use crate::domain::ids::{DemandId, StageId};
use crate::domain::stage::{Stage, Transition};
use crate::services::time_service::{
    beginning_of_day, beginning_of_month, beginning_of_week, end_of_day,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periodicity {
    Week,
    Month,
}

impl Periodicity {
    /// First day of the period that ends at `boundary`.
    pub fn period_start(self, boundary: NaiveDate) -> NaiveDate {
        match self {
            Periodicity::Week => beginning_of_week(boundary),
            Periodicity::Month => beginning_of_month(boundary),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StageCount {
    pub stage_id: StageId,
    pub name: String,
    pub count: u32,
}

/// Demands per current stage at one boundary. Buckets are mutually exclusive:
/// `not_started` plus every stage count equals the scope at that date.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CumulativeFlowPoint {
    pub date: NaiveDate,
    pub not_started: u32,
    /// Ascending stage order.
    pub stages: Vec<StageCount>,
}

impl CumulativeFlowPoint {
    pub fn total(&self) -> u32 {
        self.not_started + self.stages.iter().map(|stage| stage.count).sum::<u32>()
    }
}

pub struct FlowInput<'a> {
    pub demands: &'a [Demand],
    pub transitions: &'a [Transition],
    pub stages: &'a [Stage],
    pub initial_scope: u32,
    pub boundaries: &'a [NaiveDate],
    pub periodicity: Periodicity,
}

/// Per-period flow series for a set of demands.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WorkItemFlowInformation {
    pub boundaries: Vec<NaiveDate>,
    pub scope_per_period: Vec<u32>,
    pub throughput_per_period: Vec<u32>,
    pub accumulated_throughput: Vec<u32>,
    pub ideal_per_period: Vec<f64>,
    pub bugs_opened_per_period: Vec<u32>,
    pub bugs_closed_per_period: Vec<u32>,
    pub cumulative_flow: Vec<CumulativeFlowPoint>,
}

impl WorkItemFlowInformation {
    pub fn build(input: &FlowInput<'_>) -> Self {
        let boundaries = input.boundaries.to_vec();
        let bugs: Vec<Demand> = input
            .demands
            .iter()
            .filter(|demand| demand.is_bug())
            .cloned()
            .collect();
        let bugs_opened_per_period = boundaries
            .iter()
            .map(|boundary| {
                let start = beginning_of_day(input.periodicity.period_start(*boundary));
                let end = end_of_day(*boundary);
                bugs.iter()
                    .filter(|bug| bug.created_date >= start && bug.created_date <= end)
                    .filter(|bug| bug.is_kept_at(end))
                    .count() as u32
            })
            .collect();
        let bugs_closed_per_period = throughput_per_period(&bugs, &boundaries, input.periodicity);

        let scope_per_period = scope_per_period(input.demands, input.initial_scope, &boundaries);
        let throughput_per_period =
            throughput_per_period(input.demands, &boundaries, input.periodicity);

        let accumulated_throughput = throughput_per_period
            .iter()
            .scan(0, |total, throughput| {
                *total += throughput;
                Some(*total)
            })
            .collect();

        let final_scope = scope_per_period.last().copied().unwrap_or(0) as f64;
        let periods = boundaries.len() as f64;
        let ideal_per_period = (1..=boundaries.len())
            .map(|index| final_scope / periods * index as f64)
            .collect();

        let cumulative_flow = cumulative_flow(
            input.demands,
            input.transitions,
            input.stages,
            input.initial_scope,
            &boundaries,
        );

        Self {
            boundaries,
            scope_per_period,
            throughput_per_period,
            accumulated_throughput,
            ideal_per_period,
            bugs_opened_per_period,
            bugs_closed_per_period,
            cumulative_flow,
        }
    }
}

/// Known demands plus the initial scope at each boundary.
pub fn scope_per_period(
    demands: &[Demand],
    initial_scope: u32,
    boundaries: &[NaiveDate],
) -> Vec<u32> {
    boundaries
        .iter()
        .map(|boundary| {
            let instant = end_of_day(*boundary);
            let known = demands.iter().filter(|demand| demand.is_known_at(instant)).count();
            initial_scope + known as u32
        })
        .collect()
}

/// Demands finished within `[period_start, boundary]` for each boundary.
pub fn throughput_per_period(
    demands: &[Demand],
    boundaries: &[NaiveDate],
    periodicity: Periodicity,
) -> Vec<u32> {
    boundaries
        .iter()
        .map(|boundary| {
            let start = beginning_of_day(periodicity.period_start(*boundary));
            let end = end_of_day(*boundary);
            demands
                .iter()
                .filter(|demand| demand.is_kept_at(end))
                .filter(|demand| demand.finished_between(start, end))
                .count() as u32
        })
        .collect()
}

/// Stages sorted by `(order, name, id)`; ties in `order` are broken by name so
/// the pipeline always has a total order.
pub fn ordered_stages(stages: &[Stage]) -> Vec<&Stage> {
    let mut ordered: Vec<&Stage> = stages.iter().collect();
    ordered.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

/// Cumulative flow buckets per boundary.
///
/// For each stage, "reached" counts demands whose furthest transition by the
/// boundary is that stage or any stage downstream of it. Walking stages in
/// descending order and subtracting the downstream reached count leaves the
/// demands currently sitting in each stage. The result is re-ordered
/// ascending.
pub fn cumulative_flow(
    demands: &[Demand],
    transitions: &[Transition],
    stages: &[Stage],
    initial_scope: u32,
    boundaries: &[NaiveDate],
) -> Vec<CumulativeFlowPoint> {
    let ordered = ordered_stages(stages);
    let position: HashMap<StageId, usize> = ordered
        .iter()
        .enumerate()
        .map(|(index, stage)| (stage.id, index))
        .collect();

    let mut transitions_by_demand: HashMap<DemandId, Vec<&Transition>> = HashMap::new();
    for transition in transitions {
        transitions_by_demand
            .entry(transition.demand_id)
            .or_default()
            .push(transition);
    }

    boundaries
        .iter()
        .map(|boundary| {
            let instant = end_of_day(*boundary);
            let mut furthest_counts = vec![0_u32; ordered.len()];
            let mut not_started = initial_scope;

            for demand in demands.iter().filter(|demand| demand.is_known_at(instant)) {
                let furthest = transitions_by_demand
                    .get(&demand.id)
                    .into_iter()
                    .flatten()
                    .filter(|transition| transition.last_time_in <= instant)
                    .filter_map(|transition| position.get(&transition.stage_id).copied())
                    .max();
                match furthest {
                    Some(index) => furthest_counts[index] += 1,
                    None => not_started += 1,
                }
            }

            let mut downstream_reached = 0;
            let mut descending = Vec::with_capacity(ordered.len());
            for index in (0..ordered.len()).rev() {
                let reached = downstream_reached + furthest_counts[index];
                descending.push(StageCount {
                    stage_id: ordered[index].id,
                    name: ordered[index].name.clone(),
                    count: reached - downstream_reached,
                });
                downstream_reached = reached;
            }
            descending.reverse();

            CumulativeFlowPoint {
                date: *boundary,
                not_started,
                stages: descending,
            }
        })
        .collect()
}
