//! Aggregation queries over a project's or team's demands "as of" an instant.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::demand::Demand;
use crate::domain::ids::DemandId;
use crate::services::time_service::WeekWindow;

pub fn known_until(demands: &[Demand], instant: NaiveDateTime) -> Vec<&Demand> {
    demands
        .iter()
        .filter(|demand| demand.is_known_at(instant))
        .collect()
}

pub fn finished_until<'a>(demands: &[&'a Demand], instant: NaiveDateTime) -> Vec<&'a Demand> {
    demands
        .iter()
        .copied()
        .filter(|demand| demand.finished_until(instant))
        .collect()
}

pub fn finished_between<'a>(
    demands: &[&'a Demand],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<&'a Demand> {
    demands
        .iter()
        .copied()
        .filter(|demand| demand.finished_between(start, end))
        .collect()
}

pub fn in_wip_at<'a>(demands: &[&'a Demand], instant: NaiveDateTime) -> Vec<&'a Demand> {
    demands
        .iter()
        .copied()
        .filter(|demand| demand.committed_until(instant) && !demand.finished_until(instant))
        .collect()
}

pub fn committed_between(demands: &[&Demand], start: NaiveDateTime, end: NaiveDateTime) -> u32 {
    demands
        .iter()
        .filter(|demand| {
            demand
                .commitment_date
                .is_some_and(|commitment| commitment >= start && commitment <= end)
        })
        .count() as u32
}

pub fn wip_on(demands: &[&Demand], day: NaiveDate) -> u32 {
    demands.iter().filter(|demand| demand.in_wip_on(day)).count() as u32
}

/// Average of the daily WIP across the seven days of the week.
pub fn average_wip_in_week(demands: &[&Demand], window: &WeekWindow) -> f64 {
    let days = window.days();
    if days.is_empty() {
        return 0.0;
    }
    let total: u32 = days.iter().map(|day| wip_on(demands, *day)).sum();
    total as f64 / days.len() as f64
}

/// Scope not yet finished at `instant`, the initial scope included.
pub fn remaining_backlog(known: &[&Demand], initial_scope: u32, instant: NaiveDateTime) -> u32 {
    let unfinished = known
        .iter()
        .filter(|demand| !demand.finished_until(instant))
        .count() as u32;
    initial_scope + unfinished
}

pub fn lead_times(demands: &[&Demand]) -> Vec<f64> {
    demands
        .iter()
        .filter_map(|demand| demand.leadtime_days())
        .collect()
}

pub fn bugs_opened(demands: &[&Demand]) -> u32 {
    demands.iter().filter(|demand| demand.is_bug()).count() as u32
}

pub fn bugs_closed(demands: &[&Demand], instant: NaiveDateTime) -> u32 {
    demands
        .iter()
        .filter(|demand| demand.is_bug() && demand.finished_until(instant))
        .count() as u32
}

pub fn ids(demands: &[&Demand]) -> Vec<DemandId> {
    demands.iter().map(|demand| demand.id).collect()
}

/// The trailing `window` periods of a throughput series as samples.
pub fn last_periods(series: &[u32], window: usize) -> Vec<f64> {
    let start = series.len().saturating_sub(window);
    series[start..].iter().map(|value| *value as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::demand::DemandType;
    use crate::test_support::{at, build_demand, build_finished_demand, on_date};
    use chrono::Duration;

    #[test]
    fn remaining_backlog_counts_unfinished_known_demands_and_initial_scope() {
        let demands = vec![
            build_finished_demand(1, at(2024, 1, 1), at(2024, 1, 3)),
            build_finished_demand(2, at(2024, 1, 1), at(2024, 1, 20)),
            build_demand(3, at(2024, 1, 2)),
            build_demand(4, at(2024, 1, 30)),
        ];
        let instant = at(2024, 1, 7);
        let known = known_until(&demands, instant);
        assert_eq!(known.len(), 3);
        assert_eq!(remaining_backlog(&known, 5, instant), 7);
        assert_eq!(finished_until(&known, instant).len(), 1);
    }

    #[test]
    fn average_wip_spreads_daily_counts_over_the_week() {
        let mut wip = build_demand(1, at(2024, 1, 1));
        wip.commitment_date = Some(at(2024, 1, 4));
        let finished_monday = build_finished_demand(2, at(2024, 1, 1), at(2024, 1, 8));
        let demands = vec![wip, finished_monday];
        let refs: Vec<&Demand> = demands.iter().collect();

        let window = WeekWindow::containing(on_date(2024, 1, 8));
        // Demand 1 is in progress all 7 days; demand 2 only on Monday.
        assert!((average_wip_in_week(&refs, &window) - 8.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn in_wip_at_excludes_finished_and_uncommitted() {
        let mut committed = build_demand(1, at(2024, 1, 1));
        committed.commitment_date = Some(at(2024, 1, 2));
        let demands = vec![
            committed,
            build_demand(2, at(2024, 1, 1)),
            build_finished_demand(3, at(2024, 1, 1), at(2024, 1, 3)),
        ];
        let refs: Vec<&Demand> = demands.iter().collect();
        assert_eq!(ids(&in_wip_at(&refs, at(2024, 1, 5))), vec![DemandId(1)]);
        assert_eq!(committed_between(&refs, at(2024, 1, 1), at(2024, 1, 1) + Duration::hours(23)), 1);
    }

    #[test]
    fn bug_counts_and_lead_times() {
        let mut bug = build_finished_demand(1, at(2024, 1, 1), at(2024, 1, 3));
        bug.demand_type = DemandType::Bug;
        let mut open_bug = build_demand(2, at(2024, 1, 2));
        open_bug.demand_type = DemandType::Bug;
        let demands = vec![bug, open_bug, build_demand(3, at(2024, 1, 2))];
        let refs: Vec<&Demand> = demands.iter().collect();

        assert_eq!(bugs_opened(&refs), 2);
        assert_eq!(bugs_closed(&refs, at(2024, 1, 5)), 1);
        assert_eq!(lead_times(&refs), vec![2.0]);
    }

    #[test]
    fn last_periods_takes_the_trailing_window() {
        assert_eq!(last_periods(&[1, 2, 3, 4], 2), vec![3.0, 4.0]);
        assert_eq!(last_periods(&[1, 2], 20), vec![1.0, 2.0]);
        assert!(last_periods(&[], 20).is_empty());
    }
}
