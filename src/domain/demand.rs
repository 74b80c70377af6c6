use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{DemandId, ProductId, ProjectId, TeamId};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandType {
    #[default]
    Feature,
    Bug,
    Chore,
    PerformanceImprovement,
    Ui,
    Wireframe,
}

impl DemandType {
    pub const ALL: [DemandType; 6] = [
        DemandType::Feature,
        DemandType::Bug,
        DemandType::Chore,
        DemandType::PerformanceImprovement,
        DemandType::Ui,
        DemandType::Wireframe,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "feature" => Some(DemandType::Feature),
            "bug" => Some(DemandType::Bug),
            "chore" => Some(DemandType::Chore),
            "performance_improvement" => Some(DemandType::PerformanceImprovement),
            "ui" => Some(DemandType::Ui),
            "wireframe" => Some(DemandType::Wireframe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DemandType::Feature => "feature",
            DemandType::Bug => "bug",
            DemandType::Chore => "chore",
            DemandType::PerformanceImprovement => "performance_improvement",
            DemandType::Ui => "ui",
            DemandType::Wireframe => "wireframe",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassOfService {
    #[default]
    Standard,
    Expedite,
    FixedDate,
    Intangible,
}

impl ClassOfService {
    pub const ALL: [ClassOfService; 4] = [
        ClassOfService::Standard,
        ClassOfService::Expedite,
        ClassOfService::FixedDate,
        ClassOfService::Intangible,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(ClassOfService::Standard),
            "expedite" => Some(ClassOfService::Expedite),
            "fixed_date" => Some(ClassOfService::FixedDate),
            "intangible" => Some(ClassOfService::Intangible),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassOfService::Standard => "standard",
            ClassOfService::Expedite => "expedite",
            ClassOfService::FixedDate => "fixed_date",
            ClassOfService::Intangible => "intangible",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandState {
    Backlog,
    InProgress,
    Finished,
}

/// A unit of work flowing through a project's pipeline.
///
/// Demands are owned by the ingestion side and only read here.
#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    pub id: DemandId,
    pub external_id: String,
    pub project_id: ProjectId,
    pub team_id: TeamId,
    pub product_id: Option<ProductId>,
    pub demand_type: DemandType,
    pub class_of_service: ClassOfService,
    pub created_date: NaiveDateTime,
    pub commitment_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub discarded_at: Option<NaiveDateTime>,
}

impl Demand {
    pub fn state(&self) -> DemandState {
        match (self.commitment_date, self.end_date) {
            (_, Some(_)) => DemandState::Finished,
            (Some(_), None) => DemandState::InProgress,
            (None, None) => DemandState::Backlog,
        }
    }

    pub fn is_bug(&self) -> bool {
        self.demand_type == DemandType::Bug
    }

    /// Lead time in fractional days, `None` until both commitment and end are known.
    pub fn leadtime_days(&self) -> Option<f64> {
        let commitment = self.commitment_date?;
        let end = self.end_date?;
        Some(end.signed_duration_since(commitment).num_seconds() as f64 / SECONDS_PER_DAY)
    }

    /// Whether the demand had not been discarded at `instant`.
    pub fn is_kept_at(&self, instant: NaiveDateTime) -> bool {
        self.discarded_at.is_none_or(|discarded| discarded > instant)
    }

    pub fn is_known_at(&self, instant: NaiveDateTime) -> bool {
        self.created_date <= instant && self.is_kept_at(instant)
    }

    pub fn finished_until(&self, instant: NaiveDateTime) -> bool {
        self.end_date.is_some_and(|end| end <= instant)
    }

    pub fn finished_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.end_date
            .is_some_and(|finished| finished >= start && finished <= end)
    }

    pub fn committed_until(&self, instant: NaiveDateTime) -> bool {
        self.commitment_date
            .is_some_and(|commitment| commitment <= instant)
    }

    /// Committed by the end of `day` and not finished before it started.
    pub fn in_wip_on(&self, day: NaiveDate) -> bool {
        let day_start = day.and_time(NaiveTime::MIN);
        let day_end = day_start + Duration::seconds(86_399);
        self.committed_until(day_end) && self.end_date.is_none_or(|end| end >= day_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, build_demand};

    #[test]
    fn state_follows_commitment_and_end_dates() {
        let mut demand = build_demand(1, at(2024, 1, 1));
        assert_eq!(demand.state(), DemandState::Backlog);

        demand.commitment_date = Some(at(2024, 1, 2));
        assert_eq!(demand.state(), DemandState::InProgress);

        demand.end_date = Some(at(2024, 1, 4));
        assert_eq!(demand.state(), DemandState::Finished);
    }

    #[test]
    fn leadtime_is_fractional_days_between_commitment_and_end() {
        let mut demand = build_demand(1, at(2024, 1, 1));
        assert_eq!(demand.leadtime_days(), None);

        demand.commitment_date = Some(at(2024, 1, 2));
        demand.end_date = Some(at(2024, 1, 5) + Duration::hours(12));
        assert_eq!(demand.leadtime_days(), Some(3.5));
    }

    #[test]
    fn discarded_demands_are_kept_only_before_discard() {
        let mut demand = build_demand(1, at(2024, 1, 1));
        demand.discarded_at = Some(at(2024, 1, 10));

        assert!(demand.is_known_at(at(2024, 1, 9)));
        assert!(!demand.is_known_at(at(2024, 1, 10)));
        assert!(!demand.is_known_at(at(2023, 12, 31)));
    }

    #[test]
    fn wip_counts_the_commitment_and_end_days() {
        let mut demand = build_demand(1, at(2024, 1, 1));
        demand.commitment_date = Some(at(2024, 1, 2) + Duration::hours(15));
        demand.end_date = Some(at(2024, 1, 4) + Duration::hours(9));

        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        assert!(!demand.in_wip_on(day(1)));
        assert!(demand.in_wip_on(day(2)));
        assert!(demand.in_wip_on(day(3)));
        assert!(demand.in_wip_on(day(4)));
        assert!(!demand.in_wip_on(day(5)));
    }

    #[test]
    fn parse_round_trips_names() {
        for demand_type in DemandType::ALL {
            assert_eq!(DemandType::parse(demand_type.as_str()), Some(demand_type));
        }
        for class in ClassOfService::ALL {
            assert_eq!(ClassOfService::parse(class.as_str()), Some(class));
        }
        assert_eq!(DemandType::parse("epic"), None);
    }
}
