use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::demand::{ClassOfService, Demand, DemandType};
use crate::domain::ids::{DemandId, ProductId, ProjectId, StageId, TeamId};
use crate::domain::project::{Product, Project, Team};
use crate::domain::stage::{Stage, Transition};
use crate::services::flow_repository::FlowDataSet;

#[derive(Error, Debug)]
pub enum FlowDataYamlError {
    #[error("failed to read flow data file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse flow data yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid date in {field}: {value} (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    InvalidDate { field: &'static str, value: String },
    #[error("invalid demand type for demand {demand}: {value}")]
    InvalidDemandType { demand: DemandId, value: String },
    #[error("invalid class of service for demand {demand}: {value}")]
    InvalidClassOfService { demand: DemandId, value: String },
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },
    #[error("{owner} references unknown {kind} {id}")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: u64,
    },
    #[error("project {project} starts on {start_date} after its end date {end_date}")]
    InvalidProjectDates {
        project: ProjectId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

#[derive(Debug, Deserialize)]
struct FlowDataRecord {
    #[serde(default)]
    teams: Vec<TeamRecord>,
    #[serde(default)]
    products: Vec<ProductRecord>,
    #[serde(default)]
    projects: Vec<ProjectRecord>,
    #[serde(default)]
    stages: Vec<StageRecord>,
    #[serde(default)]
    demands: Vec<DemandRecord>,
    #[serde(default)]
    transitions: Vec<TransitionRecord>,
}

#[derive(Debug, Deserialize)]
struct TeamRecord {
    id: u64,
    name: String,
    #[serde(default)]
    max_work_in_progress: u32,
}

#[derive(Debug, Deserialize)]
struct ProductRecord {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectRecord {
    id: u64,
    name: String,
    start_date: String,
    end_date: String,
    #[serde(default)]
    max_work_in_progress: u32,
    #[serde(default)]
    initial_scope: u32,
    team_id: u64,
    product_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StageRecord {
    id: u64,
    name: String,
    order: i32,
    #[serde(default)]
    project_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct DemandRecord {
    id: u64,
    external_id: Option<String>,
    project_id: u64,
    /// Defaults to the project's team.
    team_id: Option<u64>,
    /// Defaults to the project's product.
    product_id: Option<u64>,
    demand_type: Option<String>,
    class_of_service: Option<String>,
    created_date: String,
    commitment_date: Option<String>,
    end_date: Option<String>,
    discarded_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransitionRecord {
    demand_id: u64,
    stage_id: u64,
    last_time_in: String,
    last_time_out: Option<String>,
}

pub fn load_flow_data_from_yaml_file<P: AsRef<Path>>(
    path: P,
) -> Result<FlowDataSet, FlowDataYamlError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| FlowDataYamlError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    deserialize_flow_data_from_yaml_str(&contents)
}

pub fn deserialize_flow_data_from_yaml_str(input: &str) -> Result<FlowDataSet, FlowDataYamlError> {
    let record: FlowDataRecord = serde_yaml::from_str(input)?;

    let teams = record
        .teams
        .into_iter()
        .map(|team| Team {
            id: TeamId(team.id),
            name: team.name,
            max_work_in_progress: team.max_work_in_progress,
        })
        .collect::<Vec<_>>();
    ensure_unique("team", teams.iter().map(|team| team.id.0))?;
    let team_ids: HashSet<TeamId> = teams.iter().map(|team| team.id).collect();

    let products = record
        .products
        .into_iter()
        .map(|product| Product {
            id: ProductId(product.id),
            name: product.name,
        })
        .collect::<Vec<_>>();
    ensure_unique("product", products.iter().map(|product| product.id.0))?;
    let product_ids: HashSet<ProductId> = products.iter().map(|product| product.id).collect();

    let projects = record
        .projects
        .into_iter()
        .map(|project| project_from_record(project, &team_ids, &product_ids))
        .collect::<Result<Vec<_>, _>>()?;
    ensure_unique("project", projects.iter().map(|project| project.id.0))?;
    let projects_by_id: HashMap<ProjectId, &Project> =
        projects.iter().map(|project| (project.id, project)).collect();

    let stages = record
        .stages
        .into_iter()
        .map(|stage| stage_from_record(stage, &projects_by_id))
        .collect::<Result<Vec<_>, _>>()?;
    ensure_unique("stage", stages.iter().map(|stage| stage.id.0))?;
    let stage_ids: HashSet<StageId> = stages.iter().map(|stage| stage.id).collect();

    let demands = record
        .demands
        .into_iter()
        .map(|demand| demand_from_record(demand, &projects_by_id, &team_ids, &product_ids))
        .collect::<Result<Vec<_>, _>>()?;
    ensure_unique("demand", demands.iter().map(|demand| demand.id.0))?;
    let demand_ids: HashSet<DemandId> = demands.iter().map(|demand| demand.id).collect();

    let transitions = record
        .transitions
        .into_iter()
        .map(|transition| transition_from_record(transition, &demand_ids, &stage_ids))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FlowDataSet {
        projects,
        teams,
        products,
        stages,
        demands,
        transitions,
    })
}

fn project_from_record(
    record: ProjectRecord,
    team_ids: &HashSet<TeamId>,
    product_ids: &HashSet<ProductId>,
) -> Result<Project, FlowDataYamlError> {
    let owner = format!("project {}", record.id);
    let start_date = parse_date(&record.start_date, "project.start_date")?;
    let end_date = parse_date(&record.end_date, "project.end_date")?;
    if start_date > end_date {
        return Err(FlowDataYamlError::InvalidProjectDates {
            project: ProjectId(record.id),
            start_date,
            end_date,
        });
    }
    let team_id = TeamId(record.team_id);
    if !team_ids.contains(&team_id) {
        return Err(unknown(owner, "team", team_id.0));
    }
    let product_id = record.product_id.map(ProductId);
    if let Some(product_id) = product_id {
        if !product_ids.contains(&product_id) {
            return Err(unknown(owner, "product", product_id.0));
        }
    }

    Ok(Project {
        id: ProjectId(record.id),
        name: record.name,
        start_date,
        end_date,
        max_work_in_progress: record.max_work_in_progress,
        initial_scope: record.initial_scope,
        team_id,
        product_id,
    })
}

fn stage_from_record(
    record: StageRecord,
    projects: &HashMap<ProjectId, &Project>,
) -> Result<Stage, FlowDataYamlError> {
    let project_ids = record
        .project_ids
        .into_iter()
        .map(ProjectId)
        .collect::<Vec<_>>();
    if let Some(missing) = project_ids.iter().find(|id| !projects.contains_key(id)) {
        return Err(unknown(format!("stage {}", record.id), "project", missing.0));
    }
    Ok(Stage {
        id: StageId(record.id),
        name: record.name,
        order: record.order,
        project_ids,
    })
}

fn demand_from_record(
    record: DemandRecord,
    projects: &HashMap<ProjectId, &Project>,
    team_ids: &HashSet<TeamId>,
    product_ids: &HashSet<ProductId>,
) -> Result<Demand, FlowDataYamlError> {
    let id = DemandId(record.id);
    let owner = format!("demand {id}");
    let project = projects
        .get(&ProjectId(record.project_id))
        .ok_or_else(|| unknown(owner.clone(), "project", record.project_id))?;

    let team_id = record.team_id.map(TeamId).unwrap_or(project.team_id);
    if !team_ids.contains(&team_id) {
        return Err(unknown(owner, "team", team_id.0));
    }
    let product_id = record.product_id.map(ProductId).or(project.product_id);
    if let Some(product_id) = product_id {
        if !product_ids.contains(&product_id) {
            return Err(unknown(owner, "product", product_id.0));
        }
    }

    let demand_type = match record.demand_type {
        Some(value) => DemandType::parse(&value)
            .ok_or(FlowDataYamlError::InvalidDemandType { demand: id, value })?,
        None => DemandType::default(),
    };
    let class_of_service = match record.class_of_service {
        Some(value) => ClassOfService::parse(&value)
            .ok_or(FlowDataYamlError::InvalidClassOfService { demand: id, value })?,
        None => ClassOfService::default(),
    };

    Ok(Demand {
        id,
        external_id: record.external_id.unwrap_or_else(|| id.to_string()),
        project_id: project.id,
        team_id,
        product_id,
        demand_type,
        class_of_service,
        created_date: parse_instant(&record.created_date, "demand.created_date")?,
        commitment_date: parse_instant_opt(record.commitment_date.as_deref(), "demand.commitment_date")?,
        end_date: parse_instant_opt(record.end_date.as_deref(), "demand.end_date")?,
        discarded_at: parse_instant_opt(record.discarded_at.as_deref(), "demand.discarded_at")?,
    })
}

fn transition_from_record(
    record: TransitionRecord,
    demand_ids: &HashSet<DemandId>,
    stage_ids: &HashSet<StageId>,
) -> Result<Transition, FlowDataYamlError> {
    let demand_id = DemandId(record.demand_id);
    let stage_id = StageId(record.stage_id);
    let owner = format!("transition of demand {demand_id}");
    if !demand_ids.contains(&demand_id) {
        return Err(unknown(owner, "demand", demand_id.0));
    }
    if !stage_ids.contains(&stage_id) {
        return Err(unknown(owner, "stage", stage_id.0));
    }
    Ok(Transition {
        demand_id,
        stage_id,
        last_time_in: parse_instant(&record.last_time_in, "transition.last_time_in")?,
        last_time_out: parse_instant_opt(record.last_time_out.as_deref(), "transition.last_time_out")?,
    })
}

fn ensure_unique(
    kind: &'static str,
    ids: impl Iterator<Item = u64>,
) -> Result<(), FlowDataYamlError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(FlowDataYamlError::DuplicateId { kind, id });
        }
    }
    Ok(())
}

fn unknown(owner: String, kind: &'static str, id: u64) -> FlowDataYamlError {
    FlowDataYamlError::UnknownReference { owner, kind, id }
}

fn parse_date(value: &str, field: &'static str) -> Result<NaiveDate, FlowDataYamlError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        FlowDataYamlError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

/// Accepts a plain date (midnight) or a date-time with `T` or space separator.
fn parse_instant(value: &str, field: &'static str) -> Result<NaiveDateTime, FlowDataYamlError> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(instant) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(instant);
        }
    }
    parse_date(trimmed, field).map(|date| date.and_time(chrono::NaiveTime::MIN))
}

fn parse_instant_opt(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<NaiveDateTime>, FlowDataYamlError> {
    value.map(|value| parse_instant(value, field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, on_date};

    const YAML_CONTENT: &str = r#"
teams:
  - id: 1
    name: Platform
    max_work_in_progress: 6
products:
  - id: 7
    name: Billing
projects:
  - id: 10
    name: Invoices
    start_date: 2024-01-01
    end_date: 2024-03-31
    max_work_in_progress: 3
    initial_scope: 4
    team_id: 1
    product_id: 7
stages:
  - id: 100
    name: Doing
    order: 2
    project_ids: [10]
demands:
  - id: 1
    external_id: INV-1
    project_id: 10
    demand_type: bug
    class_of_service: expedite
    created_date: 2024-01-02
    commitment_date: 2024-01-03T10:30:00
    end_date: "2024-01-05 16:00:00"
  - id: 2
    project_id: 10
    created_date: 2024-01-04
transitions:
  - demand_id: 1
    stage_id: 100
    last_time_in: 2024-01-03T10:30:00
"#;

    #[test]
    fn loads_a_complete_data_set() {
        let data = deserialize_flow_data_from_yaml_str(YAML_CONTENT).unwrap();

        assert_eq!(data.projects.len(), 1);
        let project = &data.projects[0];
        assert_eq!(project.start_date, on_date(2024, 1, 1));
        assert_eq!(project.initial_scope, 4);
        assert_eq!(project.product_id, Some(ProductId(7)));

        let bug = &data.demands[0];
        assert_eq!(bug.external_id, "INV-1");
        assert_eq!(bug.demand_type, DemandType::Bug);
        assert_eq!(bug.class_of_service, ClassOfService::Expedite);
        assert_eq!(bug.created_date, at(2024, 1, 2));
        assert_eq!(bug.commitment_date, on_date(2024, 1, 3).and_hms_opt(10, 30, 0));
        assert_eq!(bug.end_date, on_date(2024, 1, 5).and_hms_opt(16, 0, 0));

        let defaulted = &data.demands[1];
        assert_eq!(defaulted.team_id, TeamId(1));
        assert_eq!(defaulted.product_id, Some(ProductId(7)));
        assert_eq!(defaulted.demand_type, DemandType::Feature);
        assert_eq!(defaulted.external_id, "2");

        assert_eq!(data.transitions.len(), 1);
        assert_eq!(data.stages[0].project_ids, vec![ProjectId(10)]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = "teams:\n  - {id: 1, name: A}\n  - {id: 1, name: B}\n";
        let err = deserialize_flow_data_from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, FlowDataYamlError::DuplicateId { kind: "team", id: 1 }));
    }

    #[test]
    fn rejects_demands_of_unknown_projects() {
        let yaml = "demands:\n  - {id: 1, project_id: 3, created_date: 2024-01-01}\n";
        let err = deserialize_flow_data_from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, FlowDataYamlError::UnknownReference { kind: "project", id: 3, .. }));
    }

    #[test]
    fn rejects_invalid_dates_and_types() {
        let bad_date = YAML_CONTENT.replace("created_date: 2024-01-04", "created_date: 2024-13-04");
        assert!(matches!(
            deserialize_flow_data_from_yaml_str(&bad_date).unwrap_err(),
            FlowDataYamlError::InvalidDate { field: "demand.created_date", .. }
        ));

        let bad_type = YAML_CONTENT.replace("demand_type: bug", "demand_type: epic");
        assert!(matches!(
            deserialize_flow_data_from_yaml_str(&bad_type).unwrap_err(),
            FlowDataYamlError::InvalidDemandType { .. }
        ));
    }

    #[test]
    fn rejects_projects_ending_before_they_start() {
        let reversed = YAML_CONTENT.replace("end_date: 2024-03-31", "end_date: 2023-12-01");
        assert!(matches!(
            deserialize_flow_data_from_yaml_str(&reversed).unwrap_err(),
            FlowDataYamlError::InvalidProjectDates { .. }
        ));
    }

    #[test]
    fn load_reports_missing_files() {
        let err = load_flow_data_from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, FlowDataYamlError::Read { .. }));
    }
}
