use serde::Serialize;

use crate::commands::base_commands::{Commands, OutputFormat};
use crate::commands::command_error::CommandError;
use crate::commands::consolidate_cmd::open_data_and_store;
use crate::domain::ids::{DemandId, ProjectId};
use crate::domain::project_consolidation::ProjectConsolidation;
use crate::services::consolidation_reader::{ConsolidationReader, LeadTimeBreakdown};
use crate::services::consolidation_store::ConsolidationStore;
use crate::services::flow_repository::{FlowRepository, InMemoryFlowRepository};
use crate::services::throughput_yaml::{serialize_throughput_to_yaml, weekly_throughput};
use crate::services::time_service::weeks_between;
use crate::services::work_item_flow::{FlowInput, Periodicity, WorkItemFlowInformation};

#[derive(Serialize)]
struct ProjectHeader {
    id: ProjectId,
    name: String,
    team: String,
    product: Option<String>,
}

#[derive(Serialize)]
struct Progress {
    delivered: usize,
    scope: u32,
    percentage_complete: f64,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    project: ProjectHeader,
    progress: Progress,
    lead_time_p80_breakdown: LeadTimeBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    flow: Option<WorkItemFlowInformation>,
    consolidations: &'a [ProjectConsolidation],
}

pub fn show_command(cmd: Commands) -> Result<(), CommandError> {
    if let Commands::Show {
        data,
        store,
        project,
        format,
        flow,
        throughput_output,
    } = cmd
    {
        let project_id = ProjectId(project);
        let (repository, store) = open_data_and_store(&data, &store)?;
        let rows = store.project_consolidations(project_id);
        let Some(latest) = rows.last() else {
            return Err(CommandError::NoConsolidations(project_id));
        };

        let header = project_header(&repository, project_id)?;
        let breakdown = ConsolidationReader::new(latest, &repository).lead_time_breakdown()?;
        let flow = if flow {
            Some(flow_information(&repository, project_id, latest)?)
        } else {
            None
        };

        if let Some(path) = throughput_output {
            let project = repository.find_project(project_id)?;
            let boundaries =
                weeks_between(Some(project.start_date), Some(latest.consolidation_date));
            let series = weekly_throughput(&boundaries, &latest.project_throughput_data);
            let mut buffer = Vec::new();
            serialize_throughput_to_yaml(&mut buffer, &series)
                .map_err(|err| CommandError::Serialize(err.to_string()))?;
            std::fs::write(&path, buffer).map_err(|source| CommandError::Write {
                path: path.clone(),
                source,
            })?;
            eprintln!("Throughput data written to {path}");
        }

        let progress = Progress {
            delivered: latest.delivered(),
            scope: latest.project_scope,
            percentage_complete: latest.percentage_complete(),
        };
        let output = ShowOutput {
            project: header,
            progress,
            lead_time_p80_breakdown: breakdown,
            flow,
            consolidations: &rows,
        };
        println!("{}", render(&output, format)?);
    }
    Ok(())
}

fn project_header(
    repository: &InMemoryFlowRepository,
    project_id: ProjectId,
) -> Result<ProjectHeader, CommandError> {
    let project = repository.find_project(project_id)?;
    let team = repository.find_team(project.team_id)?;
    let product = match project.product_id {
        Some(product_id) => Some(repository.find_product(product_id)?.name),
        None => None,
    };
    Ok(ProjectHeader {
        id: project.id,
        name: project.name,
        team: team.name,
        product,
    })
}

fn flow_information(
    repository: &InMemoryFlowRepository,
    project_id: ProjectId,
    latest: &ProjectConsolidation,
) -> Result<WorkItemFlowInformation, CommandError> {
    let project = repository.find_project(project_id)?;
    let demands = repository.demands_for_project(project_id)?;
    let demand_ids: Vec<DemandId> = demands.iter().map(|demand| demand.id).collect();
    let stages = repository.stages_for_project(project_id)?;
    let transitions = repository.transitions_for_demands(&demand_ids)?;
    let boundaries = weeks_between(Some(project.start_date), Some(latest.consolidation_date));

    Ok(WorkItemFlowInformation::build(&FlowInput {
        demands: &demands,
        transitions: &transitions,
        stages: &stages,
        initial_scope: project.initial_scope,
        boundaries: &boundaries,
        periodicity: Periodicity::Week,
    }))
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, CommandError> {
    match format {
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|err| CommandError::Serialize(err.to_string()))
        }
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|err| CommandError::Serialize(err.to_string())),
    }
}
