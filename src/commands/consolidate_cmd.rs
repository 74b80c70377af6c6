use tracing::{info, warn};

use crate::commands::base_commands::{Commands, parse_date};
use crate::commands::command_error::CommandError;
use crate::commands::report_format::{format_batch_report, format_replenishing_table};
use crate::domain::ids::{ProjectId, TeamId};
use crate::services::consolidation_config::ConsolidationConfig;
use crate::services::consolidation_job::CancellationToken;
use crate::services::consolidation_store::ConsolidationStore;
use crate::services::consolidation_store_yaml::YamlConsolidationStore;
use crate::services::flow_data_yaml::load_flow_data_from_yaml_file;
use crate::services::flow_repository::{FlowRepository, InMemoryFlowRepository};
use crate::services::project_consolidation_job::ProjectConsolidationJob;
use crate::services::replenishing_consolidation_job::ReplenishingConsolidationJob;
use crate::services::team_consolidation_job::TeamConsolidationJob;

pub fn consolidate_command(cmd: Commands, config: &ConsolidationConfig) -> Result<(), CommandError> {
    let cancellation = CancellationToken::new();
    if let Err(err) = cancellation.cancel_on_interrupt() {
        warn!(error = %err, "could not install interrupt handler");
    }

    match cmd {
        Commands::ConsolidateProject {
            data,
            store,
            project,
            today,
        } => {
            let today = parse_date(&today)?;
            let (repository, mut store) = open_data_and_store(&data, &store)?;
            let run = ProjectConsolidationJob::new(&repository, &mut store, config)
                .with_cancellation(cancellation)
                .run(ProjectId(project), today)?;
            println!(
                "Project {project}: {} weeks consolidated ({} new, {} updated) in {}",
                run.weeks,
                run.inserted,
                run.updated,
                store.path().display()
            );
        }
        Commands::ConsolidateAll { data, store, today } => {
            let today = parse_date(&today)?;
            let (repository, mut store) = open_data_and_store(&data, &store)?;
            let project_ids: Vec<ProjectId> =
                repository.projects()?.iter().map(|project| project.id).collect();
            let report = ProjectConsolidationJob::new(&repository, &mut store, config)
                .with_cancellation(cancellation)
                .consolidate_projects(&project_ids, today);
            println!("{}", format_batch_report(&report));
            if !report.is_success() {
                return Err(CommandError::BatchFailed {
                    failed: report.failed.len(),
                    total: project_ids.len(),
                });
            }
        }
        Commands::ConsolidateTeam {
            data,
            store,
            team,
            today,
        } => {
            let today = parse_date(&today)?;
            let (repository, mut store) = open_data_and_store(&data, &store)?;
            let run = TeamConsolidationJob::new(&repository, &mut store, config)
                .with_cancellation(cancellation)
                .run(TeamId(team), today)?;
            println!(
                "Team {team}: {} weeks consolidated ({} new, {} updated) in {}",
                run.weeks,
                run.inserted,
                run.updated,
                store.path().display()
            );
        }
        Commands::Replenish {
            data,
            store,
            team,
            today,
        } => {
            let today = parse_date(&today)?;
            let (repository, mut store) = open_data_and_store(&data, &store)?;
            ReplenishingConsolidationJob::new(&repository, &mut store, config)
                .run(TeamId(team), today)?;
            let rows: Vec<_> = store
                .replenishing_consolidations(TeamId(team))
                .into_iter()
                .filter(|row| row.consolidation_date == today)
                .collect();
            println!("{}", format_replenishing_table(&rows));
        }
        _ => {}
    }
    Ok(())
}

pub fn open_data_and_store(
    data: &str,
    store: &str,
) -> Result<(InMemoryFlowRepository, YamlConsolidationStore), CommandError> {
    let flow_data = load_flow_data_from_yaml_file(data)?;
    info!(
        data = data,
        projects = flow_data.projects.len(),
        demands = flow_data.demands.len(),
        "loaded flow data"
    );
    let store = YamlConsolidationStore::open(store)?;
    Ok((InMemoryFlowRepository::new(flow_data), store))
}
