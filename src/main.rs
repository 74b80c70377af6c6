mod commands;
mod domain;
mod logging;
mod services;
#[cfg(test)]
mod test_support;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;

use crate::commands::base_commands::{CliArgs, Commands};
use crate::commands::command_error::CommandError;
use crate::commands::consolidate_cmd::consolidate_command;
use crate::commands::forecast_cmd::forecast_command;
use crate::commands::show_cmd::show_command;
use crate::logging::init_logging;
use crate::services::consolidation_config::ConsolidationConfig;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<(), CommandError> {
    if let Commands::Completions { shell } = args.command {
        let mut cmd = CliArgs::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let config = ConsolidationConfig::load(args.config.as_deref())?;
    init_logging(&config.log_level);

    match args.command {
        cmd @ (Commands::ConsolidateProject { .. }
        | Commands::ConsolidateAll { .. }
        | Commands::ConsolidateTeam { .. }
        | Commands::Replenish { .. }) => consolidate_command(cmd, &config),
        cmd @ Commands::Show { .. } => show_command(cmd),
        cmd @ Commands::Forecast { .. } => forecast_command(cmd, &config),
        Commands::Completions { .. } => Ok(()),
    }
}
