use crate::commands::base_commands::Commands;
use crate::commands::command_error::CommandError;
use crate::commands::report_format::format_forecast_report;
use crate::services::consolidation_config::ConsolidationConfig;
use crate::services::throughput_forecast::{ForecastRequest, forecast_from_throughput_file};

pub fn forecast_command(cmd: Commands, config: &ConsolidationConfig) -> Result<(), CommandError> {
    if let Commands::Forecast {
        throughput,
        backlog,
        iterations,
        weeks_to_deadline,
        seed,
        output,
    } = cmd
    {
        let request = ForecastRequest {
            backlog,
            trials: iterations.unwrap_or(config.trials),
            max_periods: config.max_periods,
            weeks_to_deadline,
        };
        let report = forecast_from_throughput_file(&throughput, &request, seed.or(config.seed))?;
        println!("{}", format_forecast_report(&report));

        if let Some(output) = output {
            let yaml = serde_yaml::to_string(&report)
                .map_err(|err| CommandError::Serialize(err.to_string()))?;
            std::fs::write(&output, yaml).map_err(|source| CommandError::Write {
                path: output.clone(),
                source,
            })?;
            println!("Forecast for {backlog} demands written to {output}");
        }
    }
    Ok(())
}
