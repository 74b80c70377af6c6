use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::commands::command_error::CommandError;

#[derive(Parser)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Optional consolidation config YAML
    #[arg(short, long, global = true)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consolidate one project week by week into the snapshot store
    ConsolidateProject {
        /// Flow data YAML file
        #[arg(short, long)]
        data: String,
        /// Snapshot store YAML file (created when missing)
        #[arg(short, long)]
        store: String,
        /// Project id
        #[arg(short, long)]
        project: u64,
        /// Consolidate up to the week of this date (YYYY-MM-DD)
        #[arg(long, default_value_t = default_today())]
        today: String,
    },
    /// Consolidate every project, continuing past failing ones
    ConsolidateAll {
        /// Flow data YAML file
        #[arg(short, long)]
        data: String,
        /// Snapshot store YAML file (created when missing)
        #[arg(short, long)]
        store: String,
        /// Consolidate up to the week of this date (YYYY-MM-DD)
        #[arg(long, default_value_t = default_today())]
        today: String,
    },
    /// Consolidate a team week by week into the snapshot store
    ConsolidateTeam {
        /// Flow data YAML file
        #[arg(short, long)]
        data: String,
        /// Snapshot store YAML file (created when missing)
        #[arg(short, long)]
        store: String,
        /// Team id
        #[arg(short, long)]
        team: u64,
        /// Consolidate up to the week of this date (YYYY-MM-DD)
        #[arg(long, default_value_t = default_today())]
        today: String,
    },
    /// Compute the replenishing view of a team's active projects
    Replenish {
        /// Flow data YAML file
        #[arg(short, long)]
        data: String,
        /// Snapshot store YAML file (created when missing)
        #[arg(short, long)]
        store: String,
        /// Team id
        #[arg(short, long)]
        team: u64,
        /// Replenishing date (YYYY-MM-DD)
        #[arg(long, default_value_t = default_today())]
        today: String,
    },
    /// Print a project's stored consolidations
    Show {
        /// Flow data YAML file
        #[arg(short, long)]
        data: String,
        /// Snapshot store YAML file
        #[arg(short, long)]
        store: String,
        /// Project id
        #[arg(short, long)]
        project: u64,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
        /// Also print the weekly flow series and cumulative flow
        #[arg(long)]
        flow: bool,
        /// Write the latest weekly throughput series to this YAML file
        #[arg(long)]
        throughput_output: Option<String>,
    },
    /// Forecast the weeks needed for a backlog from throughput history
    Forecast {
        /// Throughput YAML file
        #[arg(short = 'f', long)]
        throughput: String,
        /// Number of demands in the backlog
        #[arg(short = 'n', long)]
        backlog: u32,
        /// Number of Monte Carlo trials [default: `trials` from the config]
        #[arg(short, long)]
        iterations: Option<usize>,
        /// Weeks left until the deadline, used for the odds
        #[arg(short, long)]
        weeks_to_deadline: Option<f64>,
        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,
        /// Optional output YAML file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn default_today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| CommandError::InvalidDate(value.to_string()))
}
