use thiserror::Error;

use crate::domain::ids::ProjectId;
use crate::services::consolidation_config::ConfigError;
use crate::services::consolidation_job::ConsolidationError;
use crate::services::consolidation_store::StoreError;
use crate::services::flow_data_yaml::FlowDataYamlError;
use crate::services::flow_repository::RepositoryError;
use crate::services::throughput_forecast::ForecastError;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    FlowData(#[from] FlowDataYamlError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error("invalid date {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("{failed} of {total} projects failed to consolidate")]
    BatchFailed { failed: usize, total: usize },
    #[error("no consolidations stored for project {0}")]
    NoConsolidations(ProjectId),
    #[error("failed to serialize output: {0}")]
    Serialize(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}
