use serde::Serialize;
use thiserror::Error;

use crate::domain::distribution::Forecast;
use crate::domain::throughput::Throughput;
use crate::services::statistics_service::{RandomSampler, ThroughputSampler, run_montecarlo};
use crate::services::throughput_yaml::{ThroughputYamlError, load_throughput_from_yaml_file};

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error(transparent)]
    Throughput(#[from] ThroughputYamlError),
    #[error("number of trials must be greater than zero")]
    InvalidTrials,
}

pub struct ForecastRequest {
    pub backlog: u32,
    pub trials: usize,
    pub max_periods: u32,
    pub weeks_to_deadline: Option<f64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ForecastReport {
    pub data_source: String,
    pub backlog: u32,
    pub trials: usize,
    pub history_periods: usize,
    pub weeks_to_deadline: Option<f64>,
    pub forecast: Forecast,
}

/// Forecasts how many periods a backlog needs, resampling the throughput
/// history stored at `path`.
pub fn forecast_from_throughput_file(
    path: &str,
    request: &ForecastRequest,
    seed: Option<u64>,
) -> Result<ForecastReport, ForecastError> {
    let throughput = load_throughput_from_yaml_file(path)?;
    let mut report = match seed {
        Some(seed) => forecast(&throughput, request, &mut RandomSampler::seeded(seed))?,
        None => forecast(&throughput, request, &mut RandomSampler::from_entropy())?,
    };
    report.data_source = data_source_name(path);
    Ok(report)
}

pub fn forecast(
    throughput: &[Throughput],
    request: &ForecastRequest,
    sampler: &mut dyn ThroughputSampler,
) -> Result<ForecastReport, ForecastError> {
    if request.trials == 0 {
        return Err(ForecastError::InvalidTrials);
    }
    let samples: Vec<f64> = throughput
        .iter()
        .map(|period| period.completed_demands as f64)
        .collect();
    let run = run_montecarlo(
        request.backlog as f64,
        &samples,
        request.trials,
        request.max_periods,
        sampler,
    );

    Ok(ForecastReport {
        data_source: String::new(),
        backlog: request.backlog,
        trials: request.trials,
        history_periods: throughput.len(),
        weeks_to_deadline: request.weeks_to_deadline,
        forecast: run.summarize(request.weeks_to_deadline.unwrap_or(0.0)),
    })
}

fn data_source_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}
