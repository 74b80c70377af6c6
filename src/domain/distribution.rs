use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Distribution of "weeks to completion" extracted from a Monte Carlo run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonteCarloSummary {
    pub weeks_min: u32,
    pub weeks_max: u32,
    pub weeks_p50: f64,
    pub weeks_p80: f64,
    pub weeks_std_dev: f64,
    pub odds_to_deadline: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NoThroughputHistory,
    ZeroThroughput,
    PeriodCapExceeded,
}

impl UnavailableReason {
    pub fn describe(&self) -> &'static str {
        match self {
            UnavailableReason::NoThroughputHistory => "no throughput history",
            UnavailableReason::ZeroThroughput => "throughput history has no nonzero values",
            UnavailableReason::PeriodCapExceeded => "backlog did not clear within the period cap",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Forecast {
    Available(MonteCarloSummary),
    Unavailable { reason: UnavailableReason },
}

impl Forecast {
    pub fn summary(&self) -> Option<&MonteCarloSummary> {
        match self {
            Forecast::Available(summary) => Some(summary),
            Forecast::Unavailable { .. } => None,
        }
    }

    pub fn weeks_p80(&self) -> Option<f64> {
        self.summary().map(|summary| summary.weeks_p80)
    }
}
