//! Numeric primitives behind the consolidations.
//!
//! Every function here degrades to a sentinel instead of failing:
//! - empty input => `0.0` (or an empty collection),
//! - zero variance => `0.0`,
//! - a Monte Carlo run that cannot clear the backlog => capped trials and an
//!   unavailable [`Forecast`].

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::distribution::{Forecast, HistogramBin, MonteCarloSummary, UnavailableReason};

/// Value at `percentile` (0-100), linearly interpolated between the closest
/// ranks of the sorted samples.
pub fn percentile(percentile: f64, samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(samples);
    percentile_sorted(percentile, &sorted)
}

fn percentile_sorted(percentile: f64, sorted: &[f64]) -> f64 {
    let Some(&first) = sorted.first() else {
        return 0.0;
    };
    let last = sorted[sorted.len() - 1];
    if percentile <= 0.0 {
        return first;
    }
    if percentile >= 100.0 {
        return last;
    }

    let rank = (percentile / 100.0) * (sorted.len() as f64 - 1.0);
    let lower_index = rank.floor() as usize;
    let lower = sorted[lower_index];
    let upper = sorted.get(lower_index + 1).copied().unwrap_or(lower);
    lower + (upper - lower) * (rank - rank.floor())
}

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation.
pub fn standard_deviation(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let average = mean(samples);
    let variance = samples
        .iter()
        .map(|value| (value - average).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}

/// Most frequent value; ties go to the smallest value.
pub fn mode(samples: &[f64]) -> f64 {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for value in samples {
        counts.entry(value.to_bits()).or_insert((*value, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|(value_a, count_a), (value_b, count_b)| {
            count_a.cmp(count_b).then_with(|| value_b.total_cmp(value_a))
        })
        .map(|(value, _)| value)
        .unwrap_or(0.0)
}

/// Histogram with Sturges' bin count.
pub fn histogram_bins(samples: &[f64]) -> Vec<HistogramBin> {
    if samples.is_empty() {
        return Vec::new();
    }
    let sorted = sorted_copy(samples);
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if (max - min).abs() < f64::EPSILON {
        return vec![HistogramBin {
            start: min,
            end: max,
            count: sorted.len(),
        }];
    }

    let bin_count = (sorted.len() as f64).log2().ceil() as usize + 1;
    let width = (max - min) / bin_count as f64;
    let mut bins: Vec<HistogramBin> = (0..bin_count)
        .map(|index| HistogramBin {
            start: min + width * index as f64,
            end: min + width * (index + 1) as f64,
            count: 0,
        })
        .collect();
    for value in &sorted {
        let index = (((value - min) / width) as usize).min(bin_count - 1);
        bins[index].count += 1;
    }
    bins
}

/// Share of trials that finish within `weeks_to_deadline`.
pub fn compute_odds_to_deadline(weeks_to_deadline: f64, durations: &[u32]) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    let on_time = durations
        .iter()
        .filter(|duration| **duration as f64 <= weeks_to_deadline)
        .count();
    on_time as f64 / durations.len() as f64
}

/// Picks which historical period a Monte Carlo step draws from.
pub trait ThroughputSampler {
    /// Returns an index in `0..len`; `len` is never zero.
    fn pick_index(&mut self, len: usize) -> usize;
}

pub struct RandomSampler<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSampler<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> ThroughputSampler for RandomSampler<R> {
    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloRun {
    /// Periods needed per trial; capped trials hold the cap.
    pub durations: Vec<u32>,
    pub unavailable: Option<UnavailableReason>,
}

impl MonteCarloRun {
    pub fn summarize(&self, weeks_to_deadline: f64) -> Forecast {
        if let Some(reason) = self.unavailable {
            return Forecast::Unavailable { reason };
        }
        if self.durations.is_empty() {
            return Forecast::Unavailable {
                reason: UnavailableReason::NoThroughputHistory,
            };
        }

        let as_f64: Vec<f64> = self.durations.iter().map(|d| *d as f64).collect();
        Forecast::Available(MonteCarloSummary {
            weeks_min: self.durations.iter().copied().min().unwrap_or(0),
            weeks_max: self.durations.iter().copied().max().unwrap_or(0),
            weeks_p50: percentile(50.0, &as_f64),
            weeks_p80: percentile(80.0, &as_f64),
            weeks_std_dev: standard_deviation(&as_f64),
            odds_to_deadline: compute_odds_to_deadline(weeks_to_deadline, &self.durations),
        })
    }
}

/// Resamples `samples` with replacement until the running sum clears
/// `remaining_backlog`, `trials` times. Each trial stops at `max_periods`;
/// a run with any capped trial is reported as unavailable.
pub fn run_montecarlo<S: ThroughputSampler + ?Sized>(
    remaining_backlog: f64,
    samples: &[f64],
    trials: usize,
    max_periods: u32,
    sampler: &mut S,
) -> MonteCarloRun {
    if remaining_backlog <= 0.0 {
        return MonteCarloRun {
            durations: vec![0; trials],
            unavailable: None,
        };
    }
    if samples.is_empty() {
        return capped_run(trials, max_periods, UnavailableReason::NoThroughputHistory);
    }
    if samples.iter().all(|value| *value <= 0.0) {
        return capped_run(trials, max_periods, UnavailableReason::ZeroThroughput);
    }

    let mut durations = Vec::with_capacity(trials);
    let mut capped_trials = 0;
    for _ in 0..trials {
        let (periods, capped) = simulate_single_run(remaining_backlog, samples, max_periods, sampler);
        if capped {
            capped_trials += 1;
        }
        durations.push(periods);
    }

    MonteCarloRun {
        durations,
        unavailable: (capped_trials > 0).then_some(UnavailableReason::PeriodCapExceeded),
    }
}

fn capped_run(trials: usize, max_periods: u32, reason: UnavailableReason) -> MonteCarloRun {
    MonteCarloRun {
        durations: vec![max_periods; trials],
        unavailable: Some(reason),
    }
}

fn simulate_single_run<S: ThroughputSampler + ?Sized>(
    remaining_backlog: f64,
    samples: &[f64],
    max_periods: u32,
    sampler: &mut S,
) -> (u32, bool) {
    let mut delivered = 0.0;
    let mut periods = 0;
    while delivered < remaining_backlog {
        if periods >= max_periods {
            return (periods, true);
        }
        periods += 1;
        let index = sampler.pick_index(samples.len()).min(samples.len() - 1);
        delivered += samples[index];
    }
    (periods, false)
}

fn sorted_copy(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixedIndexSampler;

    #[test]
    fn percentile_of_empty_samples_is_zero() {
        assert_eq!(percentile(80.0, &[]), 0.0);
    }

    #[test]
    fn percentile_bounds_are_min_and_max() {
        let samples = [7.0, 3.0, 11.0, 5.0];
        assert_eq!(percentile(0.0, &samples), 3.0);
        assert_eq!(percentile(100.0, &samples), 11.0);
        assert_eq!(percentile(-5.0, &samples), 3.0);
        assert_eq!(percentile(150.0, &samples), 11.0);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        // sorted [1, 2, 3, 4]: p80 => rank 2.4 => 3 + 0.4
        let samples = [4.0, 1.0, 3.0, 2.0];
        assert!((percentile(80.0, &samples) - 3.4).abs() < 1e-9);
        assert_eq!(percentile(50.0, &[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(percentile(25.0, &[10.0]), 10.0);
    }

    #[test]
    fn standard_deviation_is_population_based() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(standard_deviation(&samples), 2.0);
        assert_eq!(standard_deviation(&[3.0, 3.0, 3.0]), 0.0);
        assert_eq!(standard_deviation(&[]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mode_prefers_frequency_then_smallest_value() {
        assert_eq!(mode(&[1.0, 2.0, 2.0, 3.0]), 2.0);
        assert_eq!(mode(&[5.0, 1.0, 5.0, 1.0]), 1.0);
        assert_eq!(mode(&[]), 0.0);
    }

    #[test]
    fn histogram_bins_cover_every_sample() {
        let samples = [1.0, 2.0, 2.5, 4.0, 8.0, 9.0, 10.0];
        let bins = histogram_bins(&samples);
        // Sturges: ceil(log2(7)) + 1 = 4
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|bin| bin.count).sum::<usize>(), samples.len());
        assert_eq!(bins[0].start, 1.0);
        assert_eq!(bins[3].end, 10.0);
    }

    #[test]
    fn histogram_of_constant_samples_is_one_bin() {
        let bins = histogram_bins(&[3.0, 3.0]);
        assert_eq!(bins, vec![HistogramBin { start: 3.0, end: 3.0, count: 2 }]);
        assert!(histogram_bins(&[]).is_empty());
    }

    #[test]
    fn odds_to_deadline_is_share_of_trials_within_deadline() {
        assert_eq!(compute_odds_to_deadline(3.0, &[1, 2, 3, 4]), 0.75);
        assert_eq!(compute_odds_to_deadline(3.0, &[]), 0.0);
    }

    #[test]
    fn montecarlo_with_fixed_index_consumes_expected_periods() {
        let mut sampler = FixedIndexSampler(1);
        let run = run_montecarlo(10.0, &[2.0, 4.0, 6.0], 1, 520, &mut sampler);
        assert_eq!(run.durations, vec![3]);
        assert_eq!(run.unavailable, None);
    }

    #[test]
    fn montecarlo_returns_one_duration_per_trial() {
        let mut sampler = RandomSampler::seeded(7);
        let run = run_montecarlo(25.0, &[0.0, 3.0, 5.0, 2.0], 500, 520, &mut sampler);
        assert_eq!(run.durations.len(), 500);
        assert!(run.durations.iter().all(|periods| *periods >= 5));
    }

    #[test]
    fn montecarlo_is_deterministic_for_a_seed() {
        let samples = [1.0, 2.0, 3.0, 0.0, 4.0];
        let first = run_montecarlo(30.0, &samples, 50, 520, &mut RandomSampler::seeded(99));
        let second = run_montecarlo(30.0, &samples, 50, 520, &mut RandomSampler::seeded(99));
        assert_eq!(first, second);
    }

    #[test]
    fn montecarlo_with_no_backlog_takes_zero_periods() {
        let mut sampler = FixedIndexSampler(0);
        let run = run_montecarlo(0.0, &[], 4, 520, &mut sampler);
        assert_eq!(run.durations, vec![0, 0, 0, 0]);
        assert!(matches!(run.summarize(1.0), Forecast::Available(ref s) if s.odds_to_deadline == 1.0));
    }

    #[test]
    fn montecarlo_without_throughput_is_capped_and_unavailable() {
        let mut sampler = FixedIndexSampler(0);
        let empty = run_montecarlo(5.0, &[], 3, 52, &mut sampler);
        assert_eq!(empty.durations, vec![52, 52, 52]);
        assert_eq!(
            empty.summarize(10.0),
            Forecast::Unavailable { reason: UnavailableReason::NoThroughputHistory }
        );

        let zeros = run_montecarlo(5.0, &[0.0, 0.0], 2, 52, &mut sampler);
        assert_eq!(zeros.durations, vec![52, 52]);
        assert_eq!(zeros.unavailable, Some(UnavailableReason::ZeroThroughput));
    }

    #[test]
    fn montecarlo_trials_beyond_the_cap_make_the_forecast_unavailable() {
        // Index 0 always draws the zero period, so the backlog never clears.
        let mut sampler = FixedIndexSampler(0);
        let run = run_montecarlo(5.0, &[0.0, 1.0], 2, 10, &mut sampler);
        assert_eq!(run.durations, vec![10, 10]);
        assert_eq!(run.unavailable, Some(UnavailableReason::PeriodCapExceeded));
    }

    #[test]
    fn summarize_extracts_distribution_statistics() {
        let run = MonteCarloRun {
            durations: vec![2, 3, 3, 4, 8],
            unavailable: None,
        };
        let Forecast::Available(summary) = run.summarize(3.0) else {
            panic!("expected an available forecast");
        };
        assert_eq!(summary.weeks_min, 2);
        assert_eq!(summary.weeks_max, 8);
        assert_eq!(summary.weeks_p50, 3.0);
        assert!((summary.weeks_p80 - 4.8).abs() < 1e-9);
        assert_eq!(summary.odds_to_deadline, 0.6);
    }
}
