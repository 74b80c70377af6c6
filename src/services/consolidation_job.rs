//! Plumbing shared by the consolidation jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use signal_hook::consts::{SIGINT, SIGTERM};
use thiserror::Error;
use tracing::warn;

use crate::services::consolidation_store::{StoreError, UpsertOutcome};
use crate::services::flow_repository::RepositoryError;
use crate::services::statistics_service::RandomSampler;

#[derive(Error, Debug)]
pub enum ConsolidationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{owner} spans {weeks} weeks, more than the configured maximum of {max_weeks}")]
    TooManyPeriods {
        owner: String,
        weeks: usize,
        max_weeks: usize,
    },
    #[error("consolidation cancelled after {completed_weeks} weeks")]
    Cancelled { completed_weeks: usize },
}

/// Cooperative stop signal, checked by the jobs between weeks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancels on the first SIGINT or SIGTERM; a second one exits the process.
    pub fn cancel_on_interrupt(&self) -> std::io::Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register_conditional_shutdown(signal, 130, Arc::clone(&self.0))?;
            signal_hook::flag::register(signal, Arc::clone(&self.0))?;
        }
        Ok(())
    }
}

/// What a single job run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationRun {
    pub weeks: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl ConsolidationRun {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        self.weeks += 1;
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

/// Runs `upsert`, retrying up to `retries` extra times while the store reports
/// a conflicting write.
pub fn upsert_with_retry<F>(retries: u32, mut upsert: F) -> Result<UpsertOutcome, StoreError>
where
    F: FnMut() -> Result<UpsertOutcome, StoreError>,
{
    let mut attempt = 0;
    loop {
        match upsert() {
            Err(StoreError::Conflict { key }) if attempt < retries => {
                attempt += 1;
                warn!(key = %key, attempt, "snapshot write conflicted, retrying");
            }
            result => return result,
        }
    }
}

/// Sampler for one owner's week. With a base seed the draw sequence depends
/// only on `(seed, owner, date)`, so reruns write identical snapshots.
pub fn week_sampler(seed: Option<u64>, owner: u64, date: NaiveDate) -> RandomSampler<StdRng> {
    match seed {
        Some(seed) => RandomSampler::seeded(derive_seed(seed, owner, date)),
        None => RandomSampler::from_entropy(),
    }
}

pub fn derive_seed(seed: u64, owner: u64, date: NaiveDate) -> u64 {
    let day = date.num_days_from_ce() as i64 as u64;
    mix(mix(mix(seed) ^ owner) ^ day)
}

// splitmix64 finalizer
fn mix(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::on_date;

    #[test]
    fn retries_conflicts_until_the_limit() {
        let mut calls = 0;
        let result = upsert_with_retry(2, || {
            calls += 1;
            Err(StoreError::Conflict {
                key: "(1, 2024-01-07)".to_string(),
            })
        });
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn succeeds_once_the_conflict_clears() {
        let mut calls = 0;
        let result = upsert_with_retry(3, || {
            calls += 1;
            if calls == 1 {
                Err(StoreError::Conflict { key: "k".to_string() })
            } else {
                Ok(UpsertOutcome::Inserted)
            }
        });
        assert_eq!(result.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(calls, 2);
    }

    #[cfg(unix)]
    #[test]
    fn termination_signal_cancels_the_token() {
        let token = CancellationToken::new();
        token.cancel_on_interrupt().unwrap();
        assert!(!token.is_cancelled());

        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn derived_seeds_depend_on_every_component() {
        let base = derive_seed(42, 1, on_date(2024, 1, 7));
        assert_eq!(base, derive_seed(42, 1, on_date(2024, 1, 7)));
        assert_ne!(base, derive_seed(43, 1, on_date(2024, 1, 7)));
        assert_ne!(base, derive_seed(42, 2, on_date(2024, 1, 7)));
        assert_ne!(base, derive_seed(42, 1, on_date(2024, 1, 14)));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
