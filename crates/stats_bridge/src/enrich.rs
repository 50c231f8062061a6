//! Stat enrichment engine
//!
//! Fetches statistics for a batch of names with bounded concurrency and a
//! per-fetch timeout, merging each outcome into the friend registry as it
//! lands. A failed or slow fetch only affects its own name.

use crate::error::FetchError;
use crate::source::StatsSource;
use core_pipeline::config::EnrichmentConfig;
use core_pipeline::{FriendRegistry, StatsLookup};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Friend registry shared between enrichment workers.
///
/// Writes take a short blocking lock per result. Whole runs are serialized
/// by a separate async gate so the write lock is never held across a fetch.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    registry: Mutex<FriendRegistry>,
    run_gate: tokio::sync::Mutex<()>,
}

impl SharedRegistry {
    pub fn new(registry: FriendRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
            run_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Record one outcome; last writer wins
    pub fn merge(&self, name: &str, lookup: StatsLookup) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge_lookup(name, lookup);
    }

    pub fn lookup(&self, name: &str) -> Option<StatsLookup> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(|entry| entry.stats.clone())
    }

    pub fn snapshot(&self) -> FriendRegistry {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_inner(self) -> FriendRegistry {
        self.registry
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-name outcomes of one run plus tallies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub results: BTreeMap<String, StatsLookup>,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl EnrichmentReport {
    fn from_results(results: BTreeMap<String, StatsLookup>) -> Self {
        let mut report = Self::default();
        for lookup in results.values() {
            match lookup {
                StatsLookup::Found(_) => report.found += 1,
                StatsLookup::NotFound => report.not_found += 1,
                StatsLookup::FetchFailed => report.failed += 1,
            }
        }
        report.results = results;
        report
    }
}

/// Bounded-concurrency fetcher over a [`StatsSource`]
pub struct EnrichmentEngine<S: ?Sized> {
    source: Arc<S>,
    max_concurrency: usize,
    fetch_timeout: Duration,
}

impl<S> EnrichmentEngine<S>
where
    S: StatsSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, config: &EnrichmentConfig) -> Self {
        Self::with_limits(
            source,
            config.max_concurrency,
            Duration::from_secs(config.fetch_timeout_secs),
        )
    }

    pub fn with_limits(source: Arc<S>, max_concurrency: usize, fetch_timeout: Duration) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.max(1),
            fetch_timeout,
        }
    }

    /// Fetch every distinct name and merge the outcomes into `registry`.
    ///
    /// Waits for any other run on the same registry to finish first.
    /// Returns once every fetch has settled; every requested name is in
    /// the report.
    pub async fn enrich(
        &self,
        names: &[String],
        registry: &Arc<SharedRegistry>,
    ) -> EnrichmentReport {
        let _gate = registry.run_gate.lock().await;
        let report = EnrichmentReport::from_results(self.dispatch(names, Some(registry)).await);
        info!(
            requested = report.results.len(),
            found = report.found,
            not_found = report.not_found,
            failed = report.failed,
            "enrichment complete"
        );
        report
    }

    /// Same fetches as [`enrich`](Self::enrich), without touching a registry
    pub async fn fetch_all(&self, names: &[String]) -> BTreeMap<String, StatsLookup> {
        self.dispatch(names, None).await
    }

    async fn dispatch(
        &self,
        names: &[String],
        registry: Option<&Arc<SharedRegistry>>,
    ) -> BTreeMap<String, StatsLookup> {
        let distinct: BTreeSet<String> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        debug!(
            names = distinct.len(),
            max_concurrency = self.max_concurrency,
            "dispatching stats fetches"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for name in distinct.iter().cloned() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let registry = registry.cloned();
            let timeout = self.fetch_timeout;

            tasks.spawn(async move {
                let lookup = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_one(source.as_ref(), &name, timeout).await,
                    Err(_) => StatsLookup::FetchFailed,
                };
                if let Some(registry) = &registry {
                    registry.merge(&name, lookup.clone());
                }
                (name, lookup)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, lookup)) => {
                    results.insert(name, lookup);
                }
                Err(e) => warn!(error = %e, "stats worker aborted"),
            }
        }

        // An aborted worker still owes its name an outcome
        for name in distinct {
            if !results.contains_key(&name) {
                if let Some(registry) = registry {
                    registry.merge(&name, StatsLookup::FetchFailed);
                }
                results.insert(name, StatsLookup::FetchFailed);
            }
        }
        results
    }
}

async fn fetch_one<S>(source: &S, name: &str, timeout: Duration) -> StatsLookup
where
    S: StatsSource + ?Sized,
{
    let result = match tokio::time::timeout(timeout, source.fetch(name)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
    };
    match result {
        Ok(Some(record)) => StatsLookup::Found(record),
        Ok(None) => StatsLookup::NotFound,
        Err(e) => {
            warn!(player = name, error = %e, "stats fetch failed");
            StatsLookup::FetchFailed
        }
    }
}
