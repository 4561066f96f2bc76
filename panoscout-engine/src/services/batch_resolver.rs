//! Batch coverage resolution
//!
//! Fans [`CoverageResolver`] out over many locations. Network concurrency is
//! bounded by the resolver's shared [`FetchPermits`](super::metadata_client::FetchPermits)
//! pool, which every fetch (base and nested spatial) draws from. Output order
//! matches input order; one location's failure never affects another.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use panoscout_common::config::BatchConfig;
use panoscout_common::PanoId;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::coverage_resolver::{CoverageResolver, CoverageVerdict};

/// One location to check: its pano and the capture date its tags claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub pano_id: PanoId,
    pub year: String,
    pub month: String,
}

impl ResolveRequest {
    pub fn new(pano_id: impl Into<PanoId>, year: impl Into<String>, month: impl Into<String>) -> Self {
        Self {
            pano_id: pano_id.into(),
            year: year.into(),
            month: month.into(),
        }
    }
}

/// Completed/total counters, readable while a batch runs
#[derive(Debug, Default)]
pub struct BatchProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl BatchProgress {
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
    }

    fn record(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Resolves batches of locations concurrently
///
/// One resolver runs one batch at a time so [`BatchProgress`] always
/// describes a single batch; overlapping `resolve_all` calls queue.
pub struct BatchResolver {
    resolver: CoverageResolver,
    config: BatchConfig,
    progress: Arc<BatchProgress>,
    running: Mutex<()>,
}

impl BatchResolver {
    pub fn new(resolver: CoverageResolver, config: BatchConfig) -> Self {
        Self {
            resolver,
            config,
            progress: Arc::new(BatchProgress::default()),
            running: Mutex::new(()),
        }
    }

    /// Shared handle for observing the running batch
    pub fn progress(&self) -> Arc<BatchProgress> {
        Arc::clone(&self.progress)
    }

    pub fn resolver(&self) -> &CoverageResolver {
        &self.resolver
    }

    /// Resolve every request; slot `i` of the output belongs to request `i`
    ///
    /// A slot is `None` when its resolution failed, panicked, or had not
    /// finished when the batch deadline expired.
    pub async fn resolve_all(&self, requests: &[ResolveRequest]) -> Vec<Option<CoverageVerdict>> {
        let _running = self.running.lock().await;

        let total = requests.len();
        let log_every = self.config.progress_log_every.max(1);
        self.progress.start(total);

        info!(
            total,
            max_concurrent_fetches = self.resolver.fetcher().permits().capacity(),
            "Starting batch coverage resolution"
        );

        let resolver = &self.resolver;
        let progress = &self.progress;

        let results = stream::iter(requests.iter().enumerate())
            .map(move |(index, request)| async move {
                let outcome = AssertUnwindSafe(resolver.resolve(&request.pano_id, &request.year, &request.month))
                    .catch_unwind()
                    .await;

                let verdict = match outcome {
                    Ok(Ok(verdict)) => Some(verdict),
                    Ok(Err(e)) => {
                        warn!(pano_id = %request.pano_id, error = %e, "Resolution failed");
                        None
                    }
                    Err(_) => {
                        error!(pano_id = %request.pano_id, "Resolution panicked");
                        None
                    }
                };

                let done = progress.record();
                if done % log_every == 0 || done == total {
                    info!(progress = format!("{}/{}", done, total), "Batch progress update");
                }

                (index, verdict)
            })
            .buffer_unordered(self.config.max_inflight_resolutions.max(1));
        futures::pin_mut!(results);

        let mut slots: Vec<Option<CoverageVerdict>> = vec![None; total];
        let deadline = self.config.deadline().map(|d| tokio::time::Instant::now() + d);

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, results.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            completed = progress.completed(),
                            total,
                            "Batch deadline expired, unfinished locations left unresolved"
                        );
                        break;
                    }
                },
                None => results.next().await,
            };

            match next {
                Some((index, verdict)) => slots[index] = verdict,
                None => break,
            }
        }

        let resolved = slots.iter().filter(|s| s.is_some()).count();
        info!(total, resolved, unresolved = total - resolved, "Batch coverage resolution completed");

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counters() {
        let progress = BatchProgress::default();
        progress.start(3);
        assert_eq!(progress.total(), 3);
        assert_eq!(progress.completed(), 0);
        assert_eq!(progress.record(), 1);
        assert_eq!(progress.record(), 2);
        assert_eq!(progress.completed(), 2);

        progress.start(1);
        assert_eq!(progress.completed(), 0);
    }

    #[test]
    fn test_request_constructor() {
        let request = ResolveRequest::new("ABC123", "2023", "05");
        assert_eq!(request.pano_id, PanoId::from("ABC123"));
        assert_eq!(request.year, "2023");
        assert_eq!(request.month, "05");
    }
}
