//! src/services/sweep_service.rs
//!
//! One sweep = enumerate stored keys, keep the sweepable ones as candidates,
//! subtract everything reachable from a fresh graph snapshot, delete what is
//! left. Deletes are independent: one failing key never stops the others, and
//! a key that failed is still in the store, so the next sweep picks it up.

use crate::{
    models::blob::BlobKey,
    services::{
        graph_source::{GraphError, GraphSource},
        reachability::{CandidateSet, prune_reachable},
        storage_service::{BlobStore, StorageError},
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("a sweep is already in progress")]
    AlreadyRunning,
    #[error("listing blob keys failed: {0}")]
    Enumeration(#[source] StorageError),
    #[error("reading live graph failed: {0}")]
    Snapshot(#[source] GraphError),
}

pub type SweepResult<T> = Result<T, SweepError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Report orphans without deleting them.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteFailure {
    pub key: BlobKey,
    pub error: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Keys returned by the store, all namespaces.
    pub scanned_keys: usize,
    /// Keys in sweepable namespaces.
    pub candidates: usize,
    /// Candidates with no live reference.
    pub orphans: Vec<BlobKey>,
    pub deleted: Vec<BlobKey>,
    /// Orphans the store no longer had by the time we deleted them.
    pub already_absent: Vec<BlobKey>,
    pub failed: Vec<DeleteFailure>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            scanned_keys: 0,
            candidates: 0,
            orphans: Vec::new(),
            deleted: Vec::new(),
            already_absent: Vec::new(),
            failed: Vec::new(),
            dry_run,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Runs sweeps against a store and a graph source, one at a time.
pub struct Sweeper {
    store: Arc<dyn BlobStore>,
    graph: Arc<dyn GraphSource>,
    options: SweepOptions,
    in_flight: Mutex<()>,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn BlobStore>,
        graph: Arc<dyn GraphSource>,
        options: SweepOptions,
    ) -> Self {
        Self {
            store,
            graph,
            options,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one full collect-then-delete cycle.
    ///
    /// Returns `AlreadyRunning` immediately, without touching the store, if
    /// another sweep holds the guard.
    #[instrument(skip(self), fields(dry_run = self.options.dry_run))]
    pub async fn run_sweep(&self) -> SweepResult<SweepReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return Err(SweepError::AlreadyRunning);
        };

        let mut report = SweepReport::new(self.options.dry_run);

        let stored = self
            .store
            .list_blob_keys()
            .await
            .map_err(SweepError::Enumeration)?;
        report.scanned_keys = stored.len();

        let mut candidates: CandidateSet =
            stored.into_iter().filter(BlobKey::is_sweepable).collect();
        report.candidates = candidates.len();

        if candidates.is_empty() {
            debug!(scanned = report.scanned_keys, "no sweepable blobs, skipping graph scan");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        let graph = self.graph.snapshot().await.map_err(SweepError::Snapshot)?;
        let stats = prune_reachable(&graph, &mut candidates);
        debug!(
            refs_visited = stats.refs_visited,
            retained = stats.candidates_retained,
            exited_early = stats.exited_early,
            "reachability scan finished"
        );

        report.orphans = candidates.into_iter().collect();

        if !self.options.dry_run {
            for key in &report.orphans {
                match self.store.delete_blob(key).await {
                    Ok(true) => {
                        debug!(%key, "deleted orphaned blob");
                        report.deleted.push(key.clone());
                    }
                    Ok(false) => {
                        debug!(%key, "orphaned blob already absent");
                        report.already_absent.push(key.clone());
                    }
                    Err(err) => {
                        warn!(%key, error = %err, "failed to delete orphaned blob");
                        report.failed.push(DeleteFailure {
                            key: key.clone(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            scanned = report.scanned_keys,
            candidates = report.candidates,
            orphans = report.orphans.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "sweep finished"
        );
        Ok(report)
    }
}
