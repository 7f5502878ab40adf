//! Reachability over the live graph.
//!
//! [`collect_reachable`] walks everything. [`prune_reachable`] is what the
//! sweep uses: it subtracts reachable keys from a candidate set in place and
//! stops walking as soon as nothing is left to decide. Both agree on the
//! resulting orphan set.

use crate::models::{
    blob::BlobKey,
    graph::{BlobRef, LiveGraph},
};
use std::collections::BTreeSet;

/// Stored keys eligible for deletion.
pub type CandidateSet = BTreeSet<BlobKey>;

/// Keys referenced by something live.
pub type ReachableSet = BTreeSet<BlobKey>;

/// Every blob reference in the graph: per session, each message's
/// attachments and image parts followed by the session avatar; then the
/// global settings avatars.
pub fn blob_refs(graph: &LiveGraph) -> impl Iterator<Item = BlobRef<'_>> {
    graph
        .sessions
        .iter()
        .flat_map(|session| {
            session
                .messages
                .iter()
                .flat_map(|msg| msg.blob_refs())
                .chain(session.avatar_refs())
        })
        .chain(graph.settings.blob_refs())
}

/// Full scan: every key referenced anywhere in `graph`.
pub fn collect_reachable(graph: &LiveGraph) -> ReachableSet {
    blob_refs(graph)
        .filter_map(|r| r.storage_key())
        .cloned()
        .collect()
}

/// Counters from one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// References looked at before the scan finished or exited early.
    pub refs_visited: usize,
    /// Candidates removed because something live points at them.
    pub candidates_retained: usize,
    /// True when the scan stopped before the end of the graph.
    pub exited_early: bool,
}

/// Remove every reachable key from `candidates`, leaving only orphans.
///
/// The walk stops once `candidates` is empty: nothing further can change the
/// outcome, so the remaining references are skipped.
pub fn prune_reachable(graph: &LiveGraph, candidates: &mut CandidateSet) -> PruneStats {
    let mut stats = PruneStats::default();
    if candidates.is_empty() {
        return stats;
    }

    let mut refs = blob_refs(graph);
    for blob_ref in refs.by_ref() {
        stats.refs_visited += 1;
        let Some(key) = blob_ref.storage_key() else {
            continue;
        };
        if candidates.remove(key) {
            stats.candidates_retained += 1;
            if candidates.is_empty() {
                break;
            }
        }
    }
    stats.exited_early = refs.next().is_some();
    stats
}
