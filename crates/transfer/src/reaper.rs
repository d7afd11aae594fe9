//! Best-effort cleanup of incomplete sessions.

use std::collections::HashSet;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::pager::SessionLister;
use crate::store::ObjectStore;
use crate::types::{SessionSummary, TransferTarget};

/// Result of aborting one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortOutcome {
    pub session_id: String,
    pub result: Result<(), StoreError>,
}

/// Per-session results of one reap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub outcomes: Vec<AbortOutcome>,
    /// Set when the session listing failed and only already known sessions
    /// were attempted.
    pub listing_failed: bool,
}

impl ReapReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn aborted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &AbortOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Aborts every incomplete session for a target.
pub struct OrphanSessionReaper<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> OrphanSessionReaper<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Lists every incomplete session matching `target` and aborts each one
    /// exactly once, concurrently.
    ///
    /// `known` sessions (for example the losers of resume selection) are
    /// included even if the listing misses them or fails. Sessions in
    /// `exclude` are never aborted. Failures are logged and collected; they
    /// never fail the reap.
    pub async fn reap(
        &self,
        target: &TransferTarget,
        known: &[SessionSummary],
        exclude: &[&str],
    ) -> ReapReport {
        let started = Instant::now();

        let listing = SessionLister::new(self.store, target).collect_all().await;
        let (listed, listing_failed) = match listing {
            Ok(sessions) => (sessions, false),
            Err(e) => {
                warn!(
                    object = %target,
                    error = %e,
                    "could not list incomplete uploads for cleanup"
                );
                (Vec::new(), true)
            }
        };

        let mut seen: HashSet<&str> = exclude.iter().copied().collect();
        let doomed: Vec<&str> = listed
            .iter()
            .chain(known)
            .map(|s| s.session_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();

        if doomed.is_empty() {
            return ReapReport {
                outcomes: Vec::new(),
                listing_failed,
            };
        }

        let results = join_all(doomed.iter().map(|&id| self.store.abort_session(id, target))).await;

        let outcomes: Vec<AbortOutcome> = doomed
            .into_iter()
            .zip(results)
            .map(|(id, result)| AbortOutcome {
                session_id: id.to_string(),
                result,
            })
            .collect();

        let report = ReapReport {
            outcomes,
            listing_failed,
        };

        for failure in report.failed() {
            if let Err(e) = &failure.result {
                warn!(
                    object = %target,
                    session_id = %failure.session_id,
                    error = %e,
                    "unable to abort incomplete upload"
                );
            }
        }

        info!(
            object = %target,
            aborted = report.aborted(),
            attempted = report.attempted(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "incomplete uploads pruned"
        );

        report
    }
}
