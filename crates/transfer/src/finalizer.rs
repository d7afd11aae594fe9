//! Session completion.

use std::time::Instant;

use tracing::{error, info};

use crate::error::TransferError;
use crate::reaper::{OrphanSessionReaper, ReapReport};
use crate::store::ObjectStore;
use crate::types::{SessionSummary, UploadSession};

/// Outcome of a successful finalization.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub destination: String,
    pub reap: ReapReport,
}

/// Completes a multi-part session and prunes what is left for its target.
pub struct SessionFinalizer<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> SessionFinalizer<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Completes `session`, which must hold parts `1..=chunk_count` and
    /// nothing else, then reaps every other incomplete session for the same
    /// target.
    ///
    /// A rejected completion fails with [`TransferError::FatalTransfer`] and
    /// leaves the session in place for a later run to resume or abort.
    /// Cleanup failures are logged only.
    pub async fn finalize(
        &self,
        session: &UploadSession,
        chunk_count: u32,
        reconcile: &[SessionSummary],
    ) -> Result<Finalized, TransferError> {
        let target = session.target();
        let session_id = session.session_id();

        let missing = session.missing_parts(chunk_count);
        if !missing.is_empty() || session.part_count() != chunk_count as usize {
            return Err(TransferError::FatalTransfer {
                target: target.clone(),
                session_id: session_id.to_string(),
                reason: format!(
                    "manifest holds {} parts for a {chunk_count}-part plan (missing {missing:?})",
                    session.part_count()
                ),
                source: None,
            });
        }

        let manifest = session.manifest();
        info!(
            object = %target,
            session_id,
            parts = manifest.len(),
            "last part uploaded; completing upload"
        );

        let started = Instant::now();
        let destination = match self
            .store
            .complete_session(session_id, target, &manifest)
            .await
        {
            Ok(destination) => destination,
            Err(e) => {
                error!(
                    object = %target,
                    session_id,
                    status = ?e.status,
                    error = %e,
                    "completion request failed"
                );
                return Err(TransferError::FatalTransfer {
                    target: target.clone(),
                    session_id: session_id.to_string(),
                    reason: "store rejected the completion request".into(),
                    source: Some(e),
                });
            }
        };

        info!(
            object = %target,
            session_id,
            destination = %destination,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upload completed"
        );

        let reap = OrphanSessionReaper::new(self.store)
            .reap(target, reconcile, &[session_id])
            .await;

        Ok(Finalized { destination, reap })
    }
}
