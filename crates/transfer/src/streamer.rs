//! End-to-end orchestration of one artifact transfer.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::finalizer::SessionFinalizer;
use crate::planner::plan_chunks;
use crate::progress::ThroughputMeter;
use crate::reaper::{OrphanSessionReaper, ReapReport};
use crate::resolver::{SessionCandidate, SessionResolver};
use crate::source::{RangeSource, probe};
use crate::store::ObjectStore;
use crate::types::{
    ChunkDescriptor, TransferEvent, TransferReport, TransferTarget, UploadSession,
};
use crate::worker::ChunkTransferWorker;

/// Byte and chunk totals for the run in progress.
#[derive(Debug, Clone, Copy)]
struct Progress {
    chunk_count: u32,
    total_bytes: u64,
    bytes_done: u64,
}

impl Progress {
    fn remaining(&self) -> u64 {
        self.total_bytes.saturating_sub(self.bytes_done)
    }
}

/// Streams remote artifacts into an object store, one multi-part session
/// per target, resuming whatever an earlier run left behind.
pub struct Streamer {
    source: Arc<dyn RangeSource>,
    store: Arc<dyn ObjectStore>,
    config: TransferConfig,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl Streamer {
    /// Creates a streamer after validating `config`.
    pub fn new(
        source: Arc<dyn RangeSource>,
        store: Arc<dyn ObjectStore>,
        config: TransferConfig,
    ) -> Result<Self, TransferError> {
        config.validate()?;
        Ok(Self {
            source,
            store,
            config,
            events: None,
        })
    }

    /// Sends progress events to `tx`. A closed receiver is ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<TransferEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Copies the artifact at `locator` into `target`.
    ///
    /// The source is probed before the store is touched. An incomplete
    /// session for the same target is resumed when one exists, so only the
    /// parts it lacks are fetched. After completion every other incomplete
    /// session for the target is aborted.
    ///
    /// On failure the session (if any) is left in place; running the same
    /// transfer again picks it up.
    pub async fn stream_to_store(
        &self,
        locator: &str,
        target: &TransferTarget,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        let result = self.run(locator, target, cancel).await;
        if let Err(e) = &result {
            error!(
                source = locator,
                object = %target,
                session_id = e.session_id(),
                resumable = e.is_resumable(),
                error = %e,
                "transfer failed"
            );
            self.emit(TransferEvent::Failed {
                target: target.clone(),
                error: e.to_string(),
            })
            .await;
        }
        result
    }

    /// Lists incomplete sessions for `target`, most progress first.
    pub async fn find_incomplete_uploads(
        &self,
        target: &TransferTarget,
    ) -> Result<Vec<SessionCandidate>, TransferError> {
        SessionResolver::new(self.store.as_ref(), self.config.chunk_size)
            .find_incomplete(target)
            .await
    }

    /// Aborts every incomplete session for `target`.
    pub async fn prune_incomplete_uploads(&self, target: &TransferTarget) -> ReapReport {
        OrphanSessionReaper::new(self.store.as_ref())
            .reap(target, &[], &[])
            .await
    }

    async fn run(
        &self,
        locator: &str,
        target: &TransferTarget,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        let started = Instant::now();
        let chunk_size = self.config.chunk_size;
        info!(
            source = locator,
            object = %target,
            chunk_size,
            part_concurrency = self.config.part_concurrency,
            "chunking and streaming"
        );

        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(target, None));
        }

        let artifact = probe(self.source.as_ref(), locator)
            .await
            .map_err(|e| e.for_target(target))?;
        let total_bytes = artifact.total_size;
        let plan = plan_chunks(total_bytes, chunk_size)
            .map_err(|e| TransferError::unsupported(locator, e.to_string()).for_target(target))?;
        // plan_chunks caps the count at u32::MAX.
        let chunks = plan.len() as u32;
        info!(object = %target, total_bytes, chunk_count = chunks, "artifact planned");
        self.emit(TransferEvent::Planned {
            target: target.clone(),
            total_bytes,
            chunk_count: chunks,
        })
        .await;

        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(target, None));
        }

        let resume = SessionResolver::new(self.store.as_ref(), chunk_size)
            .resolve(target, &plan)
            .await?;
        let mut session = resume.session;
        let resumed_parts = session.part_count() as u32;
        self.emit(TransferEvent::SessionResolved {
            target: target.clone(),
            session_id: session.session_id().to_string(),
            uploaded_parts: resumed_parts,
            next_part_number: resume.next_part_number,
        })
        .await;

        let pending: Vec<&ChunkDescriptor> = plan
            .iter()
            .filter(|chunk| !session.has_part(chunk.part_number))
            .collect();
        info!(
            object = %target,
            session_id = session.session_id(),
            pending = pending.len(),
            next_part_number = resume.next_part_number,
            next_offset = resume.next_offset,
            "transferring chunks"
        );

        let progress = Progress {
            chunk_count: chunks,
            total_bytes,
            bytes_done: plan
                .iter()
                .filter(|chunk| session.has_part(chunk.part_number))
                .map(|chunk| chunk.length)
                .sum(),
        };
        self.transfer_chunks(locator, &mut session, &pending, progress, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(target, Some(session.session_id())));
        }

        let finalized = SessionFinalizer::new(self.store.as_ref())
            .finalize(&session, chunks, &resume.reconcile)
            .await?;

        let report = TransferReport {
            source_locator: locator.to_string(),
            destination_locator: finalized.destination.clone(),
            total_bytes,
            chunk_count: chunks,
            resumed_parts,
            elapsed: started.elapsed(),
        };
        info!(object = %target, "{report}");
        self.emit(TransferEvent::Completed {
            target: target.clone(),
            destination: finalized.destination,
        })
        .await;

        Ok(report)
    }

    /// Runs the pending chunks through at most `part_concurrency` workers.
    ///
    /// The first failure stops new chunks from starting; chunks already in
    /// flight are drained and their parts recorded before the error is
    /// returned.
    async fn transfer_chunks(
        &self,
        locator: &str,
        session: &mut UploadSession,
        pending: &[&ChunkDescriptor],
        mut progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let target = session.target().clone();
        let session_id = session.session_id().to_string();
        let worker =
            ChunkTransferWorker::new(self.source.as_ref(), self.store.as_ref(), locator, &target);
        let halt = cancel.child_token();
        let meter = ThroughputMeter::default();
        let mut first_error: Option<TransferError> = None;

        let mut results = stream::iter(pending.iter().copied())
            .map(|chunk| worker.transfer(&session_id, chunk, &halt))
            .buffer_unordered(self.config.part_concurrency);

        while let Some(result) = results.next().await {
            match result {
                Ok((part, report)) => {
                    let part_number = part.part_number;
                    session.record_part(part);
                    progress.bytes_done += report.bytes;
                    meter.record(report.bytes);
                    info!(
                        object = %target,
                        chunk_count = progress.chunk_count,
                        eta_secs = meter.eta(progress.remaining()).map(|d| d.as_secs()),
                        "{report}"
                    );
                    self.emit(TransferEvent::ChunkCompleted {
                        target: target.clone(),
                        part_number,
                        chunk_count: progress.chunk_count,
                        bytes_done: progress.bytes_done,
                        total_bytes: progress.total_bytes,
                    })
                    .await;
                }
                Err(e) => {
                    halt.cancel();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
