//! Moves one chunk from the source into the store.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SourceError, StoreOperation, TransferError};
use crate::progress::ChunkReport;
use crate::source::RangeSource;
use crate::store::ObjectStore;
use crate::types::{ChunkDescriptor, PartResult, TransferTarget};

/// Downloads a byte range and uploads it as a numbered part.
///
/// The worker never retries: a failed download or upload fails the chunk,
/// and the caller restarts the whole transfer from the session's watermark.
pub struct ChunkTransferWorker<'a> {
    source: &'a dyn RangeSource,
    store: &'a dyn ObjectStore,
    locator: &'a str,
    target: &'a TransferTarget,
}

impl<'a> ChunkTransferWorker<'a> {
    pub fn new(
        source: &'a dyn RangeSource,
        store: &'a dyn ObjectStore,
        locator: &'a str,
        target: &'a TransferTarget,
    ) -> Self {
        Self {
            source,
            store,
            locator,
            target,
        }
    }

    /// Transfers `chunk` into `session_id`.
    ///
    /// `cancel` is checked before the download and before the upload; a
    /// request already in flight always runs to completion.
    pub async fn transfer(
        &self,
        session_id: &str,
        chunk: &ChunkDescriptor,
        cancel: &CancellationToken,
    ) -> Result<(PartResult, ChunkReport), TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(self.target, Some(session_id)));
        }

        let download_started = Instant::now();
        let body = self
            .source
            .fetch_range(self.locator, chunk.offset, chunk.end_inclusive())
            .await
            .map_err(|source| self.transport(session_id, source))?;
        let download = download_started.elapsed();

        if body.len() as u64 != chunk.length {
            return Err(self.transport(
                session_id,
                SourceError::new(format!(
                    "expected {} bytes for range {}-{}, received {}",
                    chunk.length,
                    chunk.offset,
                    chunk.end_inclusive(),
                    body.len()
                )),
            ));
        }

        debug!(
            object = %self.target,
            session_id,
            part_number = chunk.part_number,
            bytes = chunk.length,
            "chunk downloaded"
        );

        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(self.target, Some(session_id)));
        }

        let upload_started = Instant::now();
        let part = self
            .store
            .upload_part(session_id, self.target, chunk.part_number, body)
            .await
            .map_err(|e| {
                TransferError::storage(StoreOperation::UploadPart, self.target, Some(session_id), e)
            })?;
        let upload = upload_started.elapsed();

        let report = ChunkReport {
            session_id: session_id.to_string(),
            part_number: chunk.part_number,
            bytes: chunk.length,
            download,
            upload,
        };
        Ok((part, report))
    }

    fn transport(&self, session_id: &str, source: SourceError) -> TransferError {
        TransferError::transport(self.locator, Some(self.target), Some(session_id), source)
    }
}
