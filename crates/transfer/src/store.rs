//! The part-oriented object store the engine uploads into.

use futures_util::future::BoxFuture;

use crate::error::StoreError;
use crate::types::{PartResult, SessionSummary, TransferTarget, UploadedPart};

/// Continuation point of a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionMarkers {
    pub key_marker: String,
    pub session_marker: String,
}

/// One page of incomplete sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionListing {
    /// Sessions whose key starts with the target key. Callers must filter
    /// for an exact match.
    pub sessions: Vec<SessionSummary>,
    /// Where the next page starts; `None` once the listing is exhausted.
    pub next: Option<SessionMarkers>,
}

/// One page of a session's uploaded parts.
#[derive(Debug, Clone, Default)]
pub struct PartListing {
    pub parts: Vec<UploadedPart>,
    pub next_part_number_marker: Option<u32>,
    pub is_truncated: bool,
}

/// A store supporting multi-part uploads.
///
/// Implementations wrap a long-lived, pooled client and must be safe to
/// share between concurrent transfers.
pub trait ObjectStore: Send + Sync {
    /// Starts a new multi-part session and returns its id.
    fn initiate_session<'a>(
        &'a self,
        target: &'a TransferTarget,
    ) -> BoxFuture<'a, Result<String, StoreError>>;

    /// Uploads one part. Re-uploading a part number overwrites it.
    fn upload_part<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        part_number: u32,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<PartResult, StoreError>>;

    /// Lists incomplete sessions whose key starts with `target.key()`.
    fn list_sessions<'a>(
        &'a self,
        target: &'a TransferTarget,
        markers: Option<&'a SessionMarkers>,
    ) -> BoxFuture<'a, Result<SessionListing, StoreError>>;

    /// Lists parts with a part number greater than `part_number_marker`.
    fn list_parts<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        part_number_marker: Option<u32>,
    ) -> BoxFuture<'a, Result<PartListing, StoreError>>;

    /// Assembles the object from an ascending, gapless manifest and returns
    /// its destination locator.
    fn complete_session<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        parts: &'a [PartResult],
    ) -> BoxFuture<'a, Result<String, StoreError>>;

    /// Discards a session and its parts.
    fn abort_session<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}
