//! Paginated listings of sessions and parts.
//!
//! Each lister is an explicit cursor: it remembers the markers the store
//! handed back, yields one page per call, and can be restarted from a saved
//! marker. Each page is one store call; no listing recurses.

use tracing::{debug, warn};

use crate::error::{StoreOperation, TransferError};
use crate::store::{ObjectStore, SessionMarkers};
use crate::types::{SessionSummary, TransferTarget, UploadedPart};

/// Cursor over the incomplete sessions whose key equals the target key.
pub struct SessionLister<'a> {
    store: &'a dyn ObjectStore,
    target: &'a TransferTarget,
    markers: Option<SessionMarkers>,
    exhausted: bool,
    pages: u32,
}

impl<'a> SessionLister<'a> {
    pub fn new(store: &'a dyn ObjectStore, target: &'a TransferTarget) -> Self {
        Self {
            store,
            target,
            markers: None,
            exhausted: false,
            pages: 0,
        }
    }

    /// Restarts the listing after a previously returned marker pair.
    pub fn starting_at(mut self, markers: SessionMarkers) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Marker pair the next page will start from.
    pub fn markers(&self) -> Option<&SessionMarkers> {
        self.markers.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Fetches the next page, or `None` once the store reported no further
    /// marker. Sessions for other keys sharing the prefix are dropped.
    pub async fn next_page(&mut self) -> Result<Option<Vec<SessionSummary>>, TransferError> {
        if self.exhausted {
            return Ok(None);
        }

        let listing = self
            .store
            .list_sessions(self.target, self.markers.as_ref())
            .await
            .map_err(|e| TransferError::storage(StoreOperation::ListSessions, self.target, None, e))?;
        self.pages += 1;

        let total = listing.sessions.len();
        let matching: Vec<SessionSummary> = listing
            .sessions
            .into_iter()
            .filter(|s| s.key == self.target.key())
            .collect();

        debug!(
            object = %self.target,
            page = self.pages,
            listed = total,
            matching = matching.len(),
            "listed sessions"
        );

        match listing.next {
            Some(next) if self.markers.as_ref() == Some(&next) => {
                warn!(object = %self.target, "session listing did not advance; stopping");
                self.exhausted = true;
            }
            Some(next) => self.markers = Some(next),
            None => self.exhausted = true,
        }

        Ok(Some(matching))
    }

    /// Drains the remaining pages.
    pub async fn collect_all(mut self) -> Result<Vec<SessionSummary>, TransferError> {
        let mut sessions = Vec::new();
        while let Some(page) = self.next_page().await? {
            sessions.extend(page);
        }
        Ok(sessions)
    }
}

/// Cursor over the uploaded parts of one session.
pub struct PartLister<'a> {
    store: &'a dyn ObjectStore,
    target: &'a TransferTarget,
    session_id: &'a str,
    marker: Option<u32>,
    exhausted: bool,
}

impl<'a> PartLister<'a> {
    pub fn new(store: &'a dyn ObjectStore, target: &'a TransferTarget, session_id: &'a str) -> Self {
        Self {
            store,
            target,
            session_id,
            marker: None,
            exhausted: false,
        }
    }

    /// Restarts the listing after `part_number_marker`.
    pub fn starting_at(mut self, part_number_marker: u32) -> Self {
        self.marker = Some(part_number_marker);
        self
    }

    pub fn marker(&self) -> Option<u32> {
        self.marker
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, or `None` once the store stopped truncating.
    pub async fn next_page(&mut self) -> Result<Option<Vec<UploadedPart>>, TransferError> {
        if self.exhausted {
            return Ok(None);
        }

        let listing = self
            .store
            .list_parts(self.session_id, self.target, self.marker)
            .await
            .map_err(|e| {
                TransferError::storage(
                    StoreOperation::ListParts,
                    self.target,
                    Some(self.session_id),
                    e,
                )
            })?;

        debug!(
            object = %self.target,
            session_id = self.session_id,
            parts = listing.parts.len(),
            truncated = listing.is_truncated,
            "listed parts"
        );

        match (listing.is_truncated, listing.next_part_number_marker) {
            (true, Some(next)) if Some(next) > self.marker => {
                self.marker = Some(next);
            }
            (true, _) => {
                warn!(
                    object = %self.target,
                    session_id = self.session_id,
                    "truncated part listing without an advancing marker; stopping"
                );
                self.exhausted = true;
            }
            (false, _) => self.exhausted = true,
        }

        Ok(Some(listing.parts))
    }

    /// Drains the remaining pages.
    pub async fn collect_all(mut self) -> Result<Vec<UploadedPart>, TransferError> {
        let mut parts = Vec::new();
        while let Some(page) = self.next_page().await? {
            parts.extend(page);
        }
        Ok(parts)
    }
}
