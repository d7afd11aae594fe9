//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures_util::future::BoxFuture;

use crate::error::{SourceError, StoreError};
use crate::source::{RangeSource, SourceHeaders};
use crate::store::{ObjectStore, PartListing, SessionListing, SessionMarkers};
use crate::types::{PartResult, SessionSummary, TransferTarget, UploadedPart};

pub(crate) const MIB5: u64 = 5 * 1024 * 1024;

pub(crate) fn target() -> TransferTarget {
    TransferTarget::new("media", "isos/debian.iso").unwrap()
}

pub(crate) fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn tag(session_id: &str, part_number: u32) -> String {
    format!("{session_id}-{part_number}")
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Serves a synthetic artifact of `len` bytes, recording every range fetched.
pub(crate) struct MockSource {
    len: u64,
    accepts_ranges: bool,
    fail_at_offset: Option<u64>,
    pub(crate) header_fetches: Mutex<u32>,
    pub(crate) ranges: Mutex<Vec<(u64, u64)>>,
}

impl MockSource {
    pub(crate) fn new(len: u64) -> Self {
        Self {
            len,
            accepts_ranges: true,
            fail_at_offset: None,
            header_fetches: Mutex::new(0),
            ranges: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn without_ranges(mut self) -> Self {
        self.accepts_ranges = false;
        self
    }

    pub(crate) fn failing_at(mut self, offset: u64) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub(crate) fn fetched(&self) -> Vec<(u64, u64)> {
        self.ranges.lock().unwrap().clone()
    }
}

/// Byte at `offset` of every synthetic artifact.
pub(crate) fn byte_at(offset: u64) -> u8 {
    (offset % 251) as u8
}

impl RangeSource for MockSource {
    fn fetch_headers<'a>(
        &'a self,
        _locator: &'a str,
    ) -> BoxFuture<'a, Result<SourceHeaders, SourceError>> {
        Box::pin(async move {
            *self.header_fetches.lock().unwrap() += 1;
            Ok(SourceHeaders {
                content_length: Some(self.len),
                accepts_byte_ranges: self.accepts_ranges,
            })
        })
    }

    fn fetch_range<'a>(
        &'a self,
        _locator: &'a str,
        start: u64,
        end_inclusive: u64,
    ) -> BoxFuture<'a, Result<Vec<u8>, SourceError>> {
        Box::pin(async move {
            self.ranges.lock().unwrap().push((start, end_inclusive));
            if self.fail_at_offset == Some(start) {
                return Err(SourceError::new("connection reset"));
            }
            let end = end_inclusive.min(self.len - 1);
            Ok((start..=end).map(byte_at).collect())
        })
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Initiate,
    UploadPart(String, u32),
    ListSessions,
    ListParts(String, Option<u32>),
    Complete(String, Vec<u32>),
    Abort(String),
}

struct MockSession {
    key: String,
    initiated_at: DateTime<Utc>,
    parts: BTreeMap<u32, UploadedPart>,
}

#[derive(Default)]
struct MockInner {
    sessions: BTreeMap<String, MockSession>,
    next_id: u32,
    calls: Vec<Call>,
    fail_upload_part: Option<u32>,
    fail_complete: bool,
    fail_list_parts: HashSet<String>,
    fail_abort: HashSet<String>,
    fail_list_sessions: bool,
    completed: BTreeMap<String, Vec<u8>>,
}

/// Store double that keeps sessions in memory and records every call.
pub(crate) struct MockStore {
    inner: Mutex<MockInner>,
    session_page: usize,
    part_page: usize,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(MockInner::default()),
            session_page: 1000,
            part_page: 1000,
        }
    }

    pub(crate) fn with_page_sizes(mut self, sessions: usize, parts: usize) -> Self {
        self.session_page = sessions;
        self.part_page = parts;
        self
    }

    /// Adds an abandoned session holding full-size parts `parts`.
    pub(crate) fn seed(
        &self,
        session_id: &str,
        key: &str,
        initiated_at: DateTime<Utc>,
        parts: &[u32],
        part_size: u64,
    ) {
        let parts = parts
            .iter()
            .map(|&n| {
                (
                    n,
                    UploadedPart {
                        part_number: n,
                        integrity_tag: tag(session_id, n),
                        size: part_size,
                    },
                )
            })
            .collect();
        self.inner.lock().unwrap().sessions.insert(
            session_id.to_string(),
            MockSession {
                key: key.to_string(),
                initiated_at,
                parts,
            },
        );
    }

    pub(crate) fn fail_upload_part(&self, part_number: u32) {
        self.inner.lock().unwrap().fail_upload_part = Some(part_number);
    }

    pub(crate) fn fail_complete(&self) {
        self.inner.lock().unwrap().fail_complete = true;
    }

    pub(crate) fn fail_list_parts(&self, session_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_list_parts
            .insert(session_id.to_string());
    }

    pub(crate) fn fail_list_sessions(&self) {
        self.inner.lock().unwrap().fail_list_sessions = true;
    }

    pub(crate) fn fail_abort(&self, session_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_abort
            .insert(session_id.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn session_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().sessions.keys().cloned().collect()
    }

    pub(crate) fn part_numbers(&self, session_id: &str) -> Vec<u32> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(session_id)
            .map(|s| s.parts.keys().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn completed_object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().completed.get(key).cloned()
    }

    pub(crate) fn uploads(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UploadPart(_, n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn aborts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Abort(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl ObjectStore for MockStore {
    fn initiate_session<'a>(
        &'a self,
        target: &'a TransferTarget,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Initiate);
            inner.next_id += 1;
            let id = format!("new-{}", inner.next_id);
            inner.sessions.insert(
                id.clone(),
                MockSession {
                    key: target.key().to_string(),
                    initiated_at: Utc::now(),
                    parts: BTreeMap::new(),
                },
            );
            Ok(id)
        })
    }

    fn upload_part<'a>(
        &'a self,
        session_id: &'a str,
        _target: &'a TransferTarget,
        part_number: u32,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<PartResult, StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner
                .calls
                .push(Call::UploadPart(session_id.to_string(), part_number));
            if inner.fail_upload_part == Some(part_number) {
                return Err(StoreError::with_status(500, "internal error"));
            }
            let session = inner
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| StoreError::with_status(404, "no such upload"))?;
            let integrity_tag = tag(session_id, part_number);
            session.parts.insert(
                part_number,
                UploadedPart {
                    part_number,
                    integrity_tag: integrity_tag.clone(),
                    size: body.len() as u64,
                },
            );
            Ok(PartResult {
                part_number,
                integrity_tag,
            })
        })
    }

    fn list_sessions<'a>(
        &'a self,
        target: &'a TransferTarget,
        markers: Option<&'a SessionMarkers>,
    ) -> BoxFuture<'a, Result<SessionListing, StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::ListSessions);
            if inner.fail_list_sessions {
                return Err(StoreError::with_status(503, "unavailable"));
            }
            let mut all: Vec<SessionSummary> = inner
                .sessions
                .iter()
                .filter(|(_, s)| s.key.starts_with(target.key()))
                .map(|(id, s)| SessionSummary {
                    session_id: id.clone(),
                    key: s.key.clone(),
                    initiated_at: s.initiated_at,
                })
                .collect();
            all.sort_by(|a, b| (&a.key, &a.session_id).cmp(&(&b.key, &b.session_id)));
            let start = match markers {
                Some(m) => all
                    .iter()
                    .position(|s| (&s.key, &s.session_id) > (&m.key_marker, &m.session_marker))
                    .unwrap_or(all.len()),
                None => 0,
            };
            let page: Vec<SessionSummary> =
                all[start..].iter().take(self.session_page).cloned().collect();
            let next = if start + page.len() < all.len() {
                page.last().map(|s| SessionMarkers {
                    key_marker: s.key.clone(),
                    session_marker: s.session_id.clone(),
                })
            } else {
                None
            };
            Ok(SessionListing {
                sessions: page,
                next,
            })
        })
    }

    fn list_parts<'a>(
        &'a self,
        session_id: &'a str,
        _target: &'a TransferTarget,
        part_number_marker: Option<u32>,
    ) -> BoxFuture<'a, Result<PartListing, StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner
                .calls
                .push(Call::ListParts(session_id.to_string(), part_number_marker));
            if inner.fail_list_parts.contains(session_id) {
                return Err(StoreError::with_status(500, "list parts failed"));
            }
            let session = inner
                .sessions
                .get(session_id)
                .ok_or_else(|| StoreError::with_status(404, "no such upload"))?;
            let after = part_number_marker.unwrap_or(0);
            let remaining: Vec<&UploadedPart> =
                session.parts.range(after + 1..).map(|(_, p)| p).collect();
            let parts: Vec<UploadedPart> = remaining
                .iter()
                .take(self.part_page)
                .map(|p| (*p).clone())
                .collect();
            let is_truncated = remaining.len() > parts.len();
            Ok(PartListing {
                next_part_number_marker: parts.last().map(|p| p.part_number),
                parts,
                is_truncated,
            })
        })
    }

    fn complete_session<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        parts: &'a [PartResult],
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Complete(
                session_id.to_string(),
                parts.iter().map(|p| p.part_number).collect(),
            ));
            if inner.fail_complete {
                return Err(StoreError::with_status(400, "invalid part order"));
            }
            let session = inner
                .sessions
                .remove(session_id)
                .ok_or_else(|| StoreError::with_status(404, "no such upload"))?;
            // Reassemble a size-accurate object from the synthetic pattern.
            let mut object = Vec::new();
            let mut offset = 0u64;
            for p in parts {
                let stored = session
                    .parts
                    .get(&p.part_number)
                    .ok_or_else(|| StoreError::with_status(400, "unknown part"))?;
                if stored.integrity_tag != p.integrity_tag {
                    return Err(StoreError::with_status(400, "etag mismatch"));
                }
                object.extend((offset..offset + stored.size).map(byte_at));
                offset += stored.size;
            }
            inner.completed.insert(target.key().to_string(), object);
            Ok(format!("mock://{}/{}", target.container(), target.key()))
        })
    }

    fn abort_session<'a>(
        &'a self,
        session_id: &'a str,
        _target: &'a TransferTarget,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Abort(session_id.to_string()));
            if inner.fail_abort.contains(session_id) {
                return Err(StoreError::with_status(403, "access denied"));
            }
            inner
                .sessions
                .remove(session_id)
                .map(|_| ())
                .ok_or_else(|| StoreError::with_status(404, "no such upload"))
        })
    }
}
