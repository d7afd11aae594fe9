use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TransferError;
use crate::validation::{validate_container, validate_object_key};

/// Destination of a transfer: a container and an exact object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferTarget {
    container: String,
    key: String,
}

impl TransferTarget {
    /// Creates a target, rejecting blank container names and keys.
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Result<Self, TransferError> {
        let container = container.into();
        let key = key.into();
        validate_container(&container)?;
        validate_object_key(&key)?;
        Ok(Self { container, key })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for TransferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.key)
    }
}

/// One planned byte range, mapped one-to-one onto a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// 1-indexed part number.
    pub part_number: u32,
    /// Offset of the first byte within the artifact.
    pub offset: u64,
    /// Number of bytes in this chunk (never zero).
    pub length: u64,
    pub is_last: bool,
}

impl ChunkDescriptor {
    /// Offset of the last byte of the chunk (inclusive).
    pub fn end_inclusive(&self) -> u64 {
        self.offset + self.length - 1
    }
}

/// A part acknowledged by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    pub part_number: u32,
    /// Store-issued checksum / ETag.
    pub integrity_tag: String,
}

/// A part as reported by a part listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPart {
    pub part_number: u32,
    pub integrity_tag: String,
    pub size: u64,
}

impl UploadedPart {
    pub fn to_result(&self) -> PartResult {
        PartResult {
            part_number: self.part_number,
            integrity_tag: self.integrity_tag.clone(),
        }
    }
}

/// An incomplete session as reported by a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub key: String,
    pub initiated_at: DateTime<Utc>,
}

/// A multi-part upload session owned by one active transfer.
///
/// Parts are keyed by part number, so the manifest is always ascending no
/// matter the order they were recorded in.
#[derive(Debug, Clone)]
pub struct UploadSession {
    session_id: String,
    target: TransferTarget,
    parts: BTreeMap<u32, PartResult>,
    initiated_at: DateTime<Utc>,
}

impl UploadSession {
    /// A freshly initiated session with no parts.
    pub fn new(session_id: String, target: TransferTarget) -> Self {
        Self {
            session_id,
            target,
            parts: BTreeMap::new(),
            initiated_at: Utc::now(),
        }
    }

    /// A previously abandoned session, seeded with its durable parts.
    pub fn resumed(
        summary: &SessionSummary,
        target: TransferTarget,
        parts: impl IntoIterator<Item = PartResult>,
    ) -> Self {
        Self {
            session_id: summary.session_id.clone(),
            target,
            parts: parts.into_iter().map(|p| (p.part_number, p)).collect(),
            initiated_at: summary.initiated_at,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target(&self) -> &TransferTarget {
        &self.target
    }

    pub fn initiated_at(&self) -> DateTime<Utc> {
        self.initiated_at
    }

    /// Records a successfully uploaded part. Re-uploading a part number
    /// replaces the earlier tag, mirroring store semantics.
    pub fn record_part(&mut self, part: PartResult) {
        self.parts.insert(part.part_number, part);
    }

    pub fn has_part(&self, part_number: u32) -> bool {
        self.parts.contains_key(&part_number)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Highest part number `k` such that parts `1..=k` are all present.
    pub fn watermark(&self) -> u32 {
        let mut expected = 1;
        for &n in self.parts.keys() {
            if n != expected {
                break;
            }
            expected += 1;
        }
        expected - 1
    }

    /// Part numbers in `1..=chunk_count` that have not been uploaded.
    pub fn missing_parts(&self, chunk_count: u32) -> Vec<u32> {
        (1..=chunk_count).filter(|n| !self.has_part(*n)).collect()
    }

    /// The ascending completion manifest.
    pub fn manifest(&self) -> Vec<PartResult> {
        self.parts.values().cloned().collect()
    }
}

/// Where a transfer picks up.
#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub session: UploadSession,
    pub next_part_number: u32,
    pub next_offset: u64,
    /// Other incomplete sessions for the same target, left for the reaper.
    pub reconcile: Vec<SessionSummary>,
}

impl ResumePoint {
    /// Returns `true` if the session already held durable parts.
    pub fn is_resumed(&self) -> bool {
        self.session.part_count() > 0
    }
}

/// Summary of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub source_locator: String,
    pub destination_locator: String,
    pub total_bytes: u64,
    pub chunk_count: u32,
    /// Parts that were already durable when this run started.
    pub resumed_parts: u32,
    /// Wall time of this run only; earlier interrupted runs are not counted.
    pub elapsed: Duration,
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {} bytes in {} chunks ({} resumed) in {:.2}s",
            self.source_locator,
            self.destination_locator,
            self.total_bytes,
            self.chunk_count,
            self.resumed_parts,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Progress event emitted while a transfer runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Source probed and chunks planned.
    Planned {
        target: TransferTarget,
        total_bytes: u64,
        chunk_count: u32,
    },
    /// Session resolved; `uploaded_parts` were already durable.
    SessionResolved {
        target: TransferTarget,
        session_id: String,
        uploaded_parts: u32,
        next_part_number: u32,
    },
    /// One chunk downloaded and uploaded.
    ChunkCompleted {
        target: TransferTarget,
        part_number: u32,
        chunk_count: u32,
        bytes_done: u64,
        total_bytes: u64,
    },
    Completed {
        target: TransferTarget,
        destination: String,
    },
    Failed {
        target: TransferTarget,
        error: String,
    },
}
