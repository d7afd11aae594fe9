//! Resumable, chunked transfer of remote artifacts into multi-part object
//! stores.
//!
//! A [`Streamer`] probes an HTTP-style [`RangeSource`], splits the artifact
//! into fixed-size chunks, and uploads each one as a numbered part of an
//! [`ObjectStore`] upload session. Interrupted transfers leave their session
//! behind; the next run for the same target finds it and uploads only the
//! parts it lacks.

mod config;
mod error;
mod finalizer;
mod pager;
mod planner;
mod progress;
mod reaper;
mod resolver;
mod source;
mod store;
mod streamer;
mod types;
mod validation;
mod worker;

#[cfg(test)]
mod testing;

pub use config::TransferConfig;
pub use error::{SourceError, StoreError, StoreOperation, TransferError};
pub use finalizer::{Finalized, SessionFinalizer};
pub use pager::{PartLister, SessionLister};
pub use planner::{PlanError, chunk_count, offset_of, plan_chunks};
pub use progress::{ChunkReport, ThroughputMeter};
pub use reaper::{AbortOutcome, OrphanSessionReaper, ReapReport};
pub use resolver::{SessionCandidate, SessionResolver, select_resumable};
pub use source::{ArtifactInfo, RangeSource, SourceHeaders, probe};
pub use store::{ObjectStore, PartListing, SessionListing, SessionMarkers};
pub use streamer::Streamer;
pub use types::{
    ChunkDescriptor, PartResult, ResumePoint, SessionSummary, TransferEvent, TransferReport,
    TransferTarget, UploadSession, UploadedPart,
};
pub use validation::{validate_container, validate_key_path, validate_object_key};
pub use worker::ChunkTransferWorker;

/// Smallest chunk a multi-part store accepts for every part but the last.
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Chunk size used when none is configured: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;
