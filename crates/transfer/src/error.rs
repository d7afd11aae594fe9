//! Error taxonomy for the transfer engine.

use std::fmt;

use crate::types::TransferTarget;

/// Failure reported by a [`RangeSource`](crate::RangeSource) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SourceError {
    /// Protocol status code, when the source answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl SourceError {
    /// A failure with no response (DNS, TLS, connection reset, ...).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A failure carrying the status the source responded with.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Failure reported by an [`ObjectStore`](crate::ObjectStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub status: Option<u16>,
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Returns `true` if the store reported the session or object as missing.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// The store call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Initiate,
    UploadPart,
    ListSessions,
    ListParts,
    Complete,
    Abort,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiate => "initiate session",
            Self::UploadPart => "upload part",
            Self::ListSessions => "list sessions",
            Self::ListParts => "list parts",
            Self::Complete => "complete session",
            Self::Abort => "abort session",
        };
        f.write_str(name)
    }
}

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source {locator} is not supported{}: {reason}", target_suffix(.target.as_ref()))]
    UnsupportedSource {
        locator: String,
        target: Option<TransferTarget>,
        reason: String,
    },

    #[error(
        "transport error for {locator}{}{}: {source}",
        target_suffix(.target.as_ref()),
        session_suffix(.session_id.as_deref())
    )]
    Transport {
        locator: String,
        target: Option<TransferTarget>,
        session_id: Option<String>,
        #[source]
        source: SourceError,
    },

    #[error("{operation} failed for {target}{}: {source}", session_suffix(.session_id.as_deref()))]
    Storage {
        operation: StoreOperation,
        target: TransferTarget,
        session_id: Option<String>,
        #[source]
        source: StoreError,
    },

    #[error("could not finalize {target} (session {session_id}): {reason}")]
    FatalTransfer {
        target: TransferTarget,
        session_id: String,
        reason: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("transfer to {target} cancelled{}", session_suffix(.session_id.as_deref()))]
    Cancelled {
        target: TransferTarget,
        session_id: Option<String>,
    },
}

impl TransferError {
    pub(crate) fn unsupported(locator: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedSource {
            locator: locator.to_string(),
            target: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(
        locator: &str,
        target: Option<&TransferTarget>,
        session_id: Option<&str>,
        source: SourceError,
    ) -> Self {
        Self::Transport {
            locator: locator.to_string(),
            target: target.cloned(),
            session_id: session_id.map(str::to_string),
            source,
        }
    }

    /// Attaches `target` to source-side errors raised before it was known.
    pub(crate) fn for_target(mut self, target: &TransferTarget) -> Self {
        if let Self::UnsupportedSource { target: slot, .. } | Self::Transport { target: slot, .. } =
            &mut self
        {
            slot.get_or_insert_with(|| target.clone());
        }
        self
    }

    pub(crate) fn storage(
        operation: StoreOperation,
        target: &TransferTarget,
        session_id: Option<&str>,
        source: StoreError,
    ) -> Self {
        Self::Storage {
            operation,
            target: target.clone(),
            session_id: session_id.map(str::to_string),
            source,
        }
    }

    pub(crate) fn cancelled(target: &TransferTarget, session_id: Option<&str>) -> Self {
        Self::Cancelled {
            target: target.clone(),
            session_id: session_id.map(str::to_string),
        }
    }

    /// The destination the failed operation was working on, if known.
    pub fn target(&self) -> Option<&TransferTarget> {
        match self {
            Self::Storage { target, .. }
            | Self::FatalTransfer { target, .. }
            | Self::Cancelled { target, .. } => Some(target),
            Self::UnsupportedSource { target, .. } | Self::Transport { target, .. } => {
                target.as_ref()
            }
            Self::Configuration(_) => None,
        }
    }

    /// The upload session involved, if one had been resolved.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Storage { session_id, .. }
            | Self::Cancelled { session_id, .. }
            | Self::Transport { session_id, .. } => session_id.as_deref(),
            Self::FatalTransfer { session_id, .. } => Some(session_id),
            Self::Configuration(_) | Self::UnsupportedSource { .. } => None,
        }
    }

    /// Returns `true` if a later attempt may pick up where this one stopped.
    pub fn is_resumable(&self) -> bool {
        !matches!(
            self,
            Self::Configuration(_) | Self::UnsupportedSource { .. }
        )
    }
}

fn target_suffix(target: Option<&TransferTarget>) -> String {
    match target {
        Some(target) => format!(" ({target})"),
        None => String::new(),
    }
}

fn session_suffix(session_id: Option<&str>) -> String {
    match session_id {
        Some(id) => format!(" (session {id})"),
        None => String::new(),
    }
}
