use partstream_transfer::StoreError;

/// Errors produced by [`FsObjectStore`](crate::FsObjectStore).
#[derive(Debug, thiserror::Error)]
pub enum FsStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("no such upload: {0}")]
    NoSuchUpload(String),

    #[error("invalid part: {0}")]
    InvalidPart(String),

    #[error("invalid part order: {0}")]
    InvalidPartOrder(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl FsStoreError {
    /// HTTP-style status, so callers can treat this store like a remote one.
    pub fn status(&self) -> u16 {
        match self {
            Self::NoSuchUpload(_) => 404,
            Self::InvalidPart(_) | Self::InvalidPartOrder(_) | Self::InvalidTarget(_) => 400,
            Self::Io(_) | Self::Metadata(_) => 500,
        }
    }
}

impl From<FsStoreError> for StoreError {
    fn from(e: FsStoreError) -> Self {
        StoreError::with_status(e.status(), e.to_string())
    }
}
