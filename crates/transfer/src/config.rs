//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE, TransferError};

/// Tunables for a [`Streamer`](crate::Streamer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Size of every part except possibly the last, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Parts transferred at once. `1` keeps uploads strictly sequential.
    #[serde(default = "default_part_concurrency")]
    pub part_concurrency: usize,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_part_concurrency() -> usize {
    1
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            part_concurrency: default_part_concurrency(),
        }
    }
}

impl TransferConfig {
    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets how many parts may be in flight at once.
    pub fn with_part_concurrency(mut self, part_concurrency: usize) -> Self {
        self.part_concurrency = part_concurrency;
        self
    }

    /// Checks the configuration against the store's hard limits.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(TransferError::Configuration(format!(
                "chunk size must be at least {MIN_CHUNK_SIZE} bytes, was {} bytes",
                self.chunk_size
            )));
        }
        if self.part_concurrency == 0 {
            return Err(TransferError::Configuration(
                "part concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
