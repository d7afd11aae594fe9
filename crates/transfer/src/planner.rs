//! Chunk planning.
//!
//! The plan is a pure function of `(total_size, chunk_size)`, so a resumed
//! transfer recomputes exactly the boundaries the interrupted one used.

use crate::types::ChunkDescriptor;

/// Why a plan could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("chunk size must be non-zero")]
    ZeroChunkSize,

    #[error("{total_size} bytes needs more than {} parts of {chunk_size} bytes", u32::MAX)]
    TooManyParts { total_size: u64, chunk_size: u64 },
}

/// Number of chunks needed to cover `total_size` bytes.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> u64 {
    assert!(chunk_size > 0, "chunk size must be non-zero");
    total_size.div_ceil(chunk_size)
}

/// Splits `total_size` bytes into ordered chunks of `chunk_size` bytes.
///
/// Every chunk but the last is exactly `chunk_size` long; part numbers run
/// `1..=n` without gaps. A zero-length artifact yields an empty plan. The
/// part count is checked before anything is allocated.
pub fn plan_chunks(
    total_size: u64,
    chunk_size: u64,
) -> Result<Vec<ChunkDescriptor>, PlanError> {
    if chunk_size == 0 {
        return Err(PlanError::ZeroChunkSize);
    }
    let count = u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| {
        PlanError::TooManyParts {
            total_size,
            chunk_size,
        }
    })?;

    Ok((1..=count)
        .map(|part_number| {
            let offset = u64::from(part_number - 1) * chunk_size;
            let length = chunk_size.min(total_size - offset);
            ChunkDescriptor {
                part_number,
                offset,
                length,
                is_last: part_number == count,
            }
        })
        .collect())
}

/// Offset at which `part_number` starts under a given chunk size.
pub fn offset_of(part_number: u32, chunk_size: u64) -> u64 {
    u64::from(part_number.saturating_sub(1)) * chunk_size
}
