//! Remote byte-range sources and the range probe.

use futures_util::future::BoxFuture;
use tracing::{debug, info};

use crate::error::{SourceError, TransferError};

/// Headers-only view of a remote artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceHeaders {
    pub content_length: Option<u64>,
    /// `true` if the source advertised `Accept-Ranges: bytes`.
    pub accepts_byte_ranges: bool,
}

/// A remote artifact served over a range-capable protocol.
///
/// Implementations wrap a long-lived, pooled client and must be safe to
/// share between concurrent transfers.
pub trait RangeSource: Send + Sync {
    /// Fetches response headers without reading the body.
    fn fetch_headers<'a>(
        &'a self,
        locator: &'a str,
    ) -> BoxFuture<'a, Result<SourceHeaders, SourceError>>;

    /// Fetches bytes `start..=end_inclusive`.
    fn fetch_range<'a>(
        &'a self,
        locator: &'a str,
        start: u64,
        end_inclusive: u64,
    ) -> BoxFuture<'a, Result<Vec<u8>, SourceError>>;
}

/// Result of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub total_size: u64,
    pub range_supported: bool,
}

/// Confirms the source can serve partial content and returns its size.
///
/// Fails with [`TransferError::UnsupportedSource`] when ranges are not
/// advertised, the length is unknown, or the artifact is empty. This runs
/// before any store call so an unusable source never leaves a session behind.
pub async fn probe(source: &dyn RangeSource, locator: &str) -> Result<ArtifactInfo, TransferError> {
    let headers = source
        .fetch_headers(locator)
        .await
        .map_err(|source| TransferError::transport(locator, None, None, source))?;

    debug!(
        locator,
        content_length = ?headers.content_length,
        accepts_byte_ranges = headers.accepts_byte_ranges,
        "probed source"
    );

    if !headers.accepts_byte_ranges {
        return Err(unsupported(locator, "server does not accept byte ranges"));
    }

    let total_size = headers
        .content_length
        .ok_or_else(|| unsupported(locator, "server did not report a content length"))?;

    if total_size == 0 {
        return Err(unsupported(locator, "artifact is empty"));
    }

    info!(locator, total_size, "source supports partial downloads");

    Ok(ArtifactInfo {
        total_size,
        range_supported: true,
    })
}

fn unsupported(locator: &str, reason: &str) -> TransferError {
    TransferError::unsupported(locator, reason)
}
