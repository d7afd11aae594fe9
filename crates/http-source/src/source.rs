use futures_util::future::BoxFuture;
use partstream_transfer::{RangeSource, SourceError, SourceHeaders};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use tracing::debug;

use crate::error::HttpSourceError;

/// Range-capable HTTP source.
///
/// Clone the [`reqwest::Client`] you already use elsewhere; connections are
/// pooled per client, so one instance serves every transfer in the process.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn headers(&self, url: &str) -> Result<SourceHeaders, HttpSourceError> {
        // The body is never read; dropping the response closes the stream.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| HttpSourceError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(HttpSourceError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let headers = SourceHeaders {
            content_length: content_length(response.headers()),
            accepts_byte_ranges: accepts_byte_ranges(response.headers()),
        };
        debug!(
            url,
            status = response.status().as_u16(),
            content_length = ?headers.content_length,
            accepts_byte_ranges = headers.accepts_byte_ranges,
            "probed source"
        );
        Ok(headers)
    }

    async fn range(&self, url: &str, start: u64, end: u64) -> Result<Vec<u8>, HttpSourceError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|source| HttpSourceError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(HttpSourceError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| HttpSourceError::Body {
                url: url.to_string(),
                source,
            })?;

        let expected = end - start + 1;
        if body.len() as u64 != expected {
            return Err(HttpSourceError::Length {
                url: url.to_string(),
                start,
                end,
                expected,
                received: body.len() as u64,
            });
        }

        Ok(body.to_vec())
    }
}

impl RangeSource for HttpSource {
    fn fetch_headers<'a>(
        &'a self,
        locator: &'a str,
    ) -> BoxFuture<'a, Result<SourceHeaders, SourceError>> {
        Box::pin(async move { self.headers(locator).await.map_err(SourceError::from) })
    }

    fn fetch_range<'a>(
        &'a self,
        locator: &'a str,
        start: u64,
        end_inclusive: u64,
    ) -> BoxFuture<'a, Result<Vec<u8>, SourceError>> {
        Box::pin(async move {
            self.range(locator, start, end_inclusive)
                .await
                .map_err(SourceError::from)
        })
    }
}

/// Returns `true` if `Accept-Ranges` lists the `bytes` unit.
///
/// The header is a comma-separated token list; units compare
/// case-insensitively. `none` or a missing header mean no range support.
pub fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"))
}

/// Parses `Content-Length`, ignoring malformed values.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
