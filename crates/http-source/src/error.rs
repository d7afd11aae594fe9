use partstream_transfer::SourceError;

/// Errors produced by [`HttpSource`](crate::HttpSource).
#[derive(Debug, thiserror::Error)]
pub enum HttpSourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {received} bytes for range {start}-{end}, expected {expected}")]
    Length {
        url: String,
        start: u64,
        end: u64,
        expected: u64,
        received: u64,
    },
}

impl HttpSourceError {
    /// HTTP status of the failed response, if one arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Request { source, .. } | Self::Body { source, .. } => {
                source.status().map(|s| s.as_u16())
            }
            Self::Length { .. } => None,
        }
    }
}

impl From<HttpSourceError> for SourceError {
    fn from(e: HttpSourceError) -> Self {
        SourceError {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_code() {
        let err = HttpSourceError::Status {
            url: "http://mirror.test/a.iso".into(),
            status: reqwest::StatusCode::NOT_FOUND,
        };
        let source: SourceError = err.into();
        assert_eq!(source.status, Some(404));
        assert!(source.message.contains("404"));
    }

    #[test]
    fn length_error_has_no_status() {
        let err = HttpSourceError::Length {
            url: "http://mirror.test/a.iso".into(),
            start: 0,
            end: 9,
            expected: 10,
            received: 4,
        };
        assert_eq!(err.status(), None);
        assert_eq!(
            err.to_string(),
            "http://mirror.test/a.iso returned 4 bytes for range 0-9, expected 10"
        );
    }
}
