//! [`RangeSource`](partstream_transfer::RangeSource) over HTTP.
//!
//! Probes with a headers-only GET and fetches chunks with `Range: bytes=a-b`
//! requests on a shared, pooled [`reqwest::Client`].

mod error;
mod source;

pub use error::HttpSourceError;
pub use source::{HttpSource, accepts_byte_ranges, content_length};
