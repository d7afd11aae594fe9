//! Multi-part object store on a local directory tree.
//!
//! Objects live at `<root>/<container>/<key>`. Each upload session is a
//! directory `<root>/<container>/.multipart/<session_id>/` holding a
//! `meta.json` plus one data file and one JSON sidecar per uploaded part.
//! Part ETags are the SHA-256 of the part body, hex-encoded.

mod error;
mod layout;
mod store;

pub use error::FsStoreError;
pub use store::{DEFAULT_PAGE_SIZE, FsObjectStore};
