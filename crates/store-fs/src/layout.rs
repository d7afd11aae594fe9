//! On-disk layout of containers, objects and upload sessions.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use partstream_transfer::{TransferTarget, validate_key_path};
use serde::{Deserialize, Serialize};

use crate::error::FsStoreError;

/// Directory under each container that holds upload sessions.
pub(crate) const MULTIPART_DIR: &str = ".multipart";

pub(crate) const META_FILE: &str = "meta.json";

/// Temporary file a completion assembles the object into.
pub(crate) const ASSEMBLY_FILE: &str = "object.tmp";

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionMeta {
    pub session_id: String,
    pub key: String,
    pub initiated_at: DateTime<Utc>,
}

/// Sidecar written next to each part's data once the data is in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PartMeta {
    pub etag: String,
    pub size: u64,
}

pub(crate) fn container_dir(root: &Path, target: &TransferTarget) -> Result<PathBuf, FsStoreError> {
    let container = target.container();
    let mut components = Path::new(container).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if container != MULTIPART_DIR => {
            Ok(root.join(container))
        }
        _ => Err(FsStoreError::InvalidTarget(format!(
            "container must be a single directory name: {container}"
        ))),
    }
}

pub(crate) fn object_path(root: &Path, target: &TransferTarget) -> Result<PathBuf, FsStoreError> {
    let key = target.key();
    validate_key_path(key).map_err(|e| FsStoreError::InvalidTarget(e.to_string()))?;
    let first = Path::new(key).components().find_map(|c| match c {
        Component::Normal(name) => Some(name),
        _ => None,
    });
    if first.is_some_and(|name| name == MULTIPART_DIR) {
        return Err(FsStoreError::InvalidTarget(format!(
            "object key may not start with {MULTIPART_DIR}: {key}"
        )));
    }
    Ok(container_dir(root, target)?.join(key))
}

pub(crate) fn sessions_dir(root: &Path, target: &TransferTarget) -> Result<PathBuf, FsStoreError> {
    Ok(container_dir(root, target)?.join(MULTIPART_DIR))
}

/// Directory of one session. Ids that are not UUIDs cannot name a session,
/// so they never reach the filesystem.
pub(crate) fn session_dir(
    root: &Path,
    target: &TransferTarget,
    session_id: &str,
) -> Result<PathBuf, FsStoreError> {
    uuid::Uuid::parse_str(session_id)
        .map_err(|_| FsStoreError::NoSuchUpload(session_id.to_string()))?;
    Ok(sessions_dir(root, target)?.join(session_id))
}

pub(crate) fn part_file_name(part_number: u32) -> String {
    format!("part-{part_number:05}")
}

pub(crate) fn part_meta_file_name(part_number: u32) -> String {
    format!("part-{part_number:05}.json")
}

/// Part number of a sidecar file name, if it is one.
pub(crate) fn parse_part_meta_name(name: &str) -> Option<u32> {
    name.strip_prefix("part-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// `path` with `.tmp` appended, used for write-then-rename.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
