use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures_util::future::BoxFuture;
use partstream_transfer::{
    ObjectStore, PartListing, PartResult, SessionListing, SessionMarkers, SessionSummary,
    StoreError, TransferTarget, UploadedPart,
};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::FsStoreError;
use crate::layout::{
    ASSEMBLY_FILE, META_FILE, PartMeta, SessionMeta, object_path, parse_part_meta_name,
    part_file_name, part_meta_file_name, session_dir, sessions_dir, tmp_path,
};

/// Listing page size used unless [`FsObjectStore::with_page_size`] says
/// otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// [`ObjectStore`] rooted at a local directory.
///
/// Every file is written to a `.tmp` sibling and renamed into place, and a
/// part's sidecar is only written after its data, so a crash mid-upload
/// never leaves a listed part without data.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the maximum number of entries per listing page (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn initiate(&self, target: &TransferTarget) -> Result<String, FsStoreError> {
        object_path(&self.root, target)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = session_dir(&self.root, target, &session_id)?;

        // The session only appears under its id once meta.json is in place.
        let staging = tmp_path(&dir);
        tokio::fs::create_dir_all(&staging).await?;
        let meta = SessionMeta {
            session_id: session_id.clone(),
            key: target.key().to_string(),
            initiated_at: Utc::now(),
        };
        write_atomic(&staging.join(META_FILE), &serde_json::to_vec_pretty(&meta)?).await?;
        tokio::fs::rename(&staging, &dir).await?;

        info!(object = %target, session_id = %session_id, "upload session initiated");
        Ok(session_id)
    }

    /// Resolves a session directory and checks it belongs to `target`.
    async fn open_session(
        &self,
        target: &TransferTarget,
        session_id: &str,
    ) -> Result<PathBuf, FsStoreError> {
        let dir = session_dir(&self.root, target, session_id)?;
        match read_meta(&dir).await? {
            Some(meta) if meta.key == target.key() => Ok(dir),
            _ => Err(FsStoreError::NoSuchUpload(session_id.to_string())),
        }
    }

    async fn upload(
        &self,
        session_id: &str,
        target: &TransferTarget,
        part_number: u32,
        body: Vec<u8>,
    ) -> Result<PartResult, FsStoreError> {
        if part_number == 0 {
            return Err(FsStoreError::InvalidPart(
                "part numbers start at 1".to_string(),
            ));
        }
        let dir = self.open_session(target, session_id).await?;

        let etag = hex::encode(Sha256::digest(&body));
        let meta = PartMeta {
            etag: etag.clone(),
            size: body.len() as u64,
        };
        write_atomic(&dir.join(part_file_name(part_number)), &body).await?;
        write_atomic(
            &dir.join(part_meta_file_name(part_number)),
            &serde_json::to_vec(&meta)?,
        )
        .await?;

        debug!(
            object = %target,
            session_id,
            part_number,
            size = meta.size,
            etag = %etag,
            "part stored"
        );
        Ok(PartResult {
            part_number,
            integrity_tag: etag,
        })
    }

    async fn sessions(
        &self,
        target: &TransferTarget,
        markers: Option<&SessionMarkers>,
    ) -> Result<SessionListing, FsStoreError> {
        let dir = sessions_dir(&self.root, target)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(SessionListing {
                    sessions: Vec::new(),
                    next: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut all = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let named_as_session = entry
                .file_name()
                .to_str()
                .is_some_and(|name| uuid::Uuid::parse_str(name).is_ok());
            if !named_as_session {
                warn!(
                    path = %entry.path().display(),
                    "ignoring stray directory among upload sessions"
                );
                continue;
            }
            match read_meta(&entry.path()).await {
                Ok(Some(meta)) if meta.key.starts_with(target.key()) => {
                    all.push(SessionSummary {
                        session_id: meta.session_id,
                        key: meta.key,
                        initiated_at: meta.initiated_at,
                    });
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(
                        path = %entry.path().display(),
                        "upload session has no {META_FILE}; not listed"
                    );
                }
                Err(e) => {
                    warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "skipping unreadable upload session"
                    );
                }
            }
        }

        let listing = page_sessions(all, markers, self.page_size);
        debug!(
            object = %target,
            sessions = listing.sessions.len(),
            more = listing.next.is_some(),
            "listed upload sessions"
        );
        Ok(listing)
    }

    async fn parts(
        &self,
        session_id: &str,
        target: &TransferTarget,
        part_number_marker: Option<u32>,
    ) -> Result<PartListing, FsStoreError> {
        let dir = self.open_session(target, session_id).await?;

        let mut numbers = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let listed = entry
                .file_name()
                .to_str()
                .and_then(parse_part_meta_name)
                .filter(|&n| part_number_marker.is_none_or(|marker| n > marker));
            numbers.extend(listed);
        }
        numbers.sort_unstable();

        let is_truncated = numbers.len() > self.page_size;
        let mut parts = Vec::with_capacity(numbers.len().min(self.page_size));
        for n in numbers.into_iter().take(self.page_size) {
            let Some(meta) = read_part_meta(&dir, n).await? else {
                continue;
            };
            parts.push(UploadedPart {
                part_number: n,
                integrity_tag: meta.etag,
                size: meta.size,
            });
        }

        Ok(PartListing {
            next_part_number_marker: parts.last().map(|p| p.part_number),
            parts,
            is_truncated,
        })
    }

    async fn complete(
        &self,
        session_id: &str,
        target: &TransferTarget,
        manifest: &[PartResult],
    ) -> Result<String, FsStoreError> {
        let dir = self.open_session(target, session_id).await?;
        let object = object_path(&self.root, target)?;

        if manifest.is_empty() {
            return Err(FsStoreError::InvalidPartOrder("manifest is empty".into()));
        }
        let mut size = 0u64;
        for (expected, part) in (1u32..).zip(manifest) {
            if part.part_number != expected {
                return Err(FsStoreError::InvalidPartOrder(format!(
                    "expected part {expected}, found part {}",
                    part.part_number
                )));
            }
            let stored = read_part_meta(&dir, part.part_number)
                .await?
                .ok_or_else(|| {
                    FsStoreError::InvalidPart(format!(
                        "part {} was never uploaded",
                        part.part_number
                    ))
                })?;
            if stored.etag != part.integrity_tag {
                return Err(FsStoreError::InvalidPart(format!(
                    "part {} etag {} does not match stored {}",
                    part.part_number, part.integrity_tag, stored.etag
                )));
            }
            size += stored.size;
        }

        let assembly = dir.join(ASSEMBLY_FILE);
        let mut out = tokio::fs::File::create(&assembly).await?;
        for part in manifest {
            let path = dir.join(part_file_name(part.part_number));
            let mut data = tokio::fs::File::open(&path).await?;
            tokio::io::copy(&mut data, &mut out).await?;
        }
        out.flush().await?;
        out.sync_all().await?;
        drop(out);

        if let Some(parent) = object.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&assembly, &object).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        info!(
            object = %target,
            session_id,
            parts = manifest.len(),
            size,
            path = %object.display(),
            "object assembled"
        );
        Ok(format!("file://{}", object.display()))
    }

    async fn abort(&self, session_id: &str, target: &TransferTarget) -> Result<(), FsStoreError> {
        let dir = self.open_session(target, session_id).await?;
        tokio::fs::remove_dir_all(&dir).await?;
        info!(object = %target, session_id, "upload session aborted");
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn initiate_session<'a>(
        &'a self,
        target: &'a TransferTarget,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move { Ok(self.initiate(target).await?) })
    }

    fn upload_part<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        part_number: u32,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<PartResult, StoreError>> {
        Box::pin(async move { Ok(self.upload(session_id, target, part_number, body).await?) })
    }

    fn list_sessions<'a>(
        &'a self,
        target: &'a TransferTarget,
        markers: Option<&'a SessionMarkers>,
    ) -> BoxFuture<'a, Result<SessionListing, StoreError>> {
        Box::pin(async move { Ok(self.sessions(target, markers).await?) })
    }

    fn list_parts<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        part_number_marker: Option<u32>,
    ) -> BoxFuture<'a, Result<PartListing, StoreError>> {
        Box::pin(async move { Ok(self.parts(session_id, target, part_number_marker).await?) })
    }

    fn complete_session<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
        parts: &'a [PartResult],
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move { Ok(self.complete(session_id, target, parts).await?) })
    }

    fn abort_session<'a>(
        &'a self,
        session_id: &'a str,
        target: &'a TransferTarget,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { Ok(self.abort(session_id, target).await?) })
    }
}

/// Sorts sessions by `(key, session_id)` and returns the page after
/// `markers`.
fn page_sessions(
    mut all: Vec<SessionSummary>,
    markers: Option<&SessionMarkers>,
    page_size: usize,
) -> SessionListing {
    all.sort_by(|a, b| (&a.key, &a.session_id).cmp(&(&b.key, &b.session_id)));
    if let Some(m) = markers {
        all.retain(|s| (&s.key, &s.session_id) > (&m.key_marker, &m.session_marker));
    }
    let more = all.len() > page_size;
    all.truncate(page_size);
    let next = if more {
        all.last().map(|s| SessionMarkers {
            key_marker: s.key.clone(),
            session_marker: s.session_id.clone(),
        })
    } else {
        None
    };
    SessionListing {
        sessions: all,
        next,
    }
}

async fn read_meta(dir: &Path) -> Result<Option<SessionMeta>, FsStoreError> {
    match tokio::fs::read(dir.join(META_FILE)).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_part_meta(dir: &Path, part_number: u32) -> Result<Option<PartMeta>, FsStoreError> {
    match tokio::fs::read(dir.join(part_meta_file_name(part_number))).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FsStoreError> {
    let tmp = tmp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
