//! Upload-session discovery and resume-point selection.

use std::cmp::Ordering;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::error::{StoreOperation, TransferError};
use crate::pager::{PartLister, SessionLister};
use crate::planner::offset_of;
use crate::store::ObjectStore;
use crate::types::{
    ChunkDescriptor, PartResult, ResumePoint, SessionSummary, TransferTarget, UploadSession,
    UploadedPart,
};

/// A discovered session together with its full part listing.
#[derive(Debug, Clone)]
pub struct SessionCandidate {
    pub summary: SessionSummary,
    pub parts: Vec<UploadedPart>,
}

/// Picks the session to resume: most uploaded parts first, then the most
/// recently initiated. Returns the index into `candidates`.
pub fn select_resumable(candidates: &[SessionCandidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| compare_progress(a, b))
        .map(|(i, _)| i)
}

fn compare_progress(a: &SessionCandidate, b: &SessionCandidate) -> Ordering {
    a.parts
        .len()
        .cmp(&b.parts.len())
        .then(a.summary.initiated_at.cmp(&b.summary.initiated_at))
}

/// Resolves where a transfer to one target should pick up.
pub struct SessionResolver<'a> {
    store: &'a dyn ObjectStore,
    chunk_size: u64,
}

impl<'a> SessionResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, chunk_size: u64) -> Self {
        Self { store, chunk_size }
    }

    /// Finds every incomplete session for `target`, keeps the one with the
    /// most progress, and returns its resume point. When none can be
    /// resumed, a new session is initiated.
    ///
    /// Parts whose size disagrees with `plan` are dropped from the resumed
    /// session so they get uploaded again. All other sessions end up in
    /// [`ResumePoint::reconcile`] untouched.
    pub async fn resolve(
        &self,
        target: &TransferTarget,
        plan: &[ChunkDescriptor],
    ) -> Result<ResumePoint, TransferError> {
        let discovered = SessionLister::new(self.store, target).collect_all().await?;
        info!(
            object = %target,
            sessions = discovered.len(),
            "searched for incomplete uploads"
        );

        let (mut candidates, mut reconcile) = self.load_candidates(target, discovered).await;

        let Some(keep) = select_resumable(&candidates) else {
            let session = self.initiate(target).await?;
            return Ok(ResumePoint {
                session,
                next_part_number: 1,
                next_offset: 0,
                reconcile,
            });
        };

        let chosen = candidates.swap_remove(keep);
        reconcile.extend(candidates.into_iter().map(|c| c.summary));

        let parts = usable_parts(&chosen, plan, target);
        let session = UploadSession::resumed(&chosen.summary, target.clone(), parts);
        let next_part_number = session.watermark() + 1;

        info!(
            object = %target,
            session_id = session.session_id(),
            initiated_at = %chosen.summary.initiated_at,
            uploaded_parts = session.part_count(),
            next_part_number,
            others = reconcile.len(),
            "resuming incomplete upload"
        );

        Ok(ResumePoint {
            session,
            next_part_number,
            next_offset: offset_of(next_part_number, self.chunk_size),
            reconcile,
        })
    }

    /// Lists the incomplete sessions for `target` with their parts, most
    /// progress first. Sessions whose parts cannot be listed are left out.
    pub async fn find_incomplete(
        &self,
        target: &TransferTarget,
    ) -> Result<Vec<SessionCandidate>, TransferError> {
        let discovered = SessionLister::new(self.store, target).collect_all().await?;
        let (mut candidates, _) = self.load_candidates(target, discovered).await;
        candidates.sort_by(|a, b| compare_progress(b, a));
        Ok(candidates)
    }

    /// Lists every session's parts concurrently. Sessions whose listing
    /// fails cannot be resumed and are returned as reconciliation
    /// candidates instead.
    async fn load_candidates(
        &self,
        target: &TransferTarget,
        discovered: Vec<SessionSummary>,
    ) -> (Vec<SessionCandidate>, Vec<SessionSummary>) {
        let listings = join_all(discovered.iter().map(|summary| {
            PartLister::new(self.store, target, &summary.session_id).collect_all()
        }))
        .await;

        let mut candidates = Vec::new();
        let mut unusable = Vec::new();
        for (summary, listing) in discovered.into_iter().zip(listings) {
            match listing {
                Ok(parts) => candidates.push(SessionCandidate { summary, parts }),
                Err(e) => {
                    warn!(
                        object = %target,
                        session_id = %summary.session_id,
                        error = %e,
                        "could not list parts; session will not be resumed"
                    );
                    unusable.push(summary);
                }
            }
        }
        (candidates, unusable)
    }

    async fn initiate(&self, target: &TransferTarget) -> Result<UploadSession, TransferError> {
        info!(object = %target, "no resumable upload found; initiating one");
        let session_id = self
            .store
            .initiate_session(target)
            .await
            .map_err(|e| TransferError::storage(StoreOperation::Initiate, target, None, e))?;
        info!(object = %target, session_id = %session_id, "upload session created");
        Ok(UploadSession::new(session_id, target.clone()))
    }
}

/// Keeps only parts that exist in the plan with the planned length.
fn usable_parts(
    candidate: &SessionCandidate,
    plan: &[ChunkDescriptor],
    target: &TransferTarget,
) -> Vec<PartResult> {
    candidate
        .parts
        .iter()
        .filter(|part| {
            let planned = plan
                .get((part.part_number as usize).wrapping_sub(1))
                .map(|c| c.length);
            let fits = planned == Some(part.size);
            if !fits {
                warn!(
                    object = %target,
                    session_id = %candidate.summary.session_id,
                    part_number = part.part_number,
                    size = part.size,
                    planned = ?planned,
                    "uploaded part does not match the plan; it will be uploaded again"
                );
            }
            fits
        })
        .map(UploadedPart::to_result)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_chunks;
    use crate::testing::{Call, MIB5, MockStore, at, target};

    const SCENARIO_SIZE: u64 = 12_582_912;

    fn candidate(id: &str, parts: u32, minutes: i64) -> SessionCandidate {
        SessionCandidate {
            summary: SessionSummary {
                session_id: id.into(),
                key: "k".into(),
                initiated_at: at(minutes),
            },
            parts: (1..=parts)
                .map(|n| UploadedPart {
                    part_number: n,
                    integrity_tag: String::new(),
                    size: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn most_parts_wins() {
        let c = vec![candidate("a", 1, 30), candidate("b", 3, 0), candidate("c", 2, 60)];
        assert_eq!(select_resumable(&c), Some(1));
    }

    #[test]
    fn ties_go_to_most_recent() {
        let c = vec![candidate("a", 2, 0), candidate("b", 2, 45), candidate("c", 2, 10)];
        assert_eq!(select_resumable(&c), Some(1));
    }

    #[test]
    fn nothing_to_select() {
        assert_eq!(select_resumable(&[]), None);
    }

    #[tokio::test]
    async fn creates_session_when_none_exist() {
        let store = MockStore::new();
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.next_part_number, 1);
        assert_eq!(point.next_offset, 0);
        assert!(!point.is_resumed());
        assert!(point.reconcile.is_empty());
        assert_eq!(store.calls(), vec![Call::ListSessions, Call::Initiate]);
    }

    #[tokio::test]
    async fn resumes_after_last_uploaded_part() {
        let store = MockStore::new();
        store.seed("prior", "isos/debian.iso", at(0), &[1, 2], MIB5);
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.session.session_id(), "prior");
        assert_eq!(point.next_part_number, 3);
        assert_eq!(point.next_offset, 2 * MIB5);
        assert_eq!(point.session.part_count(), 2);
        assert!(point.is_resumed());
        assert!(!store.calls().contains(&Call::Initiate));
    }

    #[tokio::test]
    async fn losers_are_reconciled_not_touched() {
        let store = MockStore::new();
        store.seed("few", "isos/debian.iso", at(50), &[1], MIB5);
        store.seed("most", "isos/debian.iso", at(0), &[1, 2], MIB5);
        store.seed("neighbour", "isos/debian.iso.sha256", at(0), &[1, 2, 3], MIB5);
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.session.session_id(), "most");
        let reconcile: Vec<&str> = point.reconcile.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(reconcile, vec!["few"]);
        assert_eq!(store.part_numbers("few"), vec![1]);
        assert!(store.aborts().is_empty());
        assert!(store.uploads().is_empty());
    }

    #[tokio::test]
    async fn session_with_failed_listing_is_skipped() {
        let store = MockStore::new();
        store.seed("broken", "isos/debian.iso", at(0), &[1, 2], MIB5);
        store.seed("ok", "isos/debian.iso", at(5), &[1], MIB5);
        store.fail_list_parts("broken");
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.session.session_id(), "ok");
        assert_eq!(point.next_part_number, 2);
        assert_eq!(point.reconcile[0].session_id, "broken");
    }

    #[tokio::test]
    async fn initiates_when_every_listing_fails() {
        let store = MockStore::new();
        store.seed("broken", "isos/debian.iso", at(0), &[1], MIB5);
        store.fail_list_parts("broken");
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.next_part_number, 1);
        assert!(point.session.session_id().starts_with("new-"));
        assert_eq!(point.reconcile.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_parts_are_dropped() {
        let store = MockStore::new();
        // Uploaded with a larger chunk size than the current plan uses.
        store.seed("prior", "isos/debian.iso", at(0), &[1, 2], 2 * MIB5);
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.session.session_id(), "prior");
        assert_eq!(point.session.part_count(), 0);
        assert_eq!(point.next_part_number, 1);
        assert_eq!(point.next_offset, 0);
    }

    #[tokio::test]
    async fn gapped_session_resumes_at_first_gap() {
        let store = MockStore::new();
        store.seed("prior", "isos/debian.iso", at(0), &[1, 3], MIB5);
        let plan = plan_chunks(4 * MIB5, MIB5).unwrap();
        let t = target();

        let point = SessionResolver::new(&store, MIB5).resolve(&t, &plan).await.unwrap();
        assert_eq!(point.next_part_number, 2);
        assert_eq!(point.next_offset, MIB5);
        assert_eq!(point.session.missing_parts(4), vec![2, 4]);
    }

    #[tokio::test]
    async fn find_incomplete_orders_by_progress() {
        let store = MockStore::new();
        store.seed("one", "isos/debian.iso", at(0), &[1], MIB5);
        store.seed("three", "isos/debian.iso", at(0), &[1, 2, 3], MIB5);
        store.seed("two-old", "isos/debian.iso", at(0), &[1, 2], MIB5);
        store.seed("two-new", "isos/debian.iso", at(9), &[1, 2], MIB5);
        let t = target();

        let found = SessionResolver::new(&store, MIB5)
            .find_incomplete(&t)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|c| c.summary.session_id.as_str()).collect();
        assert_eq!(ids, vec!["three", "two-new", "two-old", "one"]);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let store = MockStore::new();
        store.fail_list_sessions();
        let plan = plan_chunks(SCENARIO_SIZE, MIB5).unwrap();
        let t = target();

        let err = SessionResolver::new(&store, MIB5)
            .resolve(&t, &plan)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Storage { .. }));
        assert!(!store.calls().contains(&Call::Initiate));
    }
}
