//! Front-end handles for the path scheduler.
//!
//! [`PathScheduler`] owns the channel into the arbiter and is cheap to
//! clone; [`SchedulerSession`] wraps one logical caller (typically one
//! HTTP request) with a fresh routine identity, so recursive-lock
//! ownership never depends on ambient task identity.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{
    arbiter::{Arbiter, Request, RequestKind, RELEASE_PRIORITY},
    error::{SchedulerError, SchedulerResult},
    path::LockPath,
};

const INBOX_CAPACITY: usize = 1024;

/// Handle to a running arbiter task. All clones feed the same arbiter;
/// the arbiter stops once every handle is dropped.
#[derive(Clone)]
pub struct PathScheduler {
    tx: mpsc::Sender<Request>,
    seq: Arc<AtomicU64>,
}

impl Default for PathScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PathScheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        Arbiter::spawn(rx);
        PathScheduler {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mint a session with a fresh routine identity. All lock and unlock
    /// calls of one logical caller must go through the same session.
    pub fn session(&self) -> SchedulerSession {
        SchedulerSession {
            scheduler: self.clone(),
            routine: Uuid::new_v4().to_string(),
        }
    }

    async fn acquire(
        &self,
        routine: &str,
        paths: Vec<LockPath>,
        priority: i64,
    ) -> SchedulerResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Request {
            routine: routine.to_string(),
            paths,
            priority,
            seq: self.next_seq(),
            kind: RequestKind::Acquire { reply: reply_tx },
        })
        .await?;
        match reply_rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SchedulerError::ConflictRejected {
                routine: routine.to_string(),
            }),
            Err(_) => Err(SchedulerError::ChannelClosed),
        }
    }

    async fn release(&self, routine: &str, paths: Vec<LockPath>) -> SchedulerResult<()> {
        self.send(Request {
            routine: routine.to_string(),
            paths,
            priority: RELEASE_PRIORITY,
            seq: self.next_seq(),
            kind: RequestKind::Release,
        })
        .await
    }

    async fn send(&self, request: Request) -> SchedulerResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// One logical caller's view of the scheduler.
pub struct SchedulerSession {
    scheduler: PathScheduler,
    routine: String,
}

impl SchedulerSession {
    pub fn routine_id(&self) -> &str {
        &self.routine
    }

    /// Block until `path` (and thus its whole subtree) is held by this
    /// session. Locks are recursive per session: re-locking an already
    /// held path succeeds and must be matched by its own unlock.
    pub async fn lock(&self, path: &str) -> SchedulerResult<()> {
        self.lock_many(&[path]).await
    }

    /// Atomically lock every path in `paths`: either all are granted
    /// together or the session keeps waiting. Duplicates take a single
    /// logical hold.
    pub async fn lock_many(&self, paths: &[&str]) -> SchedulerResult<()> {
        let paths = parse_distinct(paths)?;
        self.scheduler
            .acquire(&self.routine, paths, submission_priority())
            .await
    }

    /// Like [`lock`](Self::lock), but served ahead of all pending
    /// normal-priority acquires.
    pub async fn lock_urgent(&self, path: &str) -> SchedulerResult<()> {
        self.lock_many_urgent(&[path]).await
    }

    pub async fn lock_many_urgent(&self, paths: &[&str]) -> SchedulerResult<()> {
        let paths = parse_distinct(paths)?;
        self.scheduler
            .acquire(&self.routine, paths, submission_priority() / 2)
            .await
    }

    /// Release one hold on `path`. Returns as soon as the release is
    /// enqueued; the caller never waits for the arbiter to process it.
    pub async fn unlock(&self, path: &str) -> SchedulerResult<()> {
        self.unlock_many(&[path]).await
    }

    pub async fn unlock_many(&self, paths: &[&str]) -> SchedulerResult<()> {
        let paths = parse_distinct(paths)?;
        self.scheduler.release(&self.routine, paths).await
    }
}

/// Parse and deduplicate a batch of path strings: one logical hold per
/// distinct path per request.
fn parse_distinct(raw: &[&str]) -> SchedulerResult<Vec<LockPath>> {
    let mut paths: Vec<LockPath> = Vec::with_capacity(raw.len());
    for item in raw {
        let path = LockPath::parse(item)?;
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Priority is the submission-time UNIX timestamp in nanoseconds, so
/// earlier requests sort first. Computed once; never re-evaluated.
fn submission_priority() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_distinct_dedupes() {
        let paths = parse_distinct(&["/a/b", "a/b/", "/c"]).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].to_string(), "/a/b");
        assert_eq!(paths[1].to_string(), "/c");
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_routines() {
        let scheduler = PathScheduler::new();
        let first = scheduler.session();
        let second = scheduler.session();
        assert_ne!(first.routine_id(), second.routine_id());
        assert!(!first.routine_id().is_empty());
    }

    #[test]
    fn test_urgent_priority_sorts_earlier() {
        let normal = submission_priority();
        let urgent = submission_priority() / 2;
        assert!(urgent < normal);
    }
}
