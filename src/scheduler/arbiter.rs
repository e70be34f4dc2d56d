//! Single-task arbiter owning all scheduler state.
//!
//! Every caller marshals its requests onto one mpsc channel; the arbiter
//! drains that channel into a priority queue and dispatches from the
//! queue head. All mutation of the trie, the queue, and the per-routine
//! grant table happens inside this task, which makes the channel the
//! sole synchronization boundary.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{path::LockPath, queue::RequestQueue, trie::PathTrie};

/// Releases sort ahead of every acquire so a blocked head can always be
/// unblocked by a release arriving later.
pub(crate) const RELEASE_PRIORITY: i64 = -1;

#[derive(Debug)]
pub(crate) enum RequestKind {
    Acquire { reply: oneshot::Sender<bool> },
    Release,
}

#[derive(Debug)]
pub(crate) struct Request {
    pub routine: String,
    pub paths: Vec<LockPath>,
    pub priority: i64,
    pub seq: u64,
    pub kind: RequestKind,
}

pub(crate) struct Arbiter {
    inbox: mpsc::Receiver<Request>,
    queue: RequestQueue,
    trie: PathTrie,
    /// Outstanding grants per routine, one entry per un-released hold.
    grants: HashMap<String, Vec<LockPath>>,
}

impl Arbiter {
    pub fn spawn(inbox: mpsc::Receiver<Request>) -> tokio::task::JoinHandle<()> {
        let arbiter = Arbiter {
            inbox,
            queue: RequestQueue::new(),
            trie: PathTrie::new(),
            grants: HashMap::new(),
        };
        tokio::spawn(arbiter.run())
    }

    async fn run(mut self) {
        // Fully event-driven: suspend until a request arrives, absorb any
        // backlog so a burst is ordered by priority rather than arrival,
        // then dispatch. A release entering the queue re-triggers
        // dispatch, which is what unblocks a stuck head.
        while let Some(request) = self.inbox.recv().await {
            self.queue.push(request);
            while let Ok(request) = self.inbox.try_recv() {
                self.queue.push(request);
            }
            self.dispatch();
        }
        debug!("arbiter stopped: all scheduler handles dropped");
    }

    /// Serve the queue head until it blocks. A blocked acquire halts
    /// dispatch entirely; lower-priority requests wait behind it.
    fn dispatch(&mut self) {
        loop {
            let granted = match self.queue.peek() {
                None => return,
                Some(head) => match head.kind {
                    RequestKind::Release => false,
                    RequestKind::Acquire { .. } => {
                        if !self.trie.try_acquire(&head.routine, &head.paths) {
                            self.log_blocked(head);
                            return;
                        }
                        true
                    }
                },
            };

            let request = self.queue.pop().expect("queue head vanished mid-dispatch");
            if granted {
                self.finish_grant(request);
            } else {
                self.finish_release(request);
            }
        }
    }

    /// The trie already holds the paths; record the grant and wake the
    /// caller. A caller that disappeared before the grant gets it rolled
    /// back so the paths do not leak.
    fn finish_grant(&mut self, request: Request) {
        let Request {
            routine,
            paths,
            kind,
            ..
        } = request;
        let RequestKind::Acquire { reply } = kind else {
            return;
        };
        if reply.send(true).is_err() {
            warn!(%routine, "caller abandoned lock request; rolling back grant");
            for path in &paths {
                if let Err(error) = self.trie.release(&routine, path) {
                    warn!(%routine, %error, "grant rollback failed");
                }
            }
            return;
        }
        debug!(%routine, count = paths.len(), "granted");
        self.grants.entry(routine).or_default().extend(paths);
    }

    fn finish_release(&mut self, request: Request) {
        let Request {
            routine, paths, ..
        } = request;
        for path in &paths {
            match self.trie.release(&routine, path) {
                Ok(()) => {
                    debug!(%routine, path = %path, "released");
                    if let Some(held) = self.grants.get_mut(&routine) {
                        if let Some(position) = held.iter().position(|candidate| candidate == path)
                        {
                            held.swap_remove(position);
                        }
                    }
                }
                Err(error) => warn!(%routine, path = %path, %error, "release ignored"),
            }
        }
        if self.grants.get(&routine).is_some_and(Vec::is_empty) {
            self.grants.remove(&routine);
        }
    }

    fn log_blocked(&self, head: &Request) {
        for path in &head.paths {
            if self.trie.is_blocked(&head.routine, path) {
                debug!(
                    routine = %head.routine,
                    path = %path,
                    pending = self.queue.len(),
                    held = self.trie.explicit_count(),
                    "acquire blocked"
                );
            }
        }
    }
}
