//! Hierarchical path scheduler.
//!
//! Serializes mutation of a tree-structured namespace: a lock on a path
//! excludes every other routine from that path and all of its
//! descendants, while siblings proceed concurrently. Acquisition of
//! multiple paths is atomic (all or none), locks are recursive per
//! routine, and pending requests are served in priority order with FIFO
//! ties.
//!
//! All state lives inside a single arbiter task; callers interact
//! through [`PathScheduler`] / [`SchedulerSession`] handles that marshal
//! requests over a channel and await a per-request reply.

mod arbiter;
mod error;
mod path;
mod queue;
mod session;
mod trie;

pub use error::{SchedulerError, SchedulerResult};
pub use path::LockPath;
pub use session::{PathScheduler, SchedulerSession};
