//! HTTP file server whose mutations are serialized by a hierarchical
//! path scheduler.
//!
//! Concurrent requests lock the URL paths they touch; a lock on a path
//! covers its whole subtree, so no two callers ever operate on
//! overlapping parts of the namespace at once.

pub mod config;
pub mod fs_ops;
pub mod logging;
pub mod protocols;
pub mod scheduler;
pub mod server;
