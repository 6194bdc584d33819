//! Lock-free concurrent priority queues.
//!
//! The centerpiece is [`SkipQueue`], a skiplist-backed priority queue in
//! which deletions are batched: `delete_min` marks a single level-0 pointer
//! and the head of the list is lazily advanced past whole runs of deleted
//! nodes, keeping contention on the hot minimum end to one cache line.
//!
//! Memory reclamation is pluggable through the [`Guard`] trait:
//! [`DeferredGuard`] holds every retired node until the queue drops (the
//! testing strategy), while the `urchin-crossbeam` crate provides an
//! epoch-based guard for production use.

pub mod common_tests;
pub mod guard;
pub mod queues;

// Re-export the main types for convenience
pub use guard::{DeferredGuard, DeferredRef, Guard};
pub use queues::{PriorityQueue, PriorityQueueIter, QueueNode, SkipQueue};
