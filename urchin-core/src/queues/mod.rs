//! Concurrent priority queues.
//!
//! # Organization
//!
//! - [`skip_queue`] - Lock-free skiplist priority queue with batched deletion
//! - [`internal`] - Tagged pointers, level generation, the queue traits
//!
//! # Usage
//!
//! Queues are generic over a guard type `G: Guard`:
//!
//! ```ignore
//! use urchin_core::{DeferredGuard, PriorityQueue, SkipQueue};
//!
//! let queue: SkipQueue<u64, &str, DeferredGuard> = SkipQueue::default();
//! queue.insert(3, "c");
//! queue.insert(1, "a");
//! assert_eq!(queue.delete_min(), Some((1, "a")));
//! ```

pub(crate) mod internal;
pub mod skip_queue;

// Re-exports for convenience
pub use skip_queue::{DEFAULT_MAX_OFFSET, NUM_LEVELS, SkipNode, SkipQueue};

// Re-export internal types
// TaggedPtr and the level generator stay pub(crate) - truly internal details
// PriorityQueue and QueueNode are pub for external wrappers and guard crates
pub(crate) use internal::{TaggedPtr, random_level};
pub use internal::{PriorityQueue, PriorityQueueIter, QueueNode};
