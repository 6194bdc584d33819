//! Internal implementation details.
//!
//! `TaggedPtr` and the level generator are pub(crate); the queue traits are
//! public so external wrappers and guard crates can build on them.

pub mod level_generator;
pub mod priority_queue;
pub mod tagged_ptr;

pub(crate) use level_generator::random_level;
pub(crate) use tagged_ptr::TaggedPtr;
pub use priority_queue::PriorityQueue;
pub use priority_queue::PriorityQueueIter;
pub use priority_queue::QueueNode;
