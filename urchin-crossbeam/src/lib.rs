//! Crossbeam-based memory reclamation for urchin queues.
//!
//! This crate provides [`EpochGuard`], an implementation of the
//! `urchin_core::Guard` trait backed by crossbeam-epoch.
//!
//! # Usage
//!
//! ```ignore
//! use urchin_core::{PriorityQueue, SkipQueue};
//! use urchin_crossbeam::EpochGuard;
//!
//! let queue: SkipQueue<u64, String, EpochGuard> = SkipQueue::default();
//! queue.insert(1, "first".to_owned());
//! ```

pub mod epoch_guard;

// Export the Guard implementation
pub use epoch_guard::{EpochGuard, EpochRef};
