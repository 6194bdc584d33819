//! Guard trait for memory reclamation strategies.
//!
//! A lock-free queue cannot free an unlinked node immediately: another thread
//! may have read a pointer to it before it was unlinked and may still be
//! walking through it. The `Guard` trait abstracts over the schemes that make
//! this safe (epoch-based reclamation, deferred destruction, a GC).
//!
//! # Design
//!
//! Queues are generic over their guard:
//!
//! ```text
//! SkipQueue<K, V, G: Guard>
//!     │
//!     ├── SkipQueue<K, V, DeferredGuard>   (testing: freed when the queue drops)
//!     └── SkipQueue<K, V, EpochGuard>      (production: urchin-crossbeam)
//! ```
//!
//! Every public queue operation pins a [`Guard::ReadGuard`] for its duration;
//! unlinked nodes are handed to [`Guard::defer_destroy`], which must not run
//! the deallocation until no pinned thread can still reach the node.

mod deferred_guard;

use std::ops::Deref;

pub use deferred_guard::{DeferredGuard, DeferredRef};

/// A memory reclamation guard protecting concurrent access to queue nodes.
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. Nodes passed to `defer_destroy` are not freed while any thread that
///    pinned a `ReadGuard` before the call still holds it
/// 2. `GuardedRef` keeps the referenced data valid for its lifetime
///
/// The queue upholds its side: `defer_destroy` is called at most once per
/// node, and only for nodes that are no longer reachable from the queue head.
pub trait Guard: Sized + Default + Send + Sync {
    /// A reference protected by a guard of this type.
    ///
    /// Must implement `Deref<Target = T>`; the reference owns whatever
    /// protection mechanism it needs for lifetime `'a`.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>;

    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards this holds a pinned epoch handle. For deferred
    /// guards it can be `()` since protection comes from the queue's stored
    /// guard instance.
    type ReadGuard: Sized;

    /// Pin an active read guard for the duration of an operation.
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `node` must be a valid pointer previously allocated by the queue
    /// - `node` must be unlinked (not reachable by a traversal that starts
    ///   at the queue head after this call)
    /// - `dealloc` must be the matching deallocation function for `node`
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));

    /// Create a guarded reference from a raw pointer.
    ///
    /// # Safety
    ///
    /// - `ptr` must point to valid data
    /// - The data must remain valid for lifetime `'a`
    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T>;
}
