//! Deferred guard implementation for testing.
//!
//! `DeferredGuard` collects every retired node and frees the batch when the
//! guard itself drops (which, for a guard stored in a queue, is when the
//! queue drops). Destruction timing is fully predictable, which makes it the
//! right reclaimer for tests; memory accumulates for the queue's lifetime,
//! which makes it the wrong one for long-running production use.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Mutex;

use super::Guard;

/// A guard that defers all node destruction until it is dropped.
///
/// # Thread Safety
///
/// Retired nodes are collected under a `Mutex`, so `defer_destroy` may be
/// called from any number of threads.
pub struct DeferredGuard {
    deferred: Mutex<Vec<DeferredNode>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct DeferredNode {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// Safety: only the pointer and its deallocation function are stored, and all
// access goes through the Mutex
unsafe impl Send for DeferredNode {}

impl DeferredGuard {
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let nodes = self.deferred.get_mut().unwrap();

        // A node retired twice would be freed twice; catch it before the heap does
        let mut seen: HashSet<usize> = HashSet::new();
        for node in nodes.iter() {
            if !seen.insert(node.ptr as usize) {
                panic!("node {:#x} retired more than once", node.ptr as usize);
            }
        }

        for node in nodes.drain(..) {
            unsafe {
                (node.dealloc)(node.ptr);
            }
        }
    }
}

/// A plain reference handed out by [`DeferredGuard`].
///
/// No extra protection is needed: nothing retired to the stored guard is
/// freed before the guard (and with it the queue) drops.
pub struct DeferredRef<'a, T> {
    data: &'a T,
}

impl<'a, T> DeferredRef<'a, T> {
    pub fn new(data: &'a T) -> Self {
        DeferredRef { data }
    }
}

impl<T> Deref for DeferredRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl Guard for DeferredGuard {
    type GuardedRef<'a, T: 'a> = DeferredRef<'a, T>;

    /// No-op: protection is provided by the queue's stored guard.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let addr = node as usize;
            let mut seen = self.seen.lock().unwrap();
            if !seen.insert(addr) {
                panic!("duplicate defer_destroy at {:#x}", addr);
            }
        }

        let node = DeferredNode {
            ptr: node as *mut (),
            dealloc: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc)
            },
        };
        self.deferred.lock().unwrap().push(node);
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        // Safety: caller guarantees ptr is valid for lifetime 'a
        DeferredRef::new(unsafe { &*ptr })
    }
}
