use std::alloc::{Layout, alloc, dealloc};
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};

use crate::guard::{DeferredGuard, Guard};
use crate::queues::internal::tagged_ptr::DELETE_MARK;
use crate::queues::{PriorityQueue, QueueNode, TaggedPtr, random_level};

/// Number of list levels; tower heights are drawn from {1..NUM_LEVELS}.
pub const NUM_LEVELS: usize = 32;

/// Deletions tolerated between head-advance attempts when none is given.
pub const DEFAULT_MAX_OFFSET: usize = 16;

type SkipNodePtr<K, V> = *mut SkipNode<K, V>;

// =============================================================================
// QUEUE STRUCTURE & DELETION PROTOCOL
// =============================================================================
//
// Skip list sorted ascending by key; delete_min works at the head end only:
//
// Level 2:  HEAD ─────────────────────────────► 30 ──────────────────► TAIL
//             │                                  │
// Level 1:  HEAD ───────────► 20 ─────────────► 30 ──────────────────► TAIL
//             │                │                 │
// Level 0:  HEAD ──► 10 ─────► 20 ─────────────► 30 ──────► 40 ──────► TAIL
//
// Logical deletion: the mark bit on a level-0 pointer deletes the node the
// pointer LEADS TO. delete_min claims the minimum by fetch_or on the first
// unmarked level-0 pointer reachable from HEAD:
//
//   HEAD ──╳─► 10 ──╳─► 20 ──► 30 ──► ...        (10 and 20 deleted)
//
// Nothing is unlinked per deletion. Every max_offset deletions the claiming
// thread tries to swing HEAD.next[0] directly to the last deleted node, runs
// restructure() to drag the upper HEAD pointers forward, and retires the
// nodes cut off by the swing. Deleters therefore contend on one cache line
// (the marked prefix) instead of performing pointer surgery per operation.
//
// INVARIANTS:
// 1. Level-0 keys are non-decreasing from HEAD to TAIL, marks ignored
// 2. At most one live (reachable over an unmarked pointer) node per key;
//    deleted duplicates may coexist
// 3. A node whose next[0] is marked is itself already deleted; the last node
//    of a deleted run carries no mark of its own
// 4. HEAD and TAIL are never marked, claimed, or reclaimed; TAIL's slots are
//    never dereferenced
// 5. Marked level-0 pointers are frozen: insert CASes expect an unmarked
//    word and fetch_or is idempotent, so a deleted run never changes shape
// 6. A node's tower may be partially spliced while inserting is set; HEAD is
//    never advanced past a node observed with inserting set
//
// =============================================================================
// CLAIM / HEAD-SWING INTERLEAVINGS
// =============================================================================
//
// CLAIM RACE: two deleters fetch_or the same slot; the prior word tells the
// loser (mark already set) to keep scanning at the node the pointer leads to.
//
// INSERT AT THE BOUNDARY: an inserter may splice after the last deleted node
// (its next[0] is unmarked, so the CAS can succeed). The new node is then
// reachable over an unmarked pointer and live. If a deleter marks that slot
// first, the insert CAS fails and retries after a fresh locate.
//
// HEAD SWING vs CLAIM: the swing CAS expects the exact word observed on
// entry to delete_min; any interleaved swing by another deleter fails the
// comparison and the head is left to them.
//
// =============================================================================

// ============================================================================
// SkipNode - node with an inline tower of tagged pointer words
// ============================================================================

/// A queue node.
///
/// Uses the flexible array member pattern: one allocation holds the struct
/// and its `level` tower slots inline, so a node costs a single cache-miss
/// to reach and no separate tower allocation.
///
/// Sentinels (`head`, `tail`) carry no key and no value and are allocated at
/// full height.
#[repr(C)]
pub struct SkipNode<K, V> {
    key: Option<K>,
    value: UnsafeCell<Option<V>>,
    level: usize,
    inserting: AtomicBool,
    // Flexible array: tagged pointer words allocated inline after the struct.
    // Layout: [next[0], next[1], ..., next[level-1]]
    tower: [AtomicUsize; 0],
}

impl<K, V> SkipNode<K, V> {
    /// Layout for a node with the given tower height
    fn node_layout(level: usize) -> Layout {
        Layout::new::<Self>()
            .extend(Layout::array::<AtomicUsize>(level).unwrap())
            .unwrap()
            .0
            .pad_to_align()
    }

    /// Allocate a node carrying an entry; `inserting` starts set.
    fn alloc_with_entry(key: K, value: V, level: usize) -> *mut Self {
        unsafe {
            let layout = Self::node_layout(level);
            let node = alloc(layout) as *mut Self;
            if node.is_null() {
                std::alloc::handle_alloc_error(layout);
            }

            ptr::write(&mut (*node).key, Some(key));
            ptr::write(&mut (*node).value, UnsafeCell::new(Some(value)));
            ptr::write(&mut (*node).level, level);
            ptr::write(&mut (*node).inserting, AtomicBool::new(true));

            let tower_base = (*node).tower.as_ptr() as *mut AtomicUsize;
            for i in 0..level {
                ptr::write(tower_base.add(i), AtomicUsize::new(0));
            }

            node
        }
    }

    /// Allocate a full-height sentinel with no entry.
    fn alloc_sentinel() -> *mut Self {
        unsafe {
            let layout = Self::node_layout(NUM_LEVELS);
            let node = alloc(layout) as *mut Self;
            if node.is_null() {
                std::alloc::handle_alloc_error(layout);
            }

            ptr::write(&mut (*node).key, None);
            ptr::write(&mut (*node).value, UnsafeCell::new(None));
            ptr::write(&mut (*node).level, NUM_LEVELS);
            ptr::write(&mut (*node).inserting, AtomicBool::new(false));

            let tower_base = (*node).tower.as_ptr() as *mut AtomicUsize;
            for i in 0..NUM_LEVELS {
                ptr::write(tower_base.add(i), AtomicUsize::new(0));
            }

            node
        }
    }

    /// Deallocate a node.
    ///
    /// # Safety
    /// The pointer must have been allocated by `alloc_with_entry` or
    /// `alloc_sentinel` and must not be reachable by any thread.
    unsafe fn dealloc_node(node: *mut Self) {
        unsafe {
            let layout = Self::node_layout((*node).level);
            ptr::drop_in_place(&mut (*node).key);
            ptr::drop_in_place(&mut (*node).value);
            dealloc(node as *mut u8, layout);
        }
    }

    // =========================================================================
    // Tower slot access
    // =========================================================================

    /// The AtomicUsize slot at the given tower index
    ///
    /// # Safety
    /// `index` must be below this node's level.
    #[inline]
    unsafe fn slot(&self, index: usize) -> &AtomicUsize {
        unsafe { &*self.tower.as_ptr().add(index) }
    }

    /// Load a tagged next pointer (Acquire)
    #[inline]
    fn load_next(&self, level: usize) -> TaggedPtr<Self> {
        TaggedPtr::from_raw(unsafe { self.slot(level) }.load(Ordering::Acquire))
    }

    /// Store a tagged next pointer (Release)
    #[inline]
    fn store_next(&self, level: usize, next: TaggedPtr<Self>) {
        unsafe { self.slot(level) }.store(next.as_raw(), Ordering::Release);
    }

    /// CAS a tagged next pointer, comparing the full word (AcqRel/Acquire)
    #[inline]
    fn cas_next(
        &self,
        level: usize,
        expected: TaggedPtr<Self>,
        new: TaggedPtr<Self>,
    ) -> Result<usize, usize> {
        unsafe { self.slot(level) }.compare_exchange(
            expected.as_raw(),
            new.as_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
    }

    /// Atomically set the deletion mark on next[0], returning the prior word.
    ///
    /// The prior word tells the caller whether it claimed the successor
    /// (mark was clear) or lost the race (mark was already set).
    #[inline]
    fn mark_next_bottom(&self) -> TaggedPtr<Self> {
        TaggedPtr::from_raw(unsafe { self.slot(0) }.fetch_or(DELETE_MARK, Ordering::SeqCst))
    }

    // =========================================================================
    // Flags and entry access
    // =========================================================================

    #[inline]
    fn is_inserting(&self) -> bool {
        self.inserting.load(Ordering::Acquire)
    }

    /// Clear the inserting flag; must follow every splicing CAS of this node.
    #[inline]
    fn finish_inserting(&self) {
        self.inserting.store(false, Ordering::Release);
    }

    /// Overwrite the value in place.
    ///
    /// # Safety
    /// Plain store into the cell: permitted to race only with the claiming
    /// deleter's take or a concurrent overwrite; an observer sees one of the
    /// written values.
    unsafe fn store_value(&self, value: V) {
        unsafe { *self.value.get() = Some(value) };
    }

    /// Take the value out of the node.
    ///
    /// # Safety
    /// Only the thread that claimed this node through `mark_next_bottom` may
    /// take its value.
    unsafe fn take_value(&self) -> Option<V> {
        unsafe { (*self.value.get()).take() }
    }
}

impl<K, V> QueueNode<K, V> for SkipNode<K, V> {
    #[inline]
    fn key(&self) -> &K {
        self.key.as_ref().expect("sentinel nodes carry no key")
    }

    #[inline]
    fn value(&self) -> &V {
        unsafe {
            (*self.value.get())
                .as_ref()
                .expect("node value already claimed")
        }
    }

    /// Deallocate using the inline-tower layout.
    ///
    /// `SkipNode` is allocated through the raw allocator API with a computed
    /// layout, so the matching deallocation must be used.
    unsafe fn dealloc_ptr(node: *mut Self) {
        unsafe {
            Self::dealloc_node(node);
        }
    }
}

// ============================================================================
// LocateResult - predecessors and successors at every level
// ============================================================================

/// Result of a top-down search: per-level predecessors and live successors,
/// plus the last bottom-level node that was seen deleted without carrying a
/// deletion mark of its own (the splice-skew guard for insert).
struct LocateResult<K, V> {
    preds: [SkipNodePtr<K, V>; NUM_LEVELS],
    succs: [SkipNodePtr<K, V>; NUM_LEVELS],
    del: SkipNodePtr<K, V>,
}

// ============================================================================
// SkipQueue - lock-free priority queue with batched deletion
// ============================================================================

/// A lock-free concurrent priority queue.
///
/// Entries are held in a skiplist ordered by key. `insert` splices a fresh
/// tower bottom-up; an insert that finds a live entry with an equal key
/// overwrites its value in place instead. `delete_min` marks the first live
/// level-0 pointer and leaves physical unlinking to an amortized head swing
/// every `max_offset` deletions, which also hands the cut-off nodes to the
/// reclamation guard `G`.
///
/// `max_offset` trades memory for contention: a larger value means longer
/// deleted runs between swings but fewer CASes on the head's cache line.
pub struct SkipQueue<K, V, G: Guard = DeferredGuard> {
    head: SkipNodePtr<K, V>,
    tail: SkipNodePtr<K, V>,
    max_offset: usize,
    guard: G,
}

impl<K: Ord, V, G: Guard> SkipQueue<K, V, G> {
    /// Create an empty queue that tolerates `max_offset` deletions between
    /// head-advance attempts.
    pub fn new(max_offset: usize) -> Self {
        let head = SkipNode::alloc_sentinel();
        let tail = SkipNode::alloc_sentinel();

        unsafe {
            for i in 0..NUM_LEVELS {
                (*head).store_next(i, TaggedPtr::from_ptr(tail));
            }
        }

        SkipQueue {
            head,
            tail,
            max_offset,
            guard: G::default(),
        }
    }

    pub fn max_offset(&self) -> usize {
        self.max_offset
    }

    /// Find per-level predecessors and live successors for `key`.
    ///
    /// Walks top-down from `head`. At each level the walk advances while the
    /// current node's key is below `key`, while the current node is already
    /// deleted (its own next[0] is marked), or - on the bottom level - while
    /// the pointer that led here was marked (`d`), which means the node we
    /// stand on is deleted even though key order would stop the walk.
    ///
    /// On return, `preds[i] -> succs[i]` brackets the insertion point at
    /// every level with respect to what was observed, and `del` is the
    /// bottom-level node (if any) that was reached over a marked pointer but
    /// carries no mark of its own.
    fn locate_preds(&self, key: &K) -> LocateResult<K, V> {
        let mut preds = [ptr::null_mut(); NUM_LEVELS];
        let mut succs = [ptr::null_mut(); NUM_LEVELS];
        let mut del: SkipNodePtr<K, V> = ptr::null_mut();

        let mut pred = self.head;
        for i in (0..NUM_LEVELS).rev() {
            unsafe {
                let mut cur_tagged = (*pred).load_next(i);
                let mut d = cur_tagged.is_marked();
                let mut cur = cur_tagged.as_ptr();

                loop {
                    let keep_walking = cur != self.tail
                        && ((*cur).key() < key
                            || (*cur).load_next(0).is_marked()
                            || (i == 0 && d));
                    if !keep_walking {
                        break;
                    }
                    if i == 0 && d {
                        del = cur;
                    }
                    pred = cur;
                    cur_tagged = (*pred).load_next(i);
                    d = cur_tagged.is_marked();
                    cur = cur_tagged.as_ptr();
                }

                preds[i] = pred;
                succs[i] = cur;
            }
        }

        LocateResult { preds, succs, del }
    }

    /// Drag `head.next[i]` past runs of deleted nodes, top level down to 1.
    ///
    /// Level 0 is swung by `delete_min` itself; this pass restores the upper
    /// levels lazily. `pred` carries across levels: the stopping point at
    /// level i is a valid starting point at level i-1.
    ///
    /// A failed CAS retries the same level with a refreshed observation; the
    /// level is left alone as soon as its first node is no longer deleted,
    /// so concurrent restructurers drive each other toward completion.
    fn restructure(&self) {
        unsafe {
            let mut pred = self.head;
            let mut i = NUM_LEVELS - 1;
            while i > 0 {
                let h = (*self.head).load_next(i);
                // Order the head read before the pred chain read below; the
                // CAS validates against the pre-fence observation.
                fence(Ordering::SeqCst);
                let mut cur = (*pred).load_next(i);

                if !(*h.as_ptr()).load_next(0).is_marked() {
                    i -= 1;
                    continue;
                }

                while (*cur.as_ptr()).load_next(0).is_marked() {
                    pred = cur.as_ptr();
                    cur = (*pred).load_next(i);
                }

                if (*self.head)
                    .cas_next(i, h, cur.with_mark(false))
                    .is_ok()
                {
                    i -= 1;
                }
            }
        }
    }

    /// First node reachable over an unmarked level-0 pointer starting from
    /// the given tagged word, or `None` if only `tail` remains.
    fn skip_deleted(&self, from: TaggedPtr<SkipNode<K, V>>) -> Option<SkipNodePtr<K, V>> {
        unsafe {
            let mut d = from.is_marked();
            let mut cur = from.as_ptr();

            while cur != self.tail {
                if !d {
                    return Some(cur);
                }
                let next = (*cur).load_next(0);
                d = next.is_marked();
                cur = next.as_ptr();
            }

            None
        }
    }
}

impl<K: Ord, V, G: Guard> PriorityQueue<K, V> for SkipQueue<K, V, G> {
    type Guard = G;
    type Node = SkipNode<K, V>;

    /// Splice a fresh node, or absorb the entry into a live duplicate.
    ///
    /// Bottom level first, retried until a CAS lands; upper levels are
    /// best-effort and abandoned as soon as the node itself is deleted, the
    /// observed successor is deleted, or the successor is the skew node
    /// reported by the locate. The `inserting` flag is cleared only after
    /// the last splicing CAS so deleters never advance the head past a
    /// half-built tower.
    fn insert_internal(&self, key: K, value: V) {
        let level = random_level(NUM_LEVELS);
        let node = SkipNode::alloc_with_entry(key, value, level);

        unsafe {
            let mut loc = self.locate_preds((*node).key());

            loop {
                let succ = loc.succs[0];

                // Live duplicate: overwrite its value and discard the fresh
                // node. The re-read of the predecessor slot pins succ as
                // still live and still in place; anything staler falls
                // through to the CAS, which then fails and relocates.
                if succ != self.tail && (*succ).key() == (*node).key() {
                    let observed = (*loc.preds[0]).load_next(0);
                    if !observed.is_marked() && observed.as_ptr() == succ {
                        let value = (*node).take_value().expect("fresh node holds a value");
                        (*succ).store_value(value);
                        SkipNode::dealloc_node(node);
                        return;
                    }
                }

                (*node).store_next(0, TaggedPtr::from_ptr(succ));
                if (*loc.preds[0])
                    .cas_next(0, TaggedPtr::from_ptr(succ), TaggedPtr::from_ptr(node))
                    .is_ok()
                {
                    break;
                }

                loc = self.locate_preds((*node).key());
            }

            let mut i = 1;
            while i < level {
                if (*node).load_next(0).is_marked()
                    || (*loc.succs[i]).load_next(0).is_marked()
                    || loc.succs[i] == loc.del
                {
                    break;
                }

                (*node).store_next(i, TaggedPtr::from_ptr(loc.succs[i]));
                if (*loc.preds[i])
                    .cas_next(
                        i,
                        TaggedPtr::from_ptr(loc.succs[i]),
                        TaggedPtr::from_ptr(node),
                    )
                    .is_ok()
                {
                    i += 1;
                } else {
                    loc = self.locate_preds((*node).key());
                    if loc.succs[0] != node {
                        // Overtaken: the node is no longer the live entry
                        // for its key; leave the tower as it stands.
                        break;
                    }
                }
            }

            (*node).finish_inserting();
        }
    }

    /// Claim and return the minimum entry.
    ///
    /// Scans the level-0 deleted run from `head`, claims the first live node
    /// by fetch_or on the pointer leading to it, then - once the scan has
    /// cost more than `max_offset` hops - tries to swing `head.next[0]`
    /// directly to the last deleted node, restructure the upper levels, and
    /// retire everything the swing cut off.
    fn delete_min_internal(&self) -> Option<(K, V)>
    where
        K: Clone,
    {
        unsafe {
            let mut x = self.head;
            let mut offset = 0usize;
            let mut newhead: SkipNodePtr<K, V> = ptr::null_mut();
            let obs_head = (*x).load_next(0);

            let claimed = loop {
                let nxt = (*x).load_next(0);
                if nxt.as_ptr() == self.tail {
                    return None;
                }
                offset += 1;

                // Freeze the head-advance candidate at the first node whose
                // tower may still be under construction.
                if newhead.is_null() && (*x).is_inserting() {
                    newhead = x;
                }

                if nxt.is_marked() {
                    x = nxt.as_ptr();
                    continue;
                }

                let prior = (*x).mark_next_bottom();
                x = prior.as_ptr();
                if !prior.is_marked() {
                    break x;
                }
                // Lost the claim race; resume scanning at the contested node.
            };

            let key = (*claimed).key().clone();
            let value = (*claimed)
                .take_value()
                .expect("claimed node still holds its value");

            if offset <= self.max_offset {
                return Some((key, value));
            }
            if (*self.head).load_next(0).as_raw() != obs_head.as_raw() {
                // Another deleter already advanced the head.
                return Some((key, value));
            }
            if newhead.is_null() {
                newhead = claimed;
            }

            let swung = (*self.head)
                .cas_next(0, obs_head, TaggedPtr::from_ptr(newhead).with_mark(true))
                .is_ok();
            if swung {
                self.restructure();

                // Everything between the old head target and the new one is
                // now unreachable from head; hand it to the reclaimer. The
                // run is frozen (invariant 5), so this walk cannot race with
                // shape changes.
                let mut cur = obs_head.as_ptr();
                while cur != newhead {
                    let next = (*cur).load_next(0).as_ptr();
                    self.guard
                        .defer_destroy(cur, SkipNode::dealloc_node);
                    cur = next;
                }
            }

            Some((key, value))
        }
    }

    fn first_node_internal(&self) -> Option<*mut Self::Node> {
        let first = unsafe { (*self.head).load_next(0) };
        self.skip_deleted(first)
    }

    fn next_node_internal(&self, node: *mut Self::Node) -> Option<*mut Self::Node> {
        let next = unsafe { (*node).load_next(0) };
        self.skip_deleted(next)
    }

    fn guard(&self) -> &G {
        &self.guard
    }
}

impl<K: Ord, V, G: Guard> Default for SkipQueue<K, V, G> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OFFSET)
    }
}

impl<K, V, G: Guard> Drop for SkipQueue<K, V, G> {
    fn drop(&mut self) {
        // Exclusive access: free every node still on the level-0 chain.
        // Nodes already retired to the guard are no longer reachable from
        // head and are freed by the guard, not here.
        unsafe {
            let mut cur = (*self.head).load_next(0).as_ptr();
            while cur != self.tail {
                let next = (*cur).load_next(0).as_ptr();
                SkipNode::dealloc_node(cur);
                cur = next;
            }
            SkipNode::dealloc_node(self.head);
            SkipNode::dealloc_node(self.tail);
        }
    }
}

// Safety: all shared mutation goes through atomic tower slots; keys and
// values cross threads by ownership transfer
unsafe impl<K: Send, V: Send, G: Guard> Send for SkipQueue<K, V, G> {}
unsafe impl<K: Send, V: Send, G: Guard> Sync for SkipQueue<K, V, G> {}

// ============================================================================
// Tests
// ============================================================================
