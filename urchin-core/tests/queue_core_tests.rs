use rstest::rstest;
use urchin_core::DeferredGuard;
use urchin_core::common_tests::priority_queue_core_tests::*;
use urchin_core::queues::SkipQueue;

type DeferredQueue = SkipQueue<i32, i32, DeferredGuard>;

// ============================================================================
// Single-queue tests, run across head-advance policies: eager (restructure
// on every deletion), the default, and effectively-never
// ============================================================================

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_insert_snapshot(#[case] queue: DeferredQueue) {
    test_insert_snapshot(&queue);
}

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_duplicate_key_updates_value(#[case] queue: DeferredQueue) {
    test_duplicate_key_updates_value(&queue);
}

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_insert_delete_cycle(#[case] queue: DeferredQueue) {
    test_insert_delete_cycle(&queue);
}

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_min_semantics(#[case] queue: DeferredQueue) {
    test_min_semantics(&queue);
}

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_sorted_unique_snapshot(#[case] queue: DeferredQueue) {
    test_sorted_unique_snapshot(&queue);
}

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_peek_min(#[case] queue: DeferredQueue) {
    test_peek_min(&queue);
}

#[rstest]
#[case::eager_head(DeferredQueue::new(0))]
#[case::default_offset(DeferredQueue::default())]
#[case::lazy_head(DeferredQueue::new(1_000_000))]
fn core_iter_order(#[case] queue: DeferredQueue) {
    test_iter_order(&queue);
}

// ============================================================================
// Tests that build their own queues (Default = DEFAULT_MAX_OFFSET)
// ============================================================================

#[test]
fn core_conservation() {
    test_conservation::<DeferredQueue>();
}

#[test]
fn core_bulk_fill_and_drain() {
    test_bulk_fill_and_drain::<DeferredQueue>();
}

#[test]
fn core_concurrent_disjoint_inserts() {
    test_concurrent_disjoint_inserts::<DeferredQueue>();
}

#[test]
fn core_concurrent_delete_min() {
    test_concurrent_delete_min::<DeferredQueue>();
}

#[test]
fn core_mixed_workload() {
    test_mixed_workload::<DeferredQueue>();
}
