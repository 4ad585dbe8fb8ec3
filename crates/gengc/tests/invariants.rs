//! Properties that hold across any sequence of allocations and collections.

mod common;

use common::{boot_heap, config, make_slots, slots_of, steady_heap, Roots};
use gengc::{CollectionType, GcConfig, GcError, Heap, ObjectKind, Value, WORD};

fn assert_bounds(heap: &Heap) {
    let young = heap.young();
    assert!(young.low() <= young.cursor() && young.cursor() <= young.high());
    if let Some(old) = heap.old() {
        assert!(old.low() <= old.cursor() && old.cursor() <= old.high());
    }
}

#[test]
fn test_bounds_hold_under_churn() {
    let mut heap = boot_heap();
    let mut roots = Roots::register(&mut heap, 8);
    assert_bounds(&heap);

    for i in 0..4000usize {
        let size = 8 + (i * 37) % 900;
        let obj = heap.allocate(ObjectKind::Bytes, size).unwrap();
        assert_bounds(&heap);
        if i % 97 == 0 {
            roots.set(i % 8, obj);
        }
        if i % 1000 == 999 {
            heap.collect_full().unwrap();
            assert_bounds(&heap);
        }
    }
    assert!(heap.stats().minor_collections > 0);
    assert!(heap.stats().full_collections > 0);
    for i in 0..8 {
        let v = roots.get(i);
        if v != Value::EMPTY {
            assert_eq!(heap.object_kind(v), Some(ObjectKind::Bytes));
        }
    }
}

#[test]
fn test_linked_list_survives_churn() {
    let mut heap = steady_heap(config());
    let mut roots = Roots::register(&mut heap, 1);
    roots.set(0, Value::NIL);

    for i in 0..2000isize {
        let cell = make_slots(&mut heap, &[Value::from_int(i), Value::NIL]);
        heap.write_slot(cell, 1, roots.get(0)).unwrap();
        roots.set(0, cell);
        // Garbage between cells.
        heap.alloc_bytes(200).unwrap();
    }
    assert!(heap.stats().minor_collections > 0);

    let mut cursor = roots.get(0);
    let mut expected = 1999;
    while cursor != Value::NIL {
        assert_eq!(heap.read_slot(cursor, 0), Value::from_int(expected));
        cursor = heap.read_slot(cursor, 1);
        expected -= 1;
    }
    assert_eq!(expected, -1);
}

#[test]
fn test_immediates_never_change() {
    let immediates = [
        Value::EMPTY,
        Value::NIL,
        Value::TRUE,
        Value::FALSE,
        Value::from_int(0),
        Value::from_int(-1),
        Value::from_int(isize::MAX >> 1),
    ];
    let mut heap = steady_heap(config());
    let mut roots = Roots::register(&mut heap, immediates.len() + 1);
    for (i, v) in immediates.iter().enumerate() {
        roots.set(i, *v);
    }
    let holder = make_slots(&mut heap, &immediates);
    roots.set(immediates.len(), holder);

    heap.collect_garbage().unwrap();
    heap.collect_full().unwrap();

    for (i, v) in immediates.iter().enumerate() {
        assert_eq!(roots.get(i), *v);
    }
    let holder = roots.get(immediates.len());
    assert_eq!(slots_of(&heap, holder), immediates);
}

#[test]
fn test_interior_words_are_not_roots() {
    let mut heap = steady_heap(config());
    let mut roots = Roots::register(&mut heap, 1);
    let obj = make_slots(&mut heap, &[Value::from_int(1), Value::from_int(2)]);
    let interior = Value::from_bits(obj.bits() + 8);
    roots.set(0, interior);

    heap.collect_garbage().unwrap();
    assert_eq!(roots.get(0), interior, "ambiguous word left as it was");
    assert_eq!(heap.last_metrics().objects_copied, 0);
}

#[test]
fn test_too_large_fails_without_collecting() {
    let mut heap = steady_heap(config());
    let max = heap.config().max_allocation_size;
    let pass = heap.pass();
    let young = heap.young();

    let err = heap.allocate(ObjectKind::Bytes, max).unwrap_err();
    assert!(matches!(err, GcError::AllocationTooLarge { requested, .. } if requested == max));
    assert_eq!(heap.pass(), pass);
    assert_eq!(heap.young(), young);
    assert!(heap.collect(max, false).is_err());
}

#[test]
fn test_requests_near_usize_max_are_too_large() {
    let mut heap = steady_heap(config());
    let pass = heap.pass();
    let young = heap.young();

    for err in [
        heap.alloc_slots(usize::MAX).unwrap_err(),
        heap.alloc_slots(usize::MAX / WORD).unwrap_err(),
        heap.alloc_bytes(usize::MAX).unwrap_err(),
        heap.alloc_bytes(usize::MAX - 12).unwrap_err(),
        heap.allocate(ObjectKind::Bytes, usize::MAX - 3).unwrap_err(),
        heap.allocate(ObjectKind::Slots, usize::MAX).unwrap_err(),
    ] {
        assert!(matches!(err, GcError::AllocationTooLarge { .. }), "{err:?}");
    }
    assert_eq!(heap.pass(), pass);
    assert_eq!(heap.young(), young);
}

#[test]
fn test_request_rounding_up_to_limit_is_too_large() {
    let mut heap = steady_heap(config());
    let max = heap.config().max_allocation_size;
    let err = heap.allocate(ObjectKind::Bytes, max - 1).unwrap_err();
    assert!(matches!(err, GcError::AllocationTooLarge { .. }));
}

#[test]
fn test_request_larger_than_nursery_grows_it() {
    let mut heap = steady_heap(config());
    let big = 100 * 1024;
    let obj = heap.alloc_bytes(big).unwrap();
    assert_eq!(heap.last_metrics().collection_type, CollectionType::Full);
    assert!(heap.is_young(obj));
    assert!(heap.young().capacity() >= big);
}

#[test]
fn test_periodic_full_collection() {
    let mut heap = steady_heap(config().full_gc_period(4));
    // Passes 1 and 2 built the heap.
    heap.collect_garbage().unwrap();
    assert_eq!(heap.last_metrics().collection_type, CollectionType::Minor);
    heap.collect_garbage().unwrap();
    assert_eq!(heap.pass(), 4);
    assert_eq!(heap.last_metrics().collection_type, CollectionType::Full);
}

#[test]
fn test_invalid_config_rejected() {
    let err = Heap::initialize(GcConfig::default().young_size(256), 0).unwrap_err();
    assert!(matches!(err, GcError::InvalidConfig(_)));
}

#[test]
fn test_stats_track_regions() {
    let mut heap = steady_heap(config());
    // Boot page, fresh nursery, old generation.
    assert_eq!(heap.stats().regions_reserved, 3);
    heap.collect_full().unwrap();
    let stats = heap.stats();
    assert_eq!(stats.regions_reserved, 5);
    assert_eq!(stats.regions_released, 2);
    assert_eq!(stats.boot_retirements, 1);
}
