//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::ptr::NonNull;

use gengc::{GcConfig, Heap, Phase, Value};

/// A small, deterministic configuration: no native stack scanning, no
/// periodic full collections and plenty of old-generation headroom.
pub fn config() -> GcConfig {
    GcConfig::default()
        .young_size(64 * 1024)
        .old_size_factor(4)
        .store_capacity(64)
        .full_gc_period(0)
        .scan_native_stack(false)
}

/// A heap still allocating from its bootstrap page.
pub fn boot_heap() -> Heap {
    Heap::initialize(config(), 0).unwrap()
}

/// A heap with both generations present and an empty nursery.
pub fn steady_heap(config: GcConfig) -> Heap {
    let mut heap = Heap::initialize(config, 0).unwrap();
    heap.collect_garbage().unwrap();
    heap.collect_garbage().unwrap();
    assert_eq!(heap.phase(), Phase::Steady);
    assert_eq!(heap.young().used(), 0);
    heap
}

/// Root slots registered with a heap. The collector rewrites them in place,
/// so every access goes through the registered pointer.
pub struct Roots {
    _storage: Vec<Value>,
    ptr: NonNull<Value>,
    len: usize,
}

impl Roots {
    pub fn register(heap: &mut Heap, len: usize) -> Self {
        let mut storage = vec![Value::EMPTY; len];
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
        unsafe { heap.push_root_region(ptr, len) };
        Self {
            _storage: storage,
            ptr,
            len,
        }
    }

    pub fn get(&self, index: usize) -> Value {
        assert!(index < self.len);
        unsafe { self.ptr.as_ptr().add(index).read_volatile() }
    }

    pub fn set(&mut self, index: usize, value: Value) {
        assert!(index < self.len);
        unsafe { self.ptr.as_ptr().add(index).write_volatile(value) };
    }

    pub fn unregister(self, heap: &mut Heap) {
        heap.pop_root_region(self.ptr);
    }
}

/// Allocates a `Slots` object holding `values`.
pub fn make_slots(heap: &mut Heap, values: &[Value]) -> Value {
    let object = heap.alloc_slots(values.len()).unwrap();
    for (i, v) in values.iter().enumerate() {
        heap.write_slot(object, i, *v).unwrap();
    }
    object
}

/// Reads every slot of a `Slots` object.
pub fn slots_of(heap: &Heap, object: Value) -> Vec<Value> {
    let n = heap.slot_count(object).unwrap();
    (0..n).map(|i| heap.read_slot(object, i)).collect()
}
