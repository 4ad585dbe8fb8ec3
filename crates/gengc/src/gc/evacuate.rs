//! Cheney-style evacuation shared by the minor and full collectors.
//!
//! Objects in the from-spaces are copied to the end of the to-space, and a
//! forwarding marker is left in their header so later references resolve
//! to the same copy. The to-space itself is the grey set: a scan cursor
//! walks it from where the pass started and updates every field of every
//! copied object until it catches up with the allocation cursor.
//!
//! ```text
//!   to-space:  [ already there | copied, scanned | copied, grey | free ]
//!                              ^ start           ^ scan         ^ cursor
//! ```

use std::ptr;

use crate::generation::Generation;
use crate::metrics::GcMetrics;
use crate::object::{self, Header, ObjectKind};
use crate::value::Value;

/// Sorted start addresses of every object in the from-spaces.
///
/// Conservative words are only treated as roots when they hit one of
/// these exactly, so stray integers and interior pointers never get an
/// object header read through them.
#[derive(Debug, Default)]
pub struct ObjectStarts(Vec<usize>);

impl ObjectStarts {
    /// Walks `spaces` and records every object start.
    pub fn index(spaces: &[Generation]) -> Self {
        let mut starts: Vec<usize> = spaces.iter().flat_map(Generation::objects).collect();
        if spaces.len() > 1 {
            starts.sort_unstable();
        }
        Self(starts)
    }

    /// Returns `true` if an object starts at `addr`.
    pub fn contains(&self, addr: usize) -> bool {
        self.0.binary_search(&addr).is_ok()
    }
}

/// Copies reachable objects out of the from-spaces.
pub struct Evacuator {
    from: Vec<Generation>,
    to: Generation,
    scan: usize,
    pub objects_copied: usize,
    pub bytes_copied: usize,
    pub conservative_roots: usize,
    pub remembered_roots: usize,
}

impl Evacuator {
    /// Prepares to evacuate `from` into `to`. The caller guarantees `to`
    /// has room for every allocated byte of `from`.
    pub fn new(from: Vec<Generation>, to: Generation) -> Self {
        debug_assert!(to.free() >= from.iter().map(Generation::used).sum::<usize>());
        Self {
            from,
            scan: to.cursor(),
            to,
            objects_copied: 0,
            bytes_copied: 0,
            conservative_roots: 0,
            remembered_roots: 0,
        }
    }

    /// Whether `addr` lies among the allocated bytes of a from-space.
    #[inline]
    pub fn in_from_space(&self, addr: usize) -> bool {
        self.from.iter().any(|g| g.contains_allocated(addr))
    }

    /// Copies the object at `addr` unless it has already moved, and returns
    /// its address in the to-space.
    unsafe fn evacuate(&mut self, addr: usize) -> usize {
        let (kind, size) = match unsafe { object::header(addr) } {
            Some(Header::Forwarded(to)) => return to,
            Some(Header::Live { kind, size }) => (kind, size),
            None => {
                debug_assert!(false, "corrupt header at {addr:#x}");
                return addr;
            }
        };
        let Some(new_addr) = self.to.bump(size) else {
            unreachable!("to-space is sized for every from-space byte");
        };
        // SAFETY: source and destination are distinct live regions.
        unsafe {
            ptr::copy_nonoverlapping(addr as *const u8, new_addr as *mut u8, size);
            object::install_forwarding(addr, new_addr);
        }
        debug_assert!(matches!(
            unsafe { object::header(new_addr) },
            Some(Header::Live { kind: k, .. }) if k == kind
        ));
        self.objects_copied += 1;
        self.bytes_copied += size;
        new_addr
    }

    /// Resolves `value` to its to-space copy if it points into a from-space.
    ///
    /// # Safety
    ///
    /// A pointer into a from-space must be an object start.
    #[inline]
    pub unsafe fn forward(&mut self, value: Value) -> Value {
        match value.addr() {
            Some(addr) if self.in_from_space(addr) => {
                Value::from_addr(unsafe { self.evacuate(addr) })
            }
            _ => value,
        }
    }

    /// Updates a precise slot: an object field or a remembered slot.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for reads and writes and hold a valid value.
    #[inline]
    pub unsafe fn update_slot(&mut self, slot: *mut Value) {
        unsafe { *slot = self.forward(*slot) };
    }

    /// Updates a slot recorded by the write barrier.
    ///
    /// # Safety
    ///
    /// As [`Evacuator::update_slot`].
    pub unsafe fn update_remembered(&mut self, slot: *mut Value) {
        self.remembered_roots += 1;
        unsafe { self.update_slot(slot) };
    }

    /// Updates an ambiguous word. It is only treated as a reference when it
    /// is exactly the start of an object in a from-space.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for reads and writes.
    pub unsafe fn update_conservative(&mut self, slot: *mut usize, starts: &ObjectStarts) {
        let word = unsafe { ptr::read_volatile(slot) };
        if !Value::from_bits(word).is_ptr() || !self.in_from_space(word) || !starts.contains(word) {
            return;
        }
        let new_addr = unsafe { self.evacuate(word) };
        unsafe { ptr::write_volatile(slot, new_addr) };
        self.conservative_roots += 1;
    }

    /// Updates every field of the object at `addr`, which does not move.
    ///
    /// # Safety
    ///
    /// `addr` must be the start of a live object outside the from-spaces.
    pub unsafe fn scan_object(&mut self, addr: usize) {
        if let Some(Header::Live {
            kind: ObjectKind::Slots,
            size,
        }) = unsafe { object::header(addr) }
        {
            let slots = object::slots_ptr(addr);
            for i in 0..object::slot_count(size) {
                unsafe { self.update_slot(slots.add(i)) };
            }
        }
    }

    /// Scans the grey part of the to-space until every copied object has
    /// had its fields updated.
    ///
    /// # Safety
    ///
    /// All roots must have been processed or be processed by later calls;
    /// the to-space must only contain objects copied by this evacuator past
    /// its starting cursor.
    pub unsafe fn drain(&mut self) {
        while self.scan < self.to.cursor() {
            let addr = self.scan;
            let size = match unsafe { object::header(addr) } {
                Some(Header::Live { size, .. }) => size,
                _ => unreachable!("to-space objects are never forwarded"),
            };
            unsafe { self.scan_object(addr) };
            self.scan += size;
        }
    }

    /// Copies the pass counters into `metrics`.
    pub const fn record(&self, metrics: &mut GcMetrics) {
        metrics.objects_copied = self.objects_copied;
        metrics.bytes_copied = self.bytes_copied;
        metrics.conservative_roots = self.conservative_roots;
        metrics.remembered_roots = self.remembered_roots;
    }

    /// Returns the updated to-space descriptor.
    pub fn finish(self) -> Generation {
        self.to
    }
}
