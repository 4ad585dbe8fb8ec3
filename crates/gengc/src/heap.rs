//! The heap handle handed to the embedding runtime.

use std::fmt;
use std::ptr::NonNull;
use std::slice;

use crate::barrier::StorePointerList;
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::generation::Generation;
use crate::manager::{Manager, Phase};
use crate::metrics::{GcMetrics, HeapStats};
use crate::object::{self, Header, ObjectKind, HEADER_SIZE};
use crate::roots::RootScanner;
use crate::scan;
use crate::stack::{self, StackExtent};
use crate::value::{Value, ALIGN, WORD};

/// A generational, copying, conservatively scanned heap.
///
/// The handle points at the manager record, which lives at the start of the
/// heap's first page. It is neither `Send` nor `Sync`: the heap scans the
/// stack of the thread that created it.
///
/// Values handed out by the heap stay valid until the next collection;
/// collections rewrite the roots they find, so values the mutator keeps
/// must live on the scanned stack, in a registered root region or in the
/// runtime root object.
pub struct Heap {
    manager: NonNull<Manager>,
}

impl Heap {
    /// Creates a heap whose native stack scan stops at `stack_base`, the
    /// highest address of the mutator's stack (for a downward stack).
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] for an unusable configuration and
    /// [`GcError::OutOfMemory`] if the bootstrap page cannot be reserved.
    pub fn initialize(config: GcConfig, stack_base: usize) -> Result<Self> {
        let manager = Manager::bootstrap(config, stack_base)?;
        Ok(Self { manager })
    }

    /// Creates a heap scanning the whole stack of the current thread.
    ///
    /// Falls back to the caller's frame as the base when the platform does
    /// not report stack bounds; frames older than the caller are then not
    /// scanned.
    ///
    /// # Errors
    ///
    /// As [`Heap::initialize`].
    #[inline(never)]
    pub fn initialize_on_current_thread(config: GcConfig) -> Result<Self> {
        let base = match stack::get_stack_bounds() {
            Some(bounds) => bounds.bottom,
            None => stack::current_stack_pointer(),
        };
        Self::initialize(config, base)
    }

    #[inline]
    fn manager(&self) -> &Manager {
        // SAFETY: the record lives until `drop`.
        unsafe { self.manager.as_ref() }
    }

    #[inline]
    fn manager_mut(&mut self) -> &mut Manager {
        // SAFETY: the record lives until `drop`, and `&mut self` is unique.
        unsafe { self.manager.as_mut() }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocates an object of `size` total bytes (header included, rounded
    /// up to the alignment). The payload is zero-filled.
    ///
    /// # Errors
    ///
    /// [`GcError::AllocationTooLarge`] for requests at or above the
    /// configured maximum; [`GcError::OutOfMemory`] if a full collection
    /// still leaves no room; anything a collection can report.
    pub fn allocate(&mut self, kind: ObjectKind, size: usize) -> Result<Value> {
        self.manager().check_request(size)?;
        let size = object::object_size(size);
        self.manager().check_request(size)?;
        if let Some(value) = self.manager_mut().try_bump(kind, size) {
            return Ok(value);
        }
        self.collect(size, false)?;
        if let Some(value) = self.manager_mut().try_bump(kind, size) {
            return Ok(value);
        }
        self.collect(size, true)?;
        self.manager_mut()
            .try_bump(kind, size)
            .ok_or_else(|| GcError::exhausted(size))
    }

    /// Allocates a `Slots` object with `slots` value slots, all empty.
    ///
    /// # Errors
    ///
    /// As [`Heap::allocate`].
    pub fn alloc_slots(&mut self, slots: usize) -> Result<Value> {
        let size = slots
            .checked_mul(WORD)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .unwrap_or(usize::MAX);
        self.allocate(ObjectKind::Slots, size)
    }

    /// Allocates a `Bytes` object with room for at least `len` bytes.
    ///
    /// # Errors
    ///
    /// As [`Heap::allocate`].
    pub fn alloc_bytes(&mut self, len: usize) -> Result<Value> {
        self.allocate(ObjectKind::Bytes, len.saturating_add(HEADER_SIZE))
    }

    /// Allocates a `Bytes` object holding a copy of `bytes`, zero padded.
    ///
    /// # Errors
    ///
    /// As [`Heap::allocate`].
    pub fn alloc_bytes_from(&mut self, bytes: &[u8]) -> Result<Value> {
        let object = self.alloc_bytes(bytes.len())?;
        self.bytes_mut(object)[..bytes.len()].copy_from_slice(bytes);
        Ok(object)
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Runs the collector controller for a pending request of `sz` bytes.
    /// `full` forces a full collection once both generations exist.
    ///
    /// This is the outermost frame of every collection: callee-saved
    /// registers are spilled here and the stack is scanned from here up.
    ///
    /// # Errors
    ///
    /// [`GcError::AllocationTooLarge`], [`GcError::CollectionInProgress`]
    /// or [`GcError::OutOfMemory`], each before any generation is touched.
    #[inline(never)]
    pub fn collect(&mut self, sz: usize, full: bool) -> Result<()> {
        stack::force_register_spill();
        let sp = stack::current_stack_pointer();
        self.manager_mut().garbage_collect(sp, sz, full)
    }

    /// Lets the controller pick the collection kind.
    ///
    /// # Errors
    ///
    /// As [`Heap::collect`].
    pub fn collect_garbage(&mut self) -> Result<()> {
        self.collect(0, false)
    }

    /// Requests a full collection.
    ///
    /// # Errors
    ///
    /// As [`Heap::collect`].
    pub fn collect_full(&mut self) -> Result<()> {
        self.collect(0, true)
    }

    // ------------------------------------------------------------------
    // Object access
    // ------------------------------------------------------------------

    /// Resolves `value` to a live object of this heap.
    fn object(&self, value: Value) -> Option<(usize, ObjectKind, usize)> {
        let addr = value.addr()?;
        let space = self.manager().space_of(addr)?;
        // SAFETY: `addr` lies among the space's allocated bytes.
        match unsafe { object::header(addr) }? {
            Header::Live { kind, size }
                if size >= HEADER_SIZE && size % ALIGN == 0 && size <= space.cursor() - addr =>
            {
                Some((addr, kind, size))
            }
            _ => None,
        }
    }

    /// As [`Heap::object`], but also requires `value` to be the start of an
    /// object rather than a word inside one.
    fn object_start(&self, value: Value) -> Option<(usize, ObjectKind, usize)> {
        let found = self.object(value)?;
        let space = self.manager().space_of(found.0)?;
        space
            .objects()
            .take_while(|&start| start <= found.0)
            .any(|start| start == found.0)
            .then_some(found)
    }

    fn expect_object(&self, value: Value) -> (usize, ObjectKind, usize) {
        self.object(value)
            .unwrap_or_else(|| panic!("{value:?} is not a live object of this heap"))
    }

    fn slot(&self, object: Value, index: usize) -> (usize, *mut Value) {
        let (addr, kind, size) = self.expect_object(object);
        assert_eq!(kind, ObjectKind::Slots, "{object:?} has no value slots");
        let len = object::slot_count(size);
        assert!(index < len, "slot index {index} out of range for {len} slots");
        // SAFETY: in bounds of the object.
        (addr, unsafe { object::slots_ptr(addr).add(index) })
    }

    /// The kind of the object `value` refers to, or `None` for immediates
    /// and words that are not objects of this heap.
    #[must_use]
    pub fn object_kind(&self, value: Value) -> Option<ObjectKind> {
        self.object_start(value).map(|(_, kind, _)| kind)
    }

    /// Total size in bytes of the object `value` refers to.
    #[must_use]
    pub fn object_size(&self, value: Value) -> Option<usize> {
        self.object_start(value).map(|(_, _, size)| size)
    }

    /// Number of value slots of a `Slots` object.
    #[must_use]
    pub fn slot_count(&self, value: Value) -> Option<usize> {
        match self.object_start(value)? {
            (_, ObjectKind::Slots, size) => Some(object::slot_count(size)),
            _ => None,
        }
    }

    /// Reads slot `index` of a `Slots` object.
    ///
    /// # Panics
    ///
    /// If `object` is not a `Slots` object of this heap or `index` is out
    /// of range.
    #[must_use]
    pub fn read_slot(&self, object: Value, index: usize) -> Value {
        let (_, slot) = self.slot(object, index);
        // SAFETY: `slot` checked in bounds.
        unsafe { *slot }
    }

    /// Stores `value` into slot `index` of a `Slots` object, running the
    /// write barrier first.
    ///
    /// # Errors
    ///
    /// [`GcError::StorePointerOverflow`] if the store needed recording and
    /// the list is full. The slot is left unchanged.
    ///
    /// # Panics
    ///
    /// As [`Heap::read_slot`].
    pub fn write_slot(&mut self, object: Value, index: usize, value: Value) -> Result<()> {
        let (container, slot) = self.slot(object, index);
        let manager = self.manager_mut();
        manager.write_barrier(container, slot, value)?;
        // SAFETY: `slot` checked in bounds.
        unsafe { *slot = value };
        manager.dirty = true;
        Ok(())
    }

    /// The payload of a `Bytes` object.
    ///
    /// # Panics
    ///
    /// If `object` is not a `Bytes` object of this heap.
    #[must_use]
    pub fn bytes(&self, object: Value) -> &[u8] {
        let (addr, len) = self.payload(object);
        // SAFETY: the payload lies in the object, which lives as long as no
        // collection runs, and collections need `&mut self`.
        unsafe { slice::from_raw_parts((addr + HEADER_SIZE) as *const u8, len) }
    }

    /// The mutable payload of a `Bytes` object.
    ///
    /// # Panics
    ///
    /// If `object` is not a `Bytes` object of this heap.
    pub fn bytes_mut(&mut self, object: Value) -> &mut [u8] {
        let (addr, len) = self.payload(object);
        // SAFETY: as for `bytes`; `&mut self` makes the borrow unique.
        unsafe { slice::from_raw_parts_mut((addr + HEADER_SIZE) as *mut u8, len) }
    }

    fn payload(&self, object: Value) -> (usize, usize) {
        let (addr, kind, size) = self.expect_object(object);
        assert_eq!(kind, ObjectKind::Bytes, "{object:?} is not a byte object");
        (addr, size - HEADER_SIZE)
    }

    // ------------------------------------------------------------------
    // Roots and barrier
    // ------------------------------------------------------------------

    /// The runtime root object. It lives on the bootstrap page and never
    /// moves.
    #[must_use]
    pub fn root(&self) -> Value {
        self.manager().root
    }

    /// Reads slot `index` of the runtime root object.
    #[must_use]
    pub fn root_slot(&self, index: usize) -> Value {
        self.read_slot(self.root(), index)
    }

    /// Stores into slot `index` of the runtime root object.
    ///
    /// # Errors
    ///
    /// As [`Heap::write_slot`].
    pub fn set_root_slot(&mut self, index: usize, value: Value) -> Result<()> {
        self.write_slot(self.root(), index, value)
    }

    /// Records that `slot`, outside the young generation, now references a
    /// young object. [`Heap::write_slot`] does this itself; this is for
    /// embedders that store through raw pointers.
    ///
    /// # Errors
    ///
    /// [`GcError::StorePointerOverflow`] if the list is full.
    ///
    /// # Safety
    ///
    /// `slot` must stay valid for reads and writes until the next
    /// collection, which will rewrite it.
    pub unsafe fn record_old_to_young_write(&mut self, slot: NonNull<Value>) -> Result<()> {
        let manager = self.manager_mut();
        manager.store.push(slot.as_ptr())?;
        manager.dirty = true;
        Ok(())
    }

    /// Registers `len` slots at `ptr` as roots.
    ///
    /// # Safety
    ///
    /// The slots must stay valid for reads and writes until popped.
    pub unsafe fn push_root_region(&mut self, ptr: NonNull<Value>, len: usize) {
        // SAFETY: forwarded from the caller.
        unsafe { self.manager_mut().roots.push(ptr, len) };
    }

    /// Unregisters the root region starting at `ptr`.
    pub fn pop_root_region(&mut self, ptr: NonNull<Value>) {
        self.manager_mut().roots.pop(ptr);
    }

    /// Opens a root frame; [`Heap::pop_root_frame`] unregisters every
    /// region pushed since.
    pub fn push_root_frame(&mut self) {
        self.manager_mut().roots.push_frame();
    }

    /// Closes the innermost root frame.
    pub fn pop_root_frame(&mut self) {
        self.manager_mut().roots.pop_frame();
    }

    /// Number of registered root regions.
    #[must_use]
    pub fn root_region_count(&self) -> usize {
        self.manager().roots.len()
    }

    /// Replaces the native stack scanner.
    pub fn set_root_scanner(&mut self, scanner: Box<dyn RootScanner>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(scanner = scanner.name(), "root_scanner_replaced");
        self.manager_mut().scanner = scanner;
    }

    /// Name of the installed native stack scanner.
    #[must_use]
    pub fn root_scanner_name(&self) -> &'static str {
        self.manager().scanner.name()
    }

    // ------------------------------------------------------------------
    // Stack
    // ------------------------------------------------------------------

    /// The saved stack base.
    #[must_use]
    pub fn stack_base(&self) -> usize {
        self.manager().stack_base
    }

    /// The stack range between the caller's frame and the saved base.
    #[inline(always)]
    #[must_use]
    pub fn stack_extent(&self) -> StackExtent {
        stack::stack_extent(self.stack_base(), stack::current_stack_pointer())
    }

    /// Counts the words in `extent` that look like young pointers.
    ///
    /// # Safety
    ///
    /// `extent` must be readable for its whole length.
    #[must_use]
    pub unsafe fn scan_for_young_pointers(&self, extent: StackExtent) -> usize {
        // SAFETY: forwarded from the caller.
        unsafe { scan::scan_for_young_pointers(extent, &self.manager().young) }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The configuration the heap was created with.
    #[must_use]
    pub fn config(&self) -> &GcConfig {
        &self.manager().config
    }

    /// Lifecycle state.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.manager().phase()
    }

    /// Returns `true` while the nursery is still the bootstrap page.
    #[must_use]
    pub fn on_boot_page(&self) -> bool {
        self.manager().on_boot_page()
    }

    /// The young generation descriptor.
    #[must_use]
    pub fn young(&self) -> Generation {
        self.manager().young
    }

    /// The old generation descriptor, once reserved.
    #[must_use]
    pub fn old(&self) -> Option<Generation> {
        Some(self.manager().old).filter(Generation::is_present)
    }

    /// The retired bootstrap page, once retired.
    #[must_use]
    pub fn boot_space(&self) -> Option<Generation> {
        Some(self.manager().boot).filter(Generation::is_present)
    }

    /// The store pointer list of the current young region.
    #[must_use]
    pub fn store_list(&self) -> StorePointerList {
        self.manager().store
    }

    /// Collection passes started so far.
    #[must_use]
    pub fn pass(&self) -> u64 {
        self.manager().pass
    }

    /// Returns `true` during a collection pass.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.manager().collecting
    }

    /// Returns `true` if a slot was written since the last collection.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.manager().dirty
    }

    /// Metrics of the most recent pass.
    #[must_use]
    pub fn last_metrics(&self) -> GcMetrics {
        self.manager().metrics
    }

    /// Totals since the heap was created.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.manager().stats
    }

    /// Returns `true` if `value` points into the young generation.
    #[must_use]
    pub fn is_young(&self, value: Value) -> bool {
        value
            .addr()
            .is_some_and(|addr| self.manager().young.contains_allocated(addr))
    }

    /// Returns `true` if `value` points into the old generation.
    #[must_use]
    pub fn is_old(&self, value: Value) -> bool {
        value
            .addr()
            .is_some_and(|addr| self.manager().old.contains_allocated(addr))
    }

    /// Returns `true` if `value` points into the retired bootstrap page.
    #[must_use]
    pub fn is_boot(&self, value: Value) -> bool {
        value
            .addr()
            .is_some_and(|addr| self.manager().boot.contains_allocated(addr))
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        // SAFETY: the handle is the record's only owner.
        unsafe { Manager::teardown(self.manager) };
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let manager = self.manager();
        f.debug_struct("Heap")
            .field("phase", &manager.phase())
            .field("pass", &manager.pass)
            .field("young", &manager.young)
            .field("old", &self.old())
            .field("store_len", &manager.store.len())
            .field("scanner", &manager.scanner.name())
            .finish_non_exhaustive()
    }
}
