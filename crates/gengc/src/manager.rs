//! The memory manager record and the collection controller.
//!
//! The record lives at the start of the bootstrap page, the first young
//! region the heap reserves, so the manager's own storage is never subject
//! to collection:
//!
//! ```text
//!   boot page: | Manager | root object | early objects ...  | store list |
//!              ^ low     ^ first                            ^ high
//! ```
//!
//! The controller is [`Manager::garbage_collect`]. It decides between
//! retiring the bootstrap page, a minor collection and a full collection,
//! and reserves the old generation on first use.

use std::mem::{size_of, ManuallyDrop};
use std::ptr::{self, NonNull};
use std::time::Instant;

use sys_alloc::Mmap;

use crate::barrier::StorePointerList;
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::gc;
use crate::generation::{Generation, GenerationKind};
use crate::metrics::{CollectionType, GcMetrics, HeapStats};
use crate::object::{self, ObjectKind, HEADER_SIZE};
use crate::pages;
use crate::roots::{ConservativeStackScanner, NoStackScanner, RootScanner, ShadowStack};
use crate::scan::scan_for_young_pointers;
use crate::stack;
use crate::value::{align_up, Value, WORD};

/// Bytes at the start of the bootstrap page taken by the manager record.
pub(crate) const MANAGER_RESERVED: usize = align_up(size_of::<Manager>());

/// Lifecycle state of a heap.
///
/// There is no uninitialized state: a [`Heap`](crate::Heap) only exists
/// once the bootstrap page has been reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No old generation yet. The nursery is either the bootstrap page or
    /// the first region reserved after retiring it.
    YoungOnly,
    /// Both generations are present.
    Steady,
}

/// The memory manager record.
pub struct Manager {
    pub(crate) config: GcConfig,
    /// The bootstrap page. Released only when the heap is dropped.
    pub(crate) boot_region: ManuallyDrop<Mmap>,
    /// Objects on the retired bootstrap page; empty until it is retired.
    pub(crate) boot: Generation,
    pub(crate) young: Generation,
    /// `None` while the bootstrap page is still the nursery.
    pub(crate) young_region: Option<Mmap>,
    pub(crate) old: Generation,
    pub(crate) old_region: Option<Mmap>,
    pub(crate) store: StorePointerList,
    pub(crate) stack_base: usize,
    pub(crate) pass: u64,
    pub(crate) collecting: bool,
    pub(crate) dirty: bool,
    pub(crate) root: Value,
    pub(crate) roots: ShadowStack,
    pub(crate) scanner: Box<dyn RootScanner>,
    pub(crate) metrics: GcMetrics,
    pub(crate) stats: HeapStats,
}

impl Manager {
    /// Reserves the bootstrap page, installs the manager record at its
    /// start and allocates the runtime root object right behind it.
    pub(crate) fn bootstrap(config: GcConfig, stack_base: usize) -> Result<NonNull<Self>> {
        config.validate()?;
        let region = pages::reserve(config.young_size, config.executable)?;
        let low = region.ptr() as usize;
        let store_floor = region.end() - config.store_bytes();
        let young = Generation::with_bounds(low, low + MANAGER_RESERVED, store_floor);
        let store = StorePointerList::over(store_floor, region.end());
        let scanner: Box<dyn RootScanner> = if config.scan_native_stack {
            Box::new(ConservativeStackScanner)
        } else {
            Box::new(NoStackScanner)
        };
        let root_size = HEADER_SIZE + config.root_slots * WORD;

        let record = Self {
            config,
            boot_region: ManuallyDrop::new(region),
            boot: Generation::EMPTY,
            young,
            young_region: None,
            old: Generation::EMPTY,
            old_region: None,
            store,
            stack_base,
            pass: 0,
            collecting: false,
            dirty: false,
            root: Value::EMPTY,
            roots: ShadowStack::new(),
            scanner,
            metrics: GcMetrics::new(),
            stats: HeapStats {
                regions_reserved: 1,
                ..HeapStats::default()
            },
        };
        let ptr = low as *mut Self;
        // SAFETY: the page is mapped, page aligned, and `validate` checked
        // it is larger than the record.
        unsafe { ptr.write(record) };
        // SAFETY: `low` is the non-null start of a mapping.
        let record = unsafe { NonNull::new_unchecked(ptr) };
        // SAFETY: just written.
        let manager = unsafe { &mut *ptr };
        let Some(root) = manager.try_bump(ObjectKind::Slots, root_size) else {
            // SAFETY: nothing else has seen the record.
            unsafe { Self::teardown(record) };
            return Err(GcError::exhausted(root_size));
        };
        manager.root = root;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            boot_page = low,
            young_size = manager.config.young_size,
            store_capacity = manager.store.capacity(),
            "heap_bootstrap"
        );

        Ok(record)
    }

    /// Drops the record and releases every region, the bootstrap page last.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Manager::bootstrap`] and must not be used
    /// afterwards.
    pub(crate) unsafe fn teardown(ptr: NonNull<Self>) {
        let ptr = ptr.as_ptr();
        // SAFETY: the boot region is taken exactly once, here.
        let boot_region = unsafe { ManuallyDrop::take(&mut (*ptr).boot_region) };
        // SAFETY: the record is valid and is not touched again.
        unsafe { ptr::drop_in_place(ptr) };
        pages::release(Some(boot_region));
    }

    /// Current lifecycle state.
    pub(crate) const fn phase(&self) -> Phase {
        if self.old.is_present() {
            Phase::Steady
        } else {
            Phase::YoungOnly
        }
    }

    /// Returns `true` while the nursery is still the bootstrap page.
    pub(crate) const fn on_boot_page(&self) -> bool {
        self.young_region.is_none()
    }

    /// Allocates from the young cursor without collecting. The payload is
    /// zero-filled.
    pub(crate) fn try_bump(&mut self, kind: ObjectKind, size: usize) -> Option<Value> {
        let addr = self.young.bump(size)?;
        // SAFETY: `bump` handed out `size` fresh bytes at `addr`.
        unsafe {
            ptr::write_bytes((addr + HEADER_SIZE) as *mut u8, 0, size - HEADER_SIZE);
            object::write_header(addr, kind, size);
        }
        Some(Value::from_addr(addr))
    }

    /// Rejects requests no collection could ever satisfy.
    pub(crate) fn check_request(&self, size: usize) -> Result<()> {
        if size >= self.config.max_allocation_size {
            return Err(GcError::AllocationTooLarge {
                requested: size,
                max: self.config.max_allocation_size,
            });
        }
        Ok(())
    }

    /// The space whose allocated range contains `addr`.
    pub(crate) fn space_of(&self, addr: usize) -> Option<Generation> {
        [self.young, self.old, self.boot]
            .into_iter()
            .find(|space| space.contains_allocated(addr))
    }

    /// Write barrier: records `slot` when a reference to a young object is
    /// stored into a container outside the young generation.
    pub(crate) fn write_barrier(
        &mut self,
        container: usize,
        slot: *mut Value,
        value: Value,
    ) -> Result<()> {
        let young_target = value.addr().is_some_and(|addr| self.young.contains(addr));
        if young_target && !self.young.contains(container) {
            self.store.push(slot)?;
        }
        Ok(())
    }

    /// Collector controller. `sp` is the stack-pointer snapshot taken by the
    /// collection entry frame; `sz` is the pending request.
    pub(crate) fn garbage_collect(&mut self, sp: usize, sz: usize, force_full: bool) -> Result<()> {
        self.check_request(sz)?;
        if self.collecting {
            return Err(GcError::CollectionInProgress);
        }
        self.pass += 1;
        self.collecting = true;
        let result = self.run_pass(sp, sz, force_full);
        self.collecting = false;
        if result.is_ok() {
            self.dirty = false;
        }
        result
    }

    fn run_pass(&mut self, sp: usize, sz: usize, force_full: bool) -> Result<()> {
        let started = Instant::now();
        if self.on_boot_page() {
            return self.retire_boot_page(sz, started);
        }
        if !self.old.is_present() {
            self.reserve_old()?;
        }

        let extent = stack::stack_extent(self.stack_base, sp);
        let estimate = if self.config.scan_native_stack {
            // SAFETY: the extent lies between the entry frame and the base.
            unsafe { scan_for_young_pointers(extent, &self.young) }
        } else {
            0
        };
        let full = force_full || self.needs_full(sz);
        let collection_type = if full {
            CollectionType::Full
        } else {
            CollectionType::Minor
        };

        #[cfg(feature = "tracing")]
        let _span = crate::tracing::trace_gc_collection(collection_type, self.pass);

        let mut metrics = match collection_type {
            CollectionType::Full => gc::full::collect_full(self, extent, sz)?,
            _ => gc::minor::collect_minor(self, extent)?,
        };
        metrics.pass = self.pass;
        metrics.young_root_estimate = estimate;
        metrics.duration = started.elapsed();
        self.finish_pass(metrics);
        Ok(())
    }

    /// Full collection trigger.
    fn needs_full(&self, sz: usize) -> bool {
        let young_capacity = self.young.capacity();
        let worst = self
            .old
            .cursor()
            .saturating_add(sz)
            .saturating_add(self.config.young_size)
            .saturating_add(young_capacity);
        let period = self.config.full_gc_period;
        worst > self.old.high() || (period != 0 && self.pass % period == 0) || sz > young_capacity
    }

    /// Freezes the bootstrap page as immortal boot space and moves the
    /// nursery to a fresh region. Nothing is copied.
    fn retire_boot_page(&mut self, sz: usize, started: Instant) -> Result<()> {
        let size = gc::full::young_region_size(self, sz);
        let region = pages::reserve(size, self.config.executable)?;
        self.stats.regions_reserved += 1;
        self.boot = self.young;
        // The boot page's list only ever holds slots of boot objects, which
        // do not move.
        let previous = self.install_young(region);
        debug_assert!(previous.is_none());

        #[cfg(feature = "tracing")]
        tracing::debug!(
            boot_used = self.boot.used(),
            young_capacity = self.young.capacity(),
            "boot_page_retired"
        );

        let mut metrics = GcMetrics::new();
        metrics.collection_type = CollectionType::BootRetire;
        metrics.pass = self.pass;
        metrics.duration = started.elapsed();
        self.finish_pass(metrics);
        Ok(())
    }

    fn reserve_old(&mut self) -> Result<()> {
        let size = self.config.young_size.saturating_mul(self.config.old_size_factor);
        let region = pages::reserve(size, self.config.executable)?;
        self.stats.regions_reserved += 1;
        let old = Generation::over(&region, GenerationKind::Old, 0);

        #[cfg(feature = "tracing")]
        tracing::debug!(old_capacity = old.capacity(), "old_generation_reserved");

        let previous = self.install_old(region, old);
        debug_assert!(previous.is_none());
        Ok(())
    }

    /// Makes `region` the nursery, with its tail as the store pointer list.
    /// Returns the region it replaces.
    pub(crate) fn install_young(&mut self, region: Mmap) -> Option<Mmap> {
        self.young = Generation::over(&region, GenerationKind::Young, self.config.store_bytes());
        self.store = StorePointerList::over(self.young.high(), region.end());
        self.young_region.replace(region)
    }

    /// Makes `region`, described by `old`, the old generation. Returns the
    /// region it replaces.
    pub(crate) fn install_old(&mut self, region: Mmap, old: Generation) -> Option<Mmap> {
        self.old = old;
        self.old_region.replace(region)
    }

    /// Hands a replaced region back to the page provider.
    pub(crate) fn release(&mut self, region: Option<Mmap>) {
        if region.is_some() {
            self.stats.regions_released += 1;
        }
        pages::release(region);
    }

    fn finish_pass(&mut self, metrics: GcMetrics) {
        debug_assert!(self.young.is_consistent() && self.old.is_consistent());
        #[cfg(feature = "tracing")]
        crate::tracing::log_collection_end(&metrics);
        self.stats.record(&metrics);
        self.metrics = metrics;
    }
}
