//! Collector configuration.
//!
//! All sizes are in bytes unless noted. Region sizes are rounded up to the
//! page size when regions are reserved.

use crate::error::{GcError, Result};
use crate::manager::MANAGER_RESERVED;
use crate::object::MAX_OBJECT_SIZE;
use crate::value::WORD;

/// Default size of a young generation region.
pub const DEFAULT_YOUNG_SIZE: usize = 256 * 1024;

/// Default old generation size, as a multiple of the young size.
pub const DEFAULT_OLD_SIZE_FACTOR: usize = 2;

/// Default number of store pointer list entries per young region.
pub const DEFAULT_STORE_CAPACITY: usize = 4096;

/// Default period (in collection passes) of forced full collections.
pub const DEFAULT_FULL_GC_PERIOD: u64 = 256;

/// Default number of slots in the runtime root object.
pub const DEFAULT_ROOT_SLOTS: usize = 16;

/// Configuration for a [`Heap`](crate::Heap).
///
/// # Example
///
/// ```
/// use gengc::GcConfig;
///
/// let config = GcConfig::default()
///     .young_size(64 * 1024)
///     .full_gc_period(0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Size of the young generation (and of the bootstrap page).
    pub young_size: usize,
    /// The old generation starts at `young_size * old_size_factor`.
    pub old_size_factor: usize,
    /// Requests at or above this size fail with `AllocationTooLarge`.
    pub max_allocation_size: usize,
    /// Entries reserved for the store pointer list in each young region.
    pub store_capacity: usize,
    /// Every Nth collection pass is a full one; 0 disables the cadence.
    pub full_gc_period: u64,
    /// Number of value slots in the runtime root object.
    pub root_slots: usize,
    /// Whether the native call stack is scanned for roots.
    pub scan_native_stack: bool,
    /// Whether heap regions are mapped executable.
    pub executable: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            young_size: DEFAULT_YOUNG_SIZE,
            old_size_factor: DEFAULT_OLD_SIZE_FACTOR,
            max_allocation_size: DEFAULT_YOUNG_SIZE * 16,
            store_capacity: DEFAULT_STORE_CAPACITY,
            full_gc_period: DEFAULT_FULL_GC_PERIOD,
            root_slots: DEFAULT_ROOT_SLOTS,
            scan_native_stack: true,
            executable: false,
        }
    }
}

impl GcConfig {
    /// Sets the young generation size. The maximum allocation size follows
    /// it at 16x.
    #[must_use]
    pub const fn young_size(mut self, size: usize) -> Self {
        self.young_size = size;
        self.max_allocation_size = size.saturating_mul(16);
        self
    }

    /// Sets the old generation size factor.
    #[must_use]
    pub const fn old_size_factor(mut self, factor: usize) -> Self {
        self.old_size_factor = factor;
        self
    }

    /// Sets the maximum single-allocation size.
    #[must_use]
    pub const fn max_allocation_size(mut self, size: usize) -> Self {
        self.max_allocation_size = size;
        self
    }

    /// Sets the store pointer list capacity, in entries.
    #[must_use]
    pub const fn store_capacity(mut self, entries: usize) -> Self {
        self.store_capacity = entries;
        self
    }

    /// Sets the full collection cadence. `0` means never force one.
    #[must_use]
    pub const fn full_gc_period(mut self, period: u64) -> Self {
        self.full_gc_period = period;
        self
    }

    /// Sets the number of slots in the runtime root object.
    #[must_use]
    pub const fn root_slots(mut self, slots: usize) -> Self {
        self.root_slots = slots;
        self
    }

    /// Enables or disables conservative scanning of the native stack.
    #[must_use]
    pub const fn scan_native_stack(mut self, scan: bool) -> Self {
        self.scan_native_stack = scan;
        self
    }

    /// Maps heap regions executable.
    #[must_use]
    pub const fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    /// Bytes at the tail of each young region set aside for the store
    /// pointer list.
    #[must_use]
    pub const fn store_bytes(&self) -> usize {
        self.store_capacity * WORD
    }

    /// Checks that the configuration can produce a working heap.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.old_size_factor == 0 {
            return Err(GcError::InvalidConfig("old_size_factor must be at least 1"));
        }
        if self.store_capacity == 0 {
            return Err(GcError::InvalidConfig("store_capacity must be at least 1"));
        }
        let root_bytes = self
            .root_slots
            .checked_add(1)
            .and_then(|n| n.checked_mul(WORD))
            .ok_or(GcError::InvalidConfig("root_slots is too large"))?;
        let reserved = MANAGER_RESERVED
            .checked_add(root_bytes)
            .and_then(|n| n.checked_add(self.store_bytes()))
            .ok_or(GcError::InvalidConfig("store_capacity is too large"))?;
        if self.young_size <= reserved {
            return Err(GcError::InvalidConfig(
                "young_size leaves no room after the manager record, root object and store list",
            ));
        }
        if self.max_allocation_size == 0 {
            return Err(GcError::InvalidConfig("max_allocation_size must be non-zero"));
        }
        if self.max_allocation_size > MAX_OBJECT_SIZE {
            return Err(GcError::InvalidConfig(
                "max_allocation_size exceeds the largest encodable object",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        GcConfig::default().validate().unwrap();
    }

    #[test]
    fn test_young_size_moves_max_allocation() {
        let c = GcConfig::default().young_size(64 * 1024);
        assert_eq!(c.max_allocation_size, 16 * 64 * 1024);
    }

    #[test]
    fn test_rejects_tiny_young_generation() {
        let err = GcConfig::default().young_size(128).validate().unwrap_err();
        assert!(matches!(err, GcError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unencodable_max_allocation() {
        let err = GcConfig::default()
            .max_allocation_size(MAX_OBJECT_SIZE + 1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GcError::InvalidConfig(_)));
        GcConfig::default()
            .max_allocation_size(MAX_OBJECT_SIZE)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_rejects_zero_factor() {
        let err = GcConfig::default().old_size_factor(0).validate().unwrap_err();
        assert!(matches!(err, GcError::InvalidConfig(_)));
    }

    #[test]
    fn test_store_bytes() {
        let c = GcConfig::default().store_capacity(10);
        assert_eq!(c.store_bytes(), 10 * WORD);
    }
}
