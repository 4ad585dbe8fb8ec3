//! Generation descriptors.
//!
//! A [`Generation`] records the bounds of one contiguous region. The same
//! record is used for the young generation, the old generation and the
//! retired bootstrap page:
//!
//! ```text
//!   low     first                cursor                 high      end
//!   | header | allocated objects  | free                 | store list |
//! ```
//!
//! `low..high` is the region owned by the generation, `first..cursor` holds
//! allocated (not necessarily live) objects and `cursor..high` is free.
//! Young regions keep `high..end` for the store pointer list; other regions
//! have `high == end`.

use sys_alloc::Mmap;

use crate::object::ObjectWalker;
use crate::value::{ALIGN, WORD};

/// Magic number stamped into every region header ("GGCR" in ASCII).
pub const REGION_MAGIC: u32 = 0x4747_4352;

/// Size of the header at the start of every freshly reserved region.
pub const REGION_HEADER_SIZE: usize = 2 * WORD;

/// Which generation a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GenerationKind {
    /// The nursery.
    Young = 1,
    /// Survivors of at least one minor collection.
    Old = 2,
}

/// Metadata stored at the beginning of each region.
#[repr(C)]
#[derive(Debug)]
pub struct RegionHeader {
    /// Magic number to validate this is a heap region.
    pub magic: u32,
    /// Generation the region was reserved for.
    pub kind: GenerationKind,
}

/// Bounds of a contiguous memory region used as a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    low: usize,
    first: usize,
    cursor: usize,
    high: usize,
}

impl Generation {
    /// A generation with no memory behind it.
    pub const EMPTY: Self = Self {
        low: 0,
        first: 0,
        cursor: 0,
        high: 0,
    };

    /// Lays out a fresh generation over `region`, stamping its header and
    /// keeping `tail` bytes at the end out of the allocatable range.
    pub(crate) fn over(region: &Mmap, kind: GenerationKind, tail: usize) -> Self {
        let low = region.ptr() as usize;
        debug_assert!(region.len() >= REGION_HEADER_SIZE + tail);
        // SAFETY: the region is at least a page long and page aligned.
        unsafe {
            (low as *mut RegionHeader).write(RegionHeader {
                magic: REGION_MAGIC,
                kind,
            });
        }
        Self::with_bounds(low, low + REGION_HEADER_SIZE, region.end() - tail)
    }

    /// Builds a descriptor from explicit bounds. `first` is where the first
    /// object goes; the cursor starts there.
    pub(crate) const fn with_bounds(low: usize, first: usize, high: usize) -> Self {
        debug_assert!(first % ALIGN == 0 && high % ALIGN == 0);
        Self {
            low,
            first,
            cursor: first,
            high,
        }
    }

    /// Start of the region.
    #[must_use]
    pub const fn low(&self) -> usize {
        self.low
    }

    /// Address of the first object (just past the fixed header).
    #[must_use]
    pub const fn first(&self) -> usize {
        self.first
    }

    /// Allocation cursor.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Allocation limit.
    #[must_use]
    pub const fn high(&self) -> usize {
        self.high
    }

    /// Returns `true` if `addr` lies in `[low, high)`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: usize) -> bool {
        self.low <= addr && addr < self.high
    }

    /// Returns `true` if `addr` lies among the allocated objects.
    #[inline]
    #[must_use]
    pub const fn contains_allocated(&self, addr: usize) -> bool {
        self.first <= addr && addr < self.cursor
    }

    /// Bytes allocated since the last reset.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.cursor - self.first
    }

    /// Bytes still available to the allocator.
    #[must_use]
    pub const fn free(&self) -> usize {
        self.high - self.cursor
    }

    /// Bytes available to the allocator when the generation is empty.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.high - self.first
    }

    /// Returns `true` if this descriptor has memory behind it.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.high != 0
    }

    /// Checks `low <= first <= cursor <= high`.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.low <= self.first && self.first <= self.cursor && self.cursor <= self.high
    }

    /// Bumps the cursor by `size` bytes and returns the old cursor, or
    /// `None` if the generation is too full.
    #[inline]
    pub(crate) fn bump(&mut self, size: usize) -> Option<usize> {
        debug_assert!(size % ALIGN == 0);
        if size > self.free() {
            return None;
        }
        let addr = self.cursor;
        self.cursor += size;
        Some(addr)
    }

    /// Makes the generation's whole capacity available again.
    pub(crate) fn reset(&mut self) {
        self.cursor = self.first;
    }

    /// Walks the allocated objects.
    pub(crate) fn objects(&self) -> ObjectWalker {
        // SAFETY: `first..cursor` only ever holds fully written objects.
        unsafe { ObjectWalker::new(self.first, self.cursor) }
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages;

    #[test]
    fn test_fresh_generation_layout() {
        let region = pages::reserve(4096, false).unwrap();
        let gen = Generation::over(&region, GenerationKind::Old, 0);
        assert_eq!(gen.low(), region.ptr() as usize);
        assert_eq!(gen.first(), gen.low() + REGION_HEADER_SIZE);
        assert_eq!(gen.cursor(), gen.first());
        assert_eq!(gen.high(), region.end());
        assert!(gen.is_consistent());

        let header = unsafe { &*(region.ptr() as *const RegionHeader) };
        assert_eq!(header.magic, REGION_MAGIC);
        assert_eq!(header.kind, GenerationKind::Old);
    }

    #[test]
    fn test_bump_respects_tail() {
        let region = pages::reserve(4096, false).unwrap();
        let tail = 64 * WORD;
        let mut gen = Generation::over(&region, GenerationKind::Young, tail);
        assert_eq!(gen.high(), region.end() - tail);

        let cap = gen.capacity();
        let a = gen.bump(64).unwrap();
        assert_eq!(a, gen.first());
        assert_eq!(gen.used(), 64);
        assert!(gen.bump(cap).is_none(), "bump past high must fail");
        assert_eq!(gen.used(), 64, "failed bump must not move the cursor");
        gen.reset();
        assert_eq!(gen.used(), 0);
        assert!(gen.is_consistent());
    }

    #[test]
    fn test_contains() {
        let gen = Generation::with_bounds(0x1000, 0x1010, 0x2000);
        assert!(gen.contains(0x1000));
        assert!(gen.contains(0x1ff8));
        assert!(!gen.contains(0x2000));
        assert!(!gen.contains_allocated(0x1010));
        assert!(!Generation::EMPTY.is_present());
    }
}
