//! Remembered set: the store pointer list written by the write barrier.
//!
//! The list is an in-heap LIFO stack carved out of the tail of the young
//! region. It grows downward from the region end towards the allocation
//! limit; each entry is the address of a slot outside the young generation
//! that was made to reference a young object.
//!
//! ```text
//!   young.high = floor         top                 ceiling = region end
//!         |  (room)             | slot | slot | slot |
//! ```
//!
//! Duplicates are harmless. Omissions are not: a young object referenced
//! only from an unrecorded slot would be lost at the next minor collection.

use crate::error::{GcError, Result};
use crate::value::{Value, WORD};

/// The store pointer list of one young region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePointerList {
    floor: usize,
    top: usize,
    ceiling: usize,
}

impl StorePointerList {
    /// A list with no storage; every push overflows.
    pub const EMPTY: Self = Self {
        floor: 0,
        top: 0,
        ceiling: 0,
    };

    /// Creates an empty list occupying `[floor, ceiling)`.
    pub(crate) const fn over(floor: usize, ceiling: usize) -> Self {
        Self {
            floor,
            top: ceiling,
            ceiling,
        }
    }

    /// Records that `slot` now references a young object.
    ///
    /// A push of the slot already on top of the stack is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::StorePointerOverflow`] without recording anything
    /// if the list is full.
    pub(crate) fn push(&mut self, slot: *mut Value) -> Result<()> {
        if self.top < self.ceiling {
            // SAFETY: `top..ceiling` holds initialised entries.
            if unsafe { *(self.top as *const usize) } == slot as usize {
                return Ok(());
            }
        }
        if self.top < self.floor + WORD {
            return Err(GcError::StorePointerOverflow {
                capacity: self.capacity(),
            });
        }
        self.top -= WORD;
        // SAFETY: `top` is within the list's storage.
        unsafe { *(self.top as *mut usize) = slot as usize };
        Ok(())
    }

    /// Number of recorded entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.ceiling - self.top) / WORD
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.top == self.ceiling
    }

    /// Number of entries the list can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        (self.ceiling - self.floor) / WORD
    }

    /// Current top-of-stack marker.
    #[must_use]
    pub const fn top(&self) -> usize {
        self.top
    }

    /// Lowest address the list may grow down to.
    #[must_use]
    pub const fn floor(&self) -> usize {
        self.floor
    }

    /// Recorded slot addresses, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = *mut Value> + '_ {
        (0..self.len()).map(move |i| {
            // SAFETY: `top..ceiling` holds initialised entries.
            unsafe { *((self.top + i * WORD) as *const usize) as *mut Value }
        })
    }

    /// Drops every entry.
    pub(crate) fn clear(&mut self) {
        self.top = self.ceiling;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_over(storage: &mut [usize]) -> StorePointerList {
        let floor = storage.as_mut_ptr() as usize;
        StorePointerList::over(floor, floor + storage.len() * WORD)
    }

    #[test]
    fn test_push_grows_downward() {
        let mut storage = [0usize; 4];
        let mut list = list_over(&mut storage);
        let ceiling = list.top();

        list.push(0x1000 as *mut Value).unwrap();
        assert_eq!(list.top(), ceiling - WORD);
        list.push(0x2000 as *mut Value).unwrap();
        assert_eq!(list.len(), 2);

        let entries: Vec<usize> = list.entries().map(|p| p as usize).collect();
        assert_eq!(entries, vec![0x2000, 0x1000]);
    }

    #[test]
    fn test_overflow_is_reported_before_writing() {
        let mut storage = [0usize; 2];
        let mut list = list_over(&mut storage);
        list.push(0x1000 as *mut Value).unwrap();
        list.push(0x2000 as *mut Value).unwrap();
        let before = list;

        let err = list.push(0x3000 as *mut Value).unwrap_err();
        assert!(matches!(err, GcError::StorePointerOverflow { capacity: 2 }));
        assert_eq!(list, before);
    }

    #[test]
    fn test_repeated_push_of_top_is_skipped() {
        let mut storage = [0usize; 2];
        let mut list = list_over(&mut storage);
        list.push(0x1000 as *mut Value).unwrap();
        list.push(0x1000 as *mut Value).unwrap();
        assert_eq!(list.len(), 1);
        // Not on top any more: duplicates are recorded.
        list.push(0x2000 as *mut Value).unwrap();
        list.push(0x1000 as *mut Value).unwrap_err();
    }

    #[test]
    fn test_clear() {
        let mut storage = [0usize; 2];
        let mut list = list_over(&mut storage);
        list.push(0x1000 as *mut Value).unwrap();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.capacity(), 2);
    }

    #[test]
    fn test_empty_list_always_overflows() {
        let mut list = StorePointerList::EMPTY;
        assert!(list.push(0x1000 as *mut Value).is_err());
    }
}
