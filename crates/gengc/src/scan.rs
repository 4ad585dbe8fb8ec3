//! Conservative classification of machine words.

use crate::generation::Generation;
use crate::stack::StackExtent;
use crate::value::Value;

/// Counts the words in `extent` that look like pointers into `young`.
///
/// A word counts when its bit pattern is a tagged pointer and its target
/// lies in the young generation's `[low, high)` bounds. The result is a
/// liveness estimate: integers that happen to look like young addresses are
/// counted too.
///
/// # Safety
///
/// `extent` must be readable for its whole length.
pub unsafe fn scan_for_young_pointers(extent: StackExtent, young: &Generation) -> usize {
    if extent.is_empty() {
        return 0;
    }
    extent
        .word_addrs()
        .filter(|&slot| {
            // SAFETY: guaranteed by the caller. Volatile so the compiler
            // cannot assume it knows what the stack holds.
            let word = unsafe { std::ptr::read_volatile(slot) };
            Value::from_bits(word)
                .addr()
                .is_some_and(|addr| young.contains(addr))
        })
        .count()
}

/// Calls `visit` with the address of every word in `extent` whose value is
/// a tagged pointer. Words that are immediates are never offered.
///
/// # Safety
///
/// `extent` must be readable for its whole length.
pub unsafe fn for_each_pointer_word(extent: StackExtent, visit: &mut dyn FnMut(*mut usize)) {
    for slot in extent.word_addrs() {
        // SAFETY: guaranteed by the caller.
        let word = unsafe { std::ptr::read_volatile(slot) };
        if Value::from_bits(word).is_ptr() {
            visit(slot);
        }
    }
}
