//! Collection passes.
//!
//! [`minor`] evacuates the young generation into the old one; [`full`]
//! evacuates both into freshly reserved regions. Both share the root
//! handling below and the [`evacuate::Evacuator`].

pub mod evacuate;
pub mod full;
pub mod minor;

use crate::manager::Manager;
use crate::stack::StackExtent;

use evacuate::{Evacuator, ObjectStarts};

/// Evacuates the targets of the ambiguous roots: the native stack words in
/// `extent` and every region registered on the shadow stack.
///
/// # Safety
///
/// `extent` must be readable and must not cover frames of the collector
/// itself; registered regions must still be valid.
pub(crate) unsafe fn evacuate_ambiguous_roots(
    manager: &Manager,
    evacuator: &mut Evacuator,
    starts: &ObjectStarts,
    extent: StackExtent,
) {
    let mut visit = |word: *mut usize| {
        // SAFETY: the scanner only hands out words inside `extent`.
        unsafe { evacuator.update_conservative(word, starts) };
    };
    unsafe { manager.scanner.visit_stack(extent, &mut visit) };
    for region in manager.roots.iter() {
        for word in region.extent().word_addrs() {
            visit(word);
        }
    }
}

/// Evacuates the targets of the slots on the store pointer list.
///
/// With `skip_from_spaces`, slots inside a from-space are ignored: their
/// containers are traced only if they are themselves reachable.
///
/// # Safety
///
/// Every entry that is visited must still address a readable value slot.
pub(crate) unsafe fn evacuate_remembered_slots(
    manager: &Manager,
    evacuator: &mut Evacuator,
    skip_from_spaces: bool,
) {
    for slot in manager.store.entries() {
        if skip_from_spaces && evacuator.in_from_space(slot as usize) {
            continue;
        }
        unsafe { evacuator.update_remembered(slot) };
    }
}
