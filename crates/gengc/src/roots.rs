//! Root sources.
//!
//! The native stack is reached through the [`RootScanner`] trait so the
//! conservative scheme can be swapped for a precise one without touching
//! the collectors. Explicitly registered word ranges live on a
//! [`ShadowStack`] and are scanned with the same conservative rule.

use std::ptr::NonNull;

use crate::scan::for_each_pointer_word;
use crate::stack::StackExtent;
use crate::value::Value;

/// A source of root words on the native stack.
pub trait RootScanner {
    /// Calls `visit` with the address of every word in `extent` that may
    /// hold a heap pointer. The collector decides which of them are real.
    ///
    /// # Safety
    ///
    /// `extent` must be the live, readable part of the current stack.
    unsafe fn visit_stack(&self, extent: StackExtent, visit: &mut dyn FnMut(*mut usize));

    /// Name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Treats every pointer-shaped word on the stack as a potential root.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConservativeStackScanner;

impl RootScanner for ConservativeStackScanner {
    unsafe fn visit_stack(&self, extent: StackExtent, visit: &mut dyn FnMut(*mut usize)) {
        // SAFETY: forwarded from the caller.
        unsafe { for_each_pointer_word(extent, visit) };
    }

    fn name(&self) -> &'static str {
        "conservative"
    }
}

/// Ignores the native stack entirely. Roots must then be registered on the
/// shadow stack or reachable from the runtime root object.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStackScanner;

impl RootScanner for NoStackScanner {
    unsafe fn visit_stack(&self, _extent: StackExtent, _visit: &mut dyn FnMut(*mut usize)) {}

    fn name(&self) -> &'static str {
        "none"
    }
}

// ============================================================================
// ShadowStack - explicitly registered root ranges
// ============================================================================

/// A range of value slots registered as roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRegion {
    ptr: NonNull<Value>,
    len: usize,
}

impl RootRegion {
    /// The region as a stack-style extent.
    #[must_use]
    pub fn extent(&self) -> StackExtent {
        StackExtent::new(self.ptr.as_ptr() as usize, self.len)
    }

    /// Number of slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the region has no slots.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A shadow stack of root regions with scope-based frames.
#[derive(Debug, Default)]
pub struct ShadowStack {
    regions: Vec<RootRegion>,
    frame_markers: Vec<usize>,
}

impl ShadowStack {
    /// Create a new empty shadow stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
            frame_markers: Vec::new(),
        }
    }

    /// Register `len` slots starting at `ptr`.
    ///
    /// # Safety
    ///
    /// The slots must stay valid for reads and writes until the region is
    /// popped, and the collector may rewrite them at any collection.
    pub unsafe fn push(&mut self, ptr: NonNull<Value>, len: usize) {
        self.regions.push(RootRegion { ptr, len });
    }

    /// Unregister the region starting at `ptr`.
    pub fn pop(&mut self, ptr: NonNull<Value>) {
        if let Some(pos) = self.regions.iter().rposition(|r| r.ptr == ptr) {
            self.regions.remove(pos);
        }
    }

    /// Number of registered regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Iterate over all regions.
    pub fn iter(&self) -> impl Iterator<Item = RootRegion> + '_ {
        self.regions.iter().copied()
    }

    /// Push a frame marker.
    pub fn push_frame(&mut self) {
        self.frame_markers.push(self.regions.len());
    }

    /// Pop a frame marker and remove all regions added since.
    pub fn pop_frame(&mut self) {
        if let Some(marker) = self.frame_markers.pop() {
            self.regions.truncate(marker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_stack_frames() {
        let mut a = [Value::NIL; 2];
        let mut b = [Value::NIL; 3];
        let pa = NonNull::new(a.as_mut_ptr()).unwrap();
        let pb = NonNull::new(b.as_mut_ptr()).unwrap();

        let mut stack = ShadowStack::new();
        unsafe { stack.push(pa, a.len()) };
        stack.push_frame();
        unsafe { stack.push(pb, b.len()) };
        assert_eq!(stack.len(), 2);

        stack.pop_frame();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.iter().next().unwrap().len(), 2);

        stack.pop(pa);
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn test_no_stack_scanner_visits_nothing() {
        let mut words = [0x1000usize; 4];
        let extent = StackExtent::new(words.as_mut_ptr() as usize, words.len());
        let mut n = 0;
        unsafe { NoStackScanner.visit_stack(extent, &mut |_| n += 1) };
        assert_eq!(n, 0);
        unsafe { ConservativeStackScanner.visit_stack(extent, &mut |_| n += 1) };
        assert_eq!(n, 4);
    }
}
