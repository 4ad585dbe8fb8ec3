//! Native stack extent and register spilling for conservative root scanning.

use crate::value::WORD;

/// Whether the native stack grows towards lower addresses. True on every
/// target this crate supports.
pub const STACK_GROWS_DOWN: bool = true;

/// Bounds of a thread's stack.
#[derive(Debug, Clone, Copy)]
pub struct StackBounds {
    /// The bottom of the stack (highest address).
    pub bottom: usize,
    /// The top of the stack (lowest address).
    pub top: usize,
}

/// Retrieve the stack bounds for the current thread.
#[cfg(all(any(target_os = "linux", target_os = "android"), not(miri)))]
#[must_use]
pub fn get_stack_bounds() -> Option<StackBounds> {
    use libc::{
        pthread_attr_destroy, pthread_attr_getstack, pthread_attr_t, pthread_getattr_np,
        pthread_self,
    };

    unsafe {
        let mut attr: pthread_attr_t = std::mem::zeroed();
        if pthread_getattr_np(pthread_self(), &raw mut attr) != 0 {
            return None;
        }

        let mut stackaddr: *mut libc::c_void = std::ptr::null_mut();
        let mut stacksize: libc::size_t = 0;
        let ret = pthread_attr_getstack(&raw const attr, &raw mut stackaddr, &raw mut stacksize);
        pthread_attr_destroy(&raw mut attr);
        if ret != 0 {
            return None;
        }

        Some(StackBounds {
            bottom: (stackaddr as usize) + stacksize,
            top: stackaddr as usize,
        })
    }
}

/// Retrieve the stack bounds for the current thread.
#[cfg(all(target_vendor = "apple", not(miri)))]
#[must_use]
pub fn get_stack_bounds() -> Option<StackBounds> {
    unsafe {
        let thread = libc::pthread_self();
        let bottom = libc::pthread_get_stackaddr_np(thread) as usize;
        let size = libc::pthread_get_stacksize_np(thread);
        Some(StackBounds {
            bottom,
            top: bottom - size,
        })
    }
}

/// Stack bounds are unavailable on this platform.
#[cfg(any(
    miri,
    not(any(target_os = "linux", target_os = "android", target_vendor = "apple"))
))]
#[must_use]
pub fn get_stack_bounds() -> Option<StackBounds> {
    None
}

/// Address of a word in the caller's frame.
///
/// Always inlined so the marker lives in the frame of the function that
/// calls it: everything between the returned address and the stack base
/// belongs to that frame or to its callers.
#[inline(always)]
#[must_use]
pub fn current_stack_pointer() -> usize {
    let marker = 0usize;
    std::hint::black_box(&marker) as *const usize as usize
}

/// Forces the callee-saved registers into the caller's frame.
///
/// The asm block claims to clobber them, so the enclosing function saves
/// the mutator's values in its prologue and restores them on return. Those
/// saves lie above the caller's stack-pointer snapshot, which makes values
/// held only in registers visible to the scan, and lets a moving collection
/// rewrite them before they are restored.
#[inline(always)]
pub fn force_register_spill() {
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        // RBX and RBP are reserved by LLVM.
        std::arch::asm!(
            "",
            out("r12") _,
            out("r13") _,
            out("r14") _,
            out("r15") _,
        );
    }
    #[cfg(all(target_arch = "aarch64", not(miri)))]
    unsafe {
        // x19 and x29 are reserved by LLVM.
        std::arch::asm!(
            "",
            out("x20") _,
            out("x21") _,
            out("x22") _,
            out("x23") _,
            out("x24") _,
            out("x25") _,
            out("x26") _,
            out("x27") _,
            out("x28") _,
        );
    }
    #[cfg(any(not(any(target_arch = "x86_64", target_arch = "aarch64")), miri))]
    std::hint::black_box(());
}

/// A contiguous range of stack words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackExtent {
    /// Lowest address in the range, word aligned.
    pub start: usize,
    /// Number of words in the range.
    pub words: usize,
}

impl StackExtent {
    /// An extent that scans nothing.
    pub const EMPTY: Self = Self { start: 0, words: 0 };

    /// Builds an extent over `words` words from `start`.
    #[must_use]
    pub const fn new(start: usize, words: usize) -> Self {
        Self { start, words }
    }

    /// Returns `true` if there is nothing to scan.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.words == 0
    }

    /// One past the highest address in the range.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.words * WORD
    }

    /// Iterates the address of every word in the range.
    pub fn word_addrs(&self) -> impl Iterator<Item = *mut usize> {
        let start = self.start;
        (0..self.words).map(move |i| (start + i * WORD) as *mut usize)
    }
}

/// Computes the live stack range between the saved `base` and the snapshot
/// `sp`, using the platform's growth direction.
///
/// For a downward stack the range is `[sp, base)`; for an upward one it is
/// `[base, sp]`. A non-positive length yields an empty extent, which happens
/// when the collector runs before the caller has pushed any frames.
#[must_use]
pub const fn stack_extent(base: usize, sp: usize) -> StackExtent {
    const MASK: usize = WORD - 1;
    if STACK_GROWS_DOWN {
        let start = (sp + MASK) & !MASK;
        if start >= base {
            return StackExtent::EMPTY;
        }
        StackExtent::new(start, (base - start) / WORD)
    } else {
        let start = (base + MASK) & !MASK;
        if sp < start {
            return StackExtent::EMPTY;
        }
        StackExtent::new(start, (sp - start) / WORD + 1)
    }
}
