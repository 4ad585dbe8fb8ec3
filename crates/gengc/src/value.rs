//! Heap values: immediates and tagged pointers.
//!
//! A [`Value`] is a single machine word. The collector only needs to know
//! whether a word *could* be a heap pointer; everything else about the
//! encoding belongs to the runtime.
//!
//! ```text
//!   ...xxxx xxx1   small integer (n << 1 | 1)
//!   ...0000 0010   nil
//!   ...0000 0100   false
//!   ...0000 0110   true
//!   ...xxxx x000   heap pointer (non-zero, 8-byte aligned)
//!   ...0000 0000   empty slot
//! ```

use std::fmt;

/// Size of a machine word in bytes.
pub const WORD: usize = std::mem::size_of::<usize>();

/// Alignment of every heap object.
pub const ALIGN: usize = 8;

const PTR_MASK: usize = ALIGN - 1;

/// Rounds `n` up to the object alignment, saturating at the largest
/// aligned `usize`.
#[inline]
#[must_use]
pub const fn align_up(n: usize) -> usize {
    n.saturating_add(PTR_MASK) & !PTR_MASK
}

/// A runtime value: either an immediate or a pointer to a heap object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Value(usize);

impl Value {
    /// The zero word held by freshly allocated slots.
    pub const EMPTY: Self = Self(0);
    /// The nil immediate.
    pub const NIL: Self = Self(0b010);
    /// The false immediate.
    pub const FALSE: Self = Self(0b100);
    /// The true immediate.
    pub const TRUE: Self = Self(0b110);

    /// Reinterprets a raw word as a value.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: usize) -> Self {
        Self(bits)
    }

    /// Returns the raw word.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> usize {
        self.0
    }

    /// Encodes a small integer. The top bit of `n` is lost.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_int(n: isize) -> Self {
        Self(((n << 1) | 1) as usize)
    }

    /// Decodes a small integer, or `None` if this is not one.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_int(self) -> Option<isize> {
        if self.0 & 1 == 1 {
            Some((self.0 as isize) >> 1)
        } else {
            None
        }
    }

    /// Encodes a boolean.
    #[inline]
    #[must_use]
    pub const fn from_bool(b: bool) -> Self {
        if b {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }

    /// Wraps an object address. The address must be 8-byte aligned.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        debug_assert!(addr & PTR_MASK == 0);
        Self(addr)
    }

    /// Returns `true` if the bit pattern denotes a heap pointer.
    #[inline]
    #[must_use]
    pub const fn is_ptr(self) -> bool {
        self.0 != 0 && self.0 & PTR_MASK == 0
    }

    /// Returns `true` for every non-pointer value.
    #[inline]
    #[must_use]
    pub const fn is_immediate(self) -> bool {
        !self.is_ptr()
    }

    /// Returns the object address if this is a pointer.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> Option<usize> {
        if self.is_ptr() {
            Some(self.0)
        } else {
            None
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::EMPTY => f.write_str("Empty"),
            Self::NIL => f.write_str("Nil"),
            Self::FALSE => f.write_str("False"),
            Self::TRUE => f.write_str("True"),
            v if v.is_ptr() => write!(f, "Ptr({:#x})", v.0),
            v => match v.as_int() {
                Some(n) => write!(f, "Int({n})"),
                None => write!(f, "Imm({:#x})", v.0),
            },
        }
    }
}

impl From<isize> for Value {
    fn from(n: isize) -> Self {
        Self::from_int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}
