//! Object headers and forwarding markers.
//!
//! Every heap object begins with a single header word:
//!
//! ```text
//!   live:       [ size (bytes, incl. header) | kind (7 bits) | 1 ]
//!   forwarded:  [ new address                              | 0 ]
//! ```
//!
//! Object addresses are 8-byte aligned, so the low bit cleanly separates a
//! live header from a forwarding marker. A forwarding marker only exists
//! for the duration of one collection pass: the space it lives in is either
//! reset or released before the pass returns.

use crate::value::{align_up, Value, WORD};

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = WORD;

const LIVE_BIT: usize = 1;
const KIND_SHIFT: u32 = 1;
const KIND_MASK: usize = 0x7f;
const SIZE_SHIFT: u32 = 8;

/// Largest object size representable in a header.
pub const MAX_OBJECT_SIZE: usize = usize::MAX >> SIZE_SHIFT;

/// Layout class of an object's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectKind {
    /// The payload is an array of [`Value`]s, all of which are traced.
    Slots = 1,
    /// The payload is opaque bytes and never traced.
    Bytes = 2,
}

impl ObjectKind {
    const fn from_bits(bits: usize) -> Option<Self> {
        match bits {
            1 => Some(Self::Slots),
            2 => Some(Self::Bytes),
            _ => None,
        }
    }
}

/// A decoded header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// A live object of the given kind and total size.
    Live {
        /// Payload layout.
        kind: ObjectKind,
        /// Total size in bytes, header included.
        size: usize,
    },
    /// The object has moved to the given address during the current pass.
    Forwarded(usize),
}

impl Header {
    /// Encodes a live header.
    #[must_use]
    pub const fn encode(kind: ObjectKind, size: usize) -> usize {
        (size << SIZE_SHIFT) | ((kind as usize) << KIND_SHIFT) | LIVE_BIT
    }

    /// Decodes a header word. Returns `None` for words that are neither a
    /// valid live header nor a forwarding marker.
    #[must_use]
    pub const fn decode(word: usize) -> Option<Self> {
        if word & LIVE_BIT == 0 {
            if word == 0 {
                return None;
            }
            return Some(Self::Forwarded(word));
        }
        match ObjectKind::from_bits((word >> KIND_SHIFT) & KIND_MASK) {
            Some(kind) => Some(Self::Live {
                kind,
                size: word >> SIZE_SHIFT,
            }),
            None => None,
        }
    }
}

/// Total object size for a request of `size` bytes (header included).
#[must_use]
pub const fn object_size(size: usize) -> usize {
    if size < HEADER_SIZE {
        HEADER_SIZE
    } else {
        align_up(size)
    }
}

/// Reads the raw header word of the object at `addr`.
///
/// # Safety
///
/// `addr` must be the start of an object in a mapped region.
#[inline]
pub unsafe fn header_word(addr: usize) -> usize {
    unsafe { *(addr as *const usize) }
}

/// Decodes the header of the object at `addr`.
///
/// # Safety
///
/// `addr` must be the start of an object in a mapped region.
#[inline]
pub unsafe fn header(addr: usize) -> Option<Header> {
    Header::decode(unsafe { header_word(addr) })
}

/// Writes a live header at `addr`.
///
/// # Safety
///
/// `addr` must be valid for a word-sized write.
#[inline]
pub unsafe fn write_header(addr: usize, kind: ObjectKind, size: usize) {
    unsafe { *(addr as *mut usize) = Header::encode(kind, size) };
}

/// Overwrites the header at `addr` with a forwarding marker to `new_addr`.
///
/// # Safety
///
/// `addr` must be the start of an object whose bytes have been copied to
/// `new_addr`.
#[inline]
pub unsafe fn install_forwarding(addr: usize, new_addr: usize) {
    debug_assert!(new_addr & LIVE_BIT == 0);
    unsafe { *(addr as *mut usize) = new_addr };
}

/// Returns `(kind, size)` for the object at `addr`, following a forwarding
/// marker to the copy if the object has already moved.
///
/// # Safety
///
/// `addr` must be the start of an object; if forwarded, its copy must be
/// live.
pub unsafe fn resolve_layout(addr: usize) -> Option<(ObjectKind, usize)> {
    match unsafe { header(addr) }? {
        Header::Live { kind, size } => Some((kind, size)),
        Header::Forwarded(to) => match unsafe { header(to) }? {
            Header::Live { kind, size } => Some((kind, size)),
            Header::Forwarded(_) => None,
        },
    }
}

/// Returns a pointer to the first payload slot of a `Slots` object.
#[inline]
#[must_use]
pub const fn slots_ptr(addr: usize) -> *mut Value {
    (addr + HEADER_SIZE) as *mut Value
}

/// Number of value slots held by an object of total size `size`.
#[inline]
#[must_use]
pub const fn slot_count(size: usize) -> usize {
    (size - HEADER_SIZE) / WORD
}

/// Iterator over object start addresses in `[start, end)`.
///
/// Regions are parseable at every point a collection can observe them: the
/// allocator only ever bumps a cursor past a fully written header.
pub struct ObjectWalker {
    cursor: usize,
    end: usize,
}

impl ObjectWalker {
    /// Creates a walker over `[start, end)`.
    ///
    /// # Safety
    ///
    /// The range must contain a contiguous sequence of objects.
    #[must_use]
    pub const unsafe fn new(start: usize, end: usize) -> Self {
        Self { cursor: start, end }
    }
}

impl Iterator for ObjectWalker {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor >= self.end {
            return None;
        }
        let addr = self.cursor;
        // SAFETY: guaranteed by `ObjectWalker::new`.
        let size = match unsafe { resolve_layout(addr) } {
            Some((_, size)) if size >= HEADER_SIZE => size,
            _ => {
                debug_assert!(false, "unparseable object at {addr:#x}");
                self.cursor = self.end;
                return None;
            }
        };
        self.cursor += size;
        Some(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode() {
        let w = Header::encode(ObjectKind::Slots, 48);
        assert_eq!(
            Header::decode(w),
            Some(Header::Live {
                kind: ObjectKind::Slots,
                size: 48
            })
        );
        let w = Header::encode(ObjectKind::Bytes, 8);
        assert_eq!(
            Header::decode(w),
            Some(Header::Live {
                kind: ObjectKind::Bytes,
                size: 8
            })
        );
    }

    #[test]
    fn test_forwarding_marker_decodes() {
        assert_eq!(Header::decode(0x7f00_1000), Some(Header::Forwarded(0x7f00_1000)));
        assert_eq!(Header::decode(0), None);
        // live bit set but unknown kind
        assert_eq!(Header::decode(0x100 | (0x40 << 1) | 1), None);
    }

    #[test]
    fn test_object_size_clamps_and_aligns() {
        assert_eq!(object_size(0), HEADER_SIZE);
        assert_eq!(object_size(1), HEADER_SIZE);
        assert_eq!(object_size(100), 104);
        assert_eq!(slot_count(HEADER_SIZE + 3 * WORD), 3);
    }

    #[test]
    fn test_walker_follows_forwarding() {
        let mut from = [0usize; 6];
        let mut to = [0usize; 4];
        let base = from.as_mut_ptr() as usize;
        let dest = to.as_mut_ptr() as usize;
        unsafe {
            write_header(base, ObjectKind::Slots, 2 * WORD);
            write_header(base + 2 * WORD, ObjectKind::Bytes, 4 * WORD);
            // move the second object
            write_header(dest, ObjectKind::Bytes, 4 * WORD);
            install_forwarding(base + 2 * WORD, dest);

            let starts: Vec<usize> = ObjectWalker::new(base, base + 6 * WORD).collect();
            assert_eq!(starts, vec![base, base + 2 * WORD]);
        }
    }
}
