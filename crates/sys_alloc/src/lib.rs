use std::io;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

pub use os::page_size;

/// Rounds `len` up to a whole number of pages.
///
/// Returns `None` if the rounded length does not fit in a `usize`.
pub fn round_to_pages(len: usize) -> Option<usize> {
    let ps = page_size();
    len.checked_add(ps - 1).map(|n| n & !(ps - 1))
}

/// A handle to an anonymous memory mapping.
///
/// The region is released in full, at its page-rounded length, when this
/// handle is dropped.
pub struct Mmap {
    inner: os::MmapInner,
}

impl Mmap {
    /// Returns a pointer to the start of the memory mapping.
    pub fn ptr(&self) -> *mut u8 {
        self.inner.ptr()
    }

    /// Returns the length of the memory mapping in bytes.
    ///
    /// This is the page-rounded length, not the length that was requested.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the mapping is empty (never the case for a mapping
    /// created through [`MmapOptions::map_anon`]).
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Returns whether the mapping was created with execute permission.
    pub fn is_executable(&self) -> bool {
        self.inner.is_executable()
    }

    /// Returns the address one past the end of the mapping.
    pub fn end(&self) -> usize {
        self.ptr() as usize + self.len()
    }
}

impl std::fmt::Debug for Mmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mmap")
            .field("ptr", &self.ptr())
            .field("len", &self.len())
            .field("executable", &self.is_executable())
            .finish()
    }
}

unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

/// Configuration for creating a memory mapping.
#[derive(Debug, Clone)]
pub struct MmapOptions {
    len: usize,
    executable: bool,
}

impl MmapOptions {
    /// Creates a new `MmapOptions` with default settings (length 0).
    /// You must set a length before mapping.
    pub fn new() -> Self {
        Self {
            len: 0,
            executable: false,
        }
    }

    /// Sets the length of the mapping in bytes. It is rounded up to the
    /// page size when the mapping is created.
    pub fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Sets whether the mapping may hold executable code.
    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    /// Creates an anonymous, zero-filled memory map.
    ///
    /// # Safety
    ///
    /// The returned handle owns the memory; pointers derived from
    /// [`Mmap::ptr`] dangle once it is dropped.
    pub unsafe fn map_anon(&self) -> io::Result<Mmap> {
        if self.len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "length must be greater than 0",
            ));
        }
        let len = round_to_pages(self.len).ok_or_else(|| {
            io::Error::new(io::ErrorKind::OutOfMemory, "length overflows when rounded")
        })?;

        let inner = unsafe { os::MmapInner::map_anon(len, self.executable)? };

        Ok(Mmap { inner })
    }
}

impl Default for MmapOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_page_size() {
        let ps = page_size();
        assert!(ps > 0);
        assert_eq!(ps & (ps - 1), 0, "Page size should be power of 2");
    }

    #[test]
    fn test_round_to_pages() {
        let ps = page_size();
        assert_eq!(round_to_pages(1), Some(ps));
        assert_eq!(round_to_pages(ps), Some(ps));
        assert_eq!(round_to_pages(ps + 1), Some(2 * ps));
        assert_eq!(round_to_pages(usize::MAX), None);
    }

    #[test]
    fn test_basic_map() {
        let len = page_size();
        let mmap = unsafe {
            MmapOptions::new()
                .len(len)
                .map_anon()
                .expect("failed to map")
        };

        let ptr = mmap.ptr();
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % page_size(), 0);
        assert!(!mmap.is_executable());

        unsafe {
            assert_eq!(ptr::read_volatile(ptr), 0, "anonymous memory is zeroed");
            ptr::write_volatile(ptr, 42);
            assert_eq!(ptr::read_volatile(ptr), 42);
        }
    }

    #[test]
    fn test_map_rounds_length() {
        let mmap = unsafe {
            MmapOptions::new()
                .len(100)
                .map_anon()
                .expect("failed to map")
        };
        assert_eq!(mmap.len(), page_size());
        assert_eq!(mmap.end(), mmap.ptr() as usize + page_size());

        // The whole rounded length is usable.
        unsafe {
            let last = mmap.ptr().add(mmap.len() - 1);
            ptr::write_volatile(last, 7);
            assert_eq!(ptr::read_volatile(last), 7);
        }
    }

    #[test]
    fn test_map_executable() {
        let mmap = unsafe {
            MmapOptions::new()
                .len(page_size())
                .executable(true)
                .map_anon()
                .expect("failed to map executable memory")
        };
        assert!(mmap.is_executable());
    }

    #[test]
    fn test_zero_length_rejected() {
        let err = unsafe { MmapOptions::new().map_anon() }.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
