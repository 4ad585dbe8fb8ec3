//! Page provider: reserves and releases page-aligned heap regions.

use sys_alloc::{Mmap, MmapOptions};

use crate::error::{GcError, Result};

/// Reserves a region of at least `size` bytes, rounded up to the page size.
///
/// # Errors
///
/// Returns [`GcError::OutOfMemory`] if the OS refuses the mapping.
pub fn reserve(size: usize, executable: bool) -> Result<Mmap> {
    // SAFETY: the returned handle owns the mapping; every address the heap
    // derives from it is dropped from the heap before the handle is.
    let region = unsafe { MmapOptions::new().len(size).executable(executable).map_anon() };
    region.map_err(|source| GcError::OutOfMemory {
        requested: size,
        source: Some(source),
    })
}

/// Releases a region previously returned by [`reserve`]. `None` is a no-op.
pub fn release(region: Option<Mmap>) {
    #[cfg(feature = "tracing")]
    if let Some(r) = &region {
        tracing::debug!(addr = r.ptr() as usize, len = r.len(), "region_release");
    }
    drop(region);
}
