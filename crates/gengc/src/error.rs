//! Errors raised by the memory manager.
//!
//! None of these are recoverable locally: the collector has no fallback
//! allocation strategy. Every variant is detected before any generation's
//! bytes are touched, so the heap is still consistent when one is returned.

use std::io;

use thiserror::Error;

/// Represents the failures the memory manager can report.
#[derive(Debug, Error)]
pub enum GcError {
    /// The page provider could not satisfy a reservation, or a full
    /// collection still left too little room for the request.
    #[error("out of memory while requesting {requested} bytes")]
    OutOfMemory {
        /// Bytes that were being reserved or allocated.
        requested: usize,
        /// The OS error, when the page provider failed.
        #[source]
        source: Option<io::Error>,
    },
    /// A single allocation request is at or above the maximum object size.
    #[error("allocation of {requested} bytes exceeds the {max} byte limit")]
    AllocationTooLarge {
        /// Requested size in bytes.
        requested: usize,
        /// Configured maximum single-allocation size.
        max: usize,
    },
    /// The remembered set ran out of room before the next collection
    /// drained it. This indicates a sizing defect.
    #[error("store pointer list overflow (capacity {capacity} entries)")]
    StorePointerOverflow {
        /// Number of entries the list can hold.
        capacity: usize,
    },
    /// A collection was triggered while another one was running.
    #[error("collection triggered while a collection is already in progress")]
    CollectionInProgress,
    /// The configuration cannot produce a working heap.
    #[error("invalid collector configuration: {0}")]
    InvalidConfig(&'static str),
}

impl GcError {
    pub(crate) const fn exhausted(requested: usize) -> Self {
        Self::OutOfMemory {
            requested,
            source: None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GcError>;
