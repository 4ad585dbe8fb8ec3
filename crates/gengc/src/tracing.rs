//! GC tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for garbage collection operations.

#[cfg(feature = "tracing")]
pub mod internal {
    use tracing::{span, Level};

    use crate::metrics::{CollectionType, GcMetrics};

    /// Collection phases, in the order they run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        /// Scan root sources and evacuate their targets.
        Roots,
        /// Scan the to-space until the copy is transitive.
        Copy,
        /// Reset or unmap the evacuated spaces.
        Release,
    }

    /// Create a span for a whole collection pass.
    pub fn trace_gc_collection(collection_type: CollectionType, pass: u64) -> span::EnteredSpan {
        span!(
            Level::DEBUG,
            "gc_collect",
            collection_type = collection_type.as_str(),
            pass
        )
        .entered()
    }

    /// Create a span for a collection phase.
    pub fn trace_phase(phase: GcPhase) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc_phase", phase = ?phase).entered()
    }

    /// Log the start of a phase.
    pub fn log_phase_start(phase: GcPhase, bytes_before: usize) {
        tracing::debug!(phase = ?phase, bytes_before, "phase_start");
    }

    /// Log the end of a phase.
    pub fn log_phase_end(phase: GcPhase, objects_copied: usize) {
        tracing::debug!(phase = ?phase, objects_copied, "phase_end");
    }

    /// Log the outcome of a pass.
    pub fn log_collection_end(metrics: &GcMetrics) {
        tracing::debug!(
            collection_type = metrics.collection_type.as_str(),
            pass = metrics.pass,
            bytes_copied = metrics.bytes_copied,
            bytes_reclaimed = metrics.bytes_reclaimed,
            conservative_roots = metrics.conservative_roots,
            remembered_roots = metrics.remembered_roots,
            duration_us = u64::try_from(metrics.duration.as_micros()).unwrap_or(u64::MAX),
            "collection_end"
        );
    }
}

#[cfg(feature = "tracing")]
pub use internal::*;
