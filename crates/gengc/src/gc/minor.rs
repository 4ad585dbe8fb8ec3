//! Minor collection: evacuate the young generation into the old one.
//!
//! Roots are the ambiguous words (native stack and registered regions),
//! the slots on the store pointer list and the fields of the runtime root
//! object. Old objects are not traced: any old-to-young reference they hold
//! was recorded by the write barrier.

use crate::error::{GcError, Result};
use crate::gc::evacuate::{Evacuator, ObjectStarts};
use crate::manager::Manager;
use crate::metrics::{CollectionType, GcMetrics, PhaseTimer};
use crate::stack::StackExtent;

#[cfg(feature = "tracing")]
use crate::tracing::{log_phase_end, log_phase_start, trace_phase, GcPhase};

/// Runs a minor collection.
///
/// # Errors
///
/// Returns [`GcError::OutOfMemory`] before touching anything if the old
/// generation cannot absorb every allocated young byte.
pub(crate) fn collect_minor(manager: &mut Manager, extent: StackExtent) -> Result<GcMetrics> {
    let young = manager.young;
    if manager.old.free() < young.used() {
        return Err(GcError::exhausted(young.used()));
    }

    let mut metrics = GcMetrics::new();
    metrics.collection_type = CollectionType::Minor;
    let mut timer = PhaseTimer::new();

    timer.start();
    #[cfg(feature = "tracing")]
    let roots_span = trace_phase(GcPhase::Roots);
    #[cfg(feature = "tracing")]
    log_phase_start(GcPhase::Roots, young.used());
    let starts = ObjectStarts::index(&[young]);
    let mut evacuator = Evacuator::new(vec![young], manager.old);
    // SAFETY: the extent was computed by the collection entry frame and the
    // store list only holds slots registered through the barrier.
    unsafe {
        super::evacuate_ambiguous_roots(manager, &mut evacuator, &starts, extent);
        super::evacuate_remembered_slots(manager, &mut evacuator, false);
        if let Some(root) = manager.root.addr() {
            evacuator.scan_object(root);
        }
    }
    #[cfg(feature = "tracing")]
    log_phase_end(GcPhase::Roots, evacuator.objects_copied);
    #[cfg(feature = "tracing")]
    drop(roots_span);
    timer.end_roots();

    timer.start();
    #[cfg(feature = "tracing")]
    let copy_span = trace_phase(GcPhase::Copy);
    // SAFETY: every root has been processed.
    unsafe { evacuator.drain() };
    #[cfg(feature = "tracing")]
    log_phase_end(GcPhase::Copy, evacuator.objects_copied);
    #[cfg(feature = "tracing")]
    drop(copy_span);
    timer.end_copy();

    timer.start();
    #[cfg(feature = "tracing")]
    let release_span = trace_phase(GcPhase::Release);
    evacuator.record(&mut metrics);
    manager.old = evacuator.finish();
    manager.young.reset();
    manager.store.clear();
    metrics.bytes_reclaimed = young.used() - metrics.bytes_copied;
    #[cfg(feature = "tracing")]
    log_phase_end(GcPhase::Release, metrics.objects_copied);
    #[cfg(feature = "tracing")]
    drop(release_span);
    timer.end_release();

    timer.apply(&mut metrics);
    Ok(metrics)
}
