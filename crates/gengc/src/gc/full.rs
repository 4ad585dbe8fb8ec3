//! Full collection: evacuate both generations into fresh regions.
//!
//! Both replacement regions are reserved before anything is copied, so a
//! refused reservation leaves the heap exactly as it was. Young survivors
//! are promoted straight into the new old generation; the new young region
//! starts empty.
//!
//! Objects on the retired bootstrap page never move. They are traced in
//! place so that anything they reference survives. Remembered slots inside
//! the evacuated generations are not roots here: a dead old object must
//! not keep its young referents alive.

use crate::error::Result;
use crate::gc::evacuate::{Evacuator, ObjectStarts};
use crate::generation::{Generation, GenerationKind, REGION_HEADER_SIZE};
use crate::manager::Manager;
use crate::metrics::{CollectionType, GcMetrics, PhaseTimer};
use crate::object::HEADER_SIZE;
use crate::pages;
use crate::stack::StackExtent;

#[cfg(feature = "tracing")]
use crate::tracing::{log_phase_end, log_phase_start, trace_phase, GcPhase};

/// Size of the old region a full collection reserves: room for every
/// allocated byte, two young generations and the pending request, and
/// never smaller than the current old region.
pub(crate) fn old_region_size(manager: &Manager, sz: usize) -> usize {
    let current = manager.old_region.as_ref().map_or(0, sys_alloc::Mmap::len);
    let worst = manager.young.used() + manager.old.used();
    worst
        .saturating_add(manager.config.young_size.saturating_mul(2))
        .saturating_add(sz)
        .max(current)
}

/// Size of the young region a full collection reserves: the configured
/// young size, grown when the pending request would not fit.
pub(crate) fn young_region_size(manager: &Manager, sz: usize) -> usize {
    sz.saturating_add(REGION_HEADER_SIZE + HEADER_SIZE)
        .saturating_add(manager.config.store_bytes())
        .max(manager.config.young_size)
}

/// Runs a full collection sized for a pending request of `sz` bytes.
///
/// # Errors
///
/// Returns [`GcError::OutOfMemory`](crate::GcError::OutOfMemory) if either
/// replacement region cannot be reserved.
pub(crate) fn collect_full(manager: &mut Manager, extent: StackExtent, sz: usize) -> Result<GcMetrics> {
    let executable = manager.config.executable;
    let young_region = pages::reserve(young_region_size(manager, sz), executable)?;
    let old_region = pages::reserve(old_region_size(manager, sz), executable)?;
    manager.stats.regions_reserved += 2;

    let mut metrics = GcMetrics::new();
    metrics.collection_type = CollectionType::Full;
    let mut timer = PhaseTimer::new();

    let from: Vec<Generation> = [manager.young, manager.old]
        .into_iter()
        .filter(Generation::is_present)
        .collect();
    let bytes_before: usize = from.iter().map(Generation::used).sum();

    timer.start();
    #[cfg(feature = "tracing")]
    let roots_span = trace_phase(GcPhase::Roots);
    #[cfg(feature = "tracing")]
    log_phase_start(GcPhase::Roots, bytes_before);
    let starts = ObjectStarts::index(&from);
    let to = Generation::over(&old_region, GenerationKind::Old, 0);
    let mut evacuator = Evacuator::new(from, to);
    // SAFETY: as for a minor collection; boot objects are parseable and
    // never forwarded.
    unsafe {
        super::evacuate_ambiguous_roots(manager, &mut evacuator, &starts, extent);
        super::evacuate_remembered_slots(manager, &mut evacuator, true);
        for object in manager.boot.objects() {
            evacuator.scan_object(object);
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
    let new_old = evacuator.finish();
    let previous_young = manager.install_young(young_region);
    let previous_old = manager.install_old(old_region, new_old);
    manager.release(previous_young);
    manager.release(previous_old);
    metrics.bytes_reclaimed = bytes_before - metrics.bytes_copied;
    #[cfg(feature = "tracing")]
    log_phase_end(GcPhase::Release, metrics.objects_copied);
    #[cfg(feature = "tracing")]
    drop(release_span);
    timer.end_release();

    timer.apply(&mut metrics);
    Ok(metrics)
}
