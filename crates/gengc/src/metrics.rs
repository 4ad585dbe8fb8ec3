//! GC metrics and statistics.

use std::time::{Duration, Instant};

/// Statistics from the most recent collection pass.
#[derive(Debug, Clone, Copy)]
pub struct GcMetrics {
    /// Type of collection.
    pub collection_type: CollectionType,
    /// Value of the pass counter when the collection ran.
    pub pass: u64,
    /// Wall-clock duration of the whole pass.
    pub duration: Duration,
    /// Duration of root scanning and root evacuation.
    pub roots_duration: Duration,
    /// Duration of the transitive copy (scan of the to-space).
    pub copy_duration: Duration,
    /// Duration of resetting or releasing from-spaces.
    pub release_duration: Duration,
    /// Objects copied into the to-space.
    pub objects_copied: usize,
    /// Bytes copied into the to-space.
    pub bytes_copied: usize,
    /// Allocated bytes in the evacuated spaces that did not survive.
    pub bytes_reclaimed: usize,
    /// Conservative root words that referenced an evacuated object.
    pub conservative_roots: usize,
    /// Store pointer list entries consumed.
    pub remembered_roots: usize,
    /// Stack words that looked like young pointers before the pass.
    pub young_root_estimate: usize,
}

impl Default for GcMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GcMetrics {
    /// Create a new `GcMetrics` with all fields set to zero/defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            collection_type: CollectionType::None,
            pass: 0,
            duration: Duration::ZERO,
            roots_duration: Duration::ZERO,
            copy_duration: Duration::ZERO,
            release_duration: Duration::ZERO,
            objects_copied: 0,
            bytes_copied: 0,
            bytes_reclaimed: 0,
            conservative_roots: 0,
            remembered_roots: 0,
            young_root_estimate: 0,
        }
    }
}

/// Type of GC collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectionType {
    /// No collection has run yet.
    #[default]
    None = 0,
    /// The bootstrap page was retired and a fresh nursery reserved.
    BootRetire = 1,
    /// Young generation evacuated into the old generation.
    Minor = 2,
    /// Both generations compacted into fresh regions.
    Full = 3,
}

impl CollectionType {
    /// Short lowercase name, used in spans.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BootRetire => "boot_retire",
            Self::Minor => "minor",
            Self::Full => "full",
        }
    }
}

/// Internal helper for capturing phase durations.
///
/// Collections time three phases:
/// - Roots: scan root sources and evacuate their direct targets
/// - Copy: scan the to-space until no grey objects remain
/// - Release: reset or unmap the evacuated spaces
#[derive(Debug, Clone, Copy)]
pub struct PhaseTimer {
    /// Accumulated roots phase time.
    pub roots: Duration,
    /// Accumulated copy phase time.
    pub copy: Duration,
    /// Accumulated release phase time.
    pub release: Duration,
    current_start: Option<Instant>,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    /// Create a new `PhaseTimer` with all durations set to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            roots: Duration::ZERO,
            copy: Duration::ZERO,
            release: Duration::ZERO,
            current_start: None,
        }
    }

    /// Start timing a phase.
    pub fn start(&mut self) {
        self.current_start = Some(Instant::now());
    }

    /// End the roots phase and record its duration.
    pub fn end_roots(&mut self) {
        if let Some(start) = self.current_start.take() {
            self.roots = start.elapsed();
        }
    }

    /// End the copy phase and record its duration.
    pub fn end_copy(&mut self) {
        if let Some(start) = self.current_start.take() {
            self.copy = start.elapsed();
        }
    }

    /// End the release phase and record its duration.
    pub fn end_release(&mut self) {
        if let Some(start) = self.current_start.take() {
            self.release = start.elapsed();
        }
    }

    /// Copies the recorded durations into `metrics`.
    pub const fn apply(&self, metrics: &mut GcMetrics) {
        metrics.roots_duration = self.roots;
        metrics.copy_duration = self.copy;
        metrics.release_duration = self.release;
    }
}

/// Cumulative statistics for one heap since it was initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Minor collections run.
    pub minor_collections: usize,
    /// Full collections run.
    pub full_collections: usize,
    /// Times the bootstrap page was retired (at most once).
    pub boot_retirements: usize,
    /// Bytes moved from the young to the old generation by minor passes.
    pub bytes_promoted: usize,
    /// Bytes found dead across all passes.
    pub bytes_reclaimed: usize,
    /// Regions reserved from the page provider (bootstrap page included).
    pub regions_reserved: usize,
    /// Regions handed back to the page provider.
    pub regions_released: usize,
    /// Total time spent collecting.
    pub total_pause: Duration,
}

impl HeapStats {
    /// Total collection passes that moved objects.
    #[must_use]
    pub const fn total_collections(&self) -> usize {
        self.minor_collections + self.full_collections
    }

    /// Folds one pass into the running totals.
    pub(crate) fn record(&mut self, metrics: &GcMetrics) {
        match metrics.collection_type {
            CollectionType::Minor => {
                self.minor_collections += 1;
                self.bytes_promoted += metrics.bytes_copied;
            }
            CollectionType::Full => self.full_collections += 1,
            CollectionType::BootRetire => self.boot_retirements += 1,
            CollectionType::None => {}
        }
        self.bytes_reclaimed += metrics.bytes_reclaimed;
        self.total_pause += metrics.duration;
    }
}
