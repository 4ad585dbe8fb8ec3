//! A generational, copying garbage collector for a small language runtime.
//!
//! `gengc` supplies heap storage for runtime values. New objects are bump
//! allocated in a **young generation**; a **minor collection** evacuates
//! the live ones into the **old generation**, and a **full collection**
//! compacts both generations into fresh regions. Roots are found by
//! scanning the native call stack **conservatively**: every word that
//! equals the start of a heap object is treated as a reference and is
//! rewritten when the object moves.
//!
//! # Features
//!
//! - **Two generations**: cheap nursery collections, periodic full ones
//! - **Remembered set**: a store pointer list kept in the young region's
//!   tail, fed by the write barrier in [`Heap::write_slot`]
//! - **Conservative roots**: native stack scanning behind the
//!   [`RootScanner`] trait, plus explicitly registered root regions
//! - **Immortal bootstrap page**: the manager record and the runtime root
//!   object live in the first page, which is never evacuated
//!
//! # Quick Start
//!
//! ```
//! use gengc::{GcConfig, Heap, Value};
//!
//! let config = GcConfig::default().scan_native_stack(false);
//! let mut heap = Heap::initialize(config, 0)?;
//!
//! let pair = heap.alloc_slots(2)?;
//! heap.write_slot(pair, 0, Value::from_int(1))?;
//! heap.write_slot(pair, 1, Value::NIL)?;
//!
//! // Keep `pair` alive through the runtime root object.
//! heap.set_root_slot(0, pair)?;
//! heap.collect_full()?;
//!
//! let pair = heap.root_slot(0);
//! assert_eq!(heap.read_slot(pair, 0), Value::from_int(1));
//! # Ok::<(), gengc::GcError>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Heap`] is `!Send` and `!Sync`. A collection stops the (single)
//! mutator thread for its whole duration.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod barrier;
mod config;
mod error;
mod gc;
mod generation;
mod heap;
mod manager;
mod metrics;
mod object;
mod pages;
mod roots;
mod scan;
mod stack;
mod value;

/// Tracing spans and events for collections.
///
/// Only populated with the `tracing` feature.
pub mod tracing;

pub use barrier::StorePointerList;
pub use config::{
    GcConfig, DEFAULT_FULL_GC_PERIOD, DEFAULT_OLD_SIZE_FACTOR, DEFAULT_ROOT_SLOTS,
    DEFAULT_STORE_CAPACITY, DEFAULT_YOUNG_SIZE,
};
pub use error::{GcError, Result};
pub use generation::{Generation, GenerationKind, REGION_HEADER_SIZE};
pub use heap::Heap;
pub use manager::Phase;
pub use metrics::{CollectionType, GcMetrics, HeapStats};
pub use object::{ObjectKind, HEADER_SIZE, MAX_OBJECT_SIZE};
pub use roots::{ConservativeStackScanner, NoStackScanner, RootRegion, RootScanner};
pub use stack::{get_stack_bounds, StackBounds, StackExtent, STACK_GROWS_DOWN};
pub use value::{Value, ALIGN, WORD};
