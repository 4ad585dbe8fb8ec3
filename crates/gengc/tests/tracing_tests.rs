//! Integration tests for the GC tracing feature.
//!
//! These tests capture the formatted output of a `tracing-subscriber` and
//! check that collections emit their spans and events.

#![cfg(feature = "tracing")]

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use common::{make_slots, Roots};
use gengc::{Heap, Value};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn with_capture(f: impl FnOnce()) -> String {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    capture.text()
}

#[test]
fn test_bootstrap_and_retirement_are_logged() {
    let out = with_capture(|| {
        let mut heap = Heap::initialize(common::config(), 0).unwrap();
        heap.collect_garbage().unwrap();
    });
    assert!(out.contains("heap_bootstrap"), "{out}");
    assert!(out.contains("boot_page_retired"), "{out}");
}

#[test]
fn test_collection_spans_and_phases() {
    let out = with_capture(|| {
        let mut heap = common::steady_heap(common::config());
        let mut roots = Roots::register(&mut heap, 1);
        let obj = make_slots(&mut heap, &[Value::from_int(1)]);
        roots.set(0, obj);
        heap.collect_garbage().unwrap();
        heap.collect_full().unwrap();
    });
    assert!(out.contains("old_generation_reserved"), "{out}");
    assert!(out.contains("gc_collect"), "{out}");
    assert!(out.contains("minor"), "{out}");
    assert!(out.contains("full"), "{out}");
    assert!(out.contains("phase_end"), "{out}");
    assert!(out.contains("phase=Roots"), "{out}");
    assert!(out.contains("phase=Release"), "{out}");
    assert!(out.contains("collection_end"), "{out}");
    assert!(out.contains("region_release"), "{out}");
}

#[test]
fn test_collections_work_without_subscriber() {
    let mut heap = common::steady_heap(common::config());
    heap.collect_full().unwrap();
    assert_eq!(heap.stats().full_collections, 1);
}
