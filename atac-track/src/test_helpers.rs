// Copyright (c) 2020 Graphcore Ltd. All rights reserved.

//! This module provides helper functions for testing logging output
//!
//! The aim of this module is to provide commonly-used functions that enable the
//! testing of the output that should appear from logging macros.
//!
//! *Note:* tests checking output should be run in a
//! [serial](https://docs.rs/serial_test) manner when they share a tracker.

use core::sync::atomic::Ordering;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;

use regex::Regex;

use crate::tracker::stdout_tracker;
use crate::{Id, Track, Tracker};

/// A tracker that keeps track events.
pub struct TestTracker {
    events: Mutex<Vec<String>>,

    unique_id: AtomicU64,
}

impl TestTracker {
    /// Create a new [`Tracker`](crate::Tracker) for the tests.
    ///
    /// This keeps the track events in memory for checking later.
    #[must_use]
    pub fn new(initial_id: u64) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            unique_id: AtomicU64::new(initial_id),
        }
    }

    fn add_event(&self, event: String) {
        println!("{event}");
        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Return a copy of all events seen since the last clear.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Track for TestTracker {
    fn unique_id(&self) -> Id {
        let id = self.unique_id.fetch_add(1, Ordering::SeqCst);
        Id(id)
    }

    fn is_entity_enabled(&self, _id: Id, _level: log::Level) -> bool {
        true
    }

    fn add_entity(&self, _id: Id, _entity_name: &str) {
        // Do nothing
    }

    fn value(&self, id: Id, value: f64) {
        self.add_event(format!("{id}: value {value}"));
    }

    fn create(&self, created_by: Id, id: Id, name: &str) {
        self.add_event(format!("{created_by}: created {id}, {name}"));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.add_event(format!("{destroyed_by}: destroyed {id}"));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.add_event(format!("{id}:{level}: {msg}"));
    }

    fn shutdown(&self) {
        // Do nothing
    }
}

/// Create a tracker for a test.
///
/// The tracker writes to stdout at the level given by the `ATAC_TEST_LEVEL`
/// environment variable (default `Warn`). The test file path is only used to
/// report which test the output came from.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    let level = std::env::var("ATAC_TEST_LEVEL")
        .ok()
        .and_then(|lvl| crate::str_to_level(&lvl))
        .unwrap_or(log::Level::Warn);
    if level >= log::Level::Debug {
        let name = Path::new(full_filepath)
            .file_stem()
            .map_or_else(|| full_filepath.to_string(), |s| s.to_string_lossy().into_owned());
        println!("Tracking test '{name}' at level {level}");
    }
    stdout_tracker(level)
}

/// Initialise an in-memory tracker for tests
///
/// # Arguments
///
/// * `start_id` - The ID value to be set as the starting value
///
/// # Examples
///
/// ```
/// use atac_track::test_helpers;
///
/// let (test_tracker, tracker) = atac_track::test_init!(10);
/// let top = atac_track::entity::toplevel(&tracker, "top");
/// test_helpers::check_and_clear(&test_tracker, &["0: created 10, top"]);
/// ```
#[macro_export]
macro_rules! test_init {
    ($start_id:expr) => {{
        let test_tracker = std::sync::Arc::new($crate::test_helpers::TestTracker::new($start_id));
        let tracker: $crate::Tracker = test_tracker.clone();
        (test_tracker, tracker)
    }};
}

/// Check and clear the _trace_ and _log_ output
///
/// This function asserts that the logging output lines seen since the start or
/// the last time this function was called are expected.
///
/// # Arguments
///
/// * `tracker`  - A reference to the [`TestTracker`] being used in the test.
/// * `expected` - An array of expected regular expressions that the logging
///   output will be matched against.
pub fn check_and_clear(tracker: &TestTracker, expected: &[&str]) {
    let mut log_contents_ref = tracker.events.lock().unwrap();

    println!("Checking {:?} matches {:?}", expected, *log_contents_ref);

    // Check that there are the same number of strings produced as expected
    let num_strings = expected.len();
    assert_eq!(num_strings, log_contents_ref.len());

    for (i, log_expect) in expected.iter().enumerate() {
        let re = Regex::new(log_expect).unwrap();
        let actual = &(*log_contents_ref[i]);
        println!("Checking {i}: {log_expect:?} matches {actual:?}");
        assert!(re.is_match(actual));
    }

    log_contents_ref.clear();
}
