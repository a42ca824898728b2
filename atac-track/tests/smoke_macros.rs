// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::sync::Arc;

use atac_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use atac_track::entity::{Entity, toplevel};
use atac_track::test_helpers::check_and_clear;
use atac_track::{Track, debug, error, info, test_init, trace, value, warn};
use serial_test::serial;

#[test]
#[serial]
fn entity_lifecycle() {
    let (test_tracker, tracker) = test_init!(10);
    let top = toplevel(&tracker, "top");
    check_and_clear(&test_tracker, &["0: created 10, top"]);

    {
        let hub = Entity::new(&top, "hub");
        check_and_clear(&test_tracker, &["10: created 11, top::hub"]);
        value!(hub ; 42);
        check_and_clear(&test_tracker, &["11: value 42"]);
    }
    check_and_clear(&test_tracker, &["10: destroyed 11"]);
}

#[test]
#[serial]
fn all_levels() {
    let (test_tracker, tracker) = test_init!(1);
    let top = toplevel(&tracker, "top");
    check_and_clear(&test_tracker, &["created"]);

    trace!(top ; "trace {}", 1);
    debug!(top ; "debug {}", 2);
    info!(top ; "info {}", 3);
    warn!(top ; "warn {}", 4);
    error!(top ; "error {}", 5);

    check_and_clear(
        &test_tracker,
        &[
            "1:TRACE: trace 1",
            "1:DEBUG: debug 2",
            "1:INFO: info 3",
            "1:WARN: warn 4",
            "1:ERROR: error 5",
        ],
    );
}

#[test]
fn file_tracker_filters_entities() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atac.log");
    let path_str = path.to_str().unwrap();

    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: false,
            ..Default::default()
        },
        log_file: TrackerConfig {
            enable: true,
            level: atac_track::log::Level::Debug,
            filter_regex: ".*core1.*",
            file: Some(path_str),
        },
    };
    let tracker = setup_trackers(&config).unwrap();
    let top = toplevel(&tracker, "top");
    let core0 = Arc::new(Entity::new(&top, "core0"));
    let core1 = Arc::new(Entity::new(&top, "core1"));

    debug!(core0 ; "hidden");
    debug!(core1 ; "shown");
    tracker.shutdown();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("shown"));
    assert!(!contents.contains("hidden"));
}

#[test]
fn bad_filter_is_an_error() {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            filter_regex: "(",
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(setup_trackers(&config).is_err());
}
