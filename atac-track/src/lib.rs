// Copyright (c) 2020 Graphcore Ltd. All rights reserved.

//! This module provides combined _track_ capabilities for the ATAC models.
//!
//! _Track_ means the combination of _log_ and _trace_ where:
//!
//!   - _log_ are text-based human-readable messages emitted at various levels
//!     of verbosity (from `Trace` through to `Error`).
//!   - _trace_ provides a standard set of modelling events that can be emitted.
//!     For example, entity creation/destruction or a value such as the
//!     contention delay seen at a hub.
//!
//! Every model owns an [`Entity`](crate::entity::Entity) which determines
//! whether events are emitted, so that logging can be filtered to individual
//! cores or hubs with a regular expression.
//!
//! All [`Tracker`]s are `Send + Sync` because the simulated cores run on
//! separate threads and share one tracker.

// Enable warnings for missing documentation
#![warn(missing_docs)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub use log;

pub mod builder;
pub mod entity;
pub mod id;

/// Include the trackers.
pub mod tracker;
pub use tracker::{Track, Tracker};

/// A type alias for objects that receive _log_ / _trace_ events.
///
/// The writer must implement Send in order to be shared between threads.
pub type Writer = Box<dyn std::io::Write + Send>;
type SharedWriter = Arc<Mutex<Writer>>;

/// Take the command-line string and convert it to a Level
#[must_use]
pub fn str_to_level(lvl: &str) -> Option<log::Level> {
    log::Level::from_str(lvl).ok()
}

/// Type used for unique entity IDs
///
/// Each entity within the application is given a unique ID to identify it.
/// There are two reserved values: [NO_ID](constant.NO_ID.html) and
/// [ROOT](constant.ROOT.html)
pub use id::Id;

pub mod test_helpers;

/// ID value which indicates where there is no valid ID
pub const NO_ID: Id = id::Id(0);

/// The root ID from which all other IDs are derived
pub const ROOT: Id = id::Id(1);

/// Add an entity creation event
#[macro_export]
macro_rules! create {
    ($entity:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            let parent_id = match &$entity.parent {
                Some(parent) => parent.id,
                None => $crate::NO_ID,
            };
            $entity
                .tracker
                .create(parent_id, $entity.id, $entity.full_name());
        }
    }};
}

/// Add an entity destroy event
#[macro_export]
macro_rules! destroy {
    ($entity:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            match &$entity.parent {
                Some(parent) => $entity.tracker.destroy(parent.id, $entity.id),
                None => $entity.tracker.destroy($crate::NO_ID, $entity.id),
            };
        }
    }};
}

/// Track a value being set by an entity.
#[macro_export]
macro_rules! value {
    ($entity:expr ; $value:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.value($entity.id, $value as f64);
        }
    }};
}

/// Base macro for log messages of all level.
///
/// The message is only formatted if the entity has the given level enabled.
#[macro_export]
macro_rules! log_base {
    ($entity:expr ; $lvl:expr, $($arg:tt)+) => (
        if $entity.tracker.is_entity_enabled($entity.id, $lvl) {
            $entity.tracker.log($entity.id, $lvl, format_args!($($arg)+));
        }
    );
}

/// The `trace` macro emits a message at level `log::Level::Trace`
#[macro_export]
macro_rules! trace {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Trace, $($arg)+);
    );
}

/// The `debug` macro emits a message at level `log::Level::Debug`
#[macro_export]
macro_rules! debug {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Debug, $($arg)+);
    );
}

/// The `info` macro emits a message at level `log::Level::Info`
#[macro_export]
macro_rules! info {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Info, $($arg)+);
    );
}

/// The `warn` macro emits a message at level `log::Level::Warn`
#[macro_export]
macro_rules! warn {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Warn, $($arg)+);
    );
}

/// The `error` macro emits a message at level `log::Level::Error`
#[macro_export]
macro_rules! error {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Error, $($arg)+);
    );
}
