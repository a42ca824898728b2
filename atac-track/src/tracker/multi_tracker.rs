// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use crate::Id;
use crate::tracker::{EntityManager, Track, Tracker};

/// Container for multiple [`Tracker`]s
pub struct MultiTracker {
    entity_manager: EntityManager,
    trackers: Vec<Tracker>,
}

impl MultiTracker {
    /// Add a new tracker
    pub fn add_tracker(&mut self, tracker: Tracker) {
        self.trackers.push(tracker);
    }
}

impl Default for MultiTracker {
    fn default() -> Self {
        Self {
            // Create a local entity_manager that will just be used for handling IDs
            entity_manager: EntityManager::new(log::Level::Error),
            trackers: Vec::new(),
        }
    }
}

impl Track for MultiTracker {
    fn unique_id(&self) -> Id {
        self.entity_manager.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.trackers
            .iter()
            .any(|tracker| tracker.is_entity_enabled(id, level))
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        for tracker in &self.trackers {
            tracker.add_entity(id, entity_name);
        }
    }

    fn value(&self, id: Id, value: f64) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(id, log::Level::Trace) {
                tracker.value(id, value);
            }
        }
    }

    fn create(&self, created_by: Id, id: Id, name: &str) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(id, log::Level::Trace) {
                tracker.create(created_by, id, name);
            }
        }
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(id, log::Level::Trace) {
                tracker.destroy(destroyed_by, id);
            }
        }
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(id, level) {
                tracker.log(id, level, msg);
            }
        }
    }

    fn shutdown(&self) {
        for tracker in &self.trackers {
            tracker.shutdown();
        }
    }
}
