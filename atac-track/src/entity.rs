// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Named nodes of the model hierarchy.
//!
//! Every core, model and hub owns an [`Entity`]. Entities form a tree rooted
//! at the [`toplevel`] entity and are named by their path through the tree,
//! for example `top::core3::atac::hub`. The name is what tracker filters are
//! matched against, so that logging can be enabled for a single core or hub.

use std::fmt;
use std::sync::Arc;

use crate::{Id, Tracker, create, destroy};

const SEPARATOR: &str = "::";

/// A node of the model hierarchy.
///
/// Only the top-level entity has no parent. Creation and destruction of an
/// entity are reported to its [`Tracker`].
pub struct Entity {
    /// Name of this entity within its parent.
    pub name: String,

    /// Parent entity, `None` for the top-level.
    pub parent: Option<Arc<Entity>>,

    /// Unique identifier used in all events of this entity.
    pub id: Id,

    /// [`Tracker`] receiving the events of this entity.
    pub tracker: Tracker,

    full_name: String,
}

impl Entity {
    fn register(parent: Option<&Arc<Entity>>, tracker: &Tracker, name: &str) -> Self {
        let full_name = match parent {
            Some(parent) => format!("{}{SEPARATOR}{name}", parent.full_name),
            None => name.to_string(),
        };

        let id = tracker.unique_id();
        tracker.add_entity(id, &full_name);

        let entity = Self {
            name: name.to_string(),
            parent: parent.cloned(),
            id,
            tracker: tracker.clone(),
            full_name,
        };
        create!(entity);
        entity
    }

    /// Create a child of `parent`.
    #[must_use]
    pub fn new(parent: &Arc<Entity>, name: &str) -> Self {
        Self::register(Some(parent), &parent.tracker, name)
    }

    /// Create one of a numbered set of children, e.g. `core7`.
    #[must_use]
    pub fn new_indexed(parent: &Arc<Entity>, prefix: &str, index: usize) -> Self {
        Self::new(parent, &format!("{prefix}{index}"))
    }

    /// The path of this entity from the top-level.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("full_name", &self.full_name)
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Create the top-level entity.
pub fn toplevel(tracker: &Tracker, name: &str) -> Arc<Entity> {
    Arc::new(Entity::register(None, tracker, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::dev_null_tracker;

    #[test]
    fn hierarchical_names() {
        let tracker = dev_null_tracker();
        let top = toplevel(&tracker, "top");
        let core = Arc::new(Entity::new_indexed(&top, "core", 3));
        let model = Entity::new(&core, "atac");

        assert_eq!(model.full_name(), "top::core3::atac");
        assert_eq!(format!("{model}"), "top::core3::atac");
        assert_eq!(core.name, "core3");
        assert!(top.parent.is_none());
        assert_eq!(model.parent.as_ref().map(|p| p.id), Some(core.id));
    }

    #[test]
    fn unique_ids() {
        let (_test_tracker, tracker) = crate::test_init!(5);
        let top = toplevel(&tracker, "top");
        let a = Entity::new(&top, "a");
        let b = Entity::new(&top, "b");
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, top.id);
        assert_eq!(top.id, Id(5));
    }
}
