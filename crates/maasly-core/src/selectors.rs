// ── Selectors ──
//
// Read accessors over a collection snapshot. Snapshots are immutable
// `Arc`s, so a consumer can memoize on `Arc::ptr_eq` of the state.

use serde_json::Value;

use crate::model::{Model, ModelDescriptor, PrimaryKey};
use crate::store::CollectionState;
use crate::stream::EntityFilter;

/// Standard read accessors for one model.
#[derive(Debug, Clone)]
pub struct Selectors {
    descriptor: &'static ModelDescriptor,
}

#[allow(clippy::unused_self)]
impl Selectors {
    pub fn new(model: Model) -> Self {
        Self {
            descriptor: model.descriptor(),
        }
    }

    pub fn all<'a>(&self, state: &'a CollectionState) -> &'a [Value] {
        &state.items
    }

    /// Linear scan by primary key.
    pub fn get_by_id<'a>(&self, state: &'a CollectionState, key: &PrimaryKey) -> Option<&'a Value> {
        state
            .items
            .iter()
            .find(|item| self.descriptor.key_of(item).as_ref() == Some(key))
    }

    pub fn loading(&self, state: &CollectionState) -> bool {
        state.loading
    }

    pub fn loaded(&self, state: &CollectionState) -> bool {
        state.loaded
    }

    pub fn saving(&self, state: &CollectionState) -> bool {
        state.saving
    }

    pub fn saved(&self, state: &CollectionState) -> bool {
        state.saved
    }

    pub fn errors<'a>(&self, state: &'a CollectionState) -> Option<&'a Value> {
        state.errors.as_ref()
    }

    /// The entity selected by `setActive`, if it is still in the collection.
    pub fn active<'a>(&self, state: &'a CollectionState) -> Option<&'a Value> {
        state
            .active
            .as_ref()
            .and_then(|key| self.get_by_id(state, key))
    }

    /// In-flight method for one entity.
    pub fn status<'a>(&self, state: &'a CollectionState, key: &PrimaryKey) -> Option<&'a str> {
        state
            .statuses
            .as_ref()
            .and_then(|statuses| statuses.get(key))
            .map(String::as_str)
    }

    pub fn filter<'a>(&self, state: &'a CollectionState, filter: &EntityFilter) -> Vec<&'a Value> {
        state.items.iter().filter(|item| filter.matches(item)).collect()
    }
}
