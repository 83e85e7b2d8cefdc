use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::model::{ModelDescriptor, PrimaryKey};

/// Client-side state of one model's collection.
///
/// `items` never holds two entities with the same primary key, and
/// `loaded` only becomes true after a successful fetch of the whole
/// collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CollectionState {
    pub items: Vec<Value>,
    pub loading: bool,
    pub loaded: bool,
    pub saving: bool,
    pub saved: bool,
    /// Last application error reported by the server.
    pub errors: Option<Value>,
    /// Entity selected by the last successful `setActive`.
    pub active: Option<PrimaryKey>,
    /// In-flight method per entity, for models that track statuses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<BTreeMap<PrimaryKey, String>>,
}

impl CollectionState {
    /// Initial state: flags false, no items.
    pub fn new(descriptor: &ModelDescriptor) -> Self {
        Self {
            statuses: descriptor.tracks_statuses.then(BTreeMap::new),
            ..Self::default()
        }
    }
}
