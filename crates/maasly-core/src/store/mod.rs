// ── Reactive collection store ──
//
// One `watch` channel per model holds an immutable snapshot of that
// model's `CollectionState`. Reductions run inside `send_if_modified`,
// so each collection sees one action at a time and subscribers are
// only woken by real changes.

mod merge;
mod reducer;
mod state;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;
use tokio::sync::watch;

use crate::action::Action;
use crate::model::Model;
use crate::stream::CollectionStream;

pub use merge::{dedupe, remove, replace_existing, upsert};
pub use reducer::reduce;
pub use state::CollectionState;

/// Store for every model's collection.
///
/// Created with all collections in their initial state; collections are
/// never added or removed afterwards.
pub struct Store {
    /// Indexed by `Model::index`.
    collections: Vec<watch::Sender<Arc<CollectionState>>>,
    last_notification: watch::Sender<Option<DateTime<Utc>>>,
}

impl Store {
    pub fn new() -> Self {
        let collections = Model::iter()
            .map(|model| watch::Sender::new(Arc::new(CollectionState::new(model.descriptor()))))
            .collect();
        let (last_notification, _) = watch::channel(None);

        Self {
            collections,
            last_notification,
        }
    }

    fn collection(&self, model: Model) -> &watch::Sender<Arc<CollectionState>> {
        &self.collections[model.index()]
    }

    /// Run `action` through its model's reducer. Returns whether the
    /// collection changed.
    pub fn apply(&self, action: &Action) -> bool {
        let model = action.model();
        if matches!(action, Action::Notify { .. }) {
            self.last_notification.send_replace(Some(Utc::now()));
        }

        self.collection(model).send_if_modified(|current| {
            let next = reduce(current, model.descriptor(), action);
            if next == **current {
                return false;
            }
            *current = Arc::new(next);
            true
        })
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Current state of `model`'s collection.
    pub fn state(&self, model: Model) -> Arc<CollectionState> {
        self.collection(model).borrow().clone()
    }

    /// Subscribe to `model`'s collection.
    pub fn subscribe(&self, model: Model) -> CollectionStream {
        CollectionStream::new(self.collection(model).subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    /// When the last server notification was applied.
    pub fn last_notification(&self) -> Option<DateTime<Utc>> {
        *self.last_notification.borrow()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
