// ── Reactive collection streams ──
//
// Subscription types for consuming collection changes from the Store.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::CollectionState;

pub use filter::EntityFilter;

/// A subscription to one model's collection.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed`](Self::changed) or by converting into a `Stream`.
pub struct CollectionStream {
    current: Arc<CollectionState>,
    receiver: watch::Receiver<Arc<CollectionState>>,
}

impl CollectionStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<CollectionState>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or by the last `changed()`.
    pub fn current(&self) -> &Arc<CollectionState> {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<CollectionState> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Arc<CollectionState>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Wait until `predicate` holds for the latest snapshot.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<Arc<CollectionState>>
    where
        F: FnMut(&CollectionState) -> bool,
    {
        let snap = self
            .receiver
            .wait_for(|state| predicate(state))
            .await
            .ok()?
            .clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The first item is the snapshot current at conversion time.
    pub fn into_stream(self) -> CollectionWatchStream {
        CollectionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct CollectionWatchStream {
    inner: WatchStream<Arc<CollectionState>>,
}

impl Stream for CollectionWatchStream {
    type Item = Arc<CollectionState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
