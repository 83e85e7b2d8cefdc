// ── Request registry ──
//
// Correlates outgoing requests with their responses. Every request sent
// over the WebSocket gets a fresh id; the response frame carrying that
// id resolves (and removes) exactly one pending entry.

use std::collections::HashMap;

/// Identifier carried in `request_id` on the wire.
pub type RequestId = u64;

/// Maps in-flight request ids to the action that produced them.
///
/// Ids start at 0 and increase strictly for the lifetime of the
/// registry. Nothing here times out: an entry whose response never
/// arrives stays until [`drain`](Self::drain) is called.
#[derive(Debug)]
pub struct RequestRegistry<A> {
    next: RequestId,
    pending: HashMap<RequestId, A>,
}

impl<A> RequestRegistry<A> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: HashMap::new(),
        }
    }

    /// Allocate the next id without registering anything under it.
    pub fn next_id(&mut self) -> RequestId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Register an in-flight action and return the id it was stored under.
    pub fn add(&mut self, action: A) -> RequestId {
        let id = self.next_id();
        self.pending.insert(id, action);
        id
    }

    /// Look up and remove the action for `id` in one step.
    ///
    /// Returns `None` for unknown or already-resolved ids.
    pub fn resolve(&mut self, id: RequestId) -> Option<A> {
        self.pending.remove(&id)
    }

    /// Whether `id` is still awaiting a response.
    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of requests awaiting a response.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending ids in ascending order.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Remove every pending entry, returning them in id order.
    ///
    /// Id allocation is not reset.
    pub fn drain(&mut self) -> Vec<(RequestId, A)> {
        let mut drained: Vec<(RequestId, A)> = self.pending.drain().collect();
        drained.sort_unstable_by_key(|(id, _)| *id);
        drained
    }
}

impl<A> Default for RequestRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_zero_and_increase() {
        let mut reg = RequestRegistry::new();
        let ids: Vec<RequestId> = (0..5).map(|n| reg.add(n)).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn next_id_consumes_an_id() {
        let mut reg: RequestRegistry<&str> = RequestRegistry::new();
        assert_eq!(reg.next_id(), 0);
        assert_eq!(reg.add("fetch"), 1);
        assert!(!reg.contains(0));
    }

    #[test]
    fn resolve_returns_action_exactly_once() {
        let mut reg = RequestRegistry::new();
        let id = reg.add("zone/fetch");

        assert_eq!(reg.resolve(id), Some("zone/fetch"));
        assert_eq!(reg.resolve(id), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn resolve_unknown_id_is_none() {
        let mut reg: RequestRegistry<&str> = RequestRegistry::new();
        assert_eq!(reg.resolve(42), None);
    }

    #[test]
    fn out_of_order_resolution() {
        let mut reg = RequestRegistry::new();
        let a = reg.add("a");
        let b = reg.add("b");
        let c = reg.add("c");

        assert_eq!(reg.resolve(c), Some("c"));
        assert_eq!(reg.resolve(a), Some("a"));
        assert_eq!(reg.pending_ids(), vec![b]);
    }

    #[test]
    fn drain_keeps_id_sequence() {
        let mut reg = RequestRegistry::new();
        reg.add("a");
        reg.add("b");

        let drained = reg.drain();
        assert_eq!(drained, vec![(0, "a"), (1, "b")]);
        assert!(reg.is_empty());
        assert_eq!(reg.add("c"), 2);
    }
}
