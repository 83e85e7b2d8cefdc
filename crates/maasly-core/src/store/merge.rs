// ── Notification merges ──
//
// Keep `items` consistent with server-side mutations. Every function
// preserves the one-entity-per-key invariant and returns whether the
// collection changed.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{ModelDescriptor, PrimaryKey};

fn position(items: &[Value], descriptor: &ModelDescriptor, key: &PrimaryKey) -> Option<usize> {
    items
        .iter()
        .position(|item| descriptor.key_of(item).as_ref() == Some(key))
}

/// Append `entity` if its key is absent, otherwise replace in place.
///
/// Entities without a key are ignored.
pub fn upsert(items: &mut Vec<Value>, descriptor: &ModelDescriptor, entity: Value) -> bool {
    let Some(key) = descriptor.key_of(&entity) else {
        return false;
    };
    match position(items, descriptor, &key) {
        Some(idx) if items[idx] == entity => false,
        Some(idx) => {
            items[idx] = entity;
            true
        }
        None => {
            items.push(entity);
            true
        }
    }
}

/// Replace the entity with the same key; no-op if it is absent.
pub fn replace_existing(items: &mut [Value], descriptor: &ModelDescriptor, entity: Value) -> bool {
    let Some(key) = descriptor.key_of(&entity) else {
        return false;
    };
    match position(items, descriptor, &key) {
        Some(idx) if items[idx] != entity => {
            items[idx] = entity;
            true
        }
        _ => false,
    }
}

/// Remove the entity with `key`; no-op if it is absent.
pub fn remove(items: &mut Vec<Value>, descriptor: &ModelDescriptor, key: &PrimaryKey) -> bool {
    let before = items.len();
    items.retain(|item| descriptor.key_of(item).as_ref() != Some(key));
    items.len() != before
}

/// Normalize a fetched list: drop entities without a key, and collapse
/// duplicate keys to the last occurrence, kept at the first position.
pub fn dedupe(descriptor: &ModelDescriptor, entities: Vec<Value>) -> Vec<Value> {
    let mut slots: HashMap<PrimaryKey, usize> = HashMap::new();
    let mut items: Vec<Value> = Vec::with_capacity(entities.len());

    for entity in entities {
        let Some(key) = descriptor.key_of(&entity) else {
            continue;
        };
        if let Some(&idx) = slots.get(&key) {
            items[idx] = entity;
        } else {
            slots.insert(key, items.len());
            items.push(entity);
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fabric(id: i64, name: &str) -> Value {
        json!({"id": id, "name": name})
    }

    #[test]
    fn upsert_appends_then_replaces() {
        let d = Model::Fabric.descriptor();
        let mut items = vec![fabric(1, "a")];

        assert!(upsert(&mut items, d, fabric(2, "b")));
        assert!(upsert(&mut items, d, fabric(1, "a2")));
        assert_eq!(items, vec![fabric(1, "a2"), fabric(2, "b")]);
    }

    #[test]
    fn upsert_same_entity_twice_is_unchanged() {
        let d = Model::Fabric.descriptor();
        let mut items = Vec::new();

        assert!(upsert(&mut items, d, fabric(10, "x")));
        assert!(!upsert(&mut items, d, fabric(10, "x")));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn replace_existing_ignores_absent() {
        let d = Model::Zone.descriptor();
        let mut items = vec![fabric(1, "a")];

        assert!(!replace_existing(&mut items, d, fabric(2, "b")));
        assert!(replace_existing(&mut items, d, fabric(1, "c")));
        assert_eq!(items, vec![fabric(1, "c")]);
    }

    #[test]
    fn remove_absent_key_is_noop() {
        let d = Model::Tag.descriptor();
        let mut items = vec![fabric(1, "a")];

        assert!(!remove(&mut items, d, &PrimaryKey::Int(99)));
        assert!(remove(&mut items, d, &PrimaryKey::Int(1)));
        assert!(items.is_empty());
    }

    #[test]
    fn keyless_entities_are_ignored() {
        let d = Model::Machine.descriptor();
        let mut items = Vec::new();
        assert!(!upsert(&mut items, d, json!({"id": 1})));
        assert!(items.is_empty());
    }

    #[test]
    fn dedupe_keeps_last_occurrence_in_first_position() {
        let d = Model::Zone.descriptor();
        let items = dedupe(
            d,
            vec![
                fabric(1, "old"),
                fabric(2, "b"),
                json!({"name": "keyless"}),
                fabric(1, "new"),
            ],
        );
        assert_eq!(items, vec![fabric(1, "new"), fabric(2, "b")]);
    }
}
