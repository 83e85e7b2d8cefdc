// ── Collection reducer ──
//
// Pure function of (state, action). The store runs it under the
// collection's write lock, so reductions never interleave.

use maasly_api::NotifyVerb;
use serde_json::Value;
use tracing::warn;

use super::merge;
use super::state::CollectionState;
use crate::action::{Action, Request};
use crate::model::{Method, ModelDescriptor};

/// Compute the next state of `descriptor`'s collection after `action`.
///
/// Actions for other models return an unchanged copy.
pub fn reduce(
    state: &CollectionState,
    descriptor: &ModelDescriptor,
    action: &Action,
) -> CollectionState {
    let mut next = state.clone();
    if action.model() != descriptor.model {
        return next;
    }

    match action {
        Action::Request(request) => on_request(&mut next, request),
        Action::Success { request, result } => on_success(&mut next, descriptor, request, result),
        Action::Failure { request, error } => on_failure(&mut next, request, error),
        Action::Notify { verb, data, .. } => on_notify(&mut next, descriptor, *verb, data),
        Action::Cleanup { .. } => {
            next.errors = None;
            next.saving = false;
            next.saved = false;
        }
    }
    next
}

fn on_request(state: &mut CollectionState, request: &Request) {
    match request.method {
        Method::List | Method::Get => state.loading = true,
        Method::SetActive => {}
        method => {
            state.saving = true;
            state.saved = false;
            if let (Some(statuses), Some(key)) = (state.statuses.as_mut(), request.target_key()) {
                statuses.insert(key, method.wire_name().to_owned());
            }
        }
    }
}

fn on_success(
    state: &mut CollectionState,
    descriptor: &ModelDescriptor,
    request: &Request,
    result: &Value,
) {
    match request.method {
        Method::List => {
            state.loading = false;
            let Value::Array(entities) = result else {
                warn!(
                    model = %descriptor.model,
                    result = %result,
                    "list result is not an array, keeping current items"
                );
                return;
            };
            state.loaded = true;
            state.items = merge::dedupe(descriptor, entities.clone());
        }
        Method::Get => {
            state.loading = false;
            merge::upsert(&mut state.items, descriptor, result.clone());
        }
        Method::SetActive => {
            state.active = descriptor.key_of(result);
        }
        _ => {
            state.saving = false;
            state.saved = true;
            state.errors = None;
            clear_status(state, request);
        }
    }
}

fn on_failure(state: &mut CollectionState, request: &Request, error: &Value) {
    match request.method {
        Method::List | Method::Get => state.loading = false,
        Method::SetActive => {}
        _ => {
            state.saving = false;
            clear_status(state, request);
        }
    }
    state.errors = Some(error.clone());
}

fn on_notify(
    state: &mut CollectionState,
    descriptor: &ModelDescriptor,
    verb: NotifyVerb,
    data: &Value,
) {
    match verb {
        NotifyVerb::Create => {
            merge::upsert(&mut state.items, descriptor, data.clone());
        }
        NotifyVerb::Update => {
            merge::replace_existing(&mut state.items, descriptor, data.clone());
        }
        NotifyVerb::Delete => {
            let Some(key) = descriptor.key_in(data) else {
                return;
            };
            merge::remove(&mut state.items, descriptor, &key);
            if let Some(statuses) = state.statuses.as_mut() {
                statuses.remove(&key);
            }
            if state.active.as_ref() == Some(&key) {
                state.active = None;
            }
        }
    }
}

fn clear_status(state: &mut CollectionState, request: &Request) {
    if let (Some(statuses), Some(key)) = (state.statuses.as_mut(), request.target_key()) {
        statuses.remove(&key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::ActionSet;
    use crate::model::{Model, PrimaryKey};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn initial(model: Model) -> CollectionState {
        CollectionState::new(model.descriptor())
    }

    fn run(model: Model, state: &CollectionState, action: &Action) -> CollectionState {
        reduce(state, model.descriptor(), action)
    }

    fn request_of(action: &Action) -> Request {
        action.request().unwrap().clone()
    }

    #[test]
    fn initial_state_is_empty() {
        let zones = initial(Model::Zone);
        assert_eq!(zones, CollectionState::default());
        assert_eq!(initial(Model::Machine).statuses, Some(Default::default()));
    }

    // ── Fetch ────────────────────────────────────────────────────────

    #[test]
    fn fetch_round_trip_loads_collection() {
        let zones = ActionSet::new(Model::Zone);
        let fetch = zones.fetch();

        let state = run(Model::Zone, &initial(Model::Zone), &fetch);
        assert!(state.loading);
        assert!(!state.loaded);

        let state = run(
            Model::Zone,
            &state,
            &Action::Success {
                request: request_of(&fetch),
                result: json!([{"id": 1, "name": "default"}]),
            },
        );
        assert_eq!(
            state,
            CollectionState {
                items: vec![json!({"id": 1, "name": "default"})],
                loaded: true,
                ..CollectionState::default()
            }
        );
    }

    #[test]
    fn non_array_fetch_result_keeps_items() {
        let zones = ActionSet::new(Model::Zone);
        let loaded = CollectionState {
            items: vec![json!({"id": 1, "name": "default"})],
            loaded: true,
            ..CollectionState::default()
        };

        let fetch = zones.fetch();
        let state = run(Model::Zone, &loaded, &fetch);
        let state = run(
            Model::Zone,
            &state,
            &Action::Success {
                request: request_of(&fetch),
                result: json!({"detail": "unexpected"}),
            },
        );
        assert_eq!(state, loaded);

        let fresh = run(Model::Zone, &initial(Model::Zone), &fetch);
        let fresh = run(
            Model::Zone,
            &fresh,
            &Action::Success {
                request: request_of(&fetch),
                result: Value::Null,
            },
        );
        assert!(!fresh.loading);
        assert!(!fresh.loaded);
        assert!(fresh.items.is_empty());
    }

    #[test]
    fn fetch_error_sets_errors_but_not_loaded() {
        let fetch = ActionSet::new(Model::Zone).fetch();
        let state = run(Model::Zone, &initial(Model::Zone), &fetch);
        let state = run(
            Model::Zone,
            &state,
            &Action::Failure {
                request: request_of(&fetch),
                error: json!("Permission denied"),
            },
        );

        assert!(!state.loading);
        assert!(!state.loaded);
        assert_eq!(state.errors, Some(json!("Permission denied")));
    }

    #[test]
    fn fetch_success_keeps_previous_errors() {
        let fetch = ActionSet::new(Model::Zone).fetch();
        let state = CollectionState {
            errors: Some(json!("old")),
            ..initial(Model::Zone)
        };
        let state = run(
            Model::Zone,
            &state,
            &Action::Success {
                request: request_of(&fetch),
                result: json!([]),
            },
        );
        assert_eq!(state.errors, Some(json!("old")));
        assert!(state.loaded);
    }

    #[test]
    fn get_success_upserts_entity() {
        let zones = ActionSet::new(Model::Zone);
        let get = zones.get(&PrimaryKey::Int(3));
        let state = run(Model::Zone, &initial(Model::Zone), &get);
        assert!(state.loading);

        let state = run(
            Model::Zone,
            &state,
            &Action::Success {
                request: request_of(&get),
                result: json!({"id": 3, "name": "rack-3"}),
            },
        );
        assert!(!state.loading);
        assert!(!state.loaded);
        assert_eq!(state.items, vec![json!({"id": 3, "name": "rack-3"})]);
    }

    // ── Save ─────────────────────────────────────────────────────────

    #[test]
    fn save_flags_round_trip() {
        let tags = ActionSet::new(Model::Tag);
        let create = tags.create(json!({"name": "gpu"}));

        let state = CollectionState {
            saved: true,
            errors: Some(json!({"name": ["taken"]})),
            ..initial(Model::Tag)
        };
        let state = run(Model::Tag, &state, &create);
        assert!(state.saving);
        assert!(!state.saved);

        let state = run(
            Model::Tag,
            &state,
            &Action::Success {
                request: request_of(&create),
                result: json!({"id": 8, "name": "gpu"}),
            },
        );
        assert!(!state.saving);
        assert!(state.saved);
        assert_eq!(state.errors, None);
        // The created entity arrives by notification, not by response.
        assert!(state.items.is_empty());
    }

    #[test]
    fn save_error_surfaces_into_errors() {
        let tags = ActionSet::new(Model::Tag);
        let delete = tags.delete(&PrimaryKey::Int(5));
        let state = run(Model::Tag, &initial(Model::Tag), &delete);
        let state = run(
            Model::Tag,
            &state,
            &Action::Failure {
                request: request_of(&delete),
                error: json!("Tag is in use"),
            },
        );

        assert!(!state.saving);
        assert!(!state.saved);
        assert_eq!(state.errors, Some(json!("Tag is in use")));
    }

    #[test]
    fn cleanup_never_touches_items() {
        let state = CollectionState {
            items: vec![json!({"id": 1})],
            loaded: true,
            saving: true,
            saved: true,
            errors: Some(json!("x")),
            ..initial(Model::Tag)
        };
        let state = run(Model::Tag, &state, &ActionSet::new(Model::Tag).cleanup());

        assert_eq!(state.items, vec![json!({"id": 1})]);
        assert!(state.loaded);
        assert!(!state.saving);
        assert!(!state.saved);
        assert_eq!(state.errors, None);
    }

    // ── Statuses ─────────────────────────────────────────────────────

    #[test]
    fn statuses_follow_per_entity_requests() {
        let machines = ActionSet::new(Model::Machine);
        let action = machines
            .call("action", Some(json!({"system_id": "abc", "action": "deploy"})))
            .unwrap();
        let other = machines
            .call("check_power", Some(json!({"system_id": "def"})))
            .unwrap();

        let state = run(Model::Machine, &initial(Model::Machine), &action);
        let state = run(Model::Machine, &state, &other);
        let statuses = state.statuses.as_ref().unwrap();
        assert_eq!(statuses.get(&PrimaryKey::from("abc")).unwrap(), "action");
        assert_eq!(statuses.get(&PrimaryKey::from("def")).unwrap(), "check_power");

        let state = run(
            Model::Machine,
            &state,
            &Action::Success {
                request: request_of(&action),
                result: Value::Null,
            },
        );
        let statuses = state.statuses.as_ref().unwrap();
        assert!(!statuses.contains_key(&PrimaryKey::from("abc")));
        assert!(statuses.contains_key(&PrimaryKey::from("def")));

        let state = run(
            Model::Machine,
            &state,
            &Action::Failure {
                request: request_of(&other),
                error: json!("BMC unreachable"),
            },
        );
        assert!(state.statuses.as_ref().unwrap().is_empty());
    }

    #[test]
    fn untracked_models_have_no_statuses() {
        let state = run(
            Model::Zone,
            &initial(Model::Zone),
            &ActionSet::new(Model::Zone).delete(&PrimaryKey::Int(1)),
        );
        assert_eq!(state.statuses, None);
    }

    // ── setActive ────────────────────────────────────────────────────

    #[test]
    fn set_active_records_selection() {
        let machines = ActionSet::new(Model::Machine);
        let key = PrimaryKey::from("abc");
        let select = machines.set_active(Some(&key));

        let state = run(Model::Machine, &initial(Model::Machine), &select);
        assert!(!state.loading);
        assert!(!state.saving);

        let state = run(
            Model::Machine,
            &state,
            &Action::Success {
                request: request_of(&select),
                result: json!({"system_id": "abc", "hostname": "node1"}),
            },
        );
        assert_eq!(state.active, Some(key));

        let clear = machines.set_active(None);
        let state = run(
            Model::Machine,
            &state,
            &Action::Success {
                request: request_of(&clear),
                result: Value::Null,
            },
        );
        assert_eq!(state.active, None);
    }

    // ── Notifications ────────────────────────────────────────────────

    fn notify(model: Model, verb: NotifyVerb, data: Value) -> Action {
        Action::Notify { model, verb, data }
    }

    #[test]
    fn create_notify_for_existing_key_is_an_update() {
        let state = CollectionState {
            items: vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})],
            ..initial(Model::Fabric)
        };
        let state = run(
            Model::Fabric,
            &state,
            &notify(Model::Fabric, NotifyVerb::Create, json!({"id": 1, "name": "a2"})),
        );
        assert_eq!(
            state.items,
            vec![json!({"id": 1, "name": "a2"}), json!({"id": 2, "name": "b"})]
        );
    }

    #[test]
    fn update_notify_is_idempotent() {
        let state = CollectionState {
            items: vec![json!({"id": 1, "name": "a"})],
            ..initial(Model::Zone)
        };
        let update = notify(Model::Zone, NotifyVerb::Update, json!({"id": 1, "name": "b"}));

        let once = run(Model::Zone, &state, &update);
        let twice = run(Model::Zone, &once, &update);
        assert_eq!(once, twice);
        assert_eq!(once.items, vec![json!({"id": 1, "name": "b"})]);
    }

    #[test]
    fn update_notify_for_absent_key_is_noop() {
        let state = initial(Model::Zone);
        let next = run(
            Model::Zone,
            &state,
            &notify(Model::Zone, NotifyVerb::Update, json!({"id": 1})),
        );
        assert_eq!(next, state);
    }

    #[test]
    fn delete_notify_accepts_entity_or_bare_key() {
        let state = CollectionState {
            items: vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})],
            ..initial(Model::Space)
        };
        let state = run(
            Model::Space,
            &state,
            &notify(Model::Space, NotifyVerb::Delete, json!(2)),
        );
        let state = run(
            Model::Space,
            &state,
            &notify(Model::Space, NotifyVerb::Delete, json!({"id": 3})),
        );
        assert_eq!(state.items, vec![json!({"id": 1})]);

        let unchanged = run(
            Model::Space,
            &state,
            &notify(Model::Space, NotifyVerb::Delete, json!(42)),
        );
        assert_eq!(unchanged, state);
    }

    #[test]
    fn delete_notify_drops_status_and_active() {
        let key = PrimaryKey::from("abc");
        let mut statuses = std::collections::BTreeMap::new();
        statuses.insert(key.clone(), "action".to_owned());

        let state = CollectionState {
            items: vec![json!({"system_id": "abc"})],
            active: Some(key),
            statuses: Some(statuses),
            ..CollectionState::default()
        };
        let state = run(
            Model::Machine,
            &state,
            &notify(Model::Machine, NotifyVerb::Delete, json!("abc")),
        );

        assert!(state.items.is_empty());
        assert_eq!(state.active, None);
        assert!(state.statuses.unwrap().is_empty());
    }

    #[test]
    fn actions_for_other_models_are_ignored() {
        let state = initial(Model::Zone);
        let next = run(Model::Zone, &state, &ActionSet::new(Model::Tag).fetch());
        assert_eq!(next, state);
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[test]
    fn tag_delete_racing_create_notification() {
        let tags = ActionSet::new(Model::Tag);
        let state = CollectionState {
            items: vec![json!({"id": 5, "name": "gpu"})],
            loaded: true,
            ..initial(Model::Tag)
        };

        let delete = tags.delete(&PrimaryKey::Int(5));
        let state = run(Model::Tag, &state, &delete);
        let state = run(
            Model::Tag,
            &state,
            &notify(Model::Tag, NotifyVerb::Create, json!({"id": 6, "name": "ssd"})),
        );
        assert!(state.saving);
        assert_eq!(state.items.len(), 2);

        let state = run(
            Model::Tag,
            &state,
            &Action::Success {
                request: request_of(&delete),
                result: Value::Null,
            },
        );
        let state = run(
            Model::Tag,
            &state,
            &notify(Model::Tag, NotifyVerb::Delete, json!(5)),
        );

        assert_eq!(state.items, vec![json!({"id": 6, "name": "ssd"})]);
        assert!(state.saved);
        assert!(!state.saving);
    }

    #[test]
    fn duplicate_fabric_create_notifications() {
        let created = notify(
            Model::Fabric,
            NotifyVerb::Create,
            json!({"id": 10, "name": "fabric-10"}),
        );
        let state = run(Model::Fabric, &initial(Model::Fabric), &created);
        let state = run(Model::Fabric, &state, &created);

        assert_eq!(state.items, vec![json!({"id": 10, "name": "fabric-10"})]);
    }
}
