//! `watch`: print a collection's changes as the server pushes them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Local;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;

use maasly_core::{
    ActionSet, CollectionState, EntityFilter, Model, ModelDescriptor, PrimaryKey, Session,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// Entity-level difference between two snapshots.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Changes {
    pub added: Vec<Value>,
    pub updated: Vec<Value>,
    pub removed: Vec<PrimaryKey>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Compare the filtered items of two snapshots by primary key.
pub fn diff(
    descriptor: &ModelDescriptor,
    filter: &EntityFilter,
    before: &CollectionState,
    after: &CollectionState,
) -> Changes {
    let index = |state: &CollectionState| -> BTreeMap<PrimaryKey, Value> {
        state
            .items
            .iter()
            .filter(|item| filter.matches(item))
            .filter_map(|item| descriptor.key_of(item).map(|key| (key, item.clone())))
            .collect()
    };
    let before = index(before);
    let mut after = index(after);

    let mut changes = Changes::default();
    for (key, old) in &before {
        match after.remove(key) {
            None => changes.removed.push(key.clone()),
            Some(new) if new != *old => changes.updated.push(new),
            Some(_) => {}
        }
    }
    changes.added.extend(after.into_values());
    changes
}

#[derive(Serialize)]
struct ChangeEvent<'a> {
    at: String,
    model: &'a str,
    #[serde(flatten)]
    changes: &'a Changes,
}

fn render_changes(
    model: Model,
    changes: &Changes,
    global: &GlobalOpts,
    color: bool,
) -> Result<String, CliError> {
    let at = Local::now();
    let pk = model.descriptor().primary_key;
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let label = |item: &Value| {
                let name = item
                    .get("hostname")
                    .or_else(|| item.get("name"))
                    .map(|v| output::cell(Some(v)));
                let key = output::cell(item.get(pk));
                match name {
                    Some(name) if name != key => format!("{key} ({name})"),
                    _ => key,
                }
            };
            let stamp = at.format("%H:%M:%S").to_string();
            let mut lines = Vec::new();
            for item in &changes.added {
                let mark = if color { "+".green().to_string() } else { "+".into() };
                lines.push(format!("{stamp} {mark} {model} {}", label(item)));
            }
            for item in &changes.updated {
                let mark = if color { "~".yellow().to_string() } else { "~".into() };
                lines.push(format!("{stamp} {mark} {model} {}", label(item)));
            }
            for key in &changes.removed {
                let mark = if color { "-".red().to_string() } else { "-".into() };
                lines.push(format!("{stamp} {mark} {model} {key}"));
            }
            Ok(lines.join("\n"))
        }
        format => {
            let event = ChangeEvent {
                at: at.to_rfc3339(),
                model: model.name(),
                changes,
            };
            // One event per line regardless of pretty/compact.
            let format = if format == OutputFormat::Json {
                OutputFormat::JsonCompact
            } else {
                format
            };
            output::render_single(format, &event, |_| String::new(), |_| String::new())
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let model = util::resolve_model(&args.model)?;
    let filter = util::build_filter(&args.filter)?;
    let color = output::should_color(global.color);

    // The baseline is the fetch result itself: notifications reduced
    // before `call` returns still show up as the first change.
    let mut stream = session.subscribe(model);
    let fetched = session.call(ActionSet::new(model).fetch()).await?;
    let mut previous = Arc::new(CollectionState {
        items: fetched.as_array().cloned().unwrap_or_default(),
        ..CollectionState::default()
    });
    if !global.quiet {
        eprintln!(
            "Watching {} {model} entries (Ctrl-C to stop)",
            previous.items.iter().filter(|item| filter.matches(item)).count()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut seen = 0usize;

    loop {
        let next = tokio::select! {
            _ = &mut ctrl_c => break,
            next = stream.changed() => next,
        };
        let Some(next) = next else { break };

        let changes = diff(model.descriptor(), &filter, &previous, &next);
        previous = next;
        if changes.is_empty() {
            continue;
        }

        let out = render_changes(model, &changes, global, color)?;
        output::print_output(&out, global.quiet);

        seen += 1;
        if args.count.is_some_and(|count| seen >= count) {
            break;
        }
    }
    Ok(())
}
