//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};

use maasly_core::{EntityFilter, Model, PrimaryKey};

use crate::cli::{FilterArgs, GlobalOpts, OutputFormat, PayloadArgs};
use crate::error::CliError;

/// Resolve a model name given on the command line.
pub fn resolve_model(name: &str) -> Result<Model, CliError> {
    Ok(Model::lookup(&name.to_lowercase())?)
}

/// Parse a primary key argument as `model`'s key type.
pub fn parse_key(model: Model, raw: &str) -> Result<PrimaryKey, CliError> {
    Ok(model.descriptor().parse_key(raw)?)
}

/// Read `--data` / `--from-file` / `--set` into one parameter value.
///
/// Returns `None` when none of them were given.
pub fn read_payload(args: &PayloadArgs) -> Result<Option<Value>, CliError> {
    let base = if let Some(ref data) = args.data {
        Some(serde_json::from_str(data).map_err(|e| CliError::Validation {
            field: "data".into(),
            reason: format!("invalid JSON: {e}"),
        })?)
    } else if let Some(ref path) = args.from_file {
        Some(read_json_file(path)?)
    } else {
        None
    };

    if args.set.is_empty() {
        return Ok(base);
    }

    let mut fields = match base {
        None => Map::new(),
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            return Err(CliError::Validation {
                field: "set".into(),
                reason: "--set needs the base payload to be a JSON object".into(),
            });
        }
    };
    for pair in &args.set {
        let (key, value) = parse_assignment(pair)?;
        fields.insert(key, value);
    }
    Ok(Some(Value::Object(fields)))
}

/// Merge `key` into `params` under the model's primary-key field.
pub fn with_key(model: Model, params: Option<Value>, key: &PrimaryKey) -> Result<Value, CliError> {
    let mut fields = match params {
        None => Map::new(),
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            return Err(CliError::Validation {
                field: "data".into(),
                reason: "parameters must be a JSON object".into(),
            });
        }
    };
    fields.insert(model.descriptor().primary_key.to_owned(), key.to_value());
    Ok(Value::Object(fields))
}

/// `key=value`, with the value read as JSON when it parses.
fn parse_assignment(pair: &str) -> Result<(String, Value), CliError> {
    let Some((key, raw)) = pair.split_once('=') else {
        return Err(CliError::Validation {
            field: "set".into(),
            reason: format!("expected KEY=VALUE, got '{pair}'"),
        });
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((key.trim().to_owned(), value))
}

/// Combine `--filter` and `--search` into one predicate.
pub fn build_filter(args: &FilterArgs) -> Result<EntityFilter, CliError> {
    let mut filters = args
        .filters
        .iter()
        .map(|expr| {
            EntityFilter::field_equals(expr).ok_or_else(|| CliError::Validation {
                field: "filter".into(),
                reason: format!("expected FIELD=VALUE, got '{expr}'"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(ref needle) = args.search {
        filters.push(EntityFilter::Contains(needle.clone()));
    }

    Ok(match filters.len() {
        0 => EntityFilter::All,
        1 => filters.remove(0),
        _ => EntityFilter::Custom(Box::new(move |entity| {
            filters.iter().all(|f| f.matches(entity))
        })),
    })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: "yes".into(),
            reason: "confirmation needs a terminal; pass --yes".into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file(path: &Path) -> Result<Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Spinner on stderr for interactive table output; hidden otherwise.
pub fn spinner(global: &GlobalOpts, message: String) -> ProgressBar {
    if global.quiet
        || global.output != OutputFormat::Table
        || !std::io::stderr().is_terminal()
    {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
