//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Typed rows go
//! through the `Tabled` derive; untyped server entities are laid out by
//! a per-model column list.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled, builder::Builder, settings::Style};

use maasly_core::Model;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
        structured => render_structured(structured, data),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views are
/// key/value listings rather than rows.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Plain => Ok(id_fn(data)),
        structured => render_structured(structured, data),
    }
}

/// Render server entities of `model`.
pub fn render_entities(
    format: OutputFormat,
    model: Model,
    items: &[&Value],
) -> Result<String, CliError> {
    let primary_key = model.descriptor().primary_key;
    match format {
        OutputFormat::Table => {
            let columns = entity_columns(model);
            let mut builder = Builder::default();
            builder.push_record(columns.iter().map(|c| c.to_uppercase()));
            for item in items {
                builder.push_record(columns.iter().map(|c| cell(item.get(*c))));
            }
            let mut table = builder.build();
            table.with(Style::rounded());
            Ok(table.to_string())
        }
        OutputFormat::Plain => Ok(items
            .iter()
            .map(|item| cell(item.get(primary_key)))
            .collect::<Vec<_>>()
            .join("\n")),
        structured => render_structured(structured, items),
    }
}

/// Render one server entity as an aligned `key: value` listing.
pub fn render_entity(format: OutputFormat, model: Model, entity: &Value) -> Result<String, CliError> {
    let primary_key = model.descriptor().primary_key;
    render_single(
        format,
        entity,
        |e| {
            let Some(fields) = e.as_object() else {
                return cell(Some(e));
            };
            let width = fields.keys().map(String::len).max().unwrap_or(0);
            fields
                .iter()
                .map(|(k, v)| format!("{k:<width$}  {}", cell(Some(v))))
                .collect::<Vec<_>>()
                .join("\n")
        },
        |e| cell(e.get(primary_key)),
    )
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_structured<T: Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    match format {
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => serde_yaml::to_string(data)
            .map(|s| s.trim_end().to_owned())
            .map_err(|e| CliError::Internal(format!("YAML serialization: {e}"))),
        _ => Ok(serde_json::to_string_pretty(data)?),
    }
}

/// Table cell text for a JSON value. Nested objects show their `name`
/// when they have one.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(fields)) => match fields.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => Value::Object(fields.clone()).to_string(),
        },
        Some(Value::Array(values)) if values.iter().all(Value::is_string) => values
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

/// Columns shown in table output for each model.
fn entity_columns(model: Model) -> &'static [&'static str] {
    match model {
        Model::Machine => &["system_id", "hostname", "status_name", "power_state", "zone", "pool"],
        Model::Device => &["system_id", "hostname", "owner", "zone"],
        Model::Controller => &["system_id", "hostname", "node_type_display", "version"],
        Model::Pod => &["id", "name", "type", "zone", "pool"],
        Model::Subnet => &["id", "name", "cidr", "vlan", "space"],
        Model::Vlan => &["id", "name", "vid", "fabric", "dhcp_on"],
        Model::Domain => &["id", "name", "authoritative", "is_default"],
        Model::User => &["id", "username", "email", "is_superuser"],
        Model::SshKey => &["id", "display", "keysource"],
        Model::SslKey => &["id", "display"],
        Model::Token => &["id", "name", "key"],
        Model::Config => &["name", "value"],
        Model::Notification => &["id", "category", "message"],
        Model::PackageRepository => &["id", "name", "url", "enabled"],
        Model::DhcpSnippet => &["id", "name", "enabled", "description"],
        Model::Tag => &["id", "name", "definition", "comment"],
        Model::Fabric | Model::Space | Model::Zone | Model::ResourcePool => {
            &["id", "name", "description"]
        }
    }
}
