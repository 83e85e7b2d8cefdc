//! `models`: the synchronized model catalogue. Needs no connection.

use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use maasly_core::{DeletePayload, Model, ModelDescriptor};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ModelInfo {
    name: &'static str,
    primary_key: &'static str,
    tracks_statuses: bool,
    bare_delete: bool,
    methods: Vec<&'static str>,
}

impl From<&ModelDescriptor> for ModelInfo {
    fn from(d: &ModelDescriptor) -> Self {
        Self {
            name: d.model.name(),
            primary_key: d.primary_key,
            tracks_statuses: d.tracks_statuses,
            bare_delete: d.delete_payload == DeletePayload::Bare,
            methods: d.custom_methods.to_vec(),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: &'static str,
    #[tabled(rename = "Key")]
    primary_key: &'static str,
    #[tabled(rename = "Statuses")]
    statuses: &'static str,
    #[tabled(rename = "Methods")]
    methods: String,
}

impl From<&ModelInfo> for ModelRow {
    fn from(m: &ModelInfo) -> Self {
        Self {
            name: m.name,
            primary_key: m.primary_key,
            statuses: if m.tracks_statuses { "yes" } else { "" },
            methods: m.methods.join(", "),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let models: Vec<ModelInfo> = Model::iter()
        .map(|model| ModelInfo::from(model.descriptor()))
        .collect();
    let out = output::render_list(
        global.output,
        &models,
        |m| ModelRow::from(m),
        |m| m.name.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
