//! Collection commands: list, get, create, update, delete, action.

use serde_json::Value;

use maasly_core::{ActionSet, Model, Selectors, Session};

use crate::cli::{GlobalOpts, ListArgs, PayloadArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// Print a server result when it is an entity, a short note otherwise.
fn print_result(
    model: Model,
    result: &Value,
    note: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if result.is_object() {
        let out = output::render_entity(global.output, model, result)?;
        output::print_output(&out, global.quiet);
    } else if !global.quiet {
        eprintln!("{note}");
    }
    Ok(())
}

fn required_payload(args: &PayloadArgs) -> Result<Value, CliError> {
    util::read_payload(args)?.ok_or_else(|| CliError::Validation {
        field: "payload".into(),
        reason: "pass --data, --from-file or --set".into(),
    })
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(session: &Session, args: ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let model = util::resolve_model(&args.model)?;
    let filter = util::build_filter(&args.filter)?;

    let spinner = util::spinner(global, format!("Fetching {model} collection"));
    let fetched = session.call(ActionSet::new(model).fetch()).await;
    spinner.finish_and_clear();
    fetched?;

    let state = session.state(model);
    let mut items = Selectors::new(model).filter(&state, &filter);
    if let Some(limit) = args.limit {
        items.truncate(limit);
    }
    tracing::debug!(model = %model, count = items.len(), "listing");

    let out = output::render_entities(global.output, model, &items)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn get(
    session: &Session,
    model: &str,
    key: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let model = util::resolve_model(model)?;
    let entity = session.get(model, &util::parse_key(model, key)?).await?;
    let out = output::render_entity(global.output, model, &entity)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn create(
    session: &Session,
    model: &str,
    payload: &PayloadArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let model = util::resolve_model(model)?;
    let params = required_payload(payload)?;
    let result = session.call(ActionSet::new(model).create(params)).await?;
    print_result(model, &result, &format!("Created {model}"), global)
}

pub async fn update(
    session: &Session,
    model: &str,
    key: &str,
    payload: &PayloadArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let model = util::resolve_model(model)?;
    let key = util::parse_key(model, key)?;
    let params = util::with_key(model, Some(required_payload(payload)?), &key)?;
    let result = session.call(ActionSet::new(model).update(params)?).await?;
    print_result(model, &result, &format!("Updated {model} {key}"), global)
}

pub async fn delete(
    session: &Session,
    model: &str,
    key: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let model = util::resolve_model(model)?;
    let key = util::parse_key(model, key)?;
    if !util::confirm(&format!("Delete {model} '{key}'?"), global.yes)? {
        return Ok(());
    }
    session.call(ActionSet::new(model).delete(&key)).await?;
    if !global.quiet {
        eprintln!("Deleted {model} {key}");
    }
    Ok(())
}

pub async fn action(
    session: &Session,
    model: &str,
    method: &str,
    key: Option<&str>,
    payload: &PayloadArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let model = util::resolve_model(model)?;
    let mut params = util::read_payload(payload)?;
    if let Some(key) = key {
        params = Some(util::with_key(model, params, &util::parse_key(model, key)?)?);
    }

    let request = ActionSet::new(model).call(method, params)?;
    let result = session.call(request).await?;
    print_result(model, &result, &format!("{model} {method}: done"), global)
}
