//! Command dispatch: bridges CLI args -> session actions -> output formatting.

pub mod config_cmd;
pub mod entities;
pub mod models;
pub mod util;
pub mod watch;

use maasly_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::List(args) => entities::list(session, args, global).await,
        Command::Get { model, key } => entities::get(session, &model, &key, global).await,
        Command::Create { model, payload } => {
            entities::create(session, &model, &payload, global).await
        }
        Command::Update {
            model,
            key,
            payload,
        } => entities::update(session, &model, &key, &payload, global).await,
        Command::Delete { model, key } => entities::delete(session, &model, &key, global).await,
        Command::Action {
            model,
            method,
            key,
            payload,
        } => entities::action(session, &model, &method, key.as_deref(), &payload, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        // Handled before a session is opened.
        Command::Models | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not use a server session".into(),
        )),
    }
}
