//! Config subcommand handlers.

use std::collections::BTreeMap;

use dialoguer::{Input, Select};

use maasly_config::{Defaults, store_secret};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
        if profile.cookie.is_some() {
            profile.cookie = Some(MASK.into());
        }
    }
    cfg
}

/// TOML view of an already-redacted config.
fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# unrenderable config: {e}"))
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    profile_name: &str,
    kind: &str,
    secret: String,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {kind}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        store_secret(profile_name, kind, &secret)?;
        eprintln!("   ✓ {kind} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn parse_flag<T: std::str::FromStr>(field: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(|| Profile::new(""));
            set_profile_value(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: maasly config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let prof = cfg.profile(&profile_name)?;

            if prof.auth_mode == "cookie" {
                let cookie = prompt_secret("Session cookie header: ", "cookie")?;
                store_secret(&profile_name, "cookie", &cookie)?;
            } else {
                let password = prompt_secret("Password: ", "password")?;
                store_secret(&profile_name, "password", &password)?;
            }

            eprintln!("✓ Secret stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

/// Interactive wizard writing a fresh config with one profile.
fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("maasly -- configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("Server URL")
        .default("http://localhost:5240/MAAS".into())
        .interact_text()
        .map_err(prompt_err)?;
    maasly_config::parse_server_url(&server)?;

    let auth_choices = &["Username/Password", "Existing session cookie"];
    let auth_selection = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile::new(server);
    if auth_selection == 0 {
        let username: String = Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(prompt_err)?;
        let password = prompt_secret("Password: ", "password")?;
        profile.username = Some(username);
        profile.password = prompt_keyring_storage(&profile_name, "password", password)?;
    } else {
        let cookie = prompt_secret("Session cookie header: ", "cookie")?;
        profile.auth_mode = "cookie".into();
        profile.cookie = prompt_keyring_storage(&profile_name, "cookie", cookie)?;
    }

    let mut cfg = Config {
        default_profile: Some(profile_name.clone()),
        defaults: Defaults::default(),
        profiles: BTreeMap::new(),
    };
    cfg.profiles.insert(profile_name.clone(), profile);
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: maasly list zone");
    Ok(())
}

fn set_profile_value(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "server" => {
            maasly_config::parse_server_url(&value)?;
            profile.server = value;
        }
        "auth_mode" | "auth-mode" => {
            if !matches!(value.as_str(), "password" | "cookie") {
                return Err(CliError::Validation {
                    field: "auth_mode".into(),
                    reason: "must be 'password' or 'cookie'".into(),
                });
            }
            profile.auth_mode = value;
        }
        "username" => profile.username = Some(value),
        "password_env" | "password-env" => profile.password_env = Some(value),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_flag("insecure", &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_flag("timeout", &value, "a number (seconds)")?),
        "request_timeout" | "request-timeout" => {
            profile.request_timeout =
                Some(parse_flag("request_timeout", &value, "a number (seconds)")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: server, auth_mode, username, \
                     password_env, ca_cert, insecure, timeout, request_timeout"
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                username: Some("admin".into()),
                password: Some("hunter2".into()),
                cookie: Some("sessionid=abc".into()),
                ..Profile::new("http://maas.lab:5240/MAAS")
            },
        );

        let text = format_config(&redacted(&cfg));
        assert!(text.contains("****"));
        assert!(text.contains("admin"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("sessionid"));
    }

    #[test]
    fn set_validates_values() {
        let mut profile = Profile::new("http://maas:5240/MAAS");

        set_profile_value(&mut profile, "timeout", "15".into()).unwrap();
        set_profile_value(&mut profile, "auth-mode", "cookie".into()).unwrap();
        assert_eq!(profile.timeout, Some(15));
        assert_eq!(profile.auth_mode, "cookie");

        assert!(set_profile_value(&mut profile, "timeout", "soon".into()).is_err());
        assert!(set_profile_value(&mut profile, "auth_mode", "kerberos".into()).is_err());
        assert!(set_profile_value(&mut profile, "server", "ftp://x".into()).is_err());
        assert!(set_profile_value(&mut profile, "colour", "red".into()).is_err());
    }
}
