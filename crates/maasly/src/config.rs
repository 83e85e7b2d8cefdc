//! CLI configuration -- thin wrapper around `maasly_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--server, --username, --cookie, ...).

use secrecy::SecretString;

use maasly_core::{AuthCredentials, SessionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use maasly_config::{Config, Profile, config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Build a `SessionConfig` from the config file, profile, and CLI flags.
pub fn build_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        // An explicitly named profile must exist.
        None if global.profile.is_some() => cfg.profile(&profile_name)?.clone(),
        None => {
            let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            Profile::new(server)
        }
    };
    apply_overrides(&mut profile, global);

    let mut session =
        maasly_config::profile_to_session_config(&profile, &profile_name, &cfg.defaults)?;
    // The flag wins over env and keyring lookups.
    if let Some(ref cookie) = global.cookie {
        session.auth = AuthCredentials::Cookie(SecretString::from(cookie.clone()));
    }
    if global.insecure {
        session.tls = TlsVerification::DangerAcceptInvalid;
    }
    Ok(session)
}

/// Layer global flags over a profile. A cookie switches the profile to
/// cookie auth.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if let Some(ref cookie) = global.cookie {
        profile.auth_mode = "cookie".into();
        profile.cookie = Some(cookie.clone());
    } else if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(request_timeout) = global.request_timeout {
        profile.request_timeout = Some(request_timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["maasly"];
        argv.extend_from_slice(args);
        argv.push("models");
        Cli::parse_from(argv).global
    }

    #[test]
    fn flags_override_profile() {
        let mut profile = Profile {
            username: Some("admin".into()),
            timeout: Some(10),
            ..Profile::new("http://old:5240/MAAS")
        };
        let opts = global(&["--server", "http://new:5240/MAAS", "--request-timeout", "5"]);

        apply_overrides(&mut profile, &opts);

        assert_eq!(profile.server, "http://new:5240/MAAS");
        assert_eq!(profile.username.as_deref(), Some("admin"));
        assert_eq!(profile.timeout, Some(10));
        assert_eq!(profile.request_timeout, Some(5));
    }

    #[test]
    fn cookie_flag_switches_auth_mode() {
        let mut profile = Profile::new("http://maas:5240/MAAS");
        let opts = global(&["--cookie", "csrftoken=a; sessionid=b"]);

        apply_overrides(&mut profile, &opts);

        assert_eq!(profile.auth_mode, "cookie");
        assert_eq!(profile.cookie.as_deref(), Some("csrftoken=a; sessionid=b"));
    }
}
