//! Shared configuration for the maasly CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `maasly_core::SessionConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use maasly_core::{AuthCredentials, SessionConfig, TlsVerification};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "maasly";

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "MAASLY_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolve the active profile name: explicit choice, then the
    /// configured default, then `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    60
}

/// A named server profile.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL including its path (e.g., "http://maas.lan:5240/MAAS").
    pub server: String,

    /// Auth mode: "password" (log in) or "cookie" (reuse a session).
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Username for password auth.
    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Session cookie header (plaintext -- prefer keyring).
    pub cookie: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override login / connect timeout.
    pub timeout: Option<u64>,

    /// Override per-request timeout.
    pub request_timeout: Option<u64>,
}

fn default_auth_mode() -> String {
    "password".into()
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            auth_mode: default_auth_mode(),
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "maasly", "maasly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("maasly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under `MAASLY_*`
/// environment variables. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Keyring ─────────────────────────────────────────────────────────

/// Keyring entry name for a profile's secret (`"<profile>/<kind>"`).
pub fn keyring_key(profile_name: &str, kind: &str) -> String {
    format!("{profile_name}/{kind}")
}

/// Store a secret in the system keyring.
pub fn store_secret(profile_name: &str, kind: &str, secret: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name, kind))?;
    entry.set_password(secret)?;
    Ok(())
}

fn keyring_secret(profile_name: &str, kind: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name, kind)).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve username + password from the credential chain.
pub fn resolve_password_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("MAASLY_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Profile's password_env, then MAASLY_PASSWORD
    if let Some(ref env_name) = profile.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok((username, SecretString::from(pw)));
        }
    }
    if let Ok(pw) = std::env::var("MAASLY_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok((username, pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve a session cookie header from the credential chain.
pub fn resolve_cookie(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Ok(cookie) = std::env::var("MAASLY_COOKIE") {
        return Ok(SecretString::from(cookie));
    }

    // 2. Keyring
    if let Some(cookie) = keyring_secret(profile_name, "cookie") {
        return Ok(cookie);
    }

    // 3. Plaintext in config
    if let Some(ref cookie) = profile.cookie {
        return Ok(SecretString::from(cookie.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve `AuthCredentials` from a profile's `auth_mode` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.auth_mode.as_str() {
        "password" => {
            let (username, password) = resolve_password_credentials(profile, profile_name)?;
            Ok(AuthCredentials::Password { username, password })
        }
        "cookie" => Ok(AuthCredentials::Cookie(resolve_cookie(profile, profile_name)?)),
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'password' or 'cookie', got '{other}'"),
        }),
    }
}

/// Parse and check a server URL.
pub fn parse_server_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected an http or https URL, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Build a `SessionConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let url = parse_server_url(&profile.server)?;
    let auth = resolve_auth(profile, profile_name)?;

    let mut config = SessionConfig::new(url, auth);
    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.request_timeout =
        Duration::from_secs(profile.request_timeout.unwrap_or(defaults.request_timeout));
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn lab_profile() -> Profile {
        Profile {
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            password_env: Some("MAASLY_TEST_UNSET_PASSWORD_VAR".into()),
            ..Profile::new("http://maas.lab:5240/MAAS")
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.defaults.timeout, 30);
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), lab_profile());
        cfg.default_profile = Some("lab".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn toml_profile_defaults_auth_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_profile = \"edge\"\n\n[profiles.edge]\nserver = \"https://edge/MAAS\"\ntimeout = 5\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let profile = cfg.profile("edge").unwrap();
        assert_eq!(profile.auth_mode, "password");
        assert_eq!(profile.timeout, Some(5));
        assert_eq!(cfg.active_profile_name(None), "edge");
        assert_eq!(cfg.active_profile_name(Some("other")), "other");
    }

    #[test]
    fn unknown_profile_lists_available() {
        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), lab_profile());
        let err = cfg.profile("prod").unwrap_err();
        let ConfigError::ProfileNotFound { available, .. } = err else {
            panic!("expected ProfileNotFound, got {err:?}");
        };
        assert_eq!(available, vec!["lab".to_owned()]);
    }

    #[test]
    fn session_config_from_profile() {
        let mut profile = lab_profile();
        profile.ca_cert = Some(PathBuf::from("/etc/ssl/maas.pem"));
        profile.request_timeout = Some(10);

        let config = profile_to_session_config(&profile, "lab", &Defaults::default()).unwrap();
        assert_eq!(config.url.as_str(), "http://maas.lab:5240/MAAS");
        assert_eq!(
            config.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/ssl/maas.pem"))
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        let AuthCredentials::Password { username, .. } = config.auth else {
            panic!("expected password auth");
        };
        assert_eq!(username, "admin");
    }

    #[test]
    fn insecure_wins_over_ca_cert() {
        let mut profile = lab_profile();
        profile.ca_cert = Some(PathBuf::from("/etc/ssl/maas.pem"));
        profile.insecure = Some(true);

        let config = profile_to_session_config(&profile, "lab", &Defaults::default()).unwrap();
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn cookie_mode_reads_plaintext_cookie() {
        let profile = Profile {
            auth_mode: "cookie".into(),
            cookie: Some("csrftoken=abc; sessionid=xyz".into()),
            ..Profile::new("http://maas.lab:5240/MAAS")
        };
        let cookie = resolve_cookie(&profile, "maasly-test-nonexistent-profile").unwrap();
        assert_eq!(cookie.expose_secret(), "csrftoken=abc; sessionid=xyz");
    }

    #[test]
    fn password_mode_without_username_has_no_credentials() {
        let profile = Profile::new("http://maas.lab:5240/MAAS");
        if std::env::var("MAASLY_USERNAME").is_ok() {
            return;
        }
        let err = resolve_auth(&profile, "maasly-test-nonexistent-profile").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn bad_auth_mode_and_url_are_rejected() {
        let profile = Profile {
            auth_mode: "kerberos".into(),
            ..lab_profile()
        };
        assert!(matches!(
            resolve_auth(&profile, "lab"),
            Err(ConfigError::Validation { .. })
        ));

        assert!(parse_server_url("not a url").is_err());
        assert!(parse_server_url("ftp://maas.lab/MAAS").is_err());
        assert!(parse_server_url("https://maas.lab/MAAS").is_ok());
    }
}
