// Configuration resolution: merges defaults, an optional `.env`-style
// settings file and the process environment into an immutable Credentials
// value. Environment variables always win; file entries only fill gaps.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ApiError, Result};

/// Environment variable holding the Rebrickable API key.
pub const ENV_API_KEY: &str = "REBRICKABLE_API_KEY";
/// Environment variable holding the trust-override flag (`1`/`0`).
pub const ENV_SKIP_SSL_VERIFY: &str = "REBRICKABLE_SKIP_SSL_VERIFY";
/// Environment variable overriding the settings-file path.
pub const ENV_FILE_VAR: &str = "REBRICKABLE_ENV_FILE";

/// Resolved credentials for the process lifetime: the API key plus the
/// opt-in flag that disables certificate verification per request. Resolved
/// once at startup, never mutated, safe to share across handlers.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    skip_ssl_verify: bool,
}

impl Credentials {
    /// Build credentials directly. Fails with `MissingCredential` when the
    /// key is empty so a descriptor can never exist without one.
    pub fn new(api_key: impl Into<String>, skip_ssl_verify: bool) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ApiError::MissingCredential);
        }
        Ok(Credentials {
            api_key,
            skip_ssl_verify,
        })
    }

    /// Resolve credentials from the process environment, falling back to the
    /// settings file named by `REBRICKABLE_ENV_FILE` (default `.env`).
    pub fn resolve() -> Result<Self> {
        let env_file = std::env::var(ENV_FILE_VAR).unwrap_or_else(|_| ".env".into());
        Self::resolve_from(Path::new(&env_file))
    }

    /// Resolve credentials using an explicit settings-file path.
    pub fn resolve_from(env_file: &Path) -> Result<Self> {
        let file_vars = load_env_file(env_file);
        Self::from_sources(&file_vars, |key| std::env::var(key).ok())
    }

    /// Merge rule: an environment value is never overridden by a file value;
    /// the file only fills variables the environment leaves unset.
    fn from_sources<F>(file_vars: &HashMap<String, String>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).or_else(|| file_vars.get(key).cloned());

        let api_key = lookup(ENV_API_KEY).unwrap_or_default();
        let skip_ssl_verify = lookup(ENV_SKIP_SSL_VERIFY)
            .map(|value| parse_flag(ENV_SKIP_SSL_VERIFY, &value))
            .unwrap_or(false);

        Credentials::new(api_key, skip_ssl_verify)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn skip_ssl_verify(&self) -> bool {
        self.skip_ssl_verify
    }
}

// The key must never end up in logs or panic output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("skip_ssl_verify", &self.skip_ssl_verify)
            .finish()
    }
}

/// Read a `KEY=VALUE` settings file into a map. A missing or unreadable file
/// yields an empty map; blank lines, `#` comments and malformed lines are
/// skipped rather than fatal.
pub fn load_env_file(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let Ok(text) = fs::read_to_string(path) else {
        return vars;
    };

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.entry(key.to_string())
            .or_insert_with(|| strip_optional_quotes(value.trim()).to_string());
    }
    vars
}

/// Truthy: `1`, `true`, `yes` (case-insensitive). Falsy: empty, `0`,
/// `false`, `no`. Anything else defaults to false with a warning instead of
/// failing resolution.
fn parse_flag(name: &str, value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "" | "0" | "false" | "no" => false,
        other => {
            tracing::warn!("unrecognized value '{other}' for {name}, assuming false");
            false
        }
    }
}

fn strip_optional_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && bytes[0] == bytes[bytes.len() - 1]
        && (bytes[0] == b'"' || bytes[0] == b'\'')
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
