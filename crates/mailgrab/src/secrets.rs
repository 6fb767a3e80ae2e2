//! Password resolution for the IMAP login.
//!
//! A password can come from three places, checked in this order:
//!
//! 1. **Inline** in the config file (`password: "..."`), handy for a quick test
//! 2. **File** (`passwordFile: /run/secrets/imap`), the Docker secrets layout
//! 3. **Environment variable** (`passwordEnvVar: IMAP_PASSWORD`)

use secrecy::SecretString;
use std::fs;

/// Error type for password resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No password source configured (need one of: password, passwordFile, passwordEnvVar)")]
    NoSourceProvided,

    #[error("Failed to read password file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a password may be found. Empty strings count as "not configured".
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordSource<'a> {
    pub inline: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> PasswordSource<'a> {
    /// True when at least one non-empty source is configured.
    pub fn is_configured(&self) -> bool {
        [self.inline, self.file, self.env_var]
            .iter()
            .any(|s| s.is_some_and(|s| !s.is_empty()))
    }

    /// Resolves the password from the first configured source.
    ///
    /// File contents and environment values are trimmed, since both usually
    /// end with a newline.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = non_empty(self.inline) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(self.file) {
            let expanded = expand_home(path);
            return match fs::read_to_string(&expanded) {
                Ok(content) => Ok(SecretString::from(content.trim().to_string())),
                Err(e) => Err(SecretError::FileReadError {
                    path: expanded,
                    source: e,
                }),
            };
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Expands a leading `~` to the current user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
