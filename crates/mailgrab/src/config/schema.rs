use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secrets::{PasswordSource, SecretError};

const IMAPS_PORT: u16 = 993;
const IMAP_PORT: u16 = 143;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub input: InputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    /// Directory extracted attachments are written to.
    pub dir: PathBuf,
    pub imap: ImapConfig,
}

/// Connection and behaviour settings for the mailbox being drained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImapConfig {
    /// `host` or `host:port`.
    pub server: String,

    pub username: String,

    /// Inline password. Prefer `password_file` or `password_env_var`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env_var: Option<String>,

    #[serde(default = "default_mailbox")]
    pub mailbox: String,

    /// Dump the IMAP conversation to the log.
    #[serde(default)]
    pub debug: bool,

    /// Flag and expunge messages whose attachments were saved.
    #[serde(default)]
    pub delete: bool,

    #[serde(default)]
    pub security: Security,
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

/// Transport security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// TLS from the first byte (IMAPS).
    #[default]
    #[serde(rename = "", alias = "tls")]
    Tls,
    /// Plain connection upgraded with STARTTLS.
    #[serde(rename = "starttls")]
    StartTls,
    /// No encryption at all.
    #[serde(rename = "plaintext")]
    Plaintext,
}

impl Security {
    pub fn default_port(self) -> u16 {
        match self {
            Security::Tls => IMAPS_PORT,
            Security::StartTls | Security::Plaintext => IMAP_PORT,
        }
    }
}

impl ImapConfig {
    pub fn password_source(&self) -> PasswordSource<'_> {
        PasswordSource {
            inline: self.password.as_deref(),
            file: self.password_file.as_deref(),
            env_var: self.password_env_var.as_deref(),
        }
    }

    pub fn resolve_password(&self) -> Result<SecretString, SecretError> {
        self.password_source().resolve()
    }

    /// Splits `server` into host and port, applying the policy's default port.
    ///
    /// IPv6 literals must be bracketed (`[::1]:993`).
    pub fn address(&self) -> Result<(String, u16), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidAddress {
            address: self.server.clone(),
            reason: reason.to_string(),
        };

        let server = self.server.trim();
        let (host, port) = if let Some(rest) = server.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated '['"))?;
            match after {
                "" => (host, None),
                _ => {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("expected ':' after ']'"))?;
                    (host, Some(port))
                }
            }
        } else {
            match server.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (server, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| invalid("invalid port"))?,
            None => self.security.default_port(),
        };

        Ok((host.to_string(), port))
    }
}
