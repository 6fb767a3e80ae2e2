//! Mailbox import error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while importing attachments from a mailbox.
///
/// Connection, authentication, mailbox, protocol and cleanup failures are
/// fatal for a run. Parse and attachment failures are isolated to one
/// message or one part and are only ever logged by the scanner.
#[derive(Error, Debug)]
pub enum EmailError {
    /// Failed to reach the IMAP server or to negotiate the session.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection or STARTTLS upgrade.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The mailbox could not be selected (missing, no access).
    #[error("Cannot open mailbox '{mailbox}': {reason}")]
    MailboxUnavailable { mailbox: String, reason: String },

    /// The selected mailbox holds no messages.
    #[error("No messages found in mailbox '{0}'")]
    EmptyMailbox(String),

    /// The server misbehaved mid-session (missing message, missing body, NO/BAD).
    #[error("IMAP protocol error: {0}")]
    ProtocolError(String),

    /// One message's MIME structure could not be decomposed.
    #[error("Failed to parse message {seq}: {reason}")]
    ParseError { seq: u32, reason: String },

    /// One attachment part could not be resolved or written.
    #[error("Failed to save attachment '{filename}' ({stage}): {reason}")]
    AttachmentError {
        filename: String,
        stage: PartStage,
        reason: String,
    },

    /// Flagging or expunging processed messages failed.
    #[error("Failed to delete processed messages ({step}): {reason}")]
    CleanupFailed { step: CleanupStep, reason: String },

    /// Failed to retrieve credentials.
    #[error("Credentials not found: {0}")]
    CredentialsNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The destination directory is unusable.
    #[error("Destination directory '{}' is not usable: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The step of saving a single attachment that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartStage {
    Filename,
    Create,
    Copy,
    Close,
}

impl std::fmt::Display for PartStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            PartStage::Filename => "filename",
            PartStage::Create => "create",
            PartStage::Copy => "copy",
            PartStage::Close => "close",
        };
        f.write_str(stage)
    }
}

/// The half of flag-then-expunge that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    Flag,
    Expunge,
}

impl std::fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupStep::Flag => f.write_str("flag \\Deleted"),
            CleanupStep::Expunge => f.write_str("expunge"),
        }
    }
}

impl From<async_native_tls::Error> for EmailError {
    fn from(err: async_native_tls::Error) -> Self {
        EmailError::TlsError(err.to_string())
    }
}

/// Result type for email operations.
pub type Result<T> = std::result::Result<T, EmailError>;
