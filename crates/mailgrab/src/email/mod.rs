//! IMAP attachment import.
//!
//! A run connects and authenticates ([`ImapClient`]), selects one mailbox,
//! streams every message body through MIME decomposition and saves the
//! attachment parts to disk ([`AttachmentExtractor`]). Messages that yielded
//! at least one saved file can then be flagged and expunged
//! ([`CleanupCoordinator`]). [`MailboxScanner`] ties these together over any
//! [`MailSession`].

pub mod cleanup;
pub mod client;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod parser;
pub mod scanner;
pub mod seqset;
pub mod session;
pub mod transport;

pub use cleanup::CleanupCoordinator;
pub use client::ImapClient;
pub use error::{CleanupStep, EmailError, PartStage};
pub use extractor::{AttachmentExtractor, Extraction};
pub use parser::{decompose, AttachmentPart, Part};
pub use scanner::{run, MailboxScanner, ScanReport};
pub use seqset::SeqSet;
pub use session::{FetchedMessage, MailSession, MailboxStats};
