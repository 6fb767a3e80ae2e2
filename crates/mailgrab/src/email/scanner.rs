//! Mailbox scanner that drives one extraction run over a session.

use std::path::{Path, PathBuf};

use tracing::{debug, debug_span, error, info, info_span, warn, Instrument};

use crate::config::Config;

use super::cleanup::CleanupCoordinator;
use super::client::ImapClient;
use super::error::{EmailError, Result};
use super::extractor::AttachmentExtractor;
use super::fetcher;
use super::session::MailSession;

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Messages in the mailbox when it was selected.
    pub messages: u32,
    /// Messages whose structure decomposed successfully.
    pub processed: usize,
    pub attachments_saved: usize,
    pub decompose_failures: usize,
    pub part_failures: usize,
    /// Attachment parts skipped because they carried no filename.
    pub unnamed_attachments: usize,
    /// Messages flagged `\Deleted` and expunged.
    pub deleted: usize,
    /// Files written, in save order.
    pub saved_files: Vec<PathBuf>,
}

/// Scanner for one mailbox.
#[derive(Debug, Clone)]
pub struct MailboxScanner {
    mailbox: String,
    delete: bool,
    extractor: AttachmentExtractor,
}

impl MailboxScanner {
    pub fn new<P: AsRef<Path>>(mailbox: impl Into<String>, dir: P, delete: bool) -> Self {
        Self {
            mailbox: mailbox.into(),
            delete,
            extractor: AttachmentExtractor::new(dir),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.input.imap.mailbox.clone(),
            &config.input.dir,
            config.input.imap.delete,
        )
    }

    /// Runs the scan and then logs the session out.
    ///
    /// Logout is attempted exactly once whatever the outcome; a logout
    /// failure is logged and never replaces the scan's own result.
    pub async fn scan<S: MailSession + ?Sized>(&self, session: &mut S) -> Result<ScanReport> {
        let span = info_span!("mailbox_scan", mailbox = %self.mailbox);
        let outcome = self.scan_mailbox(session).instrument(span).await;

        debug!("logout");
        match session.logout().await {
            Ok(()) => debug!("logged out"),
            Err(e) => warn!("logout error {}", e),
        }

        outcome
    }

    async fn scan_mailbox<S: MailSession + ?Sized>(&self, session: &mut S) -> Result<ScanReport> {
        let dir = self.extractor.dir();
        std::fs::create_dir_all(dir).map_err(|source| EmailError::Destination {
            path: dir.to_path_buf(),
            source,
        })?;

        let stats = session.select(&self.mailbox).await?;
        if stats.messages == 0 {
            return Err(EmailError::EmptyMailbox(self.mailbox.clone()));
        }
        match stats.first_unseen {
            Some(seq) => info!(
                "found {} messages, first unseen is message {}",
                stats.messages, seq
            ),
            None => info!("found {} messages", stats.messages),
        }

        let mut report = ScanReport {
            messages: stats.messages,
            ..ScanReport::default()
        };
        let mut cleanup = CleanupCoordinator::new(self.delete);

        fetcher::stream_messages(session, stats.messages, |seq, raw| {
            let _span = debug_span!("message", seq).entered();
            match self.extractor.extract(seq, raw) {
                Ok(extraction) => {
                    report.processed += 1;
                    report.part_failures += extraction.failed;
                    report.unnamed_attachments += extraction.unnamed;
                    if extraction.any_saved() {
                        cleanup.record(seq);
                    }
                    report.attachments_saved += extraction.saved.len();
                    report.saved_files.extend(extraction.saved);
                }
                Err(e) => {
                    error!("{}, skip", e);
                    report.decompose_failures += 1;
                }
            }
        })
        .await?;

        info!(
            "processed {} of {} messages, saved {} attachments ({} messages failed to parse, {} attachments failed to save)",
            report.processed,
            report.messages,
            report.attachments_saved,
            report.decompose_failures,
            report.part_failures
        );

        report.deleted = cleanup.finish(session).await?;

        Ok(report)
    }
}

/// Connects with the configured credentials and scans the configured mailbox.
pub async fn run(config: &Config) -> crate::Result<ScanReport> {
    let scanner = MailboxScanner::from_config(config);
    let mut client = ImapClient::connect(&config.input.imap).await?;
    Ok(scanner.scan(&mut client).await?)
}
