//! Deleting processed messages from the server.

use tracing::{debug, info};

use super::error::Result;
use super::seqset::SeqSet;
use super::session::MailSession;

/// Collects the messages that yielded at least one saved attachment and,
/// when deletion is enabled, removes them in one flag-then-expunge pass.
#[derive(Debug, Default)]
pub struct CleanupCoordinator {
    enabled: bool,
    pending: SeqSet,
}

impl CleanupCoordinator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: SeqSet::new(),
        }
    }

    /// Marks `seq` as processed.
    pub fn record(&mut self, seq: u32) {
        if self.pending.insert(seq) {
            debug!("add SeqNum {} to delete set", seq);
        }
    }

    pub fn pending(&self) -> &SeqSet {
        &self.pending
    }

    /// Flags every pending message `\Deleted`, then expunges.
    ///
    /// Nothing is sent when deletion is disabled or no message is pending.
    /// Expunge is only issued once the flag command succeeded. Returns the
    /// number of messages that were flagged.
    pub async fn finish<S: MailSession + ?Sized>(&self, session: &mut S) -> Result<usize> {
        if !self.enabled {
            debug!("deletion disabled, keeping {} processed messages", self.pending.len());
            return Ok(0);
        }
        if self.pending.is_empty() {
            debug!("no processed messages to delete");
            return Ok(0);
        }

        info!("delete {} processed messages", self.pending.len());
        session.mark_deleted(&self.pending).await?;
        let removed = session.expunge().await?;
        debug!("server expunged {} messages", removed);
        Ok(self.pending.len())
    }
}
