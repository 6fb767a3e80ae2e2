//! The command surface the import pipeline needs from an IMAP session.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::Result;
use super::seqset::SeqSet;

/// Counters reported when a mailbox is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStats {
    /// Number of messages (`EXISTS`).
    pub messages: u32,
    /// Sequence number of the first unseen message, from the `UNSEEN`
    /// response code. Not a count.
    pub first_unseen: Option<u32>,
}

/// One message as delivered by a fetch.
///
/// `body` is `None` when the server answered without the requested body
/// section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub seq: u32,
    pub body: Option<Vec<u8>>,
}

/// An authenticated session with one selectable mailbox.
///
/// Implemented by [`ImapClient`](super::client::ImapClient) over the network
/// and by in-memory fakes in tests. Sequence numbers are only meaningful
/// while the mailbox selected by [`select`](MailSession::select) stays
/// selected.
#[async_trait(?Send)]
pub trait MailSession {
    /// Selects `mailbox` read-write.
    async fn select(&mut self, mailbox: &str) -> Result<MailboxStats>;

    /// Fetches the full raw body of messages `1..=count`.
    ///
    /// Each message is pushed into `sink` as it arrives; the call returns
    /// once the server has completed the command. A closed `sink` means the
    /// consumer gave up and the fetch should stop.
    async fn fetch_bodies(&mut self, count: u32, sink: mpsc::Sender<FetchedMessage>)
        -> Result<()>;

    /// Adds the `\Deleted` flag to every message in `set`.
    async fn mark_deleted(&mut self, set: &SeqSet) -> Result<()>;

    /// Permanently removes all `\Deleted` messages. Returns how many went.
    async fn expunge(&mut self) -> Result<usize>;

    /// Ends the session.
    async fn logout(&mut self) -> Result<()>;
}
