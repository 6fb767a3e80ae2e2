//! In-memory mail session.

#![allow(dead_code)]

use async_trait::async_trait;
use tokio::sync::mpsc;

use mailgrab::email::error::{CleanupStep, EmailError, Result};
use mailgrab::email::{FetchedMessage, MailSession, MailboxStats, SeqSet};

/// A command the scanner sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Select(String),
    Fetch(u32),
    Store(String),
    Expunge,
    Logout,
}

/// A mailbox served from memory, with switches for server misbehaviour.
#[derive(Debug, Default)]
pub struct FakeMailbox {
    /// Message bodies by position; `None` is a message without a body.
    pub messages: Vec<Option<Vec<u8>>>,
    pub first_unseen: Option<u32>,
    pub calls: Vec<Call>,
    pub fail_select: bool,
    pub fail_store: bool,
    pub fail_expunge: bool,
    pub fail_logout: bool,
    /// Returned from the fetch after every message has been sent.
    pub stream_error: Option<String>,
    /// Caps how many messages the fetch sends before completing normally.
    pub fetch_limit: Option<usize>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Vec<u8>>) -> Self {
        Self {
            messages: messages.into_iter().map(Some).collect(),
            ..Self::default()
        }
    }

    pub fn push(mut self, raw: Vec<u8>) -> Self {
        self.messages.push(Some(raw));
        self
    }

    pub fn push_without_body(mut self) -> Self {
        self.messages.push(None);
        self
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn stores(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Store(set) => Some(set.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn fetched(&self) -> bool {
        self.calls.iter().any(|c| matches!(c, Call::Fetch(_)))
    }
}

#[async_trait(?Send)]
impl MailSession for FakeMailbox {
    async fn select(&mut self, mailbox: &str) -> Result<MailboxStats> {
        self.calls.push(Call::Select(mailbox.to_string()));
        if self.fail_select {
            return Err(EmailError::MailboxUnavailable {
                mailbox: mailbox.to_string(),
                reason: "NO [NONEXISTENT] Unknown Mailbox".to_string(),
            });
        }
        Ok(MailboxStats {
            messages: self.messages.len() as u32,
            first_unseen: self.first_unseen,
        })
    }

    async fn fetch_bodies(&mut self, count: u32, sink: mpsc::Sender<FetchedMessage>) -> Result<()> {
        self.calls.push(Call::Fetch(count));
        let limit = self.fetch_limit.unwrap_or(count as usize).min(count as usize);
        for (index, body) in self.messages.iter().take(limit).enumerate() {
            let message = FetchedMessage {
                seq: index as u32 + 1,
                body: body.clone(),
            };
            if sink.send(message).await.is_err() {
                return Ok(());
            }
        }
        match &self.stream_error {
            Some(reason) => Err(EmailError::ProtocolError(reason.clone())),
            None => Ok(()),
        }
    }

    async fn mark_deleted(&mut self, set: &SeqSet) -> Result<()> {
        self.calls.push(Call::Store(set.to_string()));
        if self.fail_store {
            return Err(EmailError::CleanupFailed {
                step: CleanupStep::Flag,
                reason: "NO STORE failed".to_string(),
            });
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<usize> {
        self.calls.push(Call::Expunge);
        if self.fail_expunge {
            return Err(EmailError::CleanupFailed {
                step: CleanupStep::Expunge,
                reason: "NO EXPUNGE failed".to_string(),
            });
        }
        Ok(self.stores().len())
    }

    async fn logout(&mut self) -> Result<()> {
        self.calls.push(Call::Logout);
        if self.fail_logout {
            return Err(EmailError::ProtocolError("connection reset".to_string()));
        }
        Ok(())
    }
}
