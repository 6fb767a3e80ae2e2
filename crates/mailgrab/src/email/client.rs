//! IMAP client for connecting to the mail server.

use async_imap::imap_proto::{AttributeValue, Response, Status};
use async_imap::Session;
use async_trait::async_trait;
use log::{debug, info, trace, warn};
use secrecy::ExposeSecret;
use tokio::sync::mpsc;

use crate::config::{ImapConfig, Security};

use super::error::{CleanupStep, EmailError, Result};
use super::seqset::SeqSet;
use super::session::{FetchedMessage, MailSession, MailboxStats};
use super::transport::{self, ImapStream};

/// Fetch item for the complete raw message, headers and body.
const FULL_BODY: &str = "BODY[]";

/// An authenticated IMAP session.
pub struct ImapClient {
    session: Option<Session<ImapStream>>,
}

impl ImapClient {
    /// Dials the server under the configured security policy and logs in.
    ///
    /// If login fails, the unauthenticated connection is logged out before
    /// the error is returned.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let password = config
            .resolve_password()
            .map_err(|e| EmailError::CredentialsNotFound(e.to_string()))?;
        if config.password.as_deref().is_some_and(|p| !p.is_empty()) {
            warn!(
                "Using an inline password is not recommended. \
                 Consider using passwordEnvVar or passwordFile instead."
            );
        }

        let (host, port) = config
            .address()
            .map_err(|e| EmailError::ConfigError(e.to_string()))?;
        info!("imap: connecting to server {}:{}", host, port);

        let stream = open_stream(&host, port, config.security)
            .await?
            .traced(config.debug);
        debug!(
            "imap: connected ({})",
            if stream.is_encrypted() { "encrypted" } else { "cleartext" }
        );
        if config.debug {
            debug!("imap: enable debug, protocol lines are logged at trace level");
        }

        let client = async_imap::Client::new(stream);
        let session = match client.login(&config.username, password.expose_secret()).await {
            Ok(session) => session,
            Err((e, mut client)) => {
                debug!("imap: logout");
                if let Err(logout_err) = client.run_command_and_check_ok("LOGOUT", None).await {
                    log::error!("imap: logout error {}", logout_err);
                }
                return Err(EmailError::AuthenticationFailed(e.to_string()));
            }
        };
        info!("imap: logged in as {}", config.username);

        Ok(Self {
            session: Some(session),
        })
    }

    fn session(&mut self) -> Result<&mut Session<ImapStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| EmailError::ConnectionFailed("Not connected".to_string()))
    }
}

/// Opens the byte stream for `policy`. STARTTLS failures abandon the
/// cleartext session before returning.
async fn open_stream(host: &str, port: u16, policy: Security) -> Result<ImapStream> {
    let tcp = transport::dial(host, port)?;
    match policy {
        Security::Tls => {
            let tls = transport::tls_handshake(host, tcp).await?;
            Ok(ImapStream::tls(tls))
        }
        Security::StartTls => {
            let tcp = transport::negotiate_starttls(tcp).await?;
            let tls = transport::tls_handshake(host, tcp).await?;
            Ok(ImapStream::tls(tls))
        }
        Security::Plaintext => {
            warn!("Without encryption your credentials may be stolen. Be careful!");
            Ok(ImapStream::plain(tcp))
        }
    }
}

/// Returns the complete message from a FETCH response, if the server sent one.
fn full_body<'a>(attributes: &'a [AttributeValue<'_>]) -> Option<&'a [u8]> {
    attributes.iter().find_map(|attribute| match attribute {
        AttributeValue::BodySection {
            section: None,
            data: Some(body),
            ..
        } => Some(body.as_ref()),
        AttributeValue::Rfc822(Some(body)) => Some(body.as_ref()),
        _ => None,
    })
}

/// Maps a tagged completion to `Ok` only for an OK status.
fn completed(
    command: &str,
    status: &Status,
    information: Option<&str>,
) -> std::result::Result<(), String> {
    match status {
        Status::Ok => Ok(()),
        other => Err(format!(
            "{} failed: {:?} {}",
            command,
            other,
            information.unwrap_or("")
        )),
    }
}

#[async_trait(?Send)]
impl MailSession for ImapClient {
    async fn select(&mut self, mailbox: &str) -> Result<MailboxStats> {
        let session = self.session()?;
        debug!("imap: selecting mailbox {}", mailbox);

        let selected = session
            .select(mailbox)
            .await
            .map_err(|e| EmailError::MailboxUnavailable {
                mailbox: mailbox.to_string(),
                reason: e.to_string(),
            })?;

        Ok(MailboxStats {
            messages: selected.exists,
            first_unseen: selected.unseen,
        })
    }

    async fn fetch_bodies(
        &mut self,
        count: u32,
        sink: mpsc::Sender<FetchedMessage>,
    ) -> Result<()> {
        let session = self.session()?;
        let command = format!("FETCH 1:{} {}", count, FULL_BODY);
        debug!("imap: {}", command);

        let protocol_err = EmailError::ProtocolError;
        let tag = session
            .run_command(&command)
            .await
            .map_err(|e| protocol_err(e.to_string()))?;

        let mut consumer_gone = false;
        loop {
            let response = session
                .read_response()
                .await
                .map_err(|e| protocol_err(e.to_string()))?
                .ok_or_else(|| protocol_err("connection lost during FETCH".to_string()))?;

            match response.parsed() {
                Response::Fetch(seq, attributes) if !consumer_gone => {
                    let message = FetchedMessage {
                        seq: *seq,
                        body: full_body(attributes).map(<[u8]>::to_vec),
                    };
                    if sink.send(message).await.is_err() {
                        debug!("imap: message consumer stopped, draining fetch");
                        consumer_gone = true;
                    }
                }
                Response::Done {
                    tag: done,
                    status,
                    information,
                    ..
                } if *done == tag => {
                    return completed("FETCH", status, information.as_deref())
                        .map_err(protocol_err);
                }
                Response::Data {
                    status: Status::Bye,
                    information,
                    ..
                } => {
                    return Err(protocol_err(format!(
                        "server closed the connection during FETCH: {}",
                        information.as_deref().unwrap_or("BYE")
                    )));
                }
                other => trace!("imap: ignoring response during FETCH: {:?}", other),
            }
        }
    }

    async fn mark_deleted(&mut self, set: &SeqSet) -> Result<()> {
        let session = self.session()?;
        session
            .run_command_and_check_ok(format!("STORE {} +FLAGS.SILENT (\\Deleted)", set))
            .await
            .map_err(|e| EmailError::CleanupFailed {
                step: CleanupStep::Flag,
                reason: e.to_string(),
            })
    }

    async fn expunge(&mut self) -> Result<usize> {
        let session = self.session()?;
        let expunge_err = |reason: String| EmailError::CleanupFailed {
            step: CleanupStep::Expunge,
            reason,
        };

        let tag = session
            .run_command("EXPUNGE")
            .await
            .map_err(|e| expunge_err(e.to_string()))?;

        let mut removed = 0;
        loop {
            let response = session
                .read_response()
                .await
                .map_err(|e| expunge_err(e.to_string()))?
                .ok_or_else(|| expunge_err("connection lost during EXPUNGE".to_string()))?;

            match response.parsed() {
                Response::Expunge(_) => removed += 1,
                Response::Done {
                    tag: done,
                    status,
                    information,
                    ..
                } if *done == tag => {
                    completed("EXPUNGE", status, information.as_deref()).map_err(expunge_err)?;
                    return Ok(removed);
                }
                other => trace!("imap: ignoring response during EXPUNGE: {:?}", other),
            }
        }
    }

    async fn logout(&mut self) -> Result<()> {
        match self.session.take() {
            Some(mut session) => session
                .logout()
                .await
                .map_err(|e| EmailError::ProtocolError(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without logout - connection will be closed");
        }
    }
}
