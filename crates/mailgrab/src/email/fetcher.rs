//! Streaming message bodies from the session to a consumer.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::error::{EmailError, Result};
use super::session::{FetchedMessage, MailSession};

/// Messages buffered between the fetch and the consumer. The fetch never
/// runs more than one message ahead of processing.
pub const STREAM_DEPTH: usize = 1;

/// Fetches messages `1..=count` and hands each body to `on_message` in
/// arrival order.
///
/// The fetch reports its outcome on a separate completion channel, which is
/// read only after every delivered message has been consumed. A message that
/// arrives without a body stops the stream with a protocol error, and so does
/// a fetch that completes with fewer than `count` messages. Returns the number
/// of messages delivered.
pub async fn stream_messages<S, F>(session: &mut S, count: u32, mut on_message: F) -> Result<u32>
where
    S: MailSession + ?Sized,
    F: FnMut(u32, &[u8]),
{
    let (tx, mut rx) = mpsc::channel::<FetchedMessage>(STREAM_DEPTH);
    let (done_tx, done_rx) = oneshot::channel::<Result<()>>();

    let producer = async move {
        let outcome = session.fetch_bodies(count, tx).await;
        if done_tx.send(outcome).is_err() {
            debug!("fetch finished after the consumer stopped");
        }
    };

    let consumer = async move {
        let mut delivered: u32 = 0;
        while let Some(message) = rx.recv().await {
            let body = match message.body {
                Some(body) => body,
                None => {
                    return Err(EmailError::ProtocolError(format!(
                        "server didn't return message body for message {}",
                        message.seq
                    )))
                }
            };
            on_message(message.seq, &body);
            delivered += 1;
        }

        match done_rx.await {
            Ok(Ok(())) if delivered != count => Err(EmailError::ProtocolError(format!(
                "server delivered {} of {} messages",
                delivered, count
            ))),
            Ok(outcome) => outcome.map(|()| delivered),
            Err(_) => Err(EmailError::ProtocolError(
                "fetch ended without reporting completion".to_string(),
            )),
        }
    };

    let ((), outcome) = tokio::join!(producer, consumer);
    outcome
}
