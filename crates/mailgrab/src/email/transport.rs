//! Byte streams under the IMAP session: dialing, TLS, STARTTLS and wire tracing.

use std::borrow::Cow;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_native_tls::TlsConnector;
use futures_util::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use log::{debug, trace, warn};

use super::error::{EmailError, Result};

/// Async TCP stream (async-io reactor, usable from any executor).
pub type TcpStream = async_io::Async<std::net::TcpStream>;

/// TLS stream over [`TcpStream`].
pub type TlsStream = async_native_tls::TlsStream<TcpStream>;

const WIRE_TARGET: &str = "mailgrab::wire";

/// The stream handed to `async_imap::Client`, encrypted or not.
pub struct ImapStream {
    inner: Inner,
    trace: bool,
}

enum Inner {
    Tls(Box<TlsStream>),
    Plain(TcpStream),
}

impl ImapStream {
    pub fn tls(stream: TlsStream) -> Self {
        Self {
            inner: Inner::Tls(Box::new(stream)),
            trace: false,
        }
    }

    pub fn plain(stream: TcpStream) -> Self {
        Self {
            inner: Inner::Plain(stream),
            trace: false,
        }
    }

    /// Logs every line read or written at `trace` level.
    pub fn traced(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner {
            Inner::Tls(_) => write!(f, "ImapStream::Tls"),
            Inner::Plain(_) => write!(f, "ImapStream::Plain"),
        }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = match &mut this.inner {
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            Inner::Plain(s) => Pin::new(s).poll_read(cx, buf),
        };
        if this.trace {
            if let Poll::Ready(Ok(n)) = &poll {
                log_wire("S:", &buf[..*n]);
            }
        }
        poll
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = match &mut this.inner {
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            Inner::Plain(s) => Pin::new(s).poll_write(cx, buf),
        };
        if this.trace {
            if let Poll::Ready(Ok(n)) = &poll {
                log_wire("C:", &buf[..*n]);
            }
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            Inner::Plain(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_close(cx),
            Inner::Plain(s) => Pin::new(s).poll_close(cx),
        }
    }
}

fn log_wire(direction: &str, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    for line in text.split_terminator('\n') {
        let line = line.trim_end_matches('\r');
        trace!(target: WIRE_TARGET, "{} {}", direction, redact_credentials(line));
    }
}

/// Hides the arguments of a `LOGIN` command.
fn redact_credentials(line: &str) -> Cow<'_, str> {
    let mut words = line.splitn(3, ' ');
    match (words.next(), words.next()) {
        (Some(tag), Some(command)) if command.eq_ignore_ascii_case("LOGIN") => {
            Cow::Owned(format!("{} {} <redacted>", tag, command))
        }
        _ => Cow::Borrowed(line),
    }
}

/// Opens a TCP connection to `host:port`.
pub(crate) fn dial(host: &str, port: u16) -> Result<TcpStream> {
    let std_stream = std::net::TcpStream::connect((host, port))
        .map_err(|e| EmailError::ConnectionFailed(format!("{}:{}: {}", host, port, e)))?;
    std_stream
        .set_nonblocking(true)
        .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
    async_io::Async::new(std_stream).map_err(|e| EmailError::ConnectionFailed(e.to_string()))
}

/// Runs the TLS handshake over an established TCP stream.
pub(crate) async fn tls_handshake(host: &str, tcp: TcpStream) -> Result<TlsStream> {
    debug!("TLS handshake with {}", host);
    Ok(TlsConnector::new().connect(host, tcp).await?)
}

/// Performs the cleartext half of STARTTLS and returns the raw stream, ready
/// for the TLS handshake.
///
/// Consumes the server greeting, so the IMAP client built on the upgraded
/// stream must not wait for another one. Fails when the server does not
/// advertise `STARTTLS`, refuses the command, or sends anything after the
/// OK; in those cases a `LOGOUT` is attempted before the error is returned.
pub(crate) async fn negotiate_starttls(tcp: TcpStream) -> Result<TcpStream> {
    let mut conn = BufReader::new(tcp);

    let greeting = read_line(&mut conn).await?;
    if !is_ok_greeting(&greeting) {
        return Err(EmailError::ConnectionFailed(format!(
            "unexpected greeting: {}",
            greeting.trim_end()
        )));
    }

    if let Err(e) = request_upgrade(&mut conn).await {
        abandon_plain_session(&mut conn).await;
        return Err(e);
    }

    if !conn.buffer().is_empty() {
        abandon_plain_session(&mut conn).await;
        return Err(EmailError::TlsError(
            "server sent data before the TLS handshake".to_string(),
        ));
    }

    Ok(conn.into_inner())
}

async fn request_upgrade(conn: &mut BufReader<TcpStream>) -> Result<()> {
    let capabilities = run_plain_command(conn, "m1", "CAPABILITY").await?;
    if !supports_starttls(&capabilities) {
        return Err(EmailError::TlsError(
            "server doesn't support starttls".to_string(),
        ));
    }

    run_plain_command(conn, "m2", "STARTTLS").await?;
    Ok(())
}

/// Best-effort `LOGOUT` on a connection that will not be upgraded.
async fn abandon_plain_session(conn: &mut BufReader<TcpStream>) {
    match run_plain_command(conn, "m3", "LOGOUT").await {
        Ok(_) => debug!("Logged out of cleartext session"),
        Err(e) => warn!("Logout after failed STARTTLS negotiation failed: {}", e),
    }
}

/// Sends one command and collects untagged lines until its tagged completion.
async fn run_plain_command(
    conn: &mut BufReader<TcpStream>,
    tag: &str,
    command: &str,
) -> Result<Vec<String>> {
    debug!("C: {} {}", tag, command);
    let stream = conn.get_mut();
    stream
        .write_all(format!("{} {}\r\n", tag, command).as_bytes())
        .await
        .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

    let mut untagged = Vec::new();
    loop {
        let line = read_line(conn).await?;
        match tagged_status(&line, tag) {
            Some(status) if status.eq_ignore_ascii_case("OK") => return Ok(untagged),
            Some(_) => {
                return Err(EmailError::ProtocolError(format!(
                    "{} rejected: {}",
                    command,
                    line.trim_end()
                )))
            }
            None => untagged.push(line),
        }
    }
}

async fn read_line(conn: &mut BufReader<TcpStream>) -> Result<String> {
    let mut line = String::new();
    let n = conn
        .read_line(&mut line)
        .await
        .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
    if n == 0 {
        return Err(EmailError::ConnectionFailed(
            "connection closed by server".to_string(),
        ));
    }
    Ok(line)
}

fn is_ok_greeting(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("*") && words.next().is_some_and(|w| w.eq_ignore_ascii_case("OK"))
}

/// Returns the status word (`OK`, `NO`, `BAD`) of a tagged response line.
fn tagged_status<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix(tag)?
        .strip_prefix(' ')?
        .split_whitespace()
        .next()
}

/// Scans untagged `* CAPABILITY` lines for `STARTTLS`.
fn supports_starttls(untagged: &[String]) -> bool {
    untagged.iter().any(|line| {
        let mut words = line.split_whitespace();
        words.next() == Some("*")
            && words.next().is_some_and(|w| w.eq_ignore_ascii_case("CAPABILITY"))
            && words.any(|cap| cap.eq_ignore_ascii_case("STARTTLS"))
    })
}
