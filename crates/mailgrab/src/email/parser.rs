//! MIME decomposition of a raw message into informational and attachment parts.

use log::debug;
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};

use super::error::{EmailError, Result};

/// One leaf body segment of a message, in the order the message declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Body text or an inline part. Not saved.
    Informational { content_type: String },
    /// A part to be saved to disk.
    Attachment(AttachmentPart),
}

/// An attachment part: declared filename plus decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Filename from `Content-Disposition` or `Content-Type; name=`,
    /// `None` when neither declares one.
    pub filename: Option<String>,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Part {
    pub fn as_attachment(&self) -> Option<&AttachmentPart> {
        match self {
            Part::Attachment(attachment) => Some(attachment),
            Part::Informational { .. } => None,
        }
    }
}

/// Decomposes a raw RFC 5322 message into its leaf parts.
///
/// The header section is checked before anything is decoded, so a message
/// that fails here has produced no parts at all. A message without any
/// header fields has nothing to extract and yields no parts. Multipart
/// containers are walked, not returned; an embedded `message/rfc822` is a
/// single leaf.
pub fn decompose(raw: &[u8], seq: u32) -> Result<Vec<Part>> {
    let parse_error = |reason: String| EmailError::ParseError { seq, reason };

    if header_section(raw).iter().all(|b| b.is_ascii_whitespace()) {
        debug!("Message {} has no header fields, nothing to extract", seq);
        return Ok(Vec::new());
    }
    check_header_section(raw).map_err(parse_error)?;

    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| parse_error("unreadable message structure".to_string()))?;

    if let Some(root) = message.parts.first() {
        if let Some(ct) = root.content_type() {
            if ct.ctype().eq_ignore_ascii_case("multipart") && ct.attribute("boundary").is_none() {
                return Err(parse_error("multipart message without boundary".to_string()));
            }
        }
    }

    let parts: Vec<Part> = message
        .parts
        .iter()
        .filter(|part| !matches!(part.body, PartType::Multipart(_)))
        .map(classify)
        .collect();

    debug!(
        "Message {} decomposed into {} parts ({} attachments)",
        seq,
        parts.len(),
        parts.iter().filter(|p| p.as_attachment().is_some()).count()
    );
    Ok(parts)
}

/// An explicit `attachment` disposition always wins; otherwise anything not
/// marked `inline` and not `text/*` is treated as an attachment.
fn classify(part: &MessagePart) -> Part {
    let content_type = content_type_of(part);
    let disposition = part
        .content_disposition()
        .map(|d| d.ctype().to_ascii_lowercase());

    let is_attachment = match disposition.as_deref() {
        Some("attachment") => true,
        Some("inline") => false,
        _ => !content_type.starts_with("text/"),
    };

    if !is_attachment {
        return Part::Informational { content_type };
    }

    Part::Attachment(AttachmentPart {
        filename: part.attachment_name().map(|name| name.to_string()),
        content_type,
        content: part.contents().to_vec(),
    })
}

fn content_type_of(part: &MessagePart) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        })
        .map(|ct| ct.to_ascii_lowercase())
        .unwrap_or_else(|| "text/plain".to_string())
}

/// Rejects a header section that is not a sequence of `Name: value` fields
/// with optional folded continuation lines.
fn check_header_section(raw: &[u8]) -> std::result::Result<(), String> {
    let header = header_section(raw);
    for (index, line) in header.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        if line[0] == b' ' || line[0] == b'\t' {
            if index == 0 {
                return Err("header section starts with a continuation line".to_string());
            }
            continue;
        }

        let name_end = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| format!("malformed header line {}", index + 1))?;
        let name = &line[..name_end];
        if name.is_empty() || !name.iter().all(|&b| (33..=126).contains(&b)) {
            return Err(format!("malformed header field name on line {}", index + 1));
        }
    }

    Ok(())
}

/// The bytes before the first empty line (the whole input if there is none).
fn header_section(raw: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < raw.len() {
        let end = raw[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| start + p)
            .unwrap_or(raw.len());
        let line = &raw[start..end];
        if line.is_empty() || line == b"\r" {
            return &raw[..start];
        }
        start = end + 1;
    }
    raw
}
