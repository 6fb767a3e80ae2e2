//! Raw message builders.

#![allow(dead_code)]

/// Builder for a `multipart/mixed` message.
pub struct MessageBuilder {
    subject: String,
    text: Option<String>,
    attachments: Vec<(Option<String>, String, Vec<u8>)>,
}

impl MessageBuilder {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            text: Some("Please find the report attached.".to_string()),
            attachments: Vec::new(),
        }
    }

    /// Drop the leading text/plain part.
    pub fn without_text(mut self) -> Self {
        self.text = None;
        self
    }

    /// Add an `application/xml` attachment.
    pub fn attachment(mut self, filename: &str, content: &str) -> Self {
        self.attachments.push((
            Some(filename.to_string()),
            "application/xml".to_string(),
            content.as_bytes().to_vec(),
        ));
        self
    }

    /// Add an attachment part with no filename at all.
    pub fn unnamed_attachment(mut self, content: &str) -> Self {
        self.attachments.push((
            None,
            "application/octet-stream".to_string(),
            content.as_bytes().to_vec(),
        ));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut raw = format!(
            "From: noreply-dmarc@example.org\r\n\
To: reports@example.com\r\n\
Subject: {}\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"=_boundary\"\r\n\
\r\n",
            self.subject
        );

        if let Some(text) = &self.text {
            raw.push_str(&format!(
                "--=_boundary\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
                text
            ));
        }

        for (filename, content_type, content) in &self.attachments {
            raw.push_str("--=_boundary\r\n");
            raw.push_str(&format!("Content-Type: {}\r\n", content_type));
            match filename {
                Some(name) => raw.push_str(&format!(
                    "Content-Disposition: attachment; filename=\"{}\"\r\n",
                    name
                )),
                None => raw.push_str("Content-Disposition: attachment\r\n"),
            }
            raw.push_str("\r\n");
            raw.push_str(&String::from_utf8_lossy(content));
            raw.push_str("\r\n");
        }

        raw.push_str("--=_boundary--\r\n");
        raw.into_bytes()
    }
}

/// A message carrying one XML attachment.
pub fn report_message(filename: &str, content: &str) -> Vec<u8> {
    MessageBuilder::new(&format!("Report {}", filename))
        .attachment(filename, content)
        .build()
}

/// A plain text message without attachments.
pub fn text_message(body: &str) -> Vec<u8> {
    format!(
        "From: someone@example.org\r\nTo: reports@example.com\r\nSubject: hello\r\n\r\n{}\r\n",
        body
    )
    .into_bytes()
}

/// A message whose header section cannot be decomposed. The body still looks
/// like an attachment, so any file written from it would be a leak.
pub fn malformed_message() -> Vec<u8> {
    b"this line is not a header\r\n\
Content-Type: application/xml\r\n\
Content-Disposition: attachment; filename=\"leak.xml\"\r\n\
\r\n\
<feedback/>\r\n"
        .to_vec()
}
