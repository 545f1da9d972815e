//! Normalized representation of a newly arrived message.

use mail_parser::MimeHeaders as _;

/// Maximum number of characters of HTML kept when a message has no plain-text
/// body.
pub const HTML_EXCERPT_LIMIT: usize = 500;

/// A message as handed to the consumer.
///
/// Delivery is at-least-once: the same message may be handed over again if
/// the connection is lost between delivery and the seen-flag update. Use
/// [`MessageRecord::uid`] (stable within a folder) or
/// [`MessageRecord::message_id`] to deduplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// The IMAP UID of the message in the watched folder.
    pub uid: u32,

    /// The `Message-ID` header, if present.
    pub message_id: Option<String>,

    /// The sender, formatted as `Name <address>` or `address`.
    pub sender: Option<String>,

    /// `To` and `Cc` recipients, in header order.
    pub recipients: Vec<String>,

    /// The `Date` header, falling back to the server's internal date.
    pub timestamp: Option<chrono::DateTime<chrono::FixedOffset>>,

    /// The subject.
    pub subject: Option<String>,

    /// The selected body.
    pub body: Body,

    /// Attachments, in message order.
    pub attachments: Vec<Attachment>,
}

/// The body selected for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// The plain-text body.
    Text(String),

    /// The beginning of the HTML body, used when there is no plain-text one.
    HtmlExcerpt {
        /// Up to [`HTML_EXCERPT_LIMIT`] characters of HTML.
        excerpt: String,

        /// Whether the HTML was longer than the excerpt.
        truncated: bool,
    },

    /// Neither a plain-text nor an HTML body.
    Empty,
}

/// An attachment descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The file name, or `unnamed` when the part carries none.
    pub filename: String,

    /// Decoded size in bytes.
    pub size: usize,
}

/// Errors returned while building a record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// The server returned no message body.
    #[error("message {uid} has no body")]
    MissingBody {
        /// The UID of the message.
        uid: u32,
    },

    /// The raw message could not be parsed.
    #[error("message {uid} is not a parsable RFC 5322 message")]
    Unparsable {
        /// The UID of the message.
        uid: u32,
    },
}

impl MessageRecord {
    /// Build a record from a raw RFC 5322 message.
    pub fn from_rfc822(
        uid: u32,
        raw: &[u8],
        internal_date: Option<chrono::DateTime<chrono::FixedOffset>>,
    ) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::MissingBody { uid });
        }

        let message = mail_parser::MessageParser::default()
            .parse(raw)
            .ok_or(ParseError::Unparsable { uid })?;

        let sender = message
            .from()
            .and_then(|from| from.iter().next())
            .map(format_addr);

        let recipients = [message.to(), message.cc()]
            .into_iter()
            .flatten()
            .flat_map(|list| list.iter())
            .map(format_addr)
            .collect();

        let timestamp = message
            .date()
            .and_then(|date| chrono::DateTime::parse_from_rfc3339(&date.to_rfc3339()).ok())
            .or(internal_date);

        let attachments = message
            .attachments()
            .map(|part| Attachment {
                filename: part.attachment_name().unwrap_or("unnamed").to_owned(),
                size: part.len(),
            })
            .collect();

        Ok(Self {
            uid,
            message_id: message.message_id().map(str::to_owned),
            sender,
            recipients,
            timestamp,
            subject: message.subject().map(str::to_owned),
            body: select_body(&message),
            attachments,
        })
    }
}

/// Prefer plain text, else an HTML excerpt.
fn select_body(message: &mail_parser::Message<'_>) -> Body {
    let text = message.text_bodies().find_map(|part| match &part.body {
        mail_parser::PartType::Text(text) => Some(text),
        _ => None,
    });
    if let Some(text) = text {
        return Body::Text(text.to_string());
    }

    let html = message.html_bodies().find_map(|part| match &part.body {
        mail_parser::PartType::Html(html) => Some(html),
        _ => None,
    });
    match html {
        Some(html) => html_excerpt(html),
        None => Body::Empty,
    }
}

/// Cut the HTML at a character boundary.
fn html_excerpt(html: &str) -> Body {
    match html.char_indices().nth(HTML_EXCERPT_LIMIT) {
        Some((end, _)) => Body::HtmlExcerpt {
            excerpt: html[..end].to_owned(),
            truncated: true,
        },
        None => Body::HtmlExcerpt {
            excerpt: html.to_owned(),
            truncated: false,
        },
    }
}

/// Format an address as `Name <address>` or `address`.
fn format_addr(addr: &mail_parser::Addr<'_>) -> String {
    let address = addr.address.as_deref().unwrap_or_default();
    match addr.name.as_deref() {
        Some(name) if !name.is_empty() => format!("{name} <{address}>"),
        _ => address.to_owned(),
    }
}
