//! The default consumer: log every record.

use std::convert::Infallible;
use std::sync::Arc;

use message_record::{Body, MessageRecord};

/// A sink that logs each record at `info`.
pub fn log_record(
    label: Arc<str>,
) -> impl FnMut(MessageRecord) -> std::future::Ready<Result<(), Infallible>> + Send {
    move |record| {
        tracing::info!(
            mailbox = %label,
            uid = record.uid,
            message_id = record.message_id.as_deref().unwrap_or("-"),
            from = record.sender.as_deref().unwrap_or("-"),
            to = %record.recipients.join(", "),
            date = %record.timestamp.map(|date| date.to_rfc2822()).unwrap_or_default(),
            subject = record.subject.as_deref().unwrap_or(""),
            body = %summarize_body(&record.body),
            attachments = %describe_attachments(&record),
            "new mail"
        );
        std::future::ready(Ok(()))
    }
}

/// The body as one log-friendly line.
fn summarize_body(body: &Body) -> String {
    match body {
        Body::Text(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Body::HtmlExcerpt { excerpt, truncated } => {
            let excerpt = excerpt.split_whitespace().collect::<Vec<_>>().join(" ");
            if *truncated {
                format!("{excerpt}...")
            } else {
                excerpt
            }
        }
        Body::Empty => String::new(),
    }
}

/// Attachments as `name (N bytes)`, comma separated.
fn describe_attachments(record: &MessageRecord) -> String {
    record
        .attachments
        .iter()
        .map(|attachment| format!("{} ({} bytes)", attachment.filename, attachment.size))
        .collect::<Vec<_>>()
        .join(", ")
}
