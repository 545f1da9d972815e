//! Delivery of unseen messages to the consumer.

use std::future::Future;

use imap_failure::{Cause, Classify, Failure};
use message_record::MessageRecord;

/// The consumer of message records.
///
/// Implemented for any `FnMut(MessageRecord) -> impl Future<Output =
/// Result<(), E>>` closure.
pub trait Sink {
    /// Error the consumer may fail with.
    type Error: std::fmt::Display;

    /// Hand a record over to the consumer.
    fn deliver(
        &mut self,
        record: MessageRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl<F, Fut, E> Sink for F
where
    F: FnMut(MessageRecord) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::fmt::Display,
{
    type Error = E;

    fn deliver(
        &mut self,
        record: MessageRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        (self)(record)
    }
}

/// A raw message as fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// The UID of the message.
    pub uid: u32,

    /// The full RFC 5322 message, if the server returned one.
    pub body: Option<Vec<u8>>,

    /// The server's internal date of the message.
    pub internal_date: Option<chrono::DateTime<chrono::FixedOffset>>,
}

/// The result of fetching one message.
#[derive(Debug)]
pub enum Fetched {
    /// The message.
    Message(RawMessage),

    /// The message no longer exists.
    Vanished,

    /// The server refused to return this message. The session stays usable.
    Refused(Cause),

    /// The message did not arrive within the I/O bound.
    Stalled(Cause),
}

/// The mailbox commands a drain needs, against the selected folder.
pub trait UnseenMailbox {
    /// Error the commands may fail with.
    type Error: Classify + std::error::Error + Send + Sync + 'static;

    /// UIDs of the messages currently flagged unseen (`UID SEARCH UNSEEN`).
    fn search_unseen(&mut self) -> impl Future<Output = Result<Vec<u32>, Self::Error>> + Send;

    /// Fetch one message without setting its seen flag.
    ///
    /// Errors that only concern this message are reported through
    /// [`Fetched`]; `Err` means the session is no longer usable.
    fn fetch(&mut self, uid: u32) -> impl Future<Output = Result<Fetched, Self::Error>> + Send;

    /// Flag the message seen (`UID STORE +FLAGS (\Seen)`).
    fn mark_seen(&mut self, uid: u32) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// What a drain did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records the sink accepted.
    pub delivered: usize,

    /// Records the sink failed on.
    pub sink_failed: usize,

    /// Messages that could not be turned into a record.
    pub unparsable: usize,

    /// Messages the server refused to return.
    pub refused: usize,

    /// Messages that did not arrive in time. Left unseen.
    pub stalled: usize,

    /// Messages that disappeared between search and fetch.
    pub vanished: usize,
}

impl DrainReport {
    /// Number of messages the drain flagged seen.
    pub const fn marked_seen(&self) -> usize {
        self.delivered + self.sink_failed + self.unparsable + self.refused
    }
}

/// Deliver every unseen message to the sink, oldest first, flagging each
/// seen once the sink call for it has returned.
///
/// A sink error for one message is logged and does not stop the drain, and
/// neither does a fetch the server refuses (flagged seen) or one that stalls
/// (left unseen). Other mailbox command errors abort the drain; messages not
/// yet flagged seen are delivered again by the next drain.
pub async fn drain_unseen<Mailbox, S>(
    mailbox: &mut Mailbox,
    sink: &mut S,
) -> Result<DrainReport, Failure>
where
    Mailbox: UnseenMailbox,
    S: Sink,
{
    let mut uids = mailbox
        .search_unseen()
        .await
        .map_err(Failure::classified)?;

    // UIDs grow with arrival order.
    uids.sort_unstable();
    uids.dedup();

    tracing::debug!(unseen = uids.len(), "draining unseen messages");

    let mut report = DrainReport::default();

    for uid in uids {
        let raw = match mailbox.fetch(uid).await.map_err(Failure::classified)? {
            Fetched::Message(raw) => raw,
            Fetched::Vanished => {
                tracing::debug!(uid, "message vanished before it could be fetched");
                report.vanished += 1;
                continue;
            }
            Fetched::Refused(error) => {
                tracing::warn!(uid, %error, "server refused to return message, skipping it");
                report.refused += 1;
                mailbox.mark_seen(uid).await.map_err(Failure::classified)?;
                continue;
            }
            Fetched::Stalled(error) => {
                tracing::warn!(uid, %error, "message fetch stalled, leaving it unseen");
                report.stalled += 1;
                continue;
            }
        };

        let record = match raw.body {
            Some(body) => MessageRecord::from_rfc822(uid, &body, raw.internal_date),
            None => Err(message_record::ParseError::MissingBody { uid }),
        };

        match record {
            Ok(record) => match sink.deliver(record).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!(uid, %error, "sink failed on message, continuing");
                    report.sink_failed += 1;
                }
            },
            Err(error) => {
                tracing::warn!(uid, %error, "skipping message that cannot be turned into a record");
                report.unparsable += 1;
            }
        }

        mailbox.mark_seen(uid).await.map_err(Failure::classified)?;
    }

    Ok(report)
}
