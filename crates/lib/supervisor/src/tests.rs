use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use imap_failure::Classify;
use message_processor::{Fetched, RawMessage, UnseenMailbox};
use message_record::MessageRecord;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::*;

/// Something the fake server observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Session opened.
    Open(usize),

    /// Session closed.
    Close(usize),

    /// A drain started.
    DrainStart,

    /// A drain ended.
    DrainEnd,

    /// An idle wait with this bound started.
    Idle(Duration),

    /// A reconnect cooldown of this length started.
    Cooldown(Duration),
}

/// How the next idle wait ends.
#[derive(Debug, Clone, Copy)]
enum IdleStep {
    /// Nothing happens.
    Quiet,

    /// A message arrives.
    NewMail {
        /// Delay from the start of the wait.
        after: Duration,

        /// The new message.
        uid: u32,
    },

    /// The connection breaks.
    Drop {
        /// Delay from the start of the wait.
        after: Duration,

        /// How the break is classified.
        kind: FailureKind,
    },
}

/// An in-memory IMAP server with one folder.
#[derive(Debug, Default)]
struct FakeServer {
    /// Messages by UID, with their seen flag.
    messages: BTreeMap<u32, bool>,

    /// Failures for the next open attempts.
    open_failures: VecDeque<FailureKind>,

    /// How the next idle waits end; quiet once exhausted.
    idle_script: VecDeque<IdleStep>,

    /// Time each fetch takes.
    fetch_delay: Duration,

    /// The live session.
    live: Option<usize>,

    /// Sessions opened so far.
    opened: usize,

    /// What happened, in order.
    log: Vec<Step>,
}

type Shared = Arc<Mutex<FakeServer>>;

impl FakeServer {
    /// A server whose folder holds the given unseen messages.
    fn with_unseen(uids: &[u32]) -> Shared {
        let server = Self {
            messages: uids.iter().map(|&uid| (uid, false)).collect(),
            ..Self::default()
        };
        Arc::new(Mutex::new(server))
    }
}

struct FakeTransport(Shared);

impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn open(&mut self) -> Result<FakeSession, Failure> {
        let mut server = self.0.lock().unwrap();
        if let Some(kind) = server.open_failures.pop_front() {
            return Err(Failure::new(kind, "scripted open failure"));
        }
        assert!(server.live.is_none(), "opened a second live session");
        server.opened += 1;
        let id = server.opened;
        server.live = Some(id);
        server.log.push(Step::Open(id));
        Ok(FakeSession {
            server: Arc::clone(&self.0),
            id,
            closed: false,
        })
    }
}

struct FakeSession {
    server: Shared,
    id: usize,
    closed: bool,
}

impl FakeSession {
    /// Sleep out `after` within `timeout`, or requeue the rest of it.
    async fn wait_until(&self, after: Duration, timeout: Duration, requeue: IdleStep) -> bool {
        if after > timeout {
            tokio::time::sleep(timeout).await;
            self.server.lock().unwrap().idle_script.push_front(requeue);
            return false;
        }
        tokio::time::sleep(after).await;
        true
    }
}

impl Session for FakeSession {
    async fn wait_for_activity(&mut self, timeout: Duration) -> IdleOutcome {
        let step = {
            let mut server = self.server.lock().unwrap();
            server.log.push(Step::Idle(timeout));
            server.idle_script.pop_front().unwrap_or(IdleStep::Quiet)
        };

        match step {
            IdleStep::Quiet => {
                tokio::time::sleep(timeout).await;
                IdleOutcome::Timeout
            }
            IdleStep::NewMail { after, uid } => {
                let rest = IdleStep::NewMail {
                    after: after.saturating_sub(timeout),
                    uid,
                };
                if !self.wait_until(after, timeout, rest).await {
                    return IdleOutcome::Timeout;
                }
                self.server.lock().unwrap().messages.insert(uid, false);
                IdleOutcome::Activity
            }
            IdleStep::Drop { after, kind } => {
                let rest = IdleStep::Drop {
                    after: after.saturating_sub(timeout),
                    kind,
                };
                if !self.wait_until(after, timeout, rest).await {
                    return IdleOutcome::Timeout;
                }
                IdleOutcome::Error(Failure::new(kind, "connection dropped"))
            }
        }
    }

    async fn drain_unseen<Consumer>(&mut self, sink: &mut Consumer) -> Result<DrainReport, Failure>
    where
        Consumer: Sink + Send,
    {
        self.server.lock().unwrap().log.push(Step::DrainStart);
        let mut mailbox = FakeMailbox(Arc::clone(&self.server));
        let report = message_processor::drain_unseen(&mut mailbox, sink).await;
        self.server.lock().unwrap().log.push(Step::DrainEnd);
        report
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut server = self.server.lock().unwrap();
        server.log.push(Step::Close(self.id));
        if server.live == Some(self.id) {
            server.live = None;
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("fake mailbox error")]
struct FakeError;

impl Classify for FakeError {
    fn classify(&self) -> FailureKind {
        FailureKind::Transient
    }
}

struct FakeMailbox(Shared);

impl UnseenMailbox for FakeMailbox {
    type Error = FakeError;

    async fn search_unseen(&mut self) -> Result<Vec<u32>, Self::Error> {
        let server = self.0.lock().unwrap();
        Ok(server
            .messages
            .iter()
            .filter(|(_, seen)| !**seen)
            .map(|(uid, _)| *uid)
            .collect())
    }

    async fn fetch(&mut self, uid: u32) -> Result<Fetched, Self::Error> {
        let delay = self.0.lock().unwrap().fetch_delay;
        tokio::time::sleep(delay).await;
        let body =
            format!("From: sender@example.com\r\nSubject: message {uid}\r\n\r\nbody\r\n");
        Ok(Fetched::Message(RawMessage {
            uid,
            body: Some(body.into_bytes()),
            internal_date: None,
        }))
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<(), Self::Error> {
        self.0.lock().unwrap().messages.insert(uid, true);
        Ok(())
    }
}

/// Handles to observe a running supervisor.
struct Harness {
    /// UIDs handed to the sink, in order.
    delivered: Arc<Mutex<Vec<u32>>>,

    /// Notifier events, summarized.
    events: Arc<Mutex<Vec<String>>>,

    /// Shutdown signal.
    cancel: CancellationToken,
}

impl Harness {
    fn delivered(&self) -> Vec<u32> {
        self.delivered.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

fn settings(idle_timeout: u64, renewal_threshold: u64, cooldown: u64) -> Settings {
    Settings {
        idle_timeout: secs(idle_timeout),
        renewal_threshold: secs(renewal_threshold),
        cooldown: exp_backoff::State::new(secs(cooldown), 1, secs(cooldown)),
    }
}

fn describe(event: &SupervisorEvent) -> String {
    match event {
        SupervisorEvent::Connecting { attempt } => format!("connecting #{attempt}"),
        SupervisorEvent::Connected { .. } => "connected".to_owned(),
        SupervisorEvent::Drained { report } => format!("drained {}", report.delivered),
        SupervisorEvent::Renewing { .. } => "renewing".to_owned(),
        SupervisorEvent::Recovering {
            failure,
            next_retry_in,
        } => format!("recovering {} in {next_retry_in:?}", failure.kind()),
        SupervisorEvent::Terminated { kind } => format!("terminated {kind}"),
        SupervisorEvent::Stopped => "stopped".to_owned(),
    }
}

fn spawn(server: &Shared, settings: Settings) -> (Harness, JoinHandle<Result<(), Terminated>>) {
    let harness = Harness {
        delivered: Arc::default(),
        events: Arc::default(),
        cancel: CancellationToken::new(),
    };

    let delivered = Arc::clone(&harness.delivered);
    let events = Arc::clone(&harness.events);
    let cooldowns = Arc::clone(server);

    let handle = tokio::spawn(run(Params {
        transport: FakeTransport(Arc::clone(server)),
        sink: move |record: MessageRecord| {
            delivered.lock().unwrap().push(record.uid);
            std::future::ready(Ok::<(), Infallible>(()))
        },
        notifier: move |event: SupervisorEvent| {
            events.lock().unwrap().push(describe(&event));
            std::future::ready(())
        },
        sleep: move |delay: Duration| {
            cooldowns.lock().unwrap().log.push(Step::Cooldown(delay));
            tokio::time::sleep(delay)
        },
        settings,
        cancel: harness.cancel.clone(),
    }));

    (harness, handle)
}

fn log_of(server: &Shared) -> Vec<Step> {
    server.lock().unwrap().log.clone()
}

fn cooldowns_in(log: &[Step]) -> Vec<Duration> {
    log.iter()
        .filter_map(|step| match step {
            Step::Cooldown(delay) => Some(*delay),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn drains_at_connect_then_idles_quietly() {
    let server = FakeServer::with_unseen(&[1, 2, 3]);
    let start = Instant::now();
    let (harness, handle) = spawn(&server, settings(45, 1740, 60));

    tokio::time::sleep(secs(150)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();
    let elapsed = start.elapsed();

    assert_eq!(harness.delivered(), vec![1, 2, 3]);
    assert_eq!(
        log_of(&server),
        vec![
            Step::Open(1),
            Step::DrainStart,
            Step::DrainEnd,
            Step::Idle(secs(45)),
            Step::Idle(secs(45)),
            Step::Idle(secs(45)),
            Step::Idle(secs(45)),
            Step::Close(1),
        ]
    );
    assert_eq!(
        harness.events(),
        vec!["connecting #1", "connected", "drained 3", "stopped"]
    );

    // The in-flight idle wait runs out before the supervisor notices.
    assert!(elapsed > secs(150), "{elapsed:?}");
    assert!(elapsed <= secs(150 + 45), "{elapsed:?}");
    assert!(server.lock().unwrap().live.is_none());
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_waits_one_cooldown() {
    let server = FakeServer::with_unseen(&[1]);
    server
        .lock()
        .unwrap()
        .open_failures
        .push_back(FailureKind::Authentication);
    let (harness, handle) = spawn(&server, settings(45, 1740, 60));

    tokio::time::sleep(secs(100)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();

    let log = log_of(&server);
    assert_eq!(cooldowns_in(&log), vec![secs(60)]);
    assert_eq!(log.first(), Some(&Step::Cooldown(secs(60))));
    assert_eq!(log.get(1), Some(&Step::Open(1)));
    assert_eq!(harness.delivered(), vec![1]);
    assert_eq!(
        &harness.events()[..4],
        [
            "connecting #1",
            "recovering authentication in 60s",
            "connecting #2",
            "connected",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_connection_reconnects_without_duplicates() {
    let server = FakeServer::with_unseen(&[1, 2]);
    server.lock().unwrap().idle_script.extend([
        IdleStep::Drop {
            after: secs(10),
            kind: FailureKind::Transient,
        },
        IdleStep::NewMail {
            after: secs(5),
            uid: 3,
        },
    ]);
    let (harness, handle) = spawn(&server, settings(45, 1740, 60));

    tokio::time::sleep(secs(100)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(harness.delivered(), vec![1, 2, 3]);
    assert_eq!(
        log_of(&server),
        vec![
            Step::Open(1),
            Step::DrainStart,
            Step::DrainEnd,
            Step::Idle(secs(45)),
            Step::Close(1),
            Step::Cooldown(secs(60)),
            Step::Open(2),
            Step::DrainStart,
            Step::DrainEnd,
            Step::Idle(secs(45)),
            Step::DrainStart,
            Step::DrainEnd,
            Step::Idle(secs(45)),
            Step::Close(2),
        ]
    );
    assert!(
        harness
            .events()
            .contains(&"recovering transient in 60s".to_owned())
    );
}

#[tokio::test(start_paused = true)]
async fn keeps_retrying_transient_failures_with_backoff() {
    let server = FakeServer::with_unseen(&[7]);
    {
        let mut server = server.lock().unwrap();
        server
            .open_failures
            .extend([FailureKind::Transient; 5]);
        server.idle_script.push_back(IdleStep::Drop {
            after: secs(5),
            kind: FailureKind::Transient,
        });
    }
    let settings = Settings {
        cooldown: exp_backoff::State::new(secs(1), 2, secs(8)),
        ..settings(45, 1740, 1)
    };
    let (harness, handle) = spawn(&server, settings);

    tokio::time::sleep(secs(60)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(harness.delivered(), vec![7]);
    // Reset to the initial delay once a session got through.
    assert_eq!(
        cooldowns_in(&log_of(&server)),
        vec![secs(1), secs(2), secs(4), secs(8), secs(8), secs(1)]
    );
    assert_eq!(server.lock().unwrap().opened, 2);
}

#[tokio::test(start_paused = true)]
async fn renews_quiet_session_at_threshold() {
    let server = FakeServer::with_unseen(&[]);
    let (harness, handle) = spawn(&server, settings(45, 100, 60));

    tokio::time::sleep(secs(120)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(
        log_of(&server),
        vec![
            Step::Open(1),
            Step::DrainStart,
            Step::DrainEnd,
            Step::Idle(secs(45)),
            Step::Idle(secs(45)),
            // Clamped to the renewal deadline.
            Step::Idle(secs(10)),
            Step::Close(1),
            Step::Open(2),
            Step::DrainStart,
            Step::DrainEnd,
            Step::Idle(secs(45)),
            Step::Close(2),
        ]
    );
    assert!(harness.events().contains(&"renewing".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn renews_busy_session_between_drains() {
    let server = FakeServer::with_unseen(&[]);
    {
        let mut server = server.lock().unwrap();
        server.fetch_delay = secs(15);
        server
            .idle_script
            .extend((10..20).map(|uid| IdleStep::NewMail {
                after: secs(20),
                uid,
            }));
    }
    let (harness, handle) = spawn(&server, settings(45, 100, 60));

    tokio::time::sleep(secs(130)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();

    let log = log_of(&server);
    assert!(log.contains(&Step::Open(2)), "{log:?}");
    assert!(cooldowns_in(&log).is_empty());

    let mut draining = false;
    for step in &log {
        match step {
            Step::DrainStart => draining = true,
            Step::DrainEnd => draining = false,
            Step::Close(_) => assert!(!draining, "closed mid-drain: {log:?}"),
            _ => {}
        }
    }

    let delivered = harness.delivered();
    assert!(delivered.len() >= 3, "{delivered:?}");
    assert!(delivered.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test(start_paused = true)]
async fn fatal_failure_terminates_and_closes() {
    let server = FakeServer::with_unseen(&[]);
    server.lock().unwrap().idle_script.push_back(IdleStep::Drop {
        after: secs(5),
        kind: FailureKind::Fatal,
    });
    let (harness, handle) = spawn(&server, settings(45, 1740, 60));

    let err = handle.await.unwrap().unwrap_err();

    assert_eq!(err.kind, FailureKind::Fatal);
    assert_eq!(err.cause.to_string(), "connection dropped");
    assert!(err.last_session_started_at.is_some());

    let log = log_of(&server);
    assert!(cooldowns_in(&log).is_empty());
    assert_eq!(log.last(), Some(&Step::Close(1)));
    assert!(server.lock().unwrap().live.is_none());
    assert_eq!(harness.events().last().unwrap(), "terminated fatal");
}

#[tokio::test(start_paused = true)]
async fn fatal_failure_before_any_session() {
    let server = FakeServer::with_unseen(&[]);
    server
        .lock()
        .unwrap()
        .open_failures
        .push_back(FailureKind::Fatal);
    let (_harness, handle) = spawn(&server, settings(45, 1740, 60));

    let err = handle.await.unwrap().unwrap_err();

    assert_eq!(err.kind, FailureKind::Fatal);
    assert!(err.last_session_started_at.is_none());
    assert_eq!(
        err.to_string(),
        "fatal failure (last session started: never): scripted open failure"
    );
    assert!(log_of(&server).is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_cuts_the_cooldown_short() {
    let server = FakeServer::with_unseen(&[]);
    server
        .lock()
        .unwrap()
        .open_failures
        .push_back(FailureKind::Transient);
    let start = Instant::now();
    let (harness, handle) = spawn(&server, settings(45, 1740, 60));

    tokio::time::sleep(secs(10)).await;
    harness.cancel.cancel();
    handle.await.unwrap().unwrap();

    assert!(start.elapsed() < secs(60));
    assert_eq!(log_of(&server), vec![Step::Cooldown(secs(60))]);
    assert_eq!(harness.events().last().unwrap(), "stopped");
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_connecting() {
    let server = FakeServer::with_unseen(&[1]);
    let (harness, handle) = spawn(&server, settings(45, 1740, 60));
    harness.cancel.cancel();

    handle.await.unwrap().unwrap();

    assert!(log_of(&server).is_empty());
    assert!(harness.delivered().is_empty());
    assert_eq!(harness.events(), vec!["stopped"]);
}
