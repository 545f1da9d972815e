//! Docker-backed IMAP integration tests.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const IMAP_USER: &str = "test";
const IMAP_PASSWORD: &str = "secret";
const MAILBOX: &str = "INBOX";

type TestResult = Result<(), Box<dyn Error + Send + Sync>>;

fn server(host: &str, port: u16) -> config_bringup::Server {
    config_bringup::Server {
        server_name: "greenmail".to_owned(),
        host: host.to_owned(),
        port,
        tls_mode: imap_tls::TlsMode::Plain,
        tls_server_name: host.to_owned(),
        cert_verification: imap_tls::CertVerification::Verify,
        auth: config_bringup::ServerAuth::Login {
            username: IMAP_USER.to_owned(),
            password: IMAP_PASSWORD.to_owned(),
        },
    }
}

fn timing() -> config_bringup::Timing {
    config_bringup::Timing {
        idle_timeout: Duration::from_secs(5),
        renewal_threshold: Duration::from_secs(120),
        reconnect_cooldown: Duration::from_secs(1),
        reconnect_cooldown_max: Duration::from_secs(1),
        reconnect_backoff_factor: 1,
        io_timeout: Duration::from_secs(10),
    }
}

fn channel_sink(
    tx: tokio::sync::mpsc::UnboundedSender<message_record::MessageRecord>,
) -> impl FnMut(message_record::MessageRecord) -> std::future::Ready<Result<(), &'static str>> {
    move |record| std::future::ready(tx.send(record).map_err(|_| "receiver dropped"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drains_unseen_messages_once() -> TestResult {
    imap_integration::require_integration_tests_enabled()?;

    let greenmail = imap_integration::start_greenmail(IMAP_USER, IMAP_PASSWORD).await?;

    let mut seeder = imap_integration::connect_with_retry(
        &greenmail.host,
        greenmail.port,
        IMAP_USER,
        IMAP_PASSWORD,
    )
    .await?;
    for subject in ["first", "second", "third"] {
        imap_integration::append_message(&mut seeder, MAILBOX, subject).await?;
    }
    seeder.logout().await?;

    let mailbox = config_bringup::Mailbox {
        server: Arc::new(server(&greenmail.host, greenmail.port)),
        mailbox: MAILBOX.to_owned(),
        timing: timing(),
    };

    let mut session =
        imap_session::AuthenticatedSession::open(imap_service::session_params(&mailbox)).await?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut sink = channel_sink(tx);

    let report = message_processor::drain_unseen(&mut session, &mut sink).await?;
    assert_eq!(report.delivered, 3);

    let mut subjects = Vec::new();
    while let Ok(record) = rx.try_recv() {
        subjects.push(record.subject);
    }
    assert_eq!(
        subjects,
        [
            Some("first".to_owned()),
            Some("second".to_owned()),
            Some("third".to_owned()),
        ]
    );

    let report = message_processor::drain_unseen(&mut session, &mut sink).await?;
    assert_eq!(report, message_processor::DrainReport::default());

    session.close().await;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_delivers_mail_arriving_while_idle() -> TestResult {
    imap_integration::require_integration_tests_enabled()?;

    let greenmail = imap_integration::start_greenmail(IMAP_USER, IMAP_PASSWORD).await?;

    let mut seeder = imap_integration::connect_with_retry(
        &greenmail.host,
        greenmail.port,
        IMAP_USER,
        IMAP_PASSWORD,
    )
    .await?;

    let mailbox = config_bringup::Mailbox {
        server: Arc::new(server(&greenmail.host, greenmail.port)),
        mailbox: MAILBOX.to_owned(),
        timing: timing(),
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let (connected_tx, mut connected_rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = tokio_util::sync::CancellationToken::new();

    let watcher = tokio::spawn(imap_service::watch_mailbox(
        mailbox,
        channel_sink(tx),
        move |event| {
            if let supervisor::SupervisorEvent::Connected { .. } = event {
                let _ = connected_tx.send(());
            }
            std::future::ready(())
        },
        cancel.clone(),
    ));

    tokio::time::timeout(Duration::from_secs(30), connected_rx.recv())
        .await?
        .ok_or("watcher stopped before connecting")?;

    imap_integration::append_message(&mut seeder, MAILBOX, "live").await?;
    seeder.logout().await?;

    let record = tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await?
        .ok_or("watcher stopped before delivering")?;
    assert_eq!(record.subject.as_deref(), Some("live"));

    cancel.cancel();
    watcher.await??;

    Ok(())
}
