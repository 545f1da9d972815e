//! Main entrypoint: watch every configured mailbox and log new mail.

use std::sync::Arc;

mod events;
mod sink;

/// Run the notifier.
#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config_load::with_default_env_var().await?;
    tracing::info!(config_path = %config.path.display(), "loaded config");

    let mailboxes = config_bringup::mailboxes(&config.payload)?;
    drop(config);

    if mailboxes.is_empty() {
        color_eyre::eyre::bail!("no mailboxes configured");
    }

    let cancel = tokio_util::sync::CancellationToken::new();
    let mut join_set = tokio::task::JoinSet::new();

    for mailbox in mailboxes {
        let label: Arc<str> =
            format!("{} / {}", mailbox.server.server_name, mailbox.mailbox).into();
        let cancel = cancel.clone();

        join_set.spawn(async move {
            let sink = sink::log_record(Arc::clone(&label));
            let notify = {
                let label = Arc::clone(&label);
                move |event| {
                    events::log(&label, event);
                    std::future::ready(())
                }
            };

            imap_service::watch_mailbox(mailbox, sink, notify, cancel)
                .await
                .map_err(|err| (label, err))
        });
    }

    let mut fatal = None;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                result?;
                tracing::info!("shutting down");
                cancel.cancel();
            }
            joined = join_set.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                if let Err((label, err)) = joined? {
                    tracing::error!(mailbox = %label, %err, "watcher terminated");
                    cancel.cancel();
                    fatal.get_or_insert_with(|| {
                        color_eyre::eyre::Report::new(err).wrap_err(format!("watching {label}"))
                    });
                }
            }
        }
    }

    match fatal {
        Some(report) => Err(report),
        None => Ok(()),
    }
}
