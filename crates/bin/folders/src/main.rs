//! Main entrypoint for the IMAP LIST helper.
//!
//! Prints folder names in the form the `mailboxes` config expects.

use std::future::Future;
use std::time::Duration;

use futures::TryStreamExt;

/// The bound for every network operation of the helper.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the IMAP LIST helper.
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
    let servers = config_bringup::servers(&config.payload)?;
    drop(config);

    for server in &servers {
        tracing::info!(
            server_name = %server.server_name,
            imap_host = %server.host,
            imap_port = server.port,
            imap_tls_mode = ?server.tls_mode,
            "listing IMAP mailboxes"
        );

        let connect = imap_service::connect_params(server, IO_TIMEOUT);
        let auth = imap_service::auth_params(&server.auth);

        let mut session = imap_session::login(connect, auth).await?;

        let names = bounded("LIST", async {
            session
                .list(None, Some("*"))
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
        .await?;

        println!("{}:", server.server_name);
        for name in &names {
            println!("  {}", name.name());
        }

        bounded("LOGOUT", session.logout()).await?;
    }

    Ok(())
}

/// Run one IMAP command under [`IO_TIMEOUT`].
async fn bounded<T, E>(
    command: &'static str,
    fut: impl Future<Output = Result<T, E>>,
) -> color_eyre::eyre::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let result = tokio::time::timeout(IO_TIMEOUT, fut).await.map_err(|_| {
        color_eyre::eyre::eyre!("{command} timed out after {IO_TIMEOUT:?}")
    })?;
    Ok(result?)
}
