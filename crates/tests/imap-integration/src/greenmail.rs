//! GreenMail container helpers.

use testcontainers::{
    GenericImage, ImageExt as _, core::IntoContainerPort as _, runners::AsyncRunner as _,
};

/// A running GreenMail server with a single user.
///
/// The container is stopped on drop.
pub struct GreenMail {
    /// Host the IMAP port is mapped on.
    pub host: String,

    /// Mapped plaintext IMAP port.
    pub port: u16,

    _container: testcontainers::ContainerAsync<GenericImage>,
}

/// Starts a GreenMail container with the given user and resolves its IMAP
/// endpoint.
pub async fn start_greenmail(
    user: &str,
    password: &str,
) -> Result<GreenMail, testcontainers::TestcontainersError> {
    let container = GenericImage::new("greenmail/standalone", "latest")
        .with_exposed_port(crate::IMAP_PORT.tcp())
        .with_wait_for(testcontainers::core::WaitFor::message_on_stdout(
            "Starting GreenMail API server at",
        ))
        .with_env_var("GREENMAIL_USERS", format!("{user}:{password}"))
        .start()
        .await?;

    let host = container.get_host().await?.to_string();
    let port = container.get_host_port_ipv4(crate::IMAP_PORT).await?;

    Ok(GreenMail {
        host,
        port,
        _container: container,
    })
}
