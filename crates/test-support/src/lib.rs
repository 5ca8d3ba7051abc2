//! Shared helpers for tests that need a live HTTP peer.

use anyhow::Context as _;
use axum::Router;
use std::net::TcpListener;
use tokio::sync::oneshot;

/// An in-process HTTP server, shut down gracefully when dropped.
pub struct MockServer {
    /// `http://127.0.0.1:<port>` without a trailing slash.
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Serve `router` on an ephemeral localhost port.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn spawn_router(router: Router) -> anyhow::Result<MockServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind mock server")?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
    });

    Ok(MockServer {
        base_url: format!("http://{addr}"),
        shutdown: Some(tx),
    })
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the bound socket's
/// local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// A base URL nothing is listening on, for connection-failure tests.
///
/// # Errors
///
/// Returns an error if no ephemeral port could be picked.
pub fn unreachable_base_url() -> anyhow::Result<String> {
    Ok(format!("http://127.0.0.1:{}", pick_unused_port()?))
}
