//! TCP accept loop.
//!
//! Each accepted connection becomes a [`Session`](crate::application::session::Session)
//! that runs its handshake and dispatch loop in a dedicated Tokio task, so a
//! slow peer never delays the next accept. The loop polls a shared `running`
//! flag every 200 ms and returns once it is cleared.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::server::Server;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Binds the configured address and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the configured address is invalid or cannot be bound.
pub async fn run_server(server: Arc<Server>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let addr = server
        .config()
        .network
        .socket_addr()
        .context("invalid listener address in configuration")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;

    serve(listener, server, running).await
}

/// Accepts connections on an already bound `listener` until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn serve(
    listener: TcpListener,
    server: Arc<Server>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local = listener
        .local_addr()
        .context("listener has no local address")?;
    info!("easytcp server listening on {local}");

    while running.load(Ordering::Relaxed) {
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("new connection from {peer}");
                let server = Arc::clone(&server);
                tokio::spawn(handle_connection(server, stream, peer));
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    info!("shutdown flag set; stopped accepting on {local}");
    Ok(())
}

async fn handle_connection(server: Arc<Server>, stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("could not set TCP_NODELAY for {peer}: {e}");
    }

    let session = server.open_session(stream, peer);
    match session.register().await {
        Ok(()) => info!("session {session} ({peer}) closed normally"),
        Err(e) => warn!("session {session} ({peer}) closed with error: {e}"),
    }
}
