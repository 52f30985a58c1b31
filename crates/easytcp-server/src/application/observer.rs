//! Observability sink for session lifecycle events.
//!
//! Sessions never log lifecycle milestones through an ambient global; they
//! report them to the [`SessionObserver`] the server was built with. The
//! default [`TracingObserver`] forwards everything to `tracing`, tests swap in
//! a mock.

use std::net::SocketAddr;

use easytcp_core::ErrorKind;
use tracing::{error, info, warn};

use crate::application::hooks::HookPoint;
use crate::application::session::SessionId;

/// Receives one call per session lifecycle milestone.
#[cfg_attr(test, mockall::automock)]
pub trait SessionObserver: Send + Sync {
    /// The handshake succeeded and the session was added to the registry.
    fn session_registered(&self, id: SessionId, peer: SocketAddr);

    /// The handshake failed or timed out; the session was never admitted.
    fn handshake_failed(&self, id: SessionId, peer: SocketAddr, reason: &str);

    /// A received frame was handed to its registered handler.
    fn request_dispatched(&self, id: SessionId, method: &str);

    /// A handler returned an error for one frame.
    fn request_failed(&self, id: SessionId, method: &str, reason: &str);

    /// An error code was raised; `handled` tells whether the error hook took it.
    fn error_raised(&self, id: SessionId, kind: ErrorKind, handled: bool);

    /// A fire-and-forget hook returned an error.
    fn hook_failed(&self, id: SessionId, hook: HookPoint, reason: &str);

    /// The session was killed and left every group.
    fn session_left(&self, id: SessionId);
}

/// Default observer: one `tracing` event per milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn session_registered(&self, id: SessionId, peer: SocketAddr) {
        info!("client {peer} id:{id} registered to the server successfully");
    }

    fn handshake_failed(&self, id: SessionId, peer: SocketAddr, reason: &str) {
        warn!("client {peer} id:{id} failed the handshake: {reason}");
    }

    fn request_dispatched(&self, id: SessionId, method: &str) {
        info!("client with id of {id} requested {method}");
    }

    fn request_failed(&self, id: SessionId, method: &str, reason: &str) {
        warn!("client {id}: handler for {method} failed: {reason}");
    }

    fn error_raised(&self, id: SessionId, kind: ErrorKind, handled: bool) {
        if handled {
            info!("client {id} raised {kind} (code {}), handled by error hook", kind.code());
        } else {
            error!(
                "client {id} raised {kind} (code {}) and no error hook handled it",
                kind.code()
            );
        }
    }

    fn hook_failed(&self, id: SessionId, hook: HookPoint, reason: &str) {
        warn!("client {id}: {hook} hook failed: {reason}");
    }

    fn session_left(&self, id: SessionId) {
        info!("client {id} left the server");
    }
}
