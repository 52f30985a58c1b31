//! Per-connection session.
//!
//! A [`Session`] owns one connection from accept to teardown:
//!
//! ```text
//! Unregistered ──register()──▶ Handshaking ──admitted──▶ Active ──kill()──▶ Terminated
//!                                   │
//!                                   └──failed / timed out──▶ Terminated (never admitted)
//! ```
//!
//! While `Active` the session runs its dispatch loop: every received frame is
//! handled in its own task, so one slow handler never stalls the reader. The
//! loop ends on any receive failure and always finishes with a single
//! [`Session::kill`].

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use easytcp_core::domain::{HANDSHAKE_CODE, RECVED_404_CODE};
use easytcp_core::{ErrorKind, Fields, Frame};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::application::groups::{Group, GroupError};
use crate::application::handshake::{Handshake, HandshakeError};
use crate::application::hooks::{ErrorDisposition, HookPoint};
use crate::application::server::Server;
use crate::infrastructure::transport::{FramedTransport, TransportError};

/// Server-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Handshaking,
    Active,
    Terminated,
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An error code was raised and the error hook did not handle it.
    #[error("session {id} raised {kind} (code {})", .kind.code())]
    Raised { id: SessionId, kind: ErrorKind },

    #[error("session {id} cannot register from state {state:?}")]
    InvalidState { id: SessionId, state: SessionState },

    /// `kill` could not leave some of its groups. Every group was attempted.
    #[error("session {id} failed to leave {} group(s)", .failures.len())]
    GroupRemoval {
        id: SessionId,
        failures: Vec<GroupError>,
    },
}

/// The fire-and-forget hooks. The error hook is awaited inline instead.
#[derive(Debug, Clone, Copy)]
enum LifecycleHook {
    Join,
    Left,
}

impl LifecycleHook {
    fn point(self) -> HookPoint {
        match self {
            LifecycleHook::Join => HookPoint::Join,
            LifecycleHook::Left => HookPoint::Left,
        }
    }
}

/// One accepted connection and its lifecycle.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    elevated: AtomicBool,
    groups: Mutex<Vec<Arc<Group>>>,
    killed: AtomicBool,
    state: watch::Sender<SessionState>,
    transport: FramedTransport,
    server: Arc<Server>,
}

impl Session {
    /// Sessions are created by [`Server::open_session`], which assigns the id.
    pub(crate) fn new(
        id: SessionId,
        peer: SocketAddr,
        transport: FramedTransport,
        server: Arc<Server>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unregistered);
        Self {
            id,
            peer,
            elevated: AtomicBool::new(false),
            groups: Mutex::new(Vec::new()),
            killed: AtomicBool::new(false),
            state,
            transport,
            server,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated.load(Ordering::Acquire)
    }

    pub fn set_elevated(&self, elevated: bool) {
        self.elevated.store(elevated, Ordering::Release);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// True once the transport has been closed, by `close` or `kill`.
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Snapshot of the groups this session belongs to.
    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.lock_groups().clone()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.lock_groups()
            .iter()
            .map(|group| group.name().to_string())
            .collect()
    }

    /// Sends one frame to the peer.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`]; `ConnectionClosed` once the session is closed.
    pub async fn send(&self, method: &str, fields: Fields) -> Result<(), TransportError> {
        self.transport.send(method, fields).await
    }

    pub async fn send_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        self.transport.send_frame(frame).await
    }

    /// Runs the handshake and, once admitted, the dispatch loop.
    ///
    /// Returns when the session has ended. A failed or timed-out handshake
    /// raises error code 2; the result is `Ok` only if the error hook handled
    /// it. An admitted session returns the outcome of its final `kill`.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] unless the session is `Unregistered`;
    /// [`SessionError::Raised`] for an unhandled handshake failure;
    /// [`SessionError::GroupRemoval`] from the concluding `kill`.
    pub async fn register(self: &Arc<Self>) -> Result<(), SessionError> {
        self.begin_handshake()?;

        let protocol = &self.server.config().protocol;
        let deadline = protocol.handshake_timeout();
        let mut handshake = Handshake::new(
            protocol.version.as_str(),
            protocol.supported_versions.iter().map(String::as_str),
        );

        let outcome = match timeout(deadline, handshake.run(&self.transport)).await {
            Ok(result) => result,
            Err(_) => {
                handshake.abandon();
                Err(HandshakeError::TimedOut(deadline))
            }
        };

        if let Err(e) = outcome {
            self.server
                .observer()
                .handshake_failed(self.id, self.peer, &e.to_string());
            self.transport.close().await;
            self.state.send_replace(SessionState::Terminated);
            return self.raise_error_code(HANDSHAKE_CODE).await;
        }

        if !self.admit().await {
            debug!("client {} was killed before admission", self.id);
            return Ok(());
        }
        self.listen().await
    }

    /// Resolves `code` to its error kind and offers it to the error hook.
    ///
    /// # Errors
    ///
    /// [`SessionError::Raised`] if the hook returns
    /// [`ErrorDisposition::Unhandled`].
    pub async fn raise_error_code(self: &Arc<Self>, code: i32) -> Result<(), SessionError> {
        let kind = ErrorKind::from_code(code);
        let disposition = self.server.hooks().on_error(Arc::clone(self), kind).await;
        let handled = disposition == ErrorDisposition::Handled;
        self.server.observer().error_raised(self.id, kind, handled);

        if handled {
            Ok(())
        } else {
            Err(SessionError::Raised { id: self.id, kind })
        }
    }

    /// Closes the connection. Groups, registry and hooks are left alone.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    /// Tears the session down: closes the connection, leaves every group,
    /// drops out of the server registry and fires the `left` hook.
    ///
    /// Only the first call has any effect; later calls return `Ok(())`.
    ///
    /// # Errors
    ///
    /// [`SessionError::GroupRemoval`] listing each group that could not be
    /// left. The remaining teardown steps still run.
    pub async fn kill(self: &Arc<Self>) -> Result<(), SessionError> {
        if self.killed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.close().await;

        let groups = std::mem::take(&mut *self.lock_groups());
        let failures: Vec<GroupError> = groups
            .iter()
            .filter_map(|group| group.remove_member(self).err())
            .collect();

        self.server.remove_client(self.id).await;
        self.state.send_replace(SessionState::Terminated);
        self.server.observer().session_left(self.id);
        self.spawn_hook(LifecycleHook::Left);

        if failures.is_empty() {
            Ok(())
        } else {
            warn!("client {} left {} group(s) in a bad state", self.id, failures.len());
            Err(SessionError::GroupRemoval {
                id: self.id,
                failures,
            })
        }
    }

    /// Records `group` on this session. Refused once the session is killed.
    pub(crate) fn attach_group(&self, group: Arc<Group>) -> bool {
        let mut groups = self.lock_groups();
        if self.killed.load(Ordering::Acquire) {
            return false;
        }
        if !groups.iter().any(|g| Arc::ptr_eq(g, &group)) {
            groups.push(group);
        }
        true
    }

    pub(crate) fn detach_group(&self, group: &Group) {
        self.lock_groups()
            .retain(|g| !std::ptr::eq(Arc::as_ptr(g), group));
    }

    fn begin_handshake(&self) -> Result<(), SessionError> {
        let mut observed = SessionState::Unregistered;
        let started = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == SessionState::Unregistered {
                *state = SessionState::Handshaking;
                true
            } else {
                false
            }
        });

        if started {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                id: self.id,
                state: observed,
            })
        }
    }

    /// Enters the registry and goes `Active`. Returns `false`, leaving the
    /// registry untouched, if `kill` got there first.
    async fn admit(self: &Arc<Self>) -> bool {
        self.server.add_client(Arc::clone(self)).await;

        // `kill` flags before it leaves the registry, so checking after the
        // insert means one of the two removals always sees the entry.
        let admitted = !self.killed.load(Ordering::Acquire)
            && self.state.send_if_modified(|state| {
                if *state == SessionState::Handshaking {
                    *state = SessionState::Active;
                    true
                } else {
                    false
                }
            });
        if !admitted {
            self.server.remove_client(self.id).await;
            return false;
        }

        self.server.observer().session_registered(self.id, self.peer);
        self.spawn_hook(LifecycleHook::Join);
        true
    }

    async fn listen(self: &Arc<Self>) -> Result<(), SessionError> {
        loop {
            match self.transport.recv().await {
                Ok(frame) => {
                    let session = Arc::clone(self);
                    tokio::spawn(async move { session.process(frame).await });
                }
                Err(e) => {
                    debug!("client {} stopped receiving: {e}", self.id);
                    break;
                }
            }
        }
        self.kill().await
    }

    async fn process(self: Arc<Self>, frame: Frame) {
        let (method, fields) = frame.into_parts();

        let Some(handler) = self.server.handlers().get(&method) else {
            if let Err(e) = self.raise_error_code(RECVED_404_CODE).await {
                warn!("client {} requested unknown method {method}: {e}", self.id);
                self.close().await;
            }
            return;
        };

        self.server.observer().request_dispatched(self.id, &method);
        let server = Arc::clone(&self.server);
        if let Err(e) = handler.call(server, Arc::clone(&self), fields).await {
            self.server
                .observer()
                .request_failed(self.id, &method, &e.to_string());
        }
    }

    fn spawn_hook(self: &Arc<Self>, hook: LifecycleHook) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let server = Arc::clone(&session.server);
            let hooks = server.hooks();
            let result = match hook {
                LifecycleHook::Join => {
                    hooks.on_join(Arc::clone(&server), Arc::clone(&session)).await
                }
                LifecycleHook::Left => {
                    hooks.on_left(Arc::clone(&server), Arc::clone(&session)).await
                }
            };
            if let Err(e) = result {
                server
                    .observer()
                    .hook_failed(session.id, hook.point(), &e.to_string());
            }
        });
    }

    fn lock_groups(&self) -> MutexGuard<'_, Vec<Arc<Group>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Session {}

impl PartialEq<SessionId> for Session {
    fn eq(&self, other: &SessionId) -> bool {
        self.id == *other
    }
}

impl PartialOrd for Session {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Session {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd<SessionId> for Session {
    fn partial_cmp(&self, other: &SessionId) -> Option<CmpOrdering> {
        Some(self.id.cmp(other))
    }
}

impl Hash for Session {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
