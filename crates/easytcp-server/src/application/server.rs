//! Server context shared by every session.
//!
//! The [`Server`] is built once, wrapped in an `Arc` and handed to each
//! session. It owns the configuration, the handler registry, the hook set,
//! the observer, the id allocator, the registry of admitted clients and the
//! named groups.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use easytcp_core::protocol::SequenceCounter;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::RwLock;
use tracing::debug;

use crate::application::groups::{Group, GroupError};
use crate::application::handlers::HandlerRegistry;
use crate::application::hooks::{NoHooks, SessionHooks};
use crate::application::observer::{SessionObserver, TracingObserver};
use crate::application::session::{Session, SessionId};
use crate::infrastructure::config::ServerConfig;
use crate::infrastructure::transport::FramedTransport;

pub struct Server {
    config: ServerConfig,
    handlers: HandlerRegistry,
    hooks: Arc<dyn SessionHooks>,
    observer: Arc<dyn SessionObserver>,
    ids: SequenceCounter,
    clients: RwLock<HashMap<SessionId, Arc<Session>>>,
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Server {
    /// A server with no handlers, no hooks and the tracing observer.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            hooks: Arc::new(NoHooks),
            observer: Arc::new(TracingObserver),
            ids: SequenceCounter::starting_at(1),
            clients: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn hooks(&self) -> Arc<dyn SessionHooks> {
        Arc::clone(&self.hooks)
    }

    pub fn observer(&self) -> &dyn SessionObserver {
        self.observer.as_ref()
    }

    /// Wraps an accepted stream in a new, unregistered session with a fresh id.
    pub fn open_session<S>(self: &Arc<Self>, stream: S, peer: SocketAddr) -> Arc<Session>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = SessionId::new(self.ids.next());
        debug!("opening session {id} for {peer}");
        Arc::new(Session::new(
            id,
            peer,
            FramedTransport::new(stream),
            Arc::clone(self),
        ))
    }

    // ── Client registry ──────────────────────────────────────────────────────

    pub async fn add_client(&self, session: Arc<Session>) {
        self.clients.write().await.insert(session.id(), session);
    }

    pub async fn remove_client(&self, id: SessionId) -> Option<Arc<Session>> {
        self.clients.write().await.remove(&id)
    }

    pub async fn client(&self, id: SessionId) -> Option<Arc<Session>> {
        self.clients.read().await.get(&id).cloned()
    }

    /// Admitted clients, ordered by id.
    pub async fn clients(&self) -> Vec<Arc<Session>> {
        let mut clients: Vec<Arc<Session>> = self.clients.read().await.values().cloned().collect();
        clients.sort();
        clients
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    /// Returns the group called `name`, creating it if needed.
    pub async fn group(&self, name: &str) -> Arc<Group> {
        if let Some(group) = self.groups.read().await.get(name) {
            return Arc::clone(group);
        }
        let mut groups = self.groups.write().await;
        Arc::clone(
            groups
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Group::new(name))),
        )
    }

    pub async fn find_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().await.get(name).cloned()
    }

    /// Adds `session` to the group `name`, creating the group if needed.
    ///
    /// # Errors
    ///
    /// See [`Group::add`].
    pub async fn join_group(&self, session: &Arc<Session>, name: &str) -> Result<bool, GroupError> {
        self.group(name).await.add(session)
    }

    /// Removes `session` from the group `name`. Unknown groups are a no-op.
    ///
    /// # Errors
    ///
    /// See [`Group::remove`].
    pub async fn leave_group(&self, session: &Session, name: &str) -> Result<bool, GroupError> {
        match self.find_group(name).await {
            Some(group) => group.remove(session),
            None => Ok(false),
        }
    }
}
