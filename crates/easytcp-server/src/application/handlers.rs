//! Request handler registry.
//!
//! Every application method a peer may call is registered here under its
//! method name. Dispatch is a plain map lookup: a name is either found or it
//! is not, in which case the session raises error code 6.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use easytcp_core::{Fields, Frame};
use thiserror::Error;

use crate::application::server::Server;
use crate::application::session::Session;
use crate::infrastructure::transport::TransportError;

/// Error returned by a request handler. It only affects the one frame being
/// handled; the session keeps receiving.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("invalid field `{name}`: {reason}")]
    InvalidField { name: String, reason: String },

    #[error("reply to client failed: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Failed(String),
}

/// Error returned when registering a handler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// `HANDSHAKE`, `PHASE1` and `BREAK` belong to the handshake.
    #[error("method name `{0}` is reserved for the handshake")]
    Reserved(String),
}

/// An invocable bound to one method name.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn call(
        &self,
        server: Arc<Server>,
        session: Arc<Session>,
        fields: Fields,
    ) -> Result<(), HandlerError>;
}

/// Adapter that turns an async closure into a [`RequestHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Arc<Server>, Arc<Session>, Fields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn call(
        &self,
        server: Arc<Server>,
        session: Arc<Session>,
        fields: Fields,
    ) -> Result<(), HandlerError> {
        (self.0)(server, session, fields).await
    }
}

/// Method name → handler map owned by the server.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `method`, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Reserved`] for the handshake method names.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), RegistrationError> {
        let method = method.into();
        if Frame::new(method.as_str()).is_control() {
            return Err(RegistrationError::Reserved(method));
        }
        self.handlers.insert(method, handler);
        Ok(())
    }

    /// Binds an async closure to `method`.
    ///
    /// ```rust
    /// use easytcp_server::application::handlers::{HandlerError, HandlerRegistry};
    ///
    /// let mut registry = HandlerRegistry::new();
    /// registry
    ///     .register_fn("ping", |_server, session, _fields| async move {
    ///         session
    ///             .send("pong", Default::default())
    ///             .await
    ///             .map_err(HandlerError::from)
    ///     })
    ///     .unwrap();
    /// assert!(registry.contains("ping"));
    /// ```
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_fn<F, Fut>(
        &mut self,
        method: impl Into<String>,
        f: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Server>, Arc<Session>, Fields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(method, Arc::new(FnHandler(f)))
    }

    /// Looks up the handler bound to `method`.
    pub fn get(&self, method: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(method).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Reads a required string field, for use inside handlers.
///
/// # Errors
///
/// [`HandlerError::MissingField`] if absent, [`HandlerError::InvalidField`] if
/// present but not a string.
pub fn require_str<'a>(fields: &'a Fields, name: &str) -> Result<&'a str, HandlerError> {
    match fields.get(name) {
        None => Err(HandlerError::MissingField(name.to_string())),
        Some(value) => value.as_str().ok_or_else(|| HandlerError::InvalidField {
            name: name.to_string(),
            reason: format!("expected a string, got {value}"),
        }),
    }
}
