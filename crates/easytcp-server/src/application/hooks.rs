//! Lifecycle hooks: `join`, `left` and `error`.
//!
//! A server carries one [`SessionHooks`] implementation. Every method has a
//! default, so an application overrides only the extension points it cares
//! about:
//!
//! - `on_join` / `on_left` default to doing nothing. Sessions spawn them as
//!   independent tasks and never wait for them; a returned error is reported
//!   to the observer and goes no further.
//! - `on_error` defaults to [`ErrorDisposition::Unhandled`], which makes the
//!   raising session treat the error as a hard failure.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use easytcp_core::ErrorKind;
use thiserror::Error;

use crate::application::server::Server;
use crate::application::session::Session;
use crate::infrastructure::transport::TransportError;

/// The three named extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    Join,
    Left,
    Error,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPoint::Join => "join",
            HookPoint::Left => "left",
            HookPoint::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the `error` hook decided about a raised error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// The hook dealt with the error; nothing propagates.
    Handled,
    /// The hook declined; the error becomes a failure of the raising context.
    Unhandled,
}

/// Error returned by a `join` or `left` hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("hook could not reach the client: {0}")]
    Transport(#[from] TransportError),
}

/// Application callbacks fired at session lifecycle points.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Fired once after the session is admitted to the server.
    async fn on_join(&self, _server: Arc<Server>, _session: Arc<Session>) -> Result<(), HookError> {
        Ok(())
    }

    /// Fired once after the session is killed.
    async fn on_left(&self, _server: Arc<Server>, _session: Arc<Session>) -> Result<(), HookError> {
        Ok(())
    }

    /// Decides whether a raised error is handled.
    async fn on_error(&self, _session: Arc<Session>, _error: ErrorKind) -> ErrorDisposition {
        ErrorDisposition::Unhandled
    }
}

/// Hook set with no overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

#[async_trait]
impl SessionHooks for NoHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_point_display_names() {
        assert_eq!(HookPoint::Join.to_string(), "join");
        assert_eq!(HookPoint::Left.to_string(), "left");
        assert_eq!(HookPoint::Error.to_string(), "error");
    }

    #[test]
    fn test_hook_error_wraps_transport_error() {
        let err: HookError = TransportError::ConnectionClosed.into();
        assert_eq!(err.to_string(), "hook could not reach the client: connection closed");
    }
}
