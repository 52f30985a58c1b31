//! Application layer: the session lifecycle and everything it coordinates.
//!
//! - [`handshake`]: the HANDSHAKE / PHASE1 / BREAK exchange.
//! - [`session`]: one connection from registration to `kill`.
//! - [`handlers`]: method name → request handler registry.
//! - [`groups`]: named session groups.
//! - [`hooks`]: `join` / `left` / `error` extension points.
//! - [`observer`]: lifecycle event sink.
//! - [`server`]: the shared context every session points back to.

pub mod builtin;
pub mod groups;
pub mod handlers;
pub mod handshake;
pub mod hooks;
pub mod observer;
pub mod server;
pub mod session;

pub use groups::{Group, GroupError};
pub use handlers::{HandlerError, HandlerRegistry, RequestHandler};
pub use handshake::{client_handshake, Handshake, HandshakeError, HandshakeState};
pub use hooks::{ErrorDisposition, HookError, HookPoint, NoHooks, SessionHooks};
pub use observer::{SessionObserver, TracingObserver};
pub use server::Server;
pub use session::{Session, SessionError, SessionId, SessionState};
