//! easytcp server library crate.
//!
//! Per-connection sessions for a framed request/response protocol over TCP.
//!
//! ```text
//! TcpListener ──accept──▶ Session ──handshake──▶ dispatch loop ──▶ handlers
//!                            │                        │
//!                            ├── groups               └── error hook (codes 2, 6)
//!                            └── join / left hooks
//! ```
//!
//! - `application/`     Session, handshake, dispatch, groups, hooks, server context
//! - `infrastructure/`  Framed transport, TCP listener, TOML config

/// Application layer: session lifecycle.
pub mod application;

/// Infrastructure layer: transport, listener and configuration.
pub mod infrastructure;
