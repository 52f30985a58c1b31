//! Infrastructure layer: everything that touches sockets or the file system.
//!
//! - [`transport`]: whole frames over a byte stream.
//! - [`listener`]: the TCP accept loop.
//! - [`config`]: TOML configuration.

pub mod config;
pub mod listener;
pub mod transport;

pub use config::{ConfigError, ServerConfig};
pub use listener::{run_server, serve};
pub use transport::{FramedTransport, TransportError};
