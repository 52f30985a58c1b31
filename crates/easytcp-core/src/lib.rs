//! # easytcp-core
//!
//! Shared library for easytcp containing the frame type, the binary frame
//! codec and the session error-code table.
//!
//! It has no dependency on sockets or an async runtime; the server crate
//! layers transports and sessions on top of it.
//!
//! - **`protocol`** – How bytes travel over the network. Every message is a
//!   [`Frame`] (method name + named JSON fields) behind a 16-byte header.
//!
//! - **`domain`** – The [`ErrorKind`] table mapping small integer codes to
//!   failure kinds, with `-1` reserved for undefined codes.

pub mod domain;
pub mod protocol;

pub use domain::error_codes::ErrorKind;
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::messages::{control, Fields, Frame};
