//! Domain types shared by every easytcp component.

pub mod error_codes;

pub use error_codes::{ErrorKind, HANDSHAKE_CODE, RECVED_404_CODE, UNDEFINED_CODE};
