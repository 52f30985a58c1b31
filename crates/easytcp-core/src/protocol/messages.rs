//! Frame type and reserved control methods.
//!
//! Every message on an easytcp connection is a [`Frame`]: a method name plus
//! a map of named fields. Application methods are free-form; three names are
//! reserved for the handshake (see [`control`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Wire format version byte carried in every frame header.
///
/// This versions the framing itself. The application protocol version that
/// peers negotiate during the handshake is a separate string.
pub const FORMAT_VERSION: u8 = 0x01;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest payload a reader will accept (16 MiB).
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Named arguments of a frame.
pub type Fields = Map<String, Value>;

/// Reserved method names used by the handshake.
pub mod control {
    /// Greeting, greeting echo and final admission confirmation. No fields.
    pub const HANDSHAKE: &str = "HANDSHAKE";
    /// Version exchange: `server_version` outbound, `status` + `version` inbound.
    pub const PHASE1: &str = "PHASE1";
    /// Handshake abort. No fields.
    pub const BREAK: &str = "BREAK";

    /// Field carrying the server's protocol version in the outbound `PHASE1`.
    pub const FIELD_SERVER_VERSION: &str = "server_version";
    /// Field carrying the peer's verdict in the inbound `PHASE1`.
    pub const FIELD_STATUS: &str = "status";
    /// Field carrying the peer's protocol version in the inbound `PHASE1`.
    pub const FIELD_VERSION: &str = "version";

    /// The `status` value a peer sends when it accepts the server version.
    pub const STATUS_OKAY: &str = "okay";
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One framed message: a method name and its named fields.
///
/// # Examples
///
/// ```rust
/// use easytcp_core::Frame;
///
/// let frame = Frame::new("foo").with_field("x", "y");
/// assert_eq!(frame.method, "foo");
/// assert_eq!(frame.str_field("x"), Some("y"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub method: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Frame {
    /// Creates a frame with no fields.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            fields: Fields::new(),
        }
    }

    /// Creates a frame from a method name and an existing field map.
    pub fn with_fields(method: impl Into<String>, fields: Fields) -> Self {
        Self {
            method: method.into(),
            fields,
        }
    }

    /// Adds (or replaces) one field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field as `&str` if it is present and a JSON string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Splits the frame into its method name and fields.
    pub fn into_parts(self) -> (String, Fields) {
        (self.method, self.fields)
    }

    /// True for the three reserved handshake methods.
    pub fn is_control(&self) -> bool {
        matches!(
            self.method.as_str(),
            control::HANDSHAKE | control::PHASE1 | control::BREAK
        )
    }
}
