//! Error code table.
//!
//! Sessions report failures as small integer codes. The table maps each code
//! to an [`ErrorKind`]; any code that is not in the table resolves to
//! [`ErrorKind::Undefined`], whose code is the reserved sentinel `-1`.

use thiserror::Error;

/// Sentinel code for "no mapped failure kind". Never a table key.
pub const UNDEFINED_CODE: i32 = -1;

/// Code raised when the handshake fails or times out.
pub const HANDSHAKE_CODE: i32 = 2;

/// Code raised when a peer requests a method with no registered handler.
pub const RECVED_404_CODE: i32 = 6;

/// Failure kinds a session can raise through its error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// The handshake failed or timed out.
    #[error("handshake error")]
    Handshake,
    /// No handler is registered for the requested method.
    #[error("requested method not found")]
    Recved404,
    /// The raised code is not in the table.
    #[error("undefined error code")]
    Undefined,
}

static ERROR_CODES: &[(i32, ErrorKind)] = &[
    (HANDSHAKE_CODE, ErrorKind::Handshake),
    (RECVED_404_CODE, ErrorKind::Recved404),
];

impl ErrorKind {
    /// Resolves `code` through the table. Unknown codes (including `-1`
    /// itself) resolve to [`ErrorKind::Undefined`]; this never fails.
    ///
    /// ```rust
    /// use easytcp_core::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::from_code(2), ErrorKind::Handshake);
    /// assert_eq!(ErrorKind::from_code(99), ErrorKind::Undefined);
    /// ```
    pub fn from_code(code: i32) -> Self {
        ERROR_CODES
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::Undefined)
    }

    /// The table code for this kind; `-1` for [`ErrorKind::Undefined`].
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Handshake => HANDSHAKE_CODE,
            ErrorKind::Recved404 => RECVED_404_CODE,
            ErrorKind::Undefined => UNDEFINED_CODE,
        }
    }

    /// True if this kind came from a code present in the table.
    pub fn is_defined(self) -> bool {
        self != ErrorKind::Undefined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_codes_resolve_to_their_kinds() {
        assert_eq!(ErrorKind::from_code(2), ErrorKind::Handshake);
        assert_eq!(ErrorKind::from_code(6), ErrorKind::Recved404);
    }

    #[test]
    fn test_unknown_codes_resolve_to_undefined_sentinel() {
        for code in [0, 1, 3, 404, i32::MIN, i32::MAX] {
            let kind = ErrorKind::from_code(code);
            assert_eq!(kind, ErrorKind::Undefined, "code {code}");
            assert_eq!(kind.code(), UNDEFINED_CODE);
        }
    }

    #[test]
    fn test_sentinel_is_not_a_table_key() {
        assert!(ERROR_CODES.iter().all(|(code, _)| *code != UNDEFINED_CODE));
        assert_eq!(ErrorKind::from_code(UNDEFINED_CODE), ErrorKind::Undefined);
    }

    #[test]
    fn test_code_round_trips_for_defined_kinds() {
        for (code, kind) in ERROR_CODES {
            assert_eq!(kind.code(), *code);
            assert!(kind.is_defined());
        }
        assert!(!ErrorKind::Undefined.is_defined());
    }
}
