//! Binary framing for easytcp messages.
//!
//! Wire format:
//! ```text
//! [format_version:1][reserved:3][payload_len:4][seq:8][payload:N]
//! ```
//! Header size: 16 bytes. All multi-byte integers are big-endian. The payload
//! is the JSON encoding of a [`Frame`].

use thiserror::Error;

use crate::protocol::messages::{Frame, FORMAT_VERSION, HEADER_SIZE, MAX_PAYLOAD_LEN};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The format version byte in the header is not supported.
    #[error("unsupported frame format version: {0}")]
    UnsupportedVersion(u8),

    /// The header declares a payload larger than [`MAX_PAYLOAD_LEN`].
    #[error("payload of {declared} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { declared: usize, max: usize },

    /// The header's payload length does not match the bytes available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The payload is not a valid JSON frame object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Decoded fixed-size header of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: usize,
    pub seq: u64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Frame`] into header + JSON payload bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the encoded payload would not
/// be accepted by a reader, or [`ProtocolError::MalformedPayload`] if the
/// fields cannot be serialized.
///
/// # Examples
///
/// ```rust
/// use easytcp_core::{decode_frame, encode_frame, Frame};
///
/// let frame = Frame::new("foo").with_field("x", "y");
/// let bytes = encode_frame(&frame, 0).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &Frame, sequence_number: u64) -> Result<Vec<u8>, ProtocolError> {
    let payload =
        serde_json::to_vec(frame).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&[0x00; 3]); // reserved
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&sequence_number.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Parses and validates the 16-byte header at the start of `bytes`.
///
/// Readers call this on exactly [`HEADER_SIZE`] bytes to learn how many
/// payload bytes to read next.
///
/// # Errors
///
/// Returns [`ProtocolError`] for short input, an unknown format version, or
/// an oversized payload length.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != FORMAT_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    // bytes[1..4] are reserved – ignored on decode
    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut seq = [0u8; 8];
    seq.copy_from_slice(&bytes[8..16]);
    Ok(FrameHeader {
        payload_len,
        seq: u64::from_be_bytes(seq),
    })
}

/// Parses a JSON payload into a [`Frame`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload is not a JSON
/// object with a string `method` and an optional object `fields`.
pub fn decode_payload(payload: &[u8]) -> Result<Frame, ProtocolError> {
    serde_json::from_slice(payload).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed (header + payload), so
/// buffered readers can advance their cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are incomplete or malformed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let header = decode_header(bytes)?;

    let total_needed = HEADER_SIZE + header.payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: header.payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let frame = decode_payload(&bytes[HEADER_SIZE..total_needed])?;
    Ok((frame, total_needed))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::control;
    use serde_json::json;

    #[test]
    fn test_encode_writes_header_fields() {
        // Arrange
        let frame = Frame::new(control::HANDSHAKE);

        // Act
        let bytes = encode_frame(&frame, 0x0102).unwrap();

        // Assert
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(&bytes[1..4], &[0, 0, 0]);
        let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(payload_len, bytes.len() - HEADER_SIZE);
        assert_eq!(&bytes[8..16], &0x0102u64.to_be_bytes());
    }

    #[test]
    fn test_decode_frame_preserves_nested_field_values() {
        // Arrange
        let frame = Frame::new("update")
            .with_field("count", 3)
            .with_field("tags", json!(["a", "b"]))
            .with_field("meta", json!({"k": null}));

        // Act
        let bytes = encode_frame(&frame, 9).unwrap();
        let (decoded, consumed) = decode_frame(&bytes).unwrap();

        // Assert
        assert_eq!(decoded, frame);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_decode_header_reports_sequence_number() {
        let bytes = encode_frame(&Frame::new("foo"), 42).unwrap();
        let header = decode_header(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.seq, 42);
        assert_eq!(header.payload_len, bytes.len() - HEADER_SIZE);
    }

    #[test]
    fn test_decode_short_header_returns_insufficient_data() {
        let result = decode_frame(&[FORMAT_VERSION, 0, 0]);
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_rejects_unknown_format_version() {
        // Arrange
        let mut bytes = encode_frame(&Frame::new("foo"), 0).unwrap();
        bytes[0] = 0x7F;

        // Act / Assert
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::UnsupportedVersion(0x7F)));
    }

    #[test]
    fn test_decode_rejects_oversized_payload_length() {
        // Arrange – a header that claims one byte more than the limit
        let mut header = vec![FORMAT_VERSION, 0, 0, 0];
        header.extend_from_slice(&((MAX_PAYLOAD_LEN + 1) as u32).to_be_bytes());
        header.extend_from_slice(&0u64.to_be_bytes());

        // Act
        let result = decode_header(&header);

        // Assert
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_decode_truncated_payload_returns_length_mismatch() {
        let bytes = encode_frame(&Frame::new("foo").with_field("x", "y"), 0).unwrap();
        let truncated = &bytes[..bytes.len() - 2];
        assert!(matches!(
            decode_frame(truncated),
            Err(ProtocolError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_payload_rejects_missing_method() {
        let result = decode_payload(br#"{"fields":{}}"#);
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_decode_payload_rejects_non_json() {
        let result = decode_payload(b"\xff\xfe not json");
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_two_frames_in_one_buffer_decode_independently() {
        // Arrange – simulates TCP coalescing two writes into one read
        let first = Frame::new("a").with_field("n", 1);
        let second = Frame::new("b");
        let mut buf = encode_frame(&first, 0).unwrap();
        buf.extend_from_slice(&encode_frame(&second, 1).unwrap());

        // Act
        let (decoded1, consumed1) = decode_frame(&buf).unwrap();
        let (decoded2, consumed2) = decode_frame(&buf[consumed1..]).unwrap();

        // Assert
        assert_eq!(decoded1, first);
        assert_eq!(decoded2, second);
        assert_eq!(consumed1 + consumed2, buf.len());
    }
}
