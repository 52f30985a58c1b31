//! Protocol module containing the frame type, binary codec and sequence counter.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{decode_frame, decode_header, decode_payload, encode_frame, FrameHeader, ProtocolError};
pub use messages::*;
pub use sequence::SequenceCounter;
