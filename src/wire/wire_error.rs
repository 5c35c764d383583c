use thiserror::Error;

/// Errors produced while encoding or decoding bytes on the wire.
///
/// Every decode error is fatal for the connection it occurred on: once
/// framing is lost there is no way to resynchronize the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// A varint's fifth byte still carried the continuation bit.
    #[error("malformed varint")]
    MalformedVarint,

    /// The input ended in the middle of a varint, a sub-message or a frame.
    #[error("truncated input: needed {needed} more byte(s)")]
    Truncated { needed: usize },

    #[error("negative frame length {0}")]
    NegativeLength(i32),

    #[error("frame length {length} exceeds maximum of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    #[error("unknown {field} value {value}")]
    UnknownEnumValue { field: &'static str, value: i32 },

    #[error("message decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}
