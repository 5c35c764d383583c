// Connection preamble
pub const CONNECTION_HEADER_MAGIC: [u8; 4] = *b"mrpc";
pub const CURRENT_VERSION: u8 = 9;
pub const CONNECTION_HEADER_SIZE: usize = 7;

/// Service class byte sent in the preamble. Reserved for future use.
pub const RPC_SERVICE_CLASS_DEFAULT: u8 = 0;

/// Auth-protocol byte meaning "no authentication".
pub const AUTH_PROTOCOL_NONE: u8 = 0;

/// Size in bytes of the big-endian `int32` that prefixes every frame.
pub const FRAME_LENGTH_FIELD_SIZE: usize = 4;

/// Call id carried by the connection-context frame. Never handed out to a
/// real call, since real ids are masked into `[0, 2^31 - 1]`.
pub const CONNECTION_CONTEXT_CALL_ID: i32 = -3;

/// Call id carried by keep-alive pings.
pub const PING_CALL_ID: i32 = -4;

/// Retry count sent on every request. Call-level retries are not supported.
pub const INVALID_RETRY_COUNT: i32 = -1;

/// Maximum number of bytes in a 32-bit varint.
pub const MAX_VARINT32_SIZE: usize = 5;

/// Mask applied to the raw call id counter, keeping ids non-negative.
pub const CALL_ID_MASK: u32 = 0x7FFF_FFFF;

/// Length in bytes of a client identifier (a random UUID).
pub const CLIENT_ID_BYTE_LENGTH: usize = 16;
