use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Which engine produced a request. Sent in every request header so the
/// server can pick the matching decoder.
#[repr(i32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum RpcKind {
    Builtin = 0,
    Serializable = 1,
    ProtocolBuffer = 2,
}

#[repr(i32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum RpcOperation {
    FinalPacket = 0,
    ContinuationPacket = 1,
    CloseConnection = 2,
}

/// Outcome carried by a response header.
///
/// `Error` is scoped to one call; `Fatal` means the server is dropping the
/// connection.
#[repr(i32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum RpcStatus {
    Success = 0,
    Error = 1,
    Fatal = 2,
}
