//! Schema messages exchanged by the IPC layer.
//!
//! Enum-typed fields are carried as plain `int32`, which has the same wire
//! encoding as a protobuf enum; see [`RpcKind`](super::RpcKind),
//! [`RpcOperation`](super::RpcOperation) and [`RpcStatus`](super::RpcStatus).

use super::{RpcKind, RpcOperation, RpcStatus, WireError};

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcRequestHeaderProto {
    #[prost(int32, tag = "1")]
    pub rpc_kind: i32,
    #[prost(int32, tag = "2")]
    pub rpc_op: i32,
    #[prost(sint32, tag = "3")]
    pub call_id: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub client_id: Vec<u8>,
    #[prost(sint32, tag = "5")]
    pub retry_count: i32,
}

impl RpcRequestHeaderProto {
    pub fn new(
        rpc_kind: RpcKind,
        rpc_op: RpcOperation,
        call_id: i32,
        retry_count: i32,
        client_id: &[u8],
    ) -> Self {
        Self {
            rpc_kind: rpc_kind.into(),
            rpc_op: rpc_op.into(),
            call_id,
            client_id: client_id.to_vec(),
            retry_count,
        }
    }

    pub fn kind(&self) -> Result<RpcKind, WireError> {
        RpcKind::try_from(self.rpc_kind).map_err(|_| WireError::UnknownEnumValue {
            field: "rpc_kind",
            value: self.rpc_kind,
        })
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcResponseHeaderProto {
    #[prost(uint32, tag = "1")]
    pub call_id: u32,
    #[prost(int32, tag = "2")]
    pub status: i32,
    #[prost(uint32, optional, tag = "3")]
    pub server_ipc_version_num: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub client_id: Option<Vec<u8>>,
    #[prost(sint32, optional, tag = "8")]
    pub retry_count: Option<i32>,
}

impl RpcResponseHeaderProto {
    pub fn rpc_status(&self) -> Result<RpcStatus, WireError> {
        RpcStatus::try_from(self.status).map_err(|_| WireError::UnknownEnumValue {
            field: "status",
            value: self.status,
        })
    }
}

/// Payload of a response whose status is not `Success`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcErrorProto {
    #[prost(string, tag = "1")]
    pub exception_class_name: String,
    #[prost(string, tag = "2")]
    pub error_msg: String,
}

/// Sent once per connection, right after the preamble.
#[derive(Clone, PartialEq, prost::Message)]
pub struct IpcConnectionContextProto {
    #[prost(string, tag = "3")]
    pub protocol: String,
}
