mod connection_header;
mod protos;
mod rpc_frame;
mod rpc_kind;
pub mod varint;
mod wire_error;

pub use connection_header::ConnectionHeader;
pub use protos::{
    IpcConnectionContextProto, RpcErrorProto, RpcRequestHeaderProto, RpcResponseHeaderProto,
};
pub use rpc_frame::{
    RpcRequest, RpcResponse, check_frame_length, decode_delimited, encode_delimited,
    encode_frame, read_delimited,
};
pub use rpc_kind::{RpcKind, RpcOperation, RpcStatus};
pub use wire_error::WireError;
