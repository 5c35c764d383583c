mod engine;
mod error;
mod invocation_handler;
mod method;
mod object_writable;
mod protobuf_engine;
mod protocol;
pub mod rpc;
mod serializable_engine;
mod value;

pub use engine::{ProxyParams, RpcEngine};
pub use error::ServiceError;
pub use invocation_handler::RpcInvocationHandler;
pub use method::{MethodDescriptor, ReturnType};
pub use object_writable::{Invocation, ObjectValue, ObjectWritable, class_tags};
pub use protobuf_engine::{ProtobufInvoker, ProtobufRpcEngine, RequestHeaderProto};
pub use protocol::{ProxyObject, RpcProtocol};
pub use serializable_engine::{SerializableInvoker, SerializableRpcEngine};
pub use value::{DynMessage, RpcValue};

pub use manis_ipc_client::ProtocolInfo;
