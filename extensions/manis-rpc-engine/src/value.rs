use crate::{ObjectWritable, ServiceError};
use manis_ipc::wire::varint::write_varint32;
use std::any::{Any, type_name};
use std::fmt::Debug;

/// Object-safe view of a protobuf message.
pub trait DynMessage: Debug + Send + Sync + 'static {
    /// Appends the message prefixed by its varint length.
    fn encode_delimited_to(&self, buf: &mut Vec<u8>);

    fn merge_bytes(&mut self, buf: &[u8]) -> Result<(), prost::DecodeError>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<M> DynMessage for M
where
    M: prost::Message + Default + 'static,
{
    fn encode_delimited_to(&self, buf: &mut Vec<u8>) {
        let len = prost::Message::encoded_len(self);
        write_varint32(len as u32, buf);
        buf.reserve(len);
        // Encoding into a growable buffer cannot run out of space.
        let _ = prost::Message::encode(self, buf);
    }

    fn merge_bytes(&mut self, buf: &[u8]) -> Result<(), prost::DecodeError> {
        prost::Message::merge(self, buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// An argument to, or result of, an invocation.
#[derive(Debug)]
pub enum RpcValue {
    Message(Box<dyn DynMessage>),
    Object(ObjectWritable),
}

impl RpcValue {
    pub fn message<M: prost::Message + Default + 'static>(message: M) -> Self {
        RpcValue::Message(Box::new(message))
    }

    pub fn object(object: impl Into<ObjectWritable>) -> Self {
        RpcValue::Object(object.into())
    }

    pub fn into_message<M: prost::Message + Default + 'static>(self) -> Result<M, ServiceError> {
        match self {
            RpcValue::Message(message) => message
                .into_any()
                .downcast::<M>()
                .map(|message| *message)
                .map_err(|_| {
                    ServiceError::Codec(format!("response is not a {}", type_name::<M>()))
                }),
            RpcValue::Object(object) => Err(ServiceError::Codec(format!(
                "expected a {} message, got object {}",
                type_name::<M>(),
                object
            ))),
        }
    }

    pub fn into_object(self) -> Result<ObjectWritable, ServiceError> {
        match self {
            RpcValue::Object(object) => Ok(object),
            RpcValue::Message(message) => Err(ServiceError::Codec(format!(
                "expected an object, got message {message:?}"
            ))),
        }
    }
}
