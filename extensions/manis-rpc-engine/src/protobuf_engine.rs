use crate::{
    DynMessage, MethodDescriptor, ProxyParams, ReturnType, RpcEngine, RpcInvocationHandler,
    RpcValue, ServiceError,
};
use async_trait::async_trait;
use manis_ipc::wire::{RpcKind, encode_delimited};
use manis_ipc_client::{Client, ConnectionId, ProtocolInfo};
use std::sync::Arc;
use std::time::Instant;

/// Precedes every protobuf-engine request message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestHeaderProto {
    #[prost(string, tag = "1")]
    pub method_name: String,
    #[prost(string, tag = "2")]
    pub declaring_class_protocol_name: String,
    #[prost(uint64, tag = "3")]
    pub client_protocol_version: u64,
}

/// Engine for interfaces whose methods take and return protobuf messages.
#[derive(Debug, Default)]
pub struct ProtobufRpcEngine;

impl ProtobufRpcEngine {
    pub const NAME: &'static str = "protobuf";
}

impl RpcEngine for ProtobufRpcEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn get_invoker(
        &self,
        protocol: ProtocolInfo,
        params: ProxyParams<'_>,
    ) -> Arc<dyn RpcInvocationHandler> {
        let (client, remote_id) = params.into_client(protocol);
        Arc::new(ProtobufInvoker {
            client,
            remote_id,
            protocol,
        })
    }
}

pub struct ProtobufInvoker {
    client: Client,
    remote_id: ConnectionId,
    protocol: ProtocolInfo,
}

impl ProtobufInvoker {
    fn request_payload(&self, method: &MethodDescriptor, param: &dyn DynMessage) -> Vec<u8> {
        let header = RequestHeaderProto {
            method_name: method.name.to_string(),
            declaring_class_protocol_name: self.protocol.name.to_string(),
            client_protocol_version: self.protocol.version,
        };

        let mut payload = Vec::new();
        encode_delimited(&header, &mut payload);
        param.encode_delimited_to(&mut payload);
        payload
    }
}

#[async_trait]
impl RpcInvocationHandler for ProtobufInvoker {
    /// Expects exactly two arguments: a call-context placeholder, which is
    /// ignored, and the request message.
    async fn invoke(
        &self,
        method: &MethodDescriptor,
        args: Vec<Option<RpcValue>>,
    ) -> Result<RpcValue, ServiceError> {
        let start = Instant::now();

        if args.len() != 2 {
            return Err(ServiceError::Usage(format!(
                "Too many or too few parameters for request. Method: [{}], Expected: 2, Actual: {}",
                method.name,
                args.len()
            )));
        }

        let Some(param) = args.into_iter().nth(1).flatten() else {
            return Err(ServiceError::Usage(format!(
                "null param while calling Method: [{}]",
                method.name
            )));
        };
        let RpcValue::Message(param) = param else {
            return Err(ServiceError::Usage(format!(
                "Method [{}] takes a message argument",
                method.name
            )));
        };
        let ReturnType::Message(new_response) = method.return_type else {
            return Err(ServiceError::Usage(format!(
                "Method [{}] does not return a message",
                method.name
            )));
        };

        tracing::trace!("{}: Call -> {} {{{:?}}}", self.remote_id, method.name, param);

        let payload = self.request_payload(method, param.as_ref());
        let response = self
            .client
            .call(RpcKind::ProtocolBuffer, payload.into(), &self.remote_id)
            .await?;

        tracing::debug!(
            "Call: {} took {}ms",
            method.name,
            start.elapsed().as_millis()
        );

        let mut result = new_response();
        result.merge_bytes(&response)?;
        Ok(RpcValue::Message(result))
    }

    async fn close(&self) {
        self.client.stop().await;
    }

    fn connection_id(&self) -> &ConnectionId {
        &self.remote_id
    }
}
