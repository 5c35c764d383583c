use crate::{
    Invocation, MethodDescriptor, ObjectWritable, ProxyParams, ReturnType, RpcEngine,
    RpcInvocationHandler, RpcValue, ServiceError,
};
use async_trait::async_trait;
use manis_ipc::wire::RpcKind;
use manis_ipc::wire::varint::write_varint32;
use manis_ipc_client::{Client, ConnectionId, ProtocolInfo};
use std::sync::Arc;
use std::time::Instant;

/// Engine for interfaces whose methods take and return tagged generic
/// values. The default engine when none is configured.
#[derive(Debug, Default)]
pub struct SerializableRpcEngine;

impl SerializableRpcEngine {
    pub const NAME: &'static str = "serializable";
}

impl RpcEngine for SerializableRpcEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn get_invoker(
        &self,
        protocol: ProtocolInfo,
        params: ProxyParams<'_>,
    ) -> Arc<dyn RpcInvocationHandler> {
        let (client, remote_id) = params.into_client(protocol);
        Arc::new(SerializableInvoker {
            client,
            remote_id,
            protocol,
        })
    }
}

pub struct SerializableInvoker {
    client: Client,
    remote_id: ConnectionId,
    protocol: ProtocolInfo,
}

fn collect_parameters(
    method: &MethodDescriptor,
    args: Vec<Option<RpcValue>>,
) -> Result<Vec<ObjectWritable>, ServiceError> {
    if args.len() != method.arity {
        return Err(ServiceError::Usage(format!(
            "Wrong number of parameters for Method: [{}], Expected: {}, Actual: {}",
            method.name,
            method.arity,
            args.len()
        )));
    }

    args.into_iter()
        .enumerate()
        .map(|(i, arg)| match arg {
            Some(RpcValue::Object(object)) => Ok(object),
            Some(RpcValue::Message(_)) => Err(ServiceError::Usage(format!(
                "Parameter {i} of Method: [{}] is a message, not an object",
                method.name
            ))),
            None => Err(ServiceError::Usage(format!(
                "null param {i} while calling Method: [{}]",
                method.name
            ))),
        })
        .collect()
}

#[async_trait]
impl RpcInvocationHandler for SerializableInvoker {
    async fn invoke(
        &self,
        method: &MethodDescriptor,
        args: Vec<Option<RpcValue>>,
    ) -> Result<RpcValue, ServiceError> {
        let start = Instant::now();

        let ReturnType::Object(expected_class) = method.return_type else {
            return Err(ServiceError::Usage(format!(
                "Method [{}] does not return an object",
                method.name
            )));
        };

        let invocation = Invocation {
            protocol_name: self.protocol.name.to_string(),
            client_version: self.protocol.version,
            method_name: method.name.to_string(),
            parameters: collect_parameters(method, args)?,
        };

        let encoded = bitcode::encode(&invocation);
        let mut payload = Vec::with_capacity(encoded.len() + 5);
        write_varint32(encoded.len() as u32, &mut payload);
        payload.extend_from_slice(&encoded);

        let response = self
            .client
            .call(RpcKind::Serializable, payload.into(), &self.remote_id)
            .await?;

        tracing::debug!(
            "Call: {} took {}ms",
            method.name,
            start.elapsed().as_millis()
        );

        let result: ObjectWritable = bitcode::decode(&response)?;
        if result.declared_class != expected_class {
            return Err(ServiceError::Codec(format!(
                "Method [{}] declared return {} but the response carries {}",
                method.name, expected_class, result.declared_class
            )));
        }

        Ok(RpcValue::Object(result))
    }

    async fn close(&self) {
        self.client.stop().await;
    }

    fn connection_id(&self) -> &ConnectionId {
        &self.remote_id
    }
}
