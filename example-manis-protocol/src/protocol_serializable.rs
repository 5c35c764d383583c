//! The manager protocol over the serializable engine.

use crate::constants::{MANAGER_MANISDB_PROTOCOL_NAME, MANISDB_PROTOCOL_VERSION};
use crate::protocol::ManagerProtocol;
use async_trait::async_trait;
use manis_rpc_engine::{
    MethodDescriptor, ProtocolInfo, ProxyObject, RpcInvocationHandler, RpcProtocol, RpcValue,
    ServiceError, class_tags,
};
use std::sync::Arc;

pub const SET_MAX_TABLE: MethodDescriptor =
    MethodDescriptor::object("setMaxTable", 1, class_tags::BOOLEAN);

pub struct ManagerManisDbProtocolSerializable;

impl RpcProtocol for ManagerManisDbProtocolSerializable {
    const INFO: ProtocolInfo =
        ProtocolInfo::new(MANAGER_MANISDB_PROTOCOL_NAME, MANISDB_PROTOCOL_VERSION);

    type Proxy = ManagerSerializableProxy;

    fn new_proxy(handler: Arc<dyn RpcInvocationHandler>) -> Self::Proxy {
        ManagerSerializableProxy { handler }
    }
}

pub struct ManagerSerializableProxy {
    handler: Arc<dyn RpcInvocationHandler>,
}

#[async_trait]
impl ManagerProtocol for ManagerSerializableProxy {
    async fn set_max_table(&self, table_num: i32) -> Result<bool, ServiceError> {
        let result = self
            .handler
            .invoke(&SET_MAX_TABLE, vec![Some(RpcValue::object(table_num))])
            .await?
            .into_object()?;

        result.as_bool().ok_or_else(|| {
            ServiceError::Codec(format!("setMaxTable returned {result}, expected a boolean"))
        })
    }

    fn as_proxy_object(&self) -> &dyn ProxyObject {
        self
    }
}

impl ProxyObject for ManagerSerializableProxy {
    fn invocation_handler(&self) -> Option<&Arc<dyn RpcInvocationHandler>> {
        Some(&self.handler)
    }
}
