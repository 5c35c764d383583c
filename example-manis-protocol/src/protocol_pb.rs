//! The client protocol over the protobuf engine, and the translator that
//! presents it as a [`ClientProtocol`].

use crate::constants::{CLIENT_MANISDB_PROTOCOL_NAME, MANISDB_PROTOCOL_VERSION};
use crate::protocol::ClientProtocol;
use crate::protos::{GetTableCountRequestProto, GetTableCountResponseProto};
use async_trait::async_trait;
use manis_rpc_engine::{
    DynMessage, MethodDescriptor, ProtocolInfo, ProxyObject, RpcInvocationHandler, RpcProtocol,
    RpcValue, ServiceError,
};
use std::sync::Arc;

fn new_get_table_count_response() -> Box<dyn DynMessage> {
    Box::new(GetTableCountResponseProto::default())
}

pub const GET_TABLE_COUNT: MethodDescriptor =
    MethodDescriptor::message("getTableCount", new_get_table_count_response);

pub struct ClientManisDbProtocolPb;

impl RpcProtocol for ClientManisDbProtocolPb {
    const INFO: ProtocolInfo =
        ProtocolInfo::new(CLIENT_MANISDB_PROTOCOL_NAME, MANISDB_PROTOCOL_VERSION);

    type Proxy = ClientManisDbProtocolPbProxy;

    fn new_proxy(handler: Arc<dyn RpcInvocationHandler>) -> Self::Proxy {
        ClientManisDbProtocolPbProxy { handler }
    }
}

/// Message-level proxy: one request message in, one response message out.
pub struct ClientManisDbProtocolPbProxy {
    handler: Arc<dyn RpcInvocationHandler>,
}

impl ClientManisDbProtocolPbProxy {
    pub async fn get_table_count(
        &self,
        request: GetTableCountRequestProto,
    ) -> Result<GetTableCountResponseProto, ServiceError> {
        self.handler
            .invoke(&GET_TABLE_COUNT, vec![None, Some(RpcValue::message(request))])
            .await?
            .into_message()
    }
}

impl ProxyObject for ClientManisDbProtocolPbProxy {
    fn invocation_handler(&self) -> Option<&Arc<dyn RpcInvocationHandler>> {
        Some(&self.handler)
    }
}

/// Adapts the message-level proxy to [`ClientProtocol`].
pub struct ClientProtocolTranslatorPb {
    rpc_proxy: ClientManisDbProtocolPbProxy,
}

impl ClientProtocolTranslatorPb {
    pub fn new(rpc_proxy: ClientManisDbProtocolPbProxy) -> Self {
        Self { rpc_proxy }
    }
}

#[async_trait]
impl ClientProtocol for ClientProtocolTranslatorPb {
    async fn get_table_count(&self, db_name: &str, tb_name: &str) -> Result<i32, ServiceError> {
        let request = GetTableCountRequestProto {
            db_name: db_name.to_string(),
            tb_name: tb_name.to_string(),
        };
        Ok(self.rpc_proxy.get_table_count(request).await?.result)
    }

    fn as_proxy_object(&self) -> &dyn ProxyObject {
        &self.rpc_proxy
    }
}
