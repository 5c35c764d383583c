use crate::RpcInvocationHandler;
use manis_ipc::conf::Configuration;
use manis_ipc_client::{Client, ConnectionId, ProtocolInfo, SocketFactory, WorkerPool};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Everything an engine needs to build an invoker for one endpoint.
pub struct ProxyParams<'a> {
    pub address: SocketAddr,
    pub conf: &'a Configuration,
    pub rpc_timeout: Duration,
    pub socket_factory: Arc<dyn SocketFactory>,
    pub worker_pool: WorkerPool,
}

impl ProxyParams<'_> {
    /// Builds the client an invoker owns together with the pool key its
    /// calls use.
    pub(crate) fn into_client(self, protocol: ProtocolInfo) -> (Client, ConnectionId) {
        let remote_id = ConnectionId::new(self.address, protocol, self.rpc_timeout, self.conf);
        let client = Client::new(self.conf, self.socket_factory, self.worker_pool);
        (client, remote_id)
    }
}

impl fmt::Debug for ProxyParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyParams")
            .field("address", &self.address)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("socket_factory", &self.socket_factory)
            .finish_non_exhaustive()
    }
}

/// A wire-encoding strategy for calls.
pub trait RpcEngine: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn get_invoker(
        &self,
        protocol: ProtocolInfo,
        params: ProxyParams<'_>,
    ) -> Arc<dyn RpcInvocationHandler>;
}
