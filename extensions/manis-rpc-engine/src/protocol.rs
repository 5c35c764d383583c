use crate::RpcInvocationHandler;
use manis_ipc_client::ProtocolInfo;
use std::sync::Arc;

/// A service interface that can be reached through the registry.
///
/// Implemented by a marker type per interface; `Proxy` is the concrete type
/// whose methods forward to an [`RpcInvocationHandler`].
pub trait RpcProtocol: 'static {
    const INFO: ProtocolInfo;

    type Proxy: ProxyObject;

    fn new_proxy(handler: Arc<dyn RpcInvocationHandler>) -> Self::Proxy;
}

/// Anything handed out as a proxy. Only proxies backed by an invocation
/// handler can be released with [`crate::rpc::stop_proxy`].
pub trait ProxyObject: Send + Sync {
    fn invocation_handler(&self) -> Option<&Arc<dyn RpcInvocationHandler>>;
}
