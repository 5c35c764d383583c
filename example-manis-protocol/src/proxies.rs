//! Turns an endpoint URI and an interface type into a live proxy.

use crate::protocol::{ClientProtocol, ManagerProtocol};
use crate::protocol_pb::{ClientManisDbProtocolPb, ClientProtocolTranslatorPb};
use crate::protocol_serializable::ManagerManisDbProtocolSerializable;
use manis_ipc::conf::Configuration;
use manis_ipc_client::{IpcError, TcpSocketFactory, WorkerPool};
use manis_rpc_engine::{ProtobufRpcEngine, ProxyParams, ServiceError, rpc};
use std::any::{Any, TypeId, type_name};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

/// A proxy together with the address it was resolved to.
#[derive(Debug, Clone)]
pub struct ProxyInfo<P> {
    proxy: P,
    address: SocketAddr,
}

impl<P> ProxyInfo<P> {
    pub fn new(proxy: P, address: SocketAddr) -> Self {
        Self { proxy, address }
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }

    pub fn into_proxy(self) -> P {
        self.proxy
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

/// Resolves `scheme://host:port` to a socket address.
pub async fn resolve_endpoint(uri: &str) -> Result<SocketAddr, ServiceError> {
    let url = Url::parse(uri)
        .map_err(|e| ServiceError::Usage(format!("Invalid endpoint URI {uri}: {e}")))?;
    let port = url
        .port()
        .ok_or_else(|| ServiceError::Usage(format!("Endpoint URI {uri} has no port")))?;

    match url.host() {
        Some(Host::Ipv4(ip)) => Ok(SocketAddr::new(ip.into(), port)),
        Some(Host::Ipv6(ip)) => Ok(SocketAddr::new(ip.into(), port)),
        Some(Host::Domain(domain)) => tokio::net::lookup_host((domain, port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| IpcError::UnknownHost(domain.to_string()).into()),
        None => Err(ServiceError::Usage(format!(
            "Endpoint URI {uri} has no host"
        ))),
    }
}

/// Creates a proxy for the interface `T` (`dyn ClientProtocol` or
/// `dyn ManagerProtocol`). Any other type fails with
/// [`ServiceError::UnsupportedProtocol`] before any network activity.
pub async fn create_proxy<T: ?Sized + 'static>(
    conf: &Configuration,
    uri: &str,
    worker_pool: WorkerPool,
) -> Result<ProxyInfo<Arc<T>>, ServiceError> {
    let interface = TypeId::of::<T>();
    let is_client = interface == TypeId::of::<dyn ClientProtocol>();
    if !is_client && interface != TypeId::of::<dyn ManagerProtocol>() {
        return Err(ServiceError::UnsupportedProtocol(type_name::<T>().to_string()));
    }

    let address = resolve_endpoint(uri).await?;
    let params = ProxyParams {
        address,
        conf,
        rpc_timeout: Duration::ZERO,
        socket_factory: Arc::new(TcpSocketFactory),
        worker_pool,
    };

    let proxy: Box<dyn Any> = if is_client {
        Box::new(create_client_proxy(params)?)
    } else {
        Box::new(create_manager_proxy(params)?)
    };

    let proxy = proxy
        .downcast::<Arc<T>>()
        .map_err(|_| ServiceError::UnsupportedProtocol(type_name::<T>().to_string()))?;

    tracing::debug!("Created {} proxy for {}", type_name::<T>(), address);
    Ok(ProxyInfo::new(*proxy, address))
}

fn create_client_proxy(params: ProxyParams<'_>) -> Result<Arc<dyn ClientProtocol>, ServiceError> {
    let mut conf = params.conf.clone();
    rpc::set_protocol_engine::<ClientManisDbProtocolPb>(&mut conf, ProtobufRpcEngine::NAME);

    let proxy = rpc::get_protocol_proxy::<ClientManisDbProtocolPb>(ProxyParams {
        conf: &conf,
        ..params
    })?;
    Ok(Arc::new(ClientProtocolTranslatorPb::new(proxy)))
}

fn create_manager_proxy(
    params: ProxyParams<'_>,
) -> Result<Arc<dyn ManagerProtocol>, ServiceError> {
    let proxy = rpc::get_protocol_proxy::<ManagerManisDbProtocolSerializable>(params)?;
    Ok(Arc::new(proxy))
}
