//! Process-wide entry points: engine selection, proxy creation and release.
//!
//! The engine for a protocol is chosen from `rpc.engine.<protocol name>` the
//! first time the protocol is looked up and cached for the life of the
//! process; later configuration changes do not affect it.

use crate::{
    ProtobufRpcEngine, ProxyObject, ProxyParams, RpcEngine, RpcProtocol, SerializableRpcEngine,
    ServiceError,
};
use manis_ipc::conf::{Configuration, keys};
use manis_ipc_client::ProtocolInfo;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type EngineFactory = fn() -> Arc<dyn RpcEngine>;

fn protobuf_engine() -> Arc<dyn RpcEngine> {
    Arc::new(ProtobufRpcEngine)
}

fn serializable_engine() -> Arc<dyn RpcEngine> {
    Arc::new(SerializableRpcEngine)
}

static ENGINE_FACTORIES: Lazy<Mutex<HashMap<String, EngineFactory>>> = Lazy::new(|| {
    let mut factories: HashMap<String, EngineFactory> = HashMap::new();
    factories.insert(ProtobufRpcEngine::NAME.to_string(), protobuf_engine);
    factories.insert(SerializableRpcEngine::NAME.to_string(), serializable_engine);
    Mutex::new(factories)
});

static PROTOCOL_ENGINES: Lazy<Mutex<HashMap<TypeId, Arc<dyn RpcEngine>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The configuration key selecting the engine for `protocol`.
pub fn engine_key(protocol: &ProtocolInfo) -> String {
    format!("{}.{}", keys::RPC_ENGINE_KEY_PREFIX, protocol.name)
}

/// Makes `factory` selectable under `name`, replacing any previous entry.
pub fn register_engine_factory(name: impl Into<String>, factory: EngineFactory) {
    lock(&ENGINE_FACTORIES).insert(name.into(), factory);
}

/// Records in `conf` which engine `P` should use.
pub fn set_protocol_engine<P: RpcProtocol>(conf: &mut Configuration, engine: &str) {
    conf.set(engine_key(&P::INFO), engine);
}

/// Returns the engine for `P`, creating and caching it on first use.
pub fn get_protocol_engine<P: RpcProtocol>(
    conf: &Configuration,
) -> Result<Arc<dyn RpcEngine>, ServiceError> {
    let mut engines = lock(&PROTOCOL_ENGINES);
    if let Some(engine) = engines.get(&TypeId::of::<P>()) {
        return Ok(engine.clone());
    }

    let name = conf.get_or(&engine_key(&P::INFO), SerializableRpcEngine::NAME);
    let factory = lock(&ENGINE_FACTORIES).get(name).copied().ok_or_else(|| {
        ServiceError::Usage(format!(
            "Unknown rpc engine '{}' configured for {}",
            name,
            P::INFO.name
        ))
    })?;

    let engine = factory();
    tracing::debug!("Using {} engine for {}", engine.name(), P::INFO);
    engines.insert(TypeId::of::<P>(), engine.clone());
    Ok(engine)
}

/// Creates a proxy for `P` bound to `params.address`.
pub fn get_protocol_proxy<P: RpcProtocol>(
    params: ProxyParams<'_>,
) -> Result<P::Proxy, ServiceError> {
    let engine = get_protocol_engine::<P>(params.conf)?;
    let handler = engine.get_invoker(P::INFO, params);
    Ok(P::new_proxy(handler))
}

/// Releases `proxy` by closing its invocation handler.
pub async fn stop_proxy(proxy: &dyn ProxyObject) -> Result<(), ServiceError> {
    match proxy.invocation_handler() {
        Some(handler) => {
            handler.close().await;
            Ok(())
        }
        None => Err(ServiceError::Usage(
            "Cannot close proxy - is not Closeable or does not provide closeable invocation handler"
                .to_string(),
        )),
    }
}
