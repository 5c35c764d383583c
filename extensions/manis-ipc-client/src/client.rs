use crate::connection::{ConnectionSettings, ConnectionTable};
use crate::{Call, Connection, ConnectionId, IpcError, SocketFactory, TcpSocketFactory, WorkerPool};
use bytes::Bytes;
use manis_ipc::conf::{Configuration, keys};
use manis_ipc::utils::ClientId;
use manis_ipc::wire::RpcKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Pool of connections to remote servers.
///
/// Calls with equal [`ConnectionId`]s share one connection; each call waits
/// only for its own response. Connections are opened lazily and closed by
/// themselves once idle for longer than their max idle time.
///
/// Call [`Client::stop`] when done. A client dropped while still running
/// marks its connections closed and releases its worker pool reference from
/// a spawned task, which needs a tokio runtime to be current.
///
/// ```no_run
/// # async fn demo(remote_id: manis_ipc_client::ConnectionId) -> Result<(), manis_ipc_client::IpcError> {
/// use manis_ipc::conf::Configuration;
/// use manis_ipc::wire::RpcKind;
/// use manis_ipc_client::{Client, WorkerPool};
///
/// let conf = Configuration::new();
/// let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
/// let response = client
///     .call(RpcKind::ProtocolBuffer, bytes::Bytes::new(), &remote_id)
///     .await?;
/// client.stop().await;
/// # Ok(()) }
/// ```
pub struct Client {
    connections: Arc<ConnectionTable>,
    running: AtomicBool,
    settings: Arc<ConnectionSettings>,
}

impl Client {
    /// Creates a client holding one reference on `worker_pool`; the reference
    /// is released by [`Client::stop`].
    pub fn new(
        conf: &Configuration,
        socket_factory: Arc<dyn SocketFactory>,
        worker_pool: WorkerPool,
    ) -> Self {
        worker_pool.acquire();

        let max_response_length = conf.get_u64(
            keys::IPC_MAXIMUM_RESPONSE_LENGTH_KEY,
            keys::IPC_MAXIMUM_RESPONSE_LENGTH_DEFAULT,
        );

        let settings = ConnectionSettings {
            client_id: ClientId::random(),
            connection_timeout: conf.get_duration_ms(
                keys::IPC_CLIENT_CONNECT_TIMEOUT_KEY,
                keys::IPC_CLIENT_CONNECT_TIMEOUT_DEFAULT,
            ),
            max_response_length: usize::try_from(max_response_length).unwrap_or(usize::MAX),
            socket_factory,
            worker_pool,
        };

        tracing::debug!("Created IPC client {:?}", settings.client_id);

        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            running: AtomicBool::new(true),
            settings: Arc::new(settings),
        }
    }

    /// A client over plain TCP.
    pub fn with_defaults(conf: &Configuration, worker_pool: WorkerPool) -> Self {
        Self::new(conf, Arc::new(TcpSocketFactory), worker_pool)
    }

    pub fn client_id(&self) -> ClientId {
        self.settings.client_id
    }

    pub fn socket_factory(&self) -> &Arc<dyn SocketFactory> {
        &self.settings.socket_factory
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of connections currently pooled.
    pub fn connection_count(&self) -> usize {
        self.lock_connections().len()
    }

    pub fn connection(&self, remote_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.lock_connections().get(remote_id).cloned()
    }

    /// Sends `rpc_request` over the connection for `remote_id` and waits for
    /// the matching response payload.
    pub async fn call(
        &self,
        rpc_kind: RpcKind,
        rpc_request: Bytes,
        remote_id: &ConnectionId,
    ) -> Result<Bytes, IpcError> {
        let (call, completion) = Call::new(rpc_kind, rpc_request.clone());
        let call_id = call.id();

        let connection = self.get_connection(remote_id, call).await?;
        if let Err(e) = connection
            .send_rpc_request(call_id, rpc_kind, &rpc_request)
            .await
        {
            connection.remove_call(call_id);
            return Err(e);
        }

        completion.wait().await
    }

    /// Finds or creates the pooled connection, registers `call` on it and
    /// makes sure it is set up. Closing connections are evicted and replaced.
    async fn get_connection(
        &self,
        remote_id: &ConnectionId,
        mut call: Call,
    ) -> Result<Arc<Connection>, IpcError> {
        let connection = loop {
            let connection = {
                let mut connections = self.lock_connections();
                if !self.is_running() {
                    return Err(IpcError::ClientStopped);
                }
                connections
                    .entry(remote_id.clone())
                    .or_insert_with(|| {
                        Arc::new(Connection::new(
                            remote_id.clone(),
                            Arc::clone(&self.settings),
                            Arc::downgrade(&self.connections),
                        ))
                    })
                    .clone()
            };

            match connection.add_call(call) {
                Ok(()) => break connection,
                Err(rejected) => {
                    call = rejected;
                    self.evict(&connection);
                    tokio::task::yield_now().await;
                }
            }
        };

        connection.setup_io_streams().await;
        Ok(connection)
    }

    fn evict(&self, connection: &Arc<Connection>) {
        let mut connections = self.lock_connections();
        if connections
            .get(connection.remote_id())
            .is_some_and(|existing| Arc::ptr_eq(existing, connection))
        {
            connections.remove(connection.remote_id());
        }
    }

    /// Stops the client: new calls are refused, every connection is closed,
    /// pending calls fail with [`IpcError::ClientStopped`], and the worker
    /// pool reference is released. Later calls are no-ops.
    pub async fn stop(&self) {
        let connections: Vec<Arc<Connection>> = {
            let connections = self.lock_connections();
            if !self.running.swap(false, Ordering::SeqCst) {
                return;
            }
            connections.values().cloned().collect()
        };

        tracing::debug!(
            "Stopping client {:?} with {} connection(s)",
            self.settings.client_id,
            connections.len()
        );

        for connection in connections {
            connection.shutdown(IpcError::ClientStopped).await;
        }

        self.settings.worker_pool.release().await;
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<Connection>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        tracing::warn!(
            "Client {:?} dropped without stop(); closing its connections",
            self.settings.client_id
        );
        for connection in self.lock_connections().values() {
            connection.mark_closed(IpcError::ClientStopped);
        }

        let worker_pool = self.settings.worker_pool.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { worker_pool.release().await });
            }
            Err(_) => tracing::warn!(
                "Client {:?} dropped outside a runtime; its worker pool reference is not released",
                self.settings.client_id
            ),
        }
    }
}
