use crate::create_proxy;
use crate::protocol::ClientProtocol;
use manis_ipc::conf::Configuration;
use manis_ipc_client::WorkerPool;
use manis_rpc_engine::{ServiceError, rpc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Application-facing client of a Manis database.
pub struct ManisClient {
    client_running: AtomicBool,
    address: SocketAddr,
    manis_db: Arc<dyn ClientProtocol>,
}

impl ManisClient {
    pub async fn new(
        uri: &str,
        conf: &Configuration,
        worker_pool: WorkerPool,
    ) -> Result<Self, ServiceError> {
        let proxy_info = create_proxy::<dyn ClientProtocol>(conf, uri, worker_pool).await?;

        Ok(Self {
            client_running: AtomicBool::new(true),
            address: proxy_info.address(),
            manis_db: proxy_info.into_proxy(),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub async fn get_table_count(&self, db_name: &str, tb_name: &str) -> Result<i32, ServiceError> {
        self.manis_db.get_table_count(db_name, tb_name).await
    }

    /// Releases the connection to the database. Only the first call has an
    /// effect.
    pub async fn close(&self) -> Result<(), ServiceError> {
        if self.client_running.swap(false, Ordering::SeqCst) {
            rpc::stop_proxy(self.manis_db.as_proxy_object()).await?;
        }
        Ok(())
    }
}
