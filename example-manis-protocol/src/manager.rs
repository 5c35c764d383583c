use crate::create_proxy;
use crate::protocol::ManagerProtocol;
use manis_ipc::conf::Configuration;
use manis_ipc_client::WorkerPool;
use manis_rpc_engine::{ServiceError, rpc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Administrative client of a Manis database.
pub struct Manager {
    client_running: AtomicBool,
    manis_db: Arc<dyn ManagerProtocol>,
}

impl Manager {
    pub async fn new(
        uri: &str,
        conf: &Configuration,
        worker_pool: WorkerPool,
    ) -> Result<Self, ServiceError> {
        let proxy_info = create_proxy::<dyn ManagerProtocol>(conf, uri, worker_pool).await?;

        Ok(Self {
            client_running: AtomicBool::new(true),
            manis_db: proxy_info.into_proxy(),
        })
    }

    pub async fn set_max_table(&self, table_num: i32) -> Result<bool, ServiceError> {
        self.manis_db.set_max_table(table_num).await
    }

    pub async fn close(&self) -> Result<(), ServiceError> {
        if self.client_running.swap(false, Ordering::SeqCst) {
            rpc::stop_proxy(self.manis_db.as_proxy_object()).await?;
        }
        Ok(())
    }
}
