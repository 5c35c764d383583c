//! The service interfaces as application code sees them.

use async_trait::async_trait;
use manis_rpc_engine::{ProxyObject, ServiceError};

#[async_trait]
pub trait ClientProtocol: Send + Sync {
    /// Number of records in table `tb_name` of database `db_name`.
    async fn get_table_count(&self, db_name: &str, tb_name: &str) -> Result<i32, ServiceError>;

    fn as_proxy_object(&self) -> &dyn ProxyObject;
}

#[async_trait]
pub trait ManagerProtocol: Send + Sync {
    /// Sets the maximum number of tables; `true` on success.
    async fn set_max_table(&self, table_num: i32) -> Result<bool, ServiceError>;

    fn as_proxy_object(&self) -> &dyn ProxyObject;
}
