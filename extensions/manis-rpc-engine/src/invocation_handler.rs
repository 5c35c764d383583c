use crate::{MethodDescriptor, RpcValue, ServiceError};
use async_trait::async_trait;
use manis_ipc_client::ConnectionId;

/// Turns a method call on a proxy into a remote call.
///
/// `args` mirrors the method's parameter list; `None` stands for an absent
/// argument.
#[async_trait]
pub trait RpcInvocationHandler: Send + Sync {
    async fn invoke(
        &self,
        method: &MethodDescriptor,
        args: Vec<Option<RpcValue>>,
    ) -> Result<RpcValue, ServiceError>;

    /// Stops the client behind this handler. Closing twice is a no-op.
    async fn close(&self);

    fn connection_id(&self) -> &ConnectionId;
}
