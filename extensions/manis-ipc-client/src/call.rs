use crate::IpcError;
use bytes::Bytes;
use manis_ipc::utils::next_call_id;
use manis_ipc::wire::RpcKind;
use tokio::sync::oneshot;

pub type CallResult = Result<Bytes, IpcError>;

/// One outstanding request.
///
/// A `Call` is completed exactly once: completion consumes it, so a late
/// second response has nothing left to complete.
#[derive(Debug)]
pub struct Call {
    id: i32,
    rpc_kind: RpcKind,
    rpc_request: Bytes,
    done: oneshot::Sender<CallResult>,
}

/// Caller-side half of a [`Call`].
#[derive(Debug)]
pub struct CallCompletion {
    id: i32,
    rx: oneshot::Receiver<CallResult>,
}

impl Call {
    /// Assigns the next process-wide call id.
    pub fn new(rpc_kind: RpcKind, rpc_request: Bytes) -> (Self, CallCompletion) {
        let id = next_call_id();
        let (done, rx) = oneshot::channel();
        (
            Call {
                id,
                rpc_kind,
                rpc_request,
                done,
            },
            CallCompletion { id, rx },
        )
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn rpc_kind(&self) -> RpcKind {
        self.rpc_kind
    }

    pub fn rpc_request(&self) -> &Bytes {
        &self.rpc_request
    }

    pub fn set_rpc_response(self, response: Bytes) {
        // The caller may have given up; nothing to deliver to then.
        let _ = self.done.send(Ok(response));
    }

    pub fn set_exception(self, error: IpcError) {
        let _ = self.done.send(Err(error));
    }
}

impl CallCompletion {
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Waits for the response or the error that completed the call.
    pub async fn wait(self) -> CallResult {
        self.rx.await.unwrap_or(Err(IpcError::Aborted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn response_reaches_completion() {
        let (call, completion) = Call::new(RpcKind::ProtocolBuffer, Bytes::from_static(b"req"));
        assert_eq!(call.id(), completion.id());
        call.set_rpc_response(Bytes::from_static(b"resp"));
        assert_eq!(completion.wait().await.unwrap(), Bytes::from_static(b"resp"));
    }

    #[tokio::test]
    async fn exception_reaches_completion() {
        let (call, completion) = Call::new(RpcKind::Serializable, Bytes::new());
        call.set_exception(IpcError::ClientStopped);
        assert_eq!(completion.wait().await, Err(IpcError::ClientStopped));
    }

    #[tokio::test]
    async fn dropped_call_is_aborted() {
        let (call, completion) = Call::new(RpcKind::Serializable, Bytes::new());
        drop(call);
        assert_eq!(completion.wait().await, Err(IpcError::Aborted));
    }

    #[test]
    fn ids_are_distinct() {
        let (a, _) = Call::new(RpcKind::Serializable, Bytes::new());
        let (b, _) = Call::new(RpcKind::Serializable, Bytes::new());
        assert_ne!(a.id(), b.id());
    }
}
