use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use manis_ipc::conf::{Configuration, keys};
use manis_ipc::wire::{RpcErrorProto, RpcKind, RpcResponse, RpcStatus, WireError};
use manis_ipc_client::{
    BoxedStream, Client, ConnectionId, ConnectionState, IpcError, ProtocolInfo, SocketFactory,
    SocketOptions, WorkerPool,
};
use manis_ipc_mock_server::MockServer;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const PROTOCOL: ProtocolInfo = ProtocolInfo::new("TestProtocol", 1);

fn remote_error(class: &str, message: &str) -> RpcErrorProto {
    RpcErrorProto {
        exception_class_name: class.to_string(),
        error_msg: message.to_string(),
    }
}

/// Never completes a connect, counting the attempts.
#[derive(Debug, Default)]
struct BlackholeSocketFactory {
    attempts: AtomicUsize,
}

#[async_trait]
impl SocketFactory for BlackholeSocketFactory {
    async fn connect(&self, _addr: SocketAddr, _options: SocketOptions) -> io::Result<BoxedStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// TCP stream whose writes start failing once `fail_writes` is set.
struct FlakyStream {
    inner: TcpStream,
    fail_writes: Arc<AtomicBool>,
}

impl AsyncRead for FlakyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FlakyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write side gone",
            )));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[derive(Debug, Default)]
struct FlakySocketFactory {
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl SocketFactory for FlakySocketFactory {
    async fn connect(&self, addr: SocketAddr, _options: SocketOptions) -> io::Result<BoxedStream> {
        Ok(Box::new(FlakyStream {
            inner: TcpStream::connect(addr).await?,
            fail_writes: self.fail_writes.clone(),
        }))
    }
}

#[tokio::test]
async fn test_connect_timeouts_are_retried_then_fail() {
    let mut conf = Configuration::new();
    conf.set_duration_ms(keys::IPC_CLIENT_CONNECT_TIMEOUT_KEY, Duration::from_millis(20));
    conf.set_int(keys::IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_KEY, 2);

    let factory = Arc::new(BlackholeSocketFactory::default());
    let client = Client::new(&conf, factory.clone(), WorkerPool::from_conf(&conf));
    let id = ConnectionId::new("127.0.0.1:1".parse().unwrap(), PROTOCOL, Duration::ZERO, &conf);

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
        .await
        .unwrap_err();

    assert!(matches!(err, IpcError::ConnectTimeout { attempts: 3, .. }));
    assert_eq!(factory.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(client.connection_count(), 0);

    client.stop().await;
}

#[tokio::test]
async fn test_connect_error_reaches_every_waiting_caller() {
    let mut conf = Configuration::new();
    conf.set_duration_ms(keys::IPC_CLIENT_CONNECT_TIMEOUT_KEY, Duration::from_millis(20));
    conf.set_int(keys::IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_KEY, 2);

    let factory = Arc::new(BlackholeSocketFactory::default());
    let client = Client::new(&conf, factory.clone(), WorkerPool::from_conf(&conf));
    let id = ConnectionId::new("127.0.0.1:1".parse().unwrap(), PROTOCOL, Duration::ZERO, &conf);

    let results = join_all([b"a".as_slice(), b"b".as_slice(), b"c".as_slice()].map(|p| {
        client.call(RpcKind::ProtocolBuffer, Bytes::copy_from_slice(p), &id)
    }))
    .await;

    for result in results {
        assert!(matches!(
            result,
            Err(IpcError::ConnectTimeout { attempts: 3, .. })
        ));
    }
    // All three callers waited on the same setup.
    assert_eq!(factory.attempts.load(Ordering::SeqCst), 3);

    client.stop().await;
}

#[tokio::test]
async fn test_stop_releases_caller_stuck_in_connect() {
    let mut conf = Configuration::new();
    conf.set_duration_ms(keys::IPC_CLIENT_CONNECT_TIMEOUT_KEY, Duration::from_millis(500));
    conf.set_int(keys::IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_KEY, 10);

    let factory = Arc::new(BlackholeSocketFactory::default());
    let client = Arc::new(Client::new(&conf, factory.clone(), WorkerPool::from_conf(&conf)));
    let id = ConnectionId::new("127.0.0.1:1".parse().unwrap(), PROTOCOL, Duration::ZERO, &conf);

    let pending = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.stop().await;

    let result = timeout(Duration::from_secs(2), pending)
        .await
        .expect("caller still blocked after stop")
        .unwrap();
    assert_eq!(result, Err(IpcError::ClientStopped));
    assert_eq!(factory.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_completes_while_peer_stops_reading() {
    // Accepts, then never reads, so a large request fills the send buffer.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let conf = Configuration::new();
    let client = Arc::new(Client::with_defaults(&conf, WorkerPool::from_conf(&conf)));
    let id = ConnectionId::new(address, PROTOCOL, Duration::ZERO, &conf);

    let pending = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .call(RpcKind::ProtocolBuffer, Bytes::from(vec![0u8; 64 << 20]), &id)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    timeout(Duration::from_secs(3), client.stop())
        .await
        .expect("stop hung on a blocked write");

    let result = timeout(Duration::from_secs(2), pending)
        .await
        .expect("pending call never completed")
        .unwrap();
    assert_eq!(result, Err(IpcError::ClientStopped));
}

#[tokio::test]
async fn test_write_failure_goes_to_sender_and_closes_connection() {
    let (server, mut rx) = MockServer::start().await.unwrap();

    let factory = Arc::new(FlakySocketFactory::default());
    let conf = Configuration::new();
    let client = Arc::new(Client::new(&conf, factory.clone(), WorkerPool::from_conf(&conf)));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let first = tokio::spawn({
        let client = client.clone();
        let id = id.clone();
        async move {
            client
                .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"first"), &id)
                .await
        }
    });
    // The first call is now pending on the server.
    let _incoming = rx.recv().await.unwrap();

    factory.fail_writes.store(true, Ordering::SeqCst);
    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"second"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, IpcError::Io { .. }));
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

    // The other pending call fails through the close, with the same cause.
    let first_result = timeout(Duration::from_secs(2), first)
        .await
        .expect("pending call not failed by the close")
        .unwrap();
    assert_eq!(first_result, Err(err));
    assert_eq!(client.connection_count(), 0);

    client.stop().await;
}

#[tokio::test]
async fn test_refused_connection_fails_call() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let conf = Configuration::new();
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(address, PROTOCOL, Duration::ZERO, &conf);

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, IpcError::Io { .. }));

    client.stop().await;
}

#[tokio::test]
async fn test_remote_error_fails_only_that_call() {
    let server = MockServer::start_with(|incoming| {
        if incoming.request.payload.as_ref() == b"bad" {
            Some(RpcResponse::error(
                incoming.call_id(),
                RpcStatus::Error,
                &remote_error("IOException", "table missing"),
            ))
        } else {
            Some(RpcResponse::success(incoming.call_id(), b"fine"))
        }
    })
    .await
    .unwrap();

    let conf = Configuration::new();
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"bad"), &id)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        IpcError::Remote {
            class: "IOException".into(),
            message: "table missing".into(),
        }
    );
    assert!(err.is_remote());

    let ok = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"good"), &id)
        .await
        .unwrap();
    assert_eq!(ok, Bytes::from_static(b"fine"));
    assert_eq!(server.accepted_connections(), 1);

    client.stop().await;
}

#[tokio::test]
async fn test_fatal_error_closes_connection() {
    let server = MockServer::start_with(|incoming| {
        if incoming.request.payload.as_ref() == b"fatal" {
            Some(RpcResponse::error(
                incoming.call_id(),
                RpcStatus::Fatal,
                &remote_error("FatalRpcServerException", "version mismatch"),
            ))
        } else {
            Some(RpcResponse::success(incoming.call_id(), b"fine"))
        }
    })
    .await
    .unwrap();

    let conf = Configuration::new();
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"fatal"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, IpcError::Fatal { .. }));

    // The next call must not reuse the doomed connection.
    client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"again"), &id)
        .await
        .unwrap();
    assert_eq!(server.accepted_connections(), 2);

    client.stop().await;
}

#[tokio::test]
async fn test_framing_error_fails_all_pending_calls() {
    let (server, mut rx) = MockServer::start().await.unwrap();
    tokio::spawn(async move {
        let first = rx.recv().await.unwrap();
        let _second = rx.recv().await.unwrap();
        first.reply_raw((-1i32).to_be_bytes().to_vec());
    });

    let conf = Configuration::new();
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let results = join_all([b"a".as_slice(), b"b".as_slice()].map(|p| {
        client.call(RpcKind::ProtocolBuffer, Bytes::copy_from_slice(p), &id)
    }))
    .await;

    for result in results {
        assert_eq!(result, Err(IpcError::Wire(WireError::NegativeLength(-1))));
    }
    assert_eq!(client.connection_count(), 0);

    client.stop().await;
}

#[tokio::test]
async fn test_oversized_response_closes_connection() {
    let server = MockServer::start_with(|incoming| {
        Some(RpcResponse::success(incoming.call_id(), &[7u8; 64]))
    })
    .await
    .unwrap();

    let mut conf = Configuration::new();
    conf.set_int(keys::IPC_MAXIMUM_RESPONSE_LENGTH_KEY, 16);
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IpcError::Wire(WireError::FrameTooLarge { max: 16, .. })
    ));

    client.stop().await;
}

#[tokio::test]
async fn test_response_for_unknown_call_is_discarded() {
    let server = MockServer::start_with(|incoming| {
        incoming.reply(RpcResponse::success(999_999, b"stray"));
        Some(RpcResponse::success(incoming.call_id(), b"mine"))
    })
    .await
    .unwrap();

    let conf = Configuration::new();
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let reply = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
        .await
        .unwrap();
    assert_eq!(reply, Bytes::from_static(b"mine"));

    client.stop().await;
}

#[tokio::test]
async fn test_idle_connection_is_closed_and_replaced() {
    let server = MockServer::start_with(|incoming| {
        Some(RpcResponse::success(incoming.call_id(), b"ok"))
    })
    .await
    .unwrap();

    let mut conf = Configuration::new();
    conf.set_duration_ms(
        keys::IPC_CLIENT_CONNECTION_MAXIDLETIME_KEY,
        Duration::from_millis(100),
    );
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
        .await
        .unwrap();
    let connection = client.connection(&id).unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(client.connection_count(), 0);

    client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"y"), &id)
        .await
        .unwrap();
    assert_eq!(server.accepted_connections(), 2);

    client.stop().await;
}

#[tokio::test]
async fn test_read_timeout_fails_pending_call() {
    let (server, _rx) = MockServer::start().await.unwrap();

    let mut conf = Configuration::new();
    conf.set_bool(keys::IPC_CLIENT_PING_KEY, false);
    let client = Client::with_defaults(&conf, WorkerPool::from_conf(&conf));
    let id = ConnectionId::new(
        server.address(),
        PROTOCOL,
        Duration::from_millis(100),
        &conf,
    );

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"x"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, IpcError::ReadTimeout { .. }));

    client.stop().await;
}

#[tokio::test]
async fn test_stop_fails_pending_calls_and_rejects_new_ones() {
    let (server, mut rx) = MockServer::start().await.unwrap();
    let conf = Configuration::new();
    let client = Arc::new(Client::with_defaults(&conf, WorkerPool::from_conf(&conf)));
    let id = ConnectionId::new(server.address(), PROTOCOL, Duration::ZERO, &conf);

    let pending = tokio::spawn({
        let client = client.clone();
        let id = id.clone();
        async move {
            client
                .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"slow"), &id)
                .await
        }
    });

    // Wait until the request reached the server so the call is pending.
    let _incoming = rx.recv().await.unwrap();

    client.stop().await;
    assert_eq!(pending.await.unwrap(), Err(IpcError::ClientStopped));
    assert!(!client.is_running());
    assert_eq!(client.connection_count(), 0);

    let err = client
        .call(RpcKind::ProtocolBuffer, Bytes::from_static(b"late"), &id)
        .await
        .unwrap_err();
    assert_eq!(err, IpcError::ClientStopped);

    // Stopping twice is a no-op.
    client.stop().await;
}
