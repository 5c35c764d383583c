use crate::{BoxedStream, Call, ConnectionId, IpcError, SocketFactory, SocketOptions, WorkerPool};
use bytes::Bytes;
use manis_ipc::constants::{CONNECTION_CONTEXT_CALL_ID, INVALID_RETRY_COUNT, PING_CALL_ID};
use manis_ipc::utils::ClientId;
use manis_ipc::wire::{
    ConnectionHeader, IpcConnectionContextProto, RpcKind, RpcOperation, RpcRequestHeaderProto,
    RpcResponse, RpcStatus, check_frame_length, encode_delimited, encode_frame,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};
use tokio::sync::{Mutex as AsyncMutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

type Reader = BufReader<ReadHalf<BoxedStream>>;
type Writer = BufWriter<WriteHalf<BoxedStream>>;

pub(crate) type ConnectionTable = Mutex<HashMap<ConnectionId, Arc<Connection>>>;

/// Client-wide values every connection needs.
#[derive(Debug)]
pub(crate) struct ConnectionSettings {
    pub client_id: ClientId,
    pub connection_timeout: Duration,
    pub max_response_length: usize,
    pub socket_factory: Arc<dyn SocketFactory>,
    pub worker_pool: WorkerPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Handshaking,
    Ready,
    Closing,
    Closed,
}

/// A single socket to one server, multiplexing many calls.
///
/// A connection is created on demand by [`crate::Client`], set up by the
/// first caller that reaches it, and torn down by its receiver task once it
/// is idle, broken or stopped. A closed connection is never reused.
pub struct Connection {
    remote_id: ConnectionId,
    name: String,
    settings: Arc<ConnectionSettings>,
    connections: Weak<ConnectionTable>,

    state: Mutex<ConnectionState>,
    setup_lock: AsyncMutex<()>,
    out: AsyncMutex<Option<Writer>>,
    calls: Mutex<HashMap<i32, Call>>,
    should_close: AtomicBool,
    closed: AtomicBool,
    close_reason: Mutex<Option<IpcError>>,
    last_activity: Mutex<Instant>,
    work_available: Notify,
    closing: watch::Sender<bool>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Connection {
    pub(crate) fn new(
        remote_id: ConnectionId,
        settings: Arc<ConnectionSettings>,
        connections: Weak<ConnectionTable>,
    ) -> Self {
        let name = format!(
            "IPC Client ({:?}) connection to {} from {}",
            settings.client_id,
            remote_id.address(),
            remote_id.protocol().name
        );

        Self {
            remote_id,
            name,
            settings,
            connections,
            state: Mutex::new(ConnectionState::New),
            setup_lock: AsyncMutex::new(()),
            out: AsyncMutex::new(None),
            calls: Mutex::new(HashMap::new()),
            should_close: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_reason: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
            work_available: Notify::new(),
            closing: watch::Sender::new(false),
            receiver: Mutex::new(None),
        }
    }

    pub fn remote_id(&self) -> &ConnectionId {
        &self.remote_id
    }

    pub fn server(&self) -> SocketAddr {
        self.remote_id.address()
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub fn pending_calls(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn is_closing(&self) -> bool {
        self.should_close.load(Ordering::SeqCst)
    }

    /// Registers `call` as pending. A closing connection hands the call back.
    pub(crate) fn add_call(&self, call: Call) -> Result<(), Call> {
        let mut calls = lock(&self.calls);
        if self.is_closing() {
            return Err(call);
        }
        calls.insert(call.id(), call);
        drop(calls);

        self.work_available.notify_one();
        Ok(())
    }

    pub(crate) fn remove_call(&self, id: i32) -> Option<Call> {
        lock(&self.calls).remove(&id)
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    fn close_reason(&self) -> IpcError {
        lock(&self.close_reason)
            .clone()
            .unwrap_or(IpcError::ConnectionClosed(self.server()))
    }

    /// Flags the connection for teardown. The first reason recorded wins.
    pub(crate) fn mark_closed(&self, reason: IpcError) {
        let _calls = lock(&self.calls);
        if self.should_close.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!("{}: marked closed: {}", self.name, reason);
        *lock(&self.close_reason) = Some(reason);
        self.set_state(ConnectionState::Closing);
        self.work_available.notify_one();
        self.closing.send_replace(true);
    }

    /// Resolves once the connection has been marked closed.
    async fn closed_signal(&self) {
        let mut closing = self.closing.subscribe();
        let _ = closing.wait_for(|closing| *closing).await;
    }

    /// Closes the connection when nothing is pending. Decided under the
    /// pending-table lock so a concurrent `add_call` either lands first or
    /// is refused.
    fn close_if_idle(&self) -> bool {
        let calls = lock(&self.calls);
        if !calls.is_empty() || self.should_close.swap(true, Ordering::SeqCst) {
            return false;
        }

        tracing::debug!("{}: closing idle connection", self.name);
        *lock(&self.close_reason) = Some(IpcError::IdleTimeout(self.server()));
        self.set_state(ConnectionState::Closing);
        self.closing.send_replace(true);
        true
    }

    /// Connects and performs the handshake, once. Concurrent callers wait
    /// for the first; later callers return immediately. On failure the
    /// connection is closed and every pending call fails with the cause.
    /// Marking the connection closed abandons a setup still in progress.
    pub(crate) async fn setup_io_streams(self: &Arc<Self>) {
        let _guard = self.setup_lock.lock().await;
        if self.is_closing() || self.state() != ConnectionState::New {
            return;
        }

        tracing::debug!("Connecting to {}", self.server());
        let established = tokio::select! {
            _ = self.closed_signal() => Err(self.close_reason()),
            established = self.establish() => established,
        };

        match established {
            _ if self.is_closing() => self.close().await,
            Ok((reader, writer)) => {
                *self.out.lock().await = Some(writer);
                self.touch();
                self.set_state(ConnectionState::Ready);

                let connection = Arc::clone(self);
                let handle = tokio::spawn(async move { connection.run(reader).await });
                *lock(&self.receiver) = Some(handle);
            }
            Err(e) => {
                tracing::warn!("{}: setup failed: {}", self.name, e);
                self.mark_closed(e);
                self.close().await;
            }
        }
    }

    async fn establish(&self) -> Result<(Reader, Writer), IpcError> {
        self.set_state(ConnectionState::Connecting);
        let stream = self.setup_connection().await?;

        self.set_state(ConnectionState::Handshaking);
        let (read_half, write_half) = tokio::io::split(stream);
        let mut writer = BufWriter::new(write_half);

        writer.write_all(&ConnectionHeader::default().encode()).await?;
        self.write_connection_context(&mut writer).await?;
        writer.flush().await?;

        Ok((BufReader::new(read_half), writer))
    }

    async fn setup_connection(&self) -> Result<BoxedStream, IpcError> {
        let options = SocketOptions {
            tcp_no_delay: self.remote_id.tcp_no_delay(),
            keep_alive: true,
        };
        let mut timeout_failures = 0u32;

        loop {
            let attempt = timeout(
                self.settings.connection_timeout,
                self.settings.socket_factory.connect(self.server(), options),
            )
            .await;

            match attempt {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                    self.handle_connection_timeout(&mut timeout_failures)?;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => self.handle_connection_timeout(&mut timeout_failures)?,
            }
        }
    }

    fn handle_connection_timeout(&self, failures: &mut u32) -> Result<(), IpcError> {
        let current = *failures;
        *failures += 1;

        let max_retries = self.remote_id.max_retries_on_socket_timeouts();
        if current >= max_retries {
            return Err(IpcError::ConnectTimeout {
                addr: self.server(),
                attempts: *failures,
            });
        }

        tracing::info!(
            "Retrying connect to server: {}. Already tried {} time(s); maxRetries={}",
            self.server(),
            *failures,
            max_retries
        );
        Ok(())
    }

    async fn write_connection_context(&self, writer: &mut Writer) -> Result<(), IpcError> {
        let header = RpcRequestHeaderProto::new(
            RpcKind::ProtocolBuffer,
            RpcOperation::FinalPacket,
            CONNECTION_CONTEXT_CALL_ID,
            INVALID_RETRY_COUNT,
            self.settings.client_id.as_bytes(),
        );
        let context = IpcConnectionContextProto {
            protocol: self.remote_id.protocol().name.to_string(),
        };

        let mut body = Vec::new();
        encode_delimited(&context, &mut body);
        writer.write_all(&encode_frame(&header, &body)).await?;
        Ok(())
    }

    /// Serializes the request frame on the calling task and writes it from
    /// the worker pool. Only a write failure is reported here; the response
    /// arrives through the call's completion.
    pub(crate) async fn send_rpc_request(
        self: &Arc<Self>,
        call_id: i32,
        rpc_kind: RpcKind,
        rpc_request: &Bytes,
    ) -> Result<(), IpcError> {
        if self.is_closing() {
            return Ok(());
        }

        let header = RpcRequestHeaderProto::new(
            rpc_kind,
            RpcOperation::FinalPacket,
            call_id,
            INVALID_RETRY_COUNT,
            self.settings.client_id.as_bytes(),
        );
        let frame = encode_frame(&header, rpc_request);

        let connection = Arc::clone(self);
        self.settings
            .worker_pool
            .submit(async move { connection.write_frame(call_id, &frame).await })
            .await?
    }

    async fn write_frame(&self, call_id: i32, frame: &[u8]) -> Result<(), IpcError> {
        let mut out = self.out.lock().await;
        if self.is_closing() {
            return Ok(());
        }
        let Some(writer) = out.as_mut() else {
            return Err(IpcError::ConnectionClosed(self.server()));
        };

        tracing::debug!("{} sending #{}", self.name, call_id);
        let written = tokio::select! {
            // The close path fails this call along with the others.
            _ = self.closed_signal() => return Ok(()),
            written = async {
                writer.write_all(frame).await?;
                writer.flush().await
            } => written,
        };

        if let Err(e) = written {
            let error = IpcError::from(e);
            self.mark_closed(error.clone());
            return Err(error);
        }
        Ok(())
    }

    async fn send_ping(&self) -> Result<(), IpcError> {
        let header = RpcRequestHeaderProto::new(
            RpcKind::ProtocolBuffer,
            RpcOperation::FinalPacket,
            PING_CALL_ID,
            INVALID_RETRY_COUNT,
            self.settings.client_id.as_bytes(),
        );
        let frame = encode_frame(&header, &[]);

        let mut out = self.out.lock().await;
        let Some(writer) = out.as_mut() else {
            return Ok(());
        };

        tracing::trace!("{}: sending ping", self.name);
        tokio::select! {
            _ = self.closed_signal() => Err(self.close_reason()),
            written = async {
                writer.write_all(&frame).await?;
                writer.flush().await
            } => Ok(written?),
        }
    }

    async fn run(self: Arc<Self>, mut reader: Reader) {
        tracing::debug!("{}: starting", self.name);

        while self.wait_for_work().await {
            let received = tokio::select! {
                _ = self.closed_signal() => Err(self.close_reason()),
                received = self.receive_rpc_response(&mut reader) => received,
            };
            if let Err(e) = received {
                self.mark_closed(e);
                break;
            }
        }

        self.close().await;
        tracing::debug!("{}: stopped", self.name);
    }

    /// Returns `true` when there are calls to read responses for, `false`
    /// once the connection should shut down.
    async fn wait_for_work(&self) -> bool {
        loop {
            if self.is_closing() {
                return false;
            }
            if self.pending_calls() > 0 {
                return true;
            }

            let idle_deadline = *lock(&self.last_activity) + self.remote_id.max_idle_time();
            if Instant::now() >= idle_deadline {
                if self.close_if_idle() {
                    return false;
                }
                continue;
            }

            tokio::select! {
                _ = self.work_available.notified() => {}
                _ = tokio::time::sleep_until(idle_deadline) => {}
            }
        }
    }

    async fn with_read_timeout<F, T>(&self, fut: F) -> Result<T, IpcError>
    where
        F: Future<Output = T>,
    {
        match self.remote_id.read_timeout() {
            Some(limit) => timeout(limit, fut).await.map_err(|_| IpcError::ReadTimeout {
                addr: self.server(),
                timeout: limit,
            }),
            None => Ok(fut.await),
        }
    }

    /// Reads one response frame and completes the call it belongs to.
    async fn receive_rpc_response(&self, reader: &mut Reader) -> Result<(), IpcError> {
        loop {
            let ready = self
                .with_read_timeout(async { reader.fill_buf().await.map(|buf| !buf.is_empty()) })
                .await;

            match ready {
                Ok(Ok(true)) => break,
                Ok(Ok(false)) => return Err(IpcError::ConnectionClosed(self.server())),
                Ok(Err(e)) => return Err(e.into()),
                Err(timed_out) => {
                    if self.remote_id.do_ping() && self.remote_id.rpc_timeout().is_zero() {
                        self.send_ping().await?;
                    } else {
                        return Err(timed_out);
                    }
                }
            }
        }

        let body = self
            .with_read_timeout(Self::read_frame(reader, self.settings.max_response_length))
            .await??;
        self.touch();

        let response = RpcResponse::decode(&body)?;
        let call_id = response.header.call_id as i32;
        let status = response.header.rpc_status()?;
        tracing::debug!("{} got value #{}", self.name, call_id);

        let outcome = match status {
            RpcStatus::Success => Ok(response.payload),
            RpcStatus::Error => {
                let error = response.error_payload()?;
                Err(IpcError::Remote {
                    class: error.exception_class_name,
                    message: error.error_msg,
                })
            }
            RpcStatus::Fatal => {
                let error = response.error_payload()?;
                Err(IpcError::Fatal {
                    class: error.exception_class_name,
                    message: error.error_msg,
                })
            }
        };

        let fatal = match &outcome {
            Err(e @ IpcError::Fatal { .. }) => Some(e.clone()),
            _ => None,
        };
        if let Some(e) = &fatal {
            // Refuse new calls before the failed one is released to its caller.
            self.mark_closed(e.clone());
        }

        match self.remove_call(call_id) {
            Some(call) => match outcome {
                Ok(payload) => call.set_rpc_response(payload),
                Err(e) => call.set_exception(e),
            },
            None => tracing::warn!(
                "{}: discarding response for unknown call #{}",
                self.name,
                call_id
            ),
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn read_frame(reader: &mut Reader, max_length: usize) -> Result<Vec<u8>, IpcError> {
        let length = check_frame_length(reader.read_i32().await?, max_length)?;
        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;
        Ok(body)
    }

    /// Tears the connection down: leaves the pool, closes the socket and
    /// fails every pending call with the close reason. Runs once.
    pub(crate) async fn close(self: &Arc<Self>) {
        if !self.is_closing() {
            tracing::error!("{}: close requested on a connection not marked closed", self.name);
            return;
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(table) = self.connections.upgrade() {
            let mut table = lock(&table);
            if table
                .get(&self.remote_id)
                .is_some_and(|existing| Arc::ptr_eq(existing, self))
            {
                table.remove(&self.remote_id);
            }
        }

        let reason = self.close_reason();
        let calls: Vec<Call> = lock(&self.calls).drain().map(|(_, call)| call).collect();
        if !calls.is_empty() {
            tracing::warn!(
                "{}: failing {} pending call(s): {}",
                self.name,
                calls.len(),
                reason
            );
        }
        for call in calls {
            call.set_exception(reason.clone());
        }

        // Writers give up the lock once the connection is marked closed. No
        // flush here: the peer may no longer be reading.
        drop(self.out.lock().await.take());

        self.set_state(ConnectionState::Closed);
        tracing::debug!("{}: closed", self.name);
    }

    /// Marks the connection closed and waits for teardown to finish.
    pub(crate) async fn shutdown(self: &Arc<Self>, reason: IpcError) {
        self.mark_closed(reason);

        let receiver = lock(&self.receiver).take();
        match receiver {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!("{}: receiver task failed: {}", self.name, e);
                    self.close().await;
                }
            }
            None => self.close().await,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote_id", &self.remote_id)
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
