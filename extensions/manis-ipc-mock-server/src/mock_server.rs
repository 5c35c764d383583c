//! A server that accepts the client handshake and hands every request to the
//! test, which decides when and how to answer. Responses can be sent out of
//! order, delayed, or replaced by arbitrary bytes.

use crate::utils::bind_tcp_listener_on_random_port;
use manis_ipc::constants::{CONNECTION_HEADER_SIZE, PING_CALL_ID};
use manis_ipc::wire::{
    ConnectionHeader, IpcConnectionContextProto, RpcRequest, RpcRequestHeaderProto, RpcResponse,
    decode_delimited,
};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a client sent before its first request.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub connection: usize,
    pub header: ConnectionHeader,
    pub context_header: RpcRequestHeaderProto,
    pub context: IpcConnectionContextProto,
}

/// A request received on one of the server's connections.
#[derive(Debug)]
pub struct Incoming {
    pub connection: usize,
    pub request: RpcRequest,
    reply: mpsc::UnboundedSender<Vec<u8>>,
}

impl Incoming {
    pub fn call_id(&self) -> u32 {
        self.request.header.call_id as u32
    }

    /// Writes `response` back on the connection the request came from.
    pub fn reply(&self, response: RpcResponse) -> bool {
        self.reply_raw(response.encode())
    }

    /// Writes `bytes` verbatim, framing included.
    pub fn reply_raw(&self, bytes: Vec<u8>) -> bool {
        self.reply.send(bytes).is_ok()
    }
}

#[derive(Debug, Default)]
struct ServerStats {
    accepted: AtomicUsize,
    pings: AtomicUsize,
    handshakes: Mutex<Vec<Handshake>>,
}

#[derive(Debug)]
pub struct MockServer {
    address: SocketAddr,
    stats: Arc<ServerStats>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Starts a server whose requests are delivered on the returned channel.
    pub async fn start() -> io::Result<(Self, mpsc::UnboundedReceiver<Incoming>)> {
        let (listener, address) = bind_tcp_listener_on_random_port().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ServerStats::default());

        let task = tokio::spawn(Self::accept_loop(listener, tx, stats.clone()));
        tracing::info!("Mock server running on {:?}", address);

        Ok((
            Self {
                address,
                stats,
                task,
            },
            rx,
        ))
    }

    /// Starts a server that answers each request with whatever `handler`
    /// returns. `None` leaves the request unanswered.
    pub async fn start_with<F>(handler: F) -> io::Result<Self>
    where
        F: Fn(&Incoming) -> Option<RpcResponse> + Send + 'static,
    {
        let (server, mut rx) = Self::start().await?;
        tokio::spawn(async move {
            while let Some(incoming) = rx.recv().await {
                if let Some(response) = handler(&incoming) {
                    incoming.reply(response);
                }
            }
        });
        Ok(server)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn accepted_connections(&self) -> usize {
        self.stats.accepted.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.stats.pings.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.stats
            .handshakes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn accept_loop(
        listener: TcpListener,
        tx: mpsc::UnboundedSender<Incoming>,
        stats: Arc<ServerStats>,
    ) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Mock server accept failed: {}", e);
                    break;
                }
            };

            let connection = stats.accepted.fetch_add(1, Ordering::SeqCst);
            tracing::info!("Client connected: {} (#{})", peer, connection);

            let tx = tx.clone();
            let stats = stats.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, connection, tx, stats).await {
                    tracing::info!("Connection #{} ended: {}", connection, e);
                }
            });
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        connection: usize,
        tx: mpsc::UnboundedSender<Incoming>,
        stats: Arc<ServerStats>,
    ) -> io::Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (reply, mut outbound) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            while let Some(bytes) = outbound.recv().await {
                if writer.write_all(&bytes).await.is_err() {
                    break;
                }
            }
        });

        let mut preamble = [0u8; CONNECTION_HEADER_SIZE];
        reader.read_exact(&mut preamble).await?;
        let header = ConnectionHeader::decode(&preamble).map_err(invalid_data)?;

        let context_request = read_request(&mut reader).await?;
        let mut payload = context_request.payload.as_ref();
        let context: IpcConnectionContextProto =
            decode_delimited(&mut payload).map_err(invalid_data)?;

        stats
            .handshakes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Handshake {
                connection,
                header,
                context_header: context_request.header,
                context,
            });

        loop {
            let request = read_request(&mut reader).await?;
            if request.header.call_id == PING_CALL_ID {
                stats.pings.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            let incoming = Incoming {
                connection,
                request,
                reply: reply.clone(),
            };
            if tx.send(incoming).is_err() {
                return Ok(());
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<RpcRequest> {
    let length = reader.read_i32().await?;
    let length = usize::try_from(length).map_err(invalid_data)?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    RpcRequest::decode(&body).map_err(invalid_data)
}

fn invalid_data<E: std::error::Error + Send + Sync + 'static>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
