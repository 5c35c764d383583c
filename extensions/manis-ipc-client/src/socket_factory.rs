use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpSocket;

/// A bidirectional byte stream a connection can run over.
pub trait IpcStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> IpcStream for T {}

pub type BoxedStream = Box<dyn IpcStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketOptions {
    pub tcp_no_delay: bool,
    pub keep_alive: bool,
}

/// Produces connected streams for a [`crate::Client`].
///
/// The connect timeout is applied by the caller around `connect`, so
/// implementations need not enforce one.
#[async_trait]
pub trait SocketFactory: Send + Sync + fmt::Debug {
    async fn connect(&self, addr: SocketAddr, options: SocketOptions) -> io::Result<BoxedStream>;
}

/// Plain TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpSocketFactory;

#[async_trait]
impl SocketFactory for TcpSocketFactory {
    async fn connect(&self, addr: SocketAddr, options: SocketOptions) -> io::Result<BoxedStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(options.keep_alive)?;

        let stream = socket.connect(addr).await?;
        stream.set_nodelay(options.tcp_no_delay)?;

        Ok(Box::new(stream))
    }
}
