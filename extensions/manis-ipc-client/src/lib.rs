mod call;
mod client;
mod connection;
mod connection_id;
mod error;
mod socket_factory;
mod worker_pool;

pub use call::{Call, CallCompletion, CallResult};
pub use client::Client;
pub use connection::{Connection, ConnectionState};
pub use connection_id::{ConnectionId, ProtocolInfo};
pub use error::IpcError;
pub use socket_factory::{BoxedStream, IpcStream, SocketFactory, SocketOptions, TcpSocketFactory};
pub use worker_pool::WorkerPool;
