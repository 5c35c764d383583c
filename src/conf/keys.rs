//! Configuration keys understood by the IPC client and their defaults.
//!
//! Durations are expressed in milliseconds.

pub const IPC_CLIENT_CONNECT_TIMEOUT_KEY: &str = "ipc.client.connect.timeout";
pub const IPC_CLIENT_CONNECT_TIMEOUT_DEFAULT: u64 = 20_000;

pub const IPC_CLIENT_CONNECTION_MAXIDLETIME_KEY: &str = "ipc.client.connection.maxidletime";
pub const IPC_CLIENT_CONNECTION_MAXIDLETIME_DEFAULT: u64 = 10_000;

pub const IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_KEY: &str =
    "ipc.client.connect.max.retries.on.timeouts";
pub const IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_DEFAULT: u32 = 45;

pub const IPC_CLIENT_TCPNODELAY_KEY: &str = "ipc.client.tcpnodelay";
pub const IPC_CLIENT_TCPNODELAY_DEFAULT: bool = true;

pub const IPC_CLIENT_PING_KEY: &str = "ipc.client.ping";
pub const IPC_CLIENT_PING_DEFAULT: bool = true;

pub const IPC_PING_INTERVAL_KEY: &str = "ipc.ping.interval";
pub const IPC_PING_INTERVAL_DEFAULT: u64 = 60_000;

/// Upper bound on the declared length of a response frame, in bytes.
pub const IPC_MAXIMUM_RESPONSE_LENGTH_KEY: &str = "ipc.maximum.response.length";
pub const IPC_MAXIMUM_RESPONSE_LENGTH_DEFAULT: u64 = 128 * 1024 * 1024;

/// How long the last release of a worker pool waits for in-flight writes
/// before aborting them.
pub const IPC_CLIENT_EXECUTOR_SHUTDOWN_GRACE_KEY: &str = "ipc.client.executor.shutdown.grace";
pub const IPC_CLIENT_EXECUTOR_SHUTDOWN_GRACE_DEFAULT: u64 = 60_000;

/// Prefix of the per-protocol engine selection key: `rpc.engine.<protocol name>`.
pub const RPC_ENGINE_KEY_PREFIX: &str = "rpc.engine";
