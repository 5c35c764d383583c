use manis_ipc::conf::{Configuration, keys};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Identity of a remote protocol: its interface name and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolInfo {
    pub name: &'static str,
    pub version: u64,
}

impl ProtocolInfo {
    pub const fn new(name: &'static str, version: u64) -> Self {
        Self { name, version }
    }
}

impl fmt::Display for ProtocolInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/v{}", self.name, self.version)
    }
}

/// Key of the connection pool.
///
/// Two ids compare equal only when every tuning parameter matches, so calls
/// with different timeouts or ping settings never share a socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    address: SocketAddr,
    protocol: ProtocolInfo,
    rpc_timeout: Duration,
    max_idle_time: Duration,
    max_retries_on_socket_timeouts: u32,
    tcp_no_delay: bool,
    do_ping: bool,
    ping_interval: Duration,
}

impl ConnectionId {
    /// Resolves the tuning parameters from `conf`.
    ///
    /// When pinging is disabled the ping interval is recorded as zero.
    pub fn new(
        address: SocketAddr,
        protocol: ProtocolInfo,
        rpc_timeout: Duration,
        conf: &Configuration,
    ) -> Self {
        let do_ping = conf.get_bool(keys::IPC_CLIENT_PING_KEY, keys::IPC_CLIENT_PING_DEFAULT);
        let ping_interval = if do_ping {
            conf.get_duration_ms(
                keys::IPC_PING_INTERVAL_KEY,
                keys::IPC_PING_INTERVAL_DEFAULT,
            )
        } else {
            Duration::ZERO
        };

        Self {
            address,
            protocol,
            rpc_timeout,
            max_idle_time: conf.get_duration_ms(
                keys::IPC_CLIENT_CONNECTION_MAXIDLETIME_KEY,
                keys::IPC_CLIENT_CONNECTION_MAXIDLETIME_DEFAULT,
            ),
            max_retries_on_socket_timeouts: conf.get_u32(
                keys::IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_KEY,
                keys::IPC_CLIENT_CONNECT_MAX_RETRIES_ON_SOCKET_TIMEOUTS_DEFAULT,
            ),
            tcp_no_delay: conf.get_bool(
                keys::IPC_CLIENT_TCPNODELAY_KEY,
                keys::IPC_CLIENT_TCPNODELAY_DEFAULT,
            ),
            do_ping,
            ping_interval,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn protocol(&self) -> ProtocolInfo {
        self.protocol
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    pub fn max_idle_time(&self) -> Duration {
        self.max_idle_time
    }

    pub fn max_retries_on_socket_timeouts(&self) -> u32 {
        self.max_retries_on_socket_timeouts
    }

    pub fn tcp_no_delay(&self) -> bool {
        self.tcp_no_delay
    }

    pub fn do_ping(&self) -> bool {
        self.do_ping
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Socket read timeout: the larger of the rpc timeout and the ping
    /// interval. `None` when both are zero.
    pub fn read_timeout(&self) -> Option<Duration> {
        let timeout = self.rpc_timeout.max(self.ping_interval);
        (!timeout.is_zero()).then_some(timeout)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}
