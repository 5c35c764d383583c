pub const CLIENT_MANISDB_PROTOCOL_NAME: &str = "ClientManisDbProtocol";
pub const MANAGER_MANISDB_PROTOCOL_NAME: &str = "ManagerManisDbProtocol";
pub const MANISDB_PROTOCOL_VERSION: u64 = 1;
