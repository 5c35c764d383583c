use crate::constants::{
    AUTH_PROTOCOL_NONE, CONNECTION_HEADER_MAGIC, CONNECTION_HEADER_SIZE, CURRENT_VERSION,
    RPC_SERVICE_CLASS_DEFAULT,
};
use crate::wire::WireError;

/// The fixed, unframed preamble written once after connecting.
///
/// ```text
/// +----------------------------------+
/// |  "mrpc" 4 bytes                  |
/// +----------------------------------+
/// |  Version (1 byte)                |
/// +----------------------------------+
/// |  Service Class (1 byte)          |
/// +----------------------------------+
/// |  AuthProtocol (1 byte)           |
/// +----------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHeader {
    pub version: u8,
    pub service_class: u8,
    pub auth_protocol: u8,
}

impl Default for ConnectionHeader {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            service_class: RPC_SERVICE_CLASS_DEFAULT,
            auth_protocol: AUTH_PROTOCOL_NONE,
        }
    }
}

impl ConnectionHeader {
    pub fn encode(&self) -> [u8; CONNECTION_HEADER_SIZE] {
        let mut buf = [0u8; CONNECTION_HEADER_SIZE];
        buf[..4].copy_from_slice(&CONNECTION_HEADER_MAGIC);
        buf[4] = self.version;
        buf[5] = self.service_class;
        buf[6] = self.auth_protocol;
        buf
    }

    /// Parses a preamble. Only the magic is validated; version checks are
    /// left to the receiving side.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < CONNECTION_HEADER_SIZE {
            return Err(WireError::Truncated {
                needed: CONNECTION_HEADER_SIZE - buf.len(),
            });
        }

        if buf[..4] != CONNECTION_HEADER_MAGIC {
            return Err(WireError::Decode(prost::DecodeError::new(
                "bad connection header magic",
            )));
        }

        Ok(Self {
            version: buf[4],
            service_class: buf[5],
            auth_protocol: buf[6],
        })
    }
}
