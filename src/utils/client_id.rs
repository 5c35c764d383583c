use crate::constants::CLIENT_ID_BYTE_LENGTH;
use std::fmt;

/// Random 16-byte identifier, generated once per client and sent with every
/// request header.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId([u8; CLIENT_ID_BYTE_LENGTH]);

impl ClientId {
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; CLIENT_ID_BYTE_LENGTH]> for ClientId {
    fn from(bytes: [u8; CLIENT_ID_BYTE_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId(")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}
