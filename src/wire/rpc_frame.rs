use crate::{
    constants::FRAME_LENGTH_FIELD_SIZE,
    wire::{
        RpcErrorProto, RpcRequestHeaderProto, RpcResponseHeaderProto, RpcStatus, WireError,
        varint::{read_varint32, varint32_size, write_varint32},
    },
};
use bytes::Bytes;
use prost::Message;

/// Appends `msg` to `buf` prefixed by its varint-encoded length.
pub fn encode_delimited<M: Message>(msg: &M, buf: &mut Vec<u8>) {
    let len = msg.encoded_len();
    buf.reserve(varint32_size(len as u32) + len);
    write_varint32(len as u32, buf);
    // Encoding into a `Vec` only fails when capacity runs out, which it cannot.
    let _ = msg.encode(buf);
}

/// Splits one delimited sub-message off the front of `buf`.
pub fn read_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let len = read_varint32(buf)? as usize;

    if buf.len() < len {
        return Err(WireError::Truncated {
            needed: len - buf.len(),
        });
    }

    let (msg, rest) = buf.split_at(len);
    *buf = rest;
    Ok(msg)
}

pub fn decode_delimited<M: Message + Default>(buf: &mut &[u8]) -> Result<M, WireError> {
    Ok(M::decode(read_delimited(buf)?)?)
}

/// Builds a complete frame: big-endian `int32` length of everything after
/// it, the delimited `header`, then `body` verbatim.
pub fn encode_frame<H: Message>(header: &H, body: &[u8]) -> Vec<u8> {
    let header_len = header.encoded_len();
    let total = varint32_size(header_len as u32) + header_len + body.len();

    let mut buf = Vec::with_capacity(FRAME_LENGTH_FIELD_SIZE + total);
    buf.extend_from_slice(&(total as i32).to_be_bytes());
    encode_delimited(header, &mut buf);
    buf.extend_from_slice(body);
    buf
}

/// Validates a declared frame length before any of its bytes are read.
pub fn check_frame_length(length: i32, max: usize) -> Result<usize, WireError> {
    if length < 0 {
        return Err(WireError::NegativeLength(length));
    }

    let length = length as usize;
    if length > max {
        return Err(WireError::FrameTooLarge { length, max });
    }

    Ok(length)
}

/// A decoded request frame body.
///
/// `payload` is whatever the engine placed after the header, typically one
/// or more delimited sub-messages.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub header: RpcRequestHeaderProto,
    pub payload: Bytes,
}

impl RpcRequest {
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(&self.header, &self.payload)
    }

    /// Decodes a frame body (the bytes after the length prefix).
    pub fn decode(mut body: &[u8]) -> Result<Self, WireError> {
        let header = decode_delimited(&mut body)?;
        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(body),
        })
    }
}

/// A decoded response frame body.
///
/// `payload` is the contents of the single delimited sub-message following
/// the header: the result message on success, an [`RpcErrorProto`]
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub header: RpcResponseHeaderProto,
    pub payload: Bytes,
}

impl RpcResponse {
    pub fn success(call_id: u32, payload: &[u8]) -> Self {
        Self {
            header: RpcResponseHeaderProto {
                call_id,
                status: RpcStatus::Success.into(),
                ..Default::default()
            },
            payload: Bytes::copy_from_slice(payload),
        }
    }

    pub fn error(call_id: u32, status: RpcStatus, error: &RpcErrorProto) -> Self {
        Self {
            header: RpcResponseHeaderProto {
                call_id,
                status: status.into(),
                ..Default::default()
            },
            payload: Bytes::from(error.encode_to_vec()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len();
        let mut body = Vec::with_capacity(varint32_size(len as u32) + len);
        write_varint32(len as u32, &mut body);
        body.extend_from_slice(&self.payload);
        encode_frame(&self.header, &body)
    }

    /// Decodes a frame body (the bytes after the length prefix). A header
    /// with no payload following it yields an empty payload.
    pub fn decode(mut body: &[u8]) -> Result<Self, WireError> {
        let header = decode_delimited(&mut body)?;

        let payload = if body.is_empty() {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(read_delimited(&mut body)?)
        };

        Ok(Self { header, payload })
    }

    pub fn error_payload(&self) -> Result<RpcErrorProto, WireError> {
        Ok(RpcErrorProto::decode(self.payload.as_ref())?)
    }
}
