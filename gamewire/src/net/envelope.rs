//! Typed view of a decoded frame.
//!
//! Payloads are decoded exactly once, at the dispatch boundary, according to
//! the schema attached to the frame's opcode. Handlers receive an
//! [`Envelope`] and never touch raw payload bytes unless the opcode is
//! unknown.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use super::{
    errors::PayloadError,
    frame::Frame,
    opcode::{self, PayloadSchema},
};

/// Size of the `RES_ROOM_CREATED` record: `room_id` (4) + room code (8).
pub const ROOM_CREATED_RECORD_SIZE: usize = 12;

const ROOM_CODE_LEN: usize = 8;

/// Decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    RoomCreated { room_id: u32, room_code: String },
    Raw(Bytes),
}

impl Body {
    /// Serialize `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Encode`] if `value` cannot be represented as
    /// JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// Decode `payload` using `schema`.
    ///
    /// An empty payload is accepted for any schema except `RoomCreated`, whose
    /// record has a fixed size.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::Json`] if a JSON payload fails to parse
    /// - [`PayloadError::RecordSize`] if a binary record has the wrong length
    pub fn decode(opcode: u16, schema: PayloadSchema, payload: Bytes) -> Result<Self, PayloadError> {
        match schema {
            PayloadSchema::RoomCreated => decode_room_created(opcode, &payload),
            _ if payload.is_empty() => Ok(Body::Empty),
            PayloadSchema::Empty | PayloadSchema::Raw => Ok(Body::Raw(payload)),
            PayloadSchema::Json => serde_json::from_slice(&payload)
                .map(Body::Json)
                .map_err(|source| PayloadError::Json { opcode, source }),
        }
    }

    /// Wire bytes for this body.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Encode`] if JSON serialization fails.
    pub fn to_bytes(&self) -> Result<Bytes, PayloadError> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Body::RoomCreated { room_id, room_code } => {
                let mut buf = BytesMut::with_capacity(ROOM_CREATED_RECORD_SIZE);
                buf.put_u32(*room_id);
                let mut code = [0u8; ROOM_CODE_LEN];
                let src = room_code.as_bytes();
                let n = src.len().min(ROOM_CODE_LEN);
                code[..n].copy_from_slice(&src[..n]);
                buf.put_slice(&code);
                Ok(buf.freeze())
            }
            Body::Raw(bytes) => Ok(bytes.clone()),
        }
    }

    /// The JSON value, if this is a JSON body.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The server's `error` message for `{"success":false,"error":"..."}`
    /// payloads.
    pub fn error_message(&self) -> Option<&str> {
        self.as_json()?.get("error")?.as_str()
    }
}

fn decode_room_created(opcode: u16, payload: &[u8]) -> Result<Body, PayloadError> {
    if payload.len() != ROOM_CREATED_RECORD_SIZE {
        return Err(PayloadError::RecordSize {
            opcode,
            expected: ROOM_CREATED_RECORD_SIZE,
            actual: payload.len(),
        });
    }
    let room_id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let code = &payload[4..];
    let end = code.iter().position(|&b| b == 0).unwrap_or(code.len());
    let room_code = String::from_utf8_lossy(&code[..end]).into_owned();
    Ok(Body::RoomCreated { room_id, room_code })
}

/// A frame whose payload has been decoded into a [`Body`].
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub opcode: u16,
    pub sequence: u32,
    pub flags: u8,
    pub body: Body,
}

impl Envelope {
    pub fn new(opcode: u16, sequence: u32, body: Body) -> Self {
        Self {
            opcode,
            sequence,
            flags: 0,
            body,
        }
    }

    /// Decode `frame`'s payload using the opcode table.
    ///
    /// # Errors
    ///
    /// Propagates [`Body::decode`] failures.
    pub fn from_frame(frame: Frame) -> Result<Self, PayloadError> {
        let schema = opcode::schema(frame.opcode);
        Ok(Self {
            opcode: frame.opcode,
            sequence: frame.sequence,
            flags: frame.flags,
            body: Body::decode(frame.opcode, schema, frame.payload)?,
        })
    }

    /// Whether the opcode is a server error response.
    pub fn is_error(&self) -> bool {
        opcode::is_error(self.opcode)
    }

    /// Convert back into a frame ready for encoding.
    ///
    /// # Errors
    ///
    /// Propagates [`Body::to_bytes`] failures.
    pub fn into_frame(self) -> Result<Frame, PayloadError> {
        let mut frame = Frame::new(self.opcode, self.sequence, self.body.to_bytes()?);
        frame.flags = self.flags;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::opcode::{ERR_BAD_REQUEST, RES_HEARTBEAT_OK, RES_LOGIN_OK, RES_ROOM_CREATED};
    use serde_json::json;

    #[test]
    fn test_json_payload_decoded_once() {
        let frame = Frame::new(RES_LOGIN_OK, 3, &b"{\"session_id\":\"abc\"}"[..]);
        let env = Envelope::from_frame(frame).unwrap();
        assert_eq!(env.sequence, 3);
        assert_eq!(env.body, Body::Json(json!({"session_id": "abc"})));
    }

    #[test]
    fn test_error_message_extracted() {
        let frame = Frame::new(
            ERR_BAD_REQUEST,
            1,
            &b"{\"success\":false,\"error\":\"Email already exists\"}"[..],
        );
        let env = Envelope::from_frame(frame).unwrap();
        assert!(env.is_error());
        assert_eq!(env.body.error_message(), Some("Email already exists"));
    }

    #[test]
    fn test_invalid_json_reports_opcode() {
        let frame = Frame::new(RES_LOGIN_OK, 1, &b"{not json"[..]);
        let err = Envelope::from_frame(frame).unwrap_err();
        assert!(matches!(err, PayloadError::Json { opcode: RES_LOGIN_OK, .. }));
    }

    #[test]
    fn test_room_created_record() {
        let mut payload = 0x0102_0304u32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"AB12\0\0\0\0");
        let env = Envelope::from_frame(Frame::new(RES_ROOM_CREATED, 5, payload)).unwrap();
        assert_eq!(
            env.body,
            Body::RoomCreated {
                room_id: 0x0102_0304,
                room_code: "AB12".to_string()
            }
        );
        assert_eq!(env.body.to_bytes().unwrap().len(), ROOM_CREATED_RECORD_SIZE);
    }

    #[test]
    fn test_room_created_wrong_size() {
        let err = Envelope::from_frame(Frame::new(RES_ROOM_CREATED, 5, vec![0u8; 4])).unwrap_err();
        assert!(matches!(
            err,
            PayloadError::RecordSize {
                expected: 12,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_and_unknown_payloads() {
        let env = Envelope::from_frame(Frame::new(RES_HEARTBEAT_OK, 1, Bytes::new())).unwrap();
        assert_eq!(env.body, Body::Empty);

        let env = Envelope::from_frame(Frame::new(0x7FFF, 1, &b"\x01\x02"[..])).unwrap();
        assert_eq!(env.body, Body::Raw(Bytes::from_static(b"\x01\x02")));
    }

    #[test]
    fn test_flags_survive_into_frame() {
        let mut env = Envelope::new(0x0500, 4, Body::json(&json!({"msg": "hi"})).unwrap());
        env.flags = 0x80;
        let frame = env.into_frame().unwrap();
        assert_eq!(frame.flags, 0x80);
        assert_eq!(&frame.payload[..], b"{\"msg\":\"hi\"}");
    }
}
