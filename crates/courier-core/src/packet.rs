//! Logic packet envelope: header, status, flag and an opaque CBOR body.

use crate::codec::{cbor_decode, cbor_encode};
use crate::error::{CourierError, CourierResult};
use crate::wire::{CHANNEL_SEPARATOR, META_DEST_CHANNELS, META_DEST_SERVER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Result code carried by every packet.
///
/// Encoded as its numeric code; codes this enum does not name survive as
/// [`Status::Other`] so handler-defined statuses round-trip untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u16", from = "u16")]
pub enum Status {
    #[default]
    Success,
    NoDestination,
    InvalidPacketBody,
    InvalidCommand,
    Unauthorized,
    SystemException,
    NotImplemented,
    SessionNotFound,
    Other(u16),
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Success => 0,
            Status::NoDestination => 100,
            Status::InvalidPacketBody => 101,
            Status::InvalidCommand => 103,
            Status::Unauthorized => 105,
            Status::SystemException => 300,
            Status::NotImplemented => 301,
            Status::SessionNotFound => 404,
            Status::Other(code) => code,
        }
    }
}

impl From<u16> for Status {
    fn from(v: u16) -> Self {
        match v {
            0 => Self::Success,
            100 => Self::NoDestination,
            101 => Self::InvalidPacketBody,
            103 => Self::InvalidCommand,
            105 => Self::Unauthorized,
            300 => Self::SystemException,
            301 => Self::NotImplemented,
            404 => Self::SessionNotFound,
            other => Self::Other(other),
        }
    }
}

/// Role of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Flag {
    #[default]
    Request = 0,
    Response = 1,
    Push = 2,
}

impl From<Flag> for u8 {
    fn from(f: Flag) -> u8 {
        f as u8
    }
}

impl TryFrom<u8> for Flag {
    type Error = String;
    fn try_from(v: u8) -> Result<Self, String> {
        match v {
            0 => Ok(Self::Request),
            1 => Ok(Self::Response),
            2 => Ok(Self::Push),
            other => Err(format!("unknown packet flag: {other}")),
        }
    }
}

/// Logical type and origin of a packet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    pub command: String,
    /// Connection id of the sender.
    pub channel_id: String,
    /// Client-assigned correlation number.
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command:{} channel:{} seq:{}",
            self.command, self.channel_id, self.sequence
        )
    }
}

/// The application-level message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogicPkt {
    pub header: Header,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub flag: Flag,
    #[serde(default, with = "body_bytes")]
    pub body: Vec<u8>,
}

impl LogicPkt {
    /// New request packet for `command` originating from `channel_id`.
    pub fn new(command: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            header: Header {
                command: command.into(),
                channel_id: channel_id.into(),
                ..Header::default()
            },
            ..Self::default()
        }
    }

    /// New packet whose header is a copy of `header`; status, flag and body
    /// start from their defaults.
    pub fn new_from(header: &Header) -> Self {
        Self {
            header: header.clone(),
            ..Self::default()
        }
    }

    pub fn command(&self) -> &str {
        &self.header.command
    }

    pub fn channel_id(&self) -> &str {
        &self.header.channel_id
    }

    /// Serialize `body` into the packet.
    pub fn write_body<T: Serialize>(&mut self, body: &T) -> CourierResult<()> {
        self.body = cbor_encode(body)?;
        Ok(())
    }

    /// Deserialize the packet body.
    pub fn read_body<T: serde::de::DeserializeOwned>(&self) -> CourierResult<T> {
        cbor_decode(&self.body)
    }

    /// Insert or replace a metadata entry.
    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.header.meta.insert(key.into(), value.into());
    }

    pub fn get_meta(&self, key: &str) -> Option<&str> {
        self.header.meta.get(key).map(String::as_str)
    }

    /// Node id the packet arrived through. Absent or empty is an error.
    pub fn dest_server(&self) -> CourierResult<&str> {
        match self.get_meta(META_DEST_SERVER) {
            Some(server) if !server.is_empty() => Ok(server),
            _ => Err(CourierError::MissingMeta(META_DEST_SERVER.to_string())),
        }
    }

    /// Channel ids listed in the destination-channels metadata.
    pub fn dest_channels(&self) -> Vec<&str> {
        self.get_meta(META_DEST_CHANNELS)
            .map(|v| {
                v.split(CHANNEL_SEPARATOR)
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Encode the whole packet as a CBOR payload (no length prefix).
    pub fn encode(&self) -> CourierResult<Vec<u8>> {
        cbor_encode(self)
    }

    pub fn decode(data: &[u8]) -> CourierResult<Self> {
        cbor_decode(data)
    }
}

/// Encodes the body as one CBOR byte string instead of an array of integers.
mod body_bytes {
    use serde::de::{SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(BodyVisitor)
    }

    struct BodyVisitor;

    impl<'de> Visitor<'de> for BodyVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a byte string")
        }

        fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        // integer arrays written by older peers
        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut bytes = Vec::new();
            while let Some(b) = seq.next_element::<u8>()? {
                bytes.push(b);
            }
            Ok(bytes)
        }
    }
}

/// Body of error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResp {
    pub message: String,
}

/// First frame sent by a peer node after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerHandshakeReq {
    pub service_id: String,
}
