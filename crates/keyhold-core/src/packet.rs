//! Key packets
//!
//! A packet is kept as its tag plus raw body. Bodies are opaque to the store;
//! the only structure we rely on is the tag and length prefix used when the
//! packet set is canonicalized for hashing.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{KeyError, Result};

/// Packet tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketTag(pub u8);

impl PacketTag {
    pub const SIGNATURE: PacketTag = PacketTag(2);
    pub const PUBLIC_KEY: PacketTag = PacketTag(6);
    pub const USER_ID: PacketTag = PacketTag(13);
    pub const PUBLIC_SUBKEY: PacketTag = PacketTag(14);
    pub const USER_ATTRIBUTE: PacketTag = PacketTag(17);
}

/// A single key packet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    pub tag: PacketTag,
    #[serde(serialize_with = "encode_body", deserialize_with = "decode_body")]
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(tag: PacketTag, body: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            body: body.into(),
        }
    }

    pub fn user_id(text: &str) -> Self {
        Self::new(PacketTag::USER_ID, text.as_bytes())
    }

    /// Encode for hashing: four-octet big-endian tag, four-octet
    /// big-endian body length, then the body
    pub fn to_sks_bytes(&self) -> Result<Vec<u8>> {
        let len = u32::try_from(self.body.len())
            .map_err(|_| KeyError::PacketTooLarge(self.body.len()))?;
        let mut out = Vec::with_capacity(self.body.len() + 8);
        out.extend_from_slice(&u32::from(self.tag.0).to_be_bytes());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.body);
        Ok(out)
    }
}

fn encode_body<S: Serializer>(body: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(body))
}

fn decode_body<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sks_encoding() {
        let packet = Packet::user_id("ab");
        assert_eq!(
            packet.to_sks_bytes().unwrap(),
            vec![0, 0, 0, 13, 0, 0, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn test_sks_encoding_long_body() {
        let packet = Packet::new(PacketTag::PUBLIC_SUBKEY, vec![b'x'; 9000]);
        let bytes = packet.to_sks_bytes().unwrap();
        assert_eq!(&bytes[..8], &[0, 0, 0, 14, 0x00, 0x00, 0x23, 0x28]);
        assert_eq!(bytes.len(), 9008);
    }

    #[test]
    fn test_body_serializes_as_base64() {
        let packet = Packet::new(PacketTag::SIGNATURE, vec![0xAB, 0xCD]);
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["tag"], 2);
        assert_eq!(json["body"], "q80=");

        let back: Packet = serde_json::from_value(json).unwrap();
        assert_eq!(back, packet);
    }
}
