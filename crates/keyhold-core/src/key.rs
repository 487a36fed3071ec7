//! Parsed key objects
//!
//! `ParsedKey` is the structured form a key codec hands to the store. It
//! carries the primary fingerprint and the full packet list, from which user
//! IDs, subkeys and signatures are read on demand.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::digest::sks_digest;
use crate::error::{KeyError, Result};
use crate::packet::{Packet, PacketTag};
use crate::types::{Digest, Fingerprint, KeyId, ShortId};

/// A structurally valid public key
///
/// The fingerprint is always computed from the primary key packet, so two
/// keys with the same packets share every identifier as well as the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyDocument")]
pub struct ParsedKey {
    fingerprint: Fingerprint,
    packets: Vec<Packet>,
}

/// Serialized key form. A fingerprint in it is a claim to be checked.
#[derive(Debug, Deserialize)]
pub struct KeyDocument {
    #[serde(default)]
    fingerprint: Option<Fingerprint>,
    packets: Vec<Packet>,
}

impl TryFrom<KeyDocument> for ParsedKey {
    type Error = KeyError;

    fn try_from(doc: KeyDocument) -> Result<Self> {
        let key = ParsedKey::new(doc.packets)?;
        match doc.fingerprint {
            Some(claimed) => key.with_claimed_fingerprint(&claimed),
            None => Ok(key),
        }
    }
}

impl ParsedKey {
    /// Create a key from its packets
    ///
    /// Exactly one distinct primary key packet must be present; its body
    /// determines the fingerprint.
    pub fn new(packets: Vec<Packet>) -> Result<Self> {
        let mut primaries = packets.iter().filter(|p| p.tag == PacketTag::PUBLIC_KEY);
        let primary = primaries.next().ok_or(KeyError::MissingPrimaryKey)?;
        let others: HashSet<&Packet> = primaries.filter(|p| *p != primary).collect();
        if !others.is_empty() {
            return Err(KeyError::MultiplePrimaryKeys(others.len() + 1));
        }

        let fingerprint = Fingerprint::of_primary_key(&primary.body)?;
        Ok(Self {
            fingerprint,
            packets,
        })
    }

    /// Fail unless `claimed` is the fingerprint of this key's primary packet
    pub fn with_claimed_fingerprint(self, claimed: &Fingerprint) -> Result<Self> {
        if *claimed != self.fingerprint {
            return Err(KeyError::ClaimedFingerprint {
                claimed: claimed.to_string(),
                computed: self.fingerprint.to_string(),
            });
        }
        Ok(self)
    }

    pub fn builder() -> ParsedKeyBuilder {
        ParsedKeyBuilder::new()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<Packet> {
        self.packets
    }

    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }

    pub fn short_id(&self) -> ShortId {
        self.fingerprint.short_id()
    }

    /// Canonical content digest of this key's packet set
    pub fn digest(&self) -> Result<Digest> {
        sks_digest(&self.packets)
    }

    /// User IDs in packet order, as written by the key owner
    pub fn user_ids(&self) -> Vec<String> {
        self.packets_with_tag(PacketTag::USER_ID)
            .map(|p| String::from_utf8_lossy(&p.body).into_owned())
            .collect()
    }

    /// User IDs trimmed and lowercased for case-insensitive search
    pub fn normalized_user_ids(&self) -> Vec<String> {
        self.user_ids()
            .iter()
            .map(|uid| normalize_user_id(uid))
            .collect()
    }

    pub fn subkey_count(&self) -> usize {
        self.packets_with_tag(PacketTag::PUBLIC_SUBKEY).count()
    }

    pub fn signature_count(&self) -> usize {
        self.packets_with_tag(PacketTag::SIGNATURE).count()
    }

    fn packets_with_tag(&self, tag: PacketTag) -> impl Iterator<Item = &Packet> {
        self.packets.iter().filter(move |p| p.tag == tag)
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(KeyError::from)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc: KeyDocument = serde_json::from_slice(bytes)?;
        Self::try_from(doc)
    }
}

/// Normalize a user ID for substring search
pub fn normalize_user_id(uid: &str) -> String {
    uid.trim().to_lowercase()
}

/// Builder for assembling keys packet by packet
#[derive(Debug, Default)]
pub struct ParsedKeyBuilder {
    fingerprint: Option<Fingerprint>,
    packets: Vec<Packet>,
}

impl ParsedKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the built key to have this fingerprint
    pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn primary_key(self, body: impl Into<Vec<u8>>) -> Self {
        self.packet(Packet::new(PacketTag::PUBLIC_KEY, body))
    }

    pub fn user_id(self, uid: &str) -> Self {
        self.packet(Packet::user_id(uid))
    }

    pub fn subkey(self, body: impl Into<Vec<u8>>) -> Self {
        self.packet(Packet::new(PacketTag::PUBLIC_SUBKEY, body))
    }

    pub fn signature(self, body: impl Into<Vec<u8>>) -> Self {
        self.packet(Packet::new(PacketTag::SIGNATURE, body))
    }

    pub fn packet(mut self, packet: Packet) -> Self {
        self.packets.push(packet);
        self
    }

    pub fn build(self) -> Result<ParsedKey> {
        let key = ParsedKey::new(self.packets)?;
        match self.fingerprint {
            Some(claimed) => key.with_claimed_fingerprint(&claimed),
            None => Ok(key),
        }
    }
}
