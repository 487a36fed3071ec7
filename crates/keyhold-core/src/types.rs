//! Identifier types for stored keys
//!
//! All identifiers render as lowercase hex and parse from hex with an
//! optional `0x` prefix, in either case.

use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

use crate::error::{KeyError, Result};

/// Length in bytes of a v4 fingerprint (SHA-1)
pub const V4_FINGERPRINT_LEN: usize = 20;

/// Length in bytes of a v5/v6 fingerprint (SHA-256)
pub const V5_FINGERPRINT_LEN: usize = 32;

fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn decode_hex(kind: &'static str, s: &str, len: Option<usize>) -> Result<Vec<u8>> {
    let invalid = || KeyError::InvalidIdentifier {
        kind,
        value: s.to_string(),
    };
    let bytes = hex::decode(strip_hex_prefix(s)).map_err(|_| invalid())?;
    match len {
        Some(len) if bytes.len() != len => Err(invalid()),
        _ => Ok(bytes),
    }
}

/// Primary key fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Create a fingerprint from raw bytes
    ///
    /// Only v4 (20 byte) and v5/v6 (32 byte) fingerprints are accepted.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        match bytes.len() {
            V4_FINGERPRINT_LEN | V5_FINGERPRINT_LEN => Ok(Self(bytes)),
            n => Err(KeyError::UnsupportedFingerprint(n)),
        }
    }

    /// Compute the fingerprint of a primary key packet body
    ///
    /// The version octet picks the scheme: v4 is SHA-1 over `0x99`, a
    /// two-octet length and the body; v5 and v6 are SHA-256 over `0x9A` or
    /// `0x9B`, a four-octet length and the body.
    pub fn of_primary_key(body: &[u8]) -> Result<Self> {
        let too_large = || KeyError::PacketTooLarge(body.len());
        let bytes = match body.first() {
            Some(4) => {
                let len = u16::try_from(body.len()).map_err(|_| too_large())?;
                let mut hasher = Sha1::new();
                hasher.update([0x99]);
                hasher.update(len.to_be_bytes());
                hasher.update(body);
                hasher.finalize().to_vec()
            }
            Some(&version @ (5 | 6)) => {
                let len = u32::try_from(body.len()).map_err(|_| too_large())?;
                let mut hasher = Sha256::new();
                hasher.update([if version == 5 { 0x9A } else { 0x9B }]);
                hasher.update(len.to_be_bytes());
                hasher.update(body);
                hasher.finalize().to_vec()
            }
            Some(&version) => return Err(KeyError::UnsupportedKeyVersion(version)),
            None => return Err(KeyError::MissingPrimaryKey),
        };
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derive the 64-bit key identifier
    ///
    /// v4 keys use the low-order 8 bytes of the fingerprint, v5/v6 keys the
    /// high-order 8 bytes.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        if self.0.len() == V4_FINGERPRINT_LEN {
            id.copy_from_slice(&self.0[V4_FINGERPRINT_LEN - 8..]);
        } else {
            id.copy_from_slice(&self.0[..8]);
        }
        KeyId(u64::from_be_bytes(id))
    }

    pub fn short_id(&self) -> ShortId {
        self.key_id().short_id()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex("fingerprint", s, None)?;
        Self::from_bytes(bytes).map_err(|_| KeyError::InvalidIdentifier {
            kind: "fingerprint",
            value: s.to_string(),
        })
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_string()
    }
}

/// 64-bit key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u64);

impl KeyId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Low-order 32 bits
    pub fn short_id(&self) -> ShortId {
        ShortId(self.0 as u32)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for KeyId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex("key id", s, Some(8))?;
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes);
        Ok(Self(u64::from_be_bytes(id)))
    }
}

/// 32-bit short key identifier; collisions are expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId(u32);

impl ShortId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for ShortId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex("short id", s, Some(4))?;
        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes);
        Ok(Self(u32::from_be_bytes(id)))
    }
}

/// Content digest of a canonicalized key (MD5, 16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 16]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Digest {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex("digest", s, Some(16))?;
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&bytes);
        Ok(Self(digest))
    }
}
