//! Error types for key objects and codecs

use thiserror::Error;

/// Result type alias using KeyError
pub type Result<T> = std::result::Result<T, KeyError>;

/// Errors that can occur while building, hashing or encoding keys
#[derive(Error, Debug)]
pub enum KeyError {
    /// Identifier text was not valid hex or had the wrong length
    #[error("Invalid {kind}: {value}")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// Fingerprint length does not match any supported key version
    #[error("Unsupported fingerprint length: {0} bytes")]
    UnsupportedFingerprint(usize),

    /// Key has no primary public key packet
    #[error("Key is missing its primary key packet")]
    MissingPrimaryKey,

    /// Primary key packet carries a version we cannot fingerprint
    #[error("Unsupported key version: {0}")]
    UnsupportedKeyVersion(u8),

    /// Key carries more than one primary key packet
    #[error("Key has {0} primary key packets")]
    MultiplePrimaryKeys(usize),

    /// Supplied fingerprint does not belong to the primary key packet
    #[error("Fingerprint {claimed} does not match primary key {computed}")]
    ClaimedFingerprint { claimed: String, computed: String },

    /// Packet body exceeds the encodable length
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),

    /// Merge was attempted across different primary keys
    #[error("Cannot merge keys with different fingerprints: {existing} vs {incoming}")]
    FingerprintMismatch { existing: String, incoming: String },

    /// Codec failed to decode or encode
    #[error("Codec error: {0}")]
    Codec(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for KeyError {
    fn from(err: serde_json::Error) -> Self {
        KeyError::Serialization(err.to_string())
    }
}
