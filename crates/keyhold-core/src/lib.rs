//! # Keyhold Core
//!
//! Key object model and canonical identity for the keyhold key store.
//!
//! ## Key Concepts
//!
//! - **ParsedKey**: A public key as handed over by a key codec: every packet
//!   (primary key, user IDs, subkeys, signatures) plus the fingerprint
//!   computed from the primary key packet
//! - **Digest**: MD5 over the canonicalized packet set; the deduplication key
//! - **KeyId / ShortId**: 64-bit and 32-bit identifiers derived from the
//!   primary fingerprint
//! - **KeyCodec**: Contract for turning wire text into `ParsedKey`s and back
//! - **KeyMerger**: Optional policy for folding new material into a stored key
//!
//! ## Identity Rules
//!
//! 1. The digest depends only on the *set* of packets, never on their order
//! 2. The fingerprint is computed from the primary key packet, and key
//!    identifiers are pure functions of the fingerprint
//! 3. Identical material always yields an identical digest

pub mod codec;
pub mod digest;
pub mod error;
pub mod key;
pub mod merge;
pub mod packet;
pub mod types;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use codec::{JsonKeyCodec, KeyCodec};
pub use digest::sks_digest;
pub use error::{KeyError, Result};
pub use key::{ParsedKey, ParsedKeyBuilder};
pub use merge::{KeyMerger, MergeMode, PacketUnionMerger};
pub use packet::{Packet, PacketTag};
pub use types::{Digest, Fingerprint, KeyId, ShortId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
