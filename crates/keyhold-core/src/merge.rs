//! Merge policies
//!
//! By default a submission is stored exactly as received and deduplicated by
//! digest only. A `KeyMerger` lets the store fold new signatures, user IDs or
//! subkeys into an already stored key with the same primary fingerprint, so
//! the merged material replaces the old record instead of sitting next to it.

use std::collections::HashSet;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::{KeyError, Result};
use crate::key::ParsedKey;

/// Combines a stored key with newly submitted material for the same primary key
pub trait KeyMerger: Send + Sync + Debug {
    /// Produce the merged key. Both inputs share a primary fingerprint.
    fn merge(&self, existing: &ParsedKey, incoming: &ParsedKey) -> Result<ParsedKey>;
}

/// Set union of packets: stored packets first, then unseen incoming ones
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketUnionMerger;

impl KeyMerger for PacketUnionMerger {
    fn merge(&self, existing: &ParsedKey, incoming: &ParsedKey) -> Result<ParsedKey> {
        if existing.fingerprint() != incoming.fingerprint() {
            return Err(KeyError::FingerprintMismatch {
                existing: existing.fingerprint().to_string(),
                incoming: incoming.fingerprint().to_string(),
            });
        }

        let mut seen: HashSet<_> = existing.packets().iter().collect();
        let mut packets = existing.packets().to_vec();
        for packet in incoming.packets() {
            if seen.insert(packet) {
                packets.push(packet.clone());
            }
        }

        debug!(
            fingerprint = %existing.fingerprint(),
            added = packets.len() - existing.packets().len(),
            "Packet union"
        );

        ParsedKey::new(packets)
    }
}

/// Configured merge behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Deduplicate by digest only
    #[default]
    Disabled,
    /// Fold new packets into the stored key with `PacketUnionMerger`
    PacketUnion,
}

impl MergeMode {
    pub fn merger(&self) -> Option<Arc<dyn KeyMerger>> {
        match self {
            MergeMode::Disabled => None,
            MergeMode::PacketUnion => Some(Arc::new(PacketUnionMerger)),
        }
    }
}

impl FromStr for MergeMode {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "disabled" => Ok(MergeMode::Disabled),
            "union" | "packet-union" => Ok(MergeMode::PacketUnion),
            other => Err(KeyError::InvalidIdentifier {
                kind: "merge mode",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_union_adds_new_material() {
        let merged = PacketUnionMerger
            .merge(&testutil::jenny_ondioline(), &testutil::jenny_ondioline_update())
            .unwrap();

        assert_eq!(
            merged.user_ids(),
            vec![
                testutil::JENNY_USER_ID.to_string(),
                testutil::JENNY_SECOND_USER_ID.to_string()
            ]
        );
        assert_eq!(merged.signature_count(), 3);
        assert_eq!(merged.digest().unwrap().to_string(), testutil::JENNY_MERGED_DIGEST);
    }

    #[test]
    fn test_union_is_idempotent() {
        let key = testutil::jenny_ondioline();
        let merged = PacketUnionMerger.merge(&key, &key).unwrap();
        assert_eq!(merged, key);
    }

    #[test]
    fn test_union_rejects_different_primary() {
        let other = testutil::distinct_key(9, "x");
        assert!(matches!(
            PacketUnionMerger.merge(&testutil::jenny_ondioline(), &other),
            Err(KeyError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_mode_parsing() {
        assert_eq!("none".parse::<MergeMode>().unwrap(), MergeMode::Disabled);
        assert_eq!("UNION".parse::<MergeMode>().unwrap(), MergeMode::PacketUnion);
        assert!("sometimes".parse::<MergeMode>().is_err());
        assert!(MergeMode::Disabled.merger().is_none());
        assert!(MergeMode::PacketUnion.merger().is_some());
    }
}
