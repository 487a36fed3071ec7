//! Property-Based Tests for Key Identity
//!
//! These tests verify the identity rules for arbitrary keys:
//! 1. The digest depends only on the packet set, not order or repetition
//! 2. Key identifiers are derived from the primary key packet alone
//! 3. Different packet sets hash to different digests
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use proptest::prelude::*;
use keyhold_core::{Fingerprint, JsonKeyCodec, KeyCodec, Packet, PacketTag, ParsedKey};

fn arb_packet() -> impl Strategy<Value = Packet> {
    (
        prop_oneof![
            Just(PacketTag::SIGNATURE),
            Just(PacketTag::USER_ID),
            Just(PacketTag::PUBLIC_SUBKEY),
            Just(PacketTag::USER_ATTRIBUTE),
        ],
        prop::collection::vec(any::<u8>(), 0..300),
    )
        .prop_map(|(tag, body)| Packet::new(tag, body))
}

fn arb_key() -> impl Strategy<Value = ParsedKey> {
    (
        prop_oneof![Just(4u8), Just(5u8), Just(6u8)],
        prop::collection::vec(any::<u8>(), 0..64),
        prop::collection::vec(arb_packet(), 0..12),
    )
        .prop_map(|(version, material, rest)| {
            let mut primary = vec![version];
            primary.extend(material);
            let mut packets = vec![Packet::new(PacketTag::PUBLIC_KEY, primary)];
            packets.extend(rest);
            ParsedKey::new(packets).unwrap()
        })
}

proptest! {
    /// Shuffling packets never changes the digest
    #[test]
    fn prop_digest_ignores_packet_order(key in arb_key(), seed in any::<u64>()) {
        let mut shuffled = key.packets().to_vec();
        // Deterministic rotation + swap driven by the seed
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        if len > 1 {
            shuffled.swap(0, (seed as usize / 7) % len);
        }

        let reordered = ParsedKey::new(shuffled).unwrap();
        prop_assert_eq!(reordered.digest().unwrap(), key.digest().unwrap());
        prop_assert_eq!(reordered.fingerprint(), key.fingerprint());
    }

    /// Repeating packets within a submission never changes the digest
    #[test]
    fn prop_digest_ignores_repeats(key in arb_key(), times in 2usize..4) {
        let mut repeated = Vec::new();
        for _ in 0..times {
            repeated.extend(key.packets().iter().cloned());
        }

        let repeated = ParsedKey::new(repeated).unwrap();
        prop_assert_eq!(repeated.digest().unwrap(), key.digest().unwrap());
    }

    /// Adding a packet the key does not already carry changes the digest
    #[test]
    fn prop_new_packet_changes_digest(key in arb_key(), extra in arb_packet()) {
        prop_assume!(!key.packets().contains(&extra));

        let mut packets = key.packets().to_vec();
        packets.push(extra);
        let extended = ParsedKey::new(packets).unwrap();
        prop_assert_ne!(extended.digest().unwrap(), key.digest().unwrap());
    }

    /// The short id is always the low half of the key id
    #[test]
    fn prop_short_id_is_low_half_of_key_id(key in arb_key()) {
        let key_id = key.key_id();
        prop_assert_eq!(key.short_id().as_u32(), key_id.as_u64() as u32);
        prop_assert!(key_id.to_string().ends_with(&key.short_id().to_string()));
        let fp = key.fingerprint().to_string();
        if fp.len() == 40 {
            prop_assert!(fp.ends_with(&key_id.to_string()));
        } else {
            prop_assert!(fp.starts_with(&key_id.to_string()));
        }
    }

    /// Equal digests imply equal identifiers: the fingerprint cannot vary
    /// independently of the packets
    #[test]
    fn prop_same_packets_same_identity(key in arb_key()) {
        let rebuilt = ParsedKey::new(key.packets().to_vec()).unwrap();
        prop_assert_eq!(rebuilt.digest().unwrap(), key.digest().unwrap());
        prop_assert_eq!(rebuilt.fingerprint(), key.fingerprint());
        prop_assert_eq!(rebuilt.key_id(), key.key_id());
    }

    /// A key cannot be decoded under another key's fingerprint
    #[test]
    fn prop_foreign_fingerprint_rejected(key in arb_key(), other in arb_key()) {
        prop_assume!(key.fingerprint() != other.fingerprint());
        let mut json: serde_json::Value = serde_json::from_slice(&key.to_bytes().unwrap()).unwrap();
        json["fingerprint"] = other.fingerprint().to_string().into();

        let result = ParsedKey::from_bytes(&serde_json::to_vec(&json).unwrap());
        prop_assert!(result.is_err());
    }

    /// Identifiers survive a render/parse cycle through their text form
    #[test]
    fn prop_identifier_text_roundtrip(key in arb_key()) {
        let fp: Fingerprint = key.fingerprint().to_string().parse().unwrap();
        prop_assert_eq!(&fp, key.fingerprint());
        prop_assert_eq!(key.key_id().to_string().parse::<keyhold_core::KeyId>().unwrap(), key.key_id());
        prop_assert_eq!(key.digest().unwrap().to_string().parse::<keyhold_core::Digest>().unwrap(), key.digest().unwrap());
    }

    /// The JSON codec preserves identity
    #[test]
    fn prop_codec_preserves_digest(key in arb_key()) {
        let encoded = JsonKeyCodec.encode(std::slice::from_ref(&key)).unwrap();
        let decoded = JsonKeyCodec.decode(&encoded).unwrap();
        prop_assert_eq!(decoded.len(), 1);
        prop_assert_eq!(decoded[0].digest().unwrap(), key.digest().unwrap());
    }
}
