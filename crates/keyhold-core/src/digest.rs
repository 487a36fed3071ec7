//! Canonical content digest
//!
//! This is the SKS key hash. Every packet is encoded as a four-octet
//! big-endian tag, a four-octet big-endian body length and the body. The
//! encodings are sorted bytewise, which orders them by tag, then length, then
//! body. Exact duplicates are dropped and the concatenation is hashed with
//! MD5. Packet order in the submission therefore never changes the
//! digest, and neither does a packet repeated within one submission.

use md5::{Digest as _, Md5};

use crate::error::Result;
use crate::packet::Packet;
use crate::types::Digest;

/// Compute the canonical digest of a packet set
pub fn sks_digest(packets: &[Packet]) -> Result<Digest> {
    let mut encoded = packets
        .iter()
        .map(Packet::to_sks_bytes)
        .collect::<Result<Vec<_>>>()?;
    encoded.sort();
    encoded.dedup();

    let mut hasher = Md5::new();
    for bytes in &encoded {
        hasher.update(bytes);
    }

    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    Ok(Digest::from_bytes(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_fixture_digest() {
        let key = testutil::jenny_ondioline();
        assert_eq!(
            sks_digest(key.packets()).unwrap().to_string(),
            testutil::JENNY_DIGEST
        );
    }

    #[test]
    fn test_order_does_not_matter() {
        let key = testutil::jenny_ondioline();
        let mut reversed = key.packets().to_vec();
        reversed.reverse();
        assert_eq!(sks_digest(&reversed).unwrap(), sks_digest(key.packets()).unwrap());
    }

    #[test]
    fn test_duplicate_packets_ignored() {
        let key = testutil::jenny_ondioline();
        let mut doubled = key.packets().to_vec();
        doubled.extend(key.packets().iter().cloned());
        assert_eq!(sks_digest(&doubled).unwrap(), sks_digest(key.packets()).unwrap());
    }

    #[test]
    fn test_empty_set_is_md5_of_nothing() {
        assert_eq!(
            sks_digest(&[]).unwrap().to_string(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_hash_input_is_sorted_sks_encoding() {
        use crate::packet::PacketTag;
        use md5::{Digest as _, Md5};

        let uid = Packet::user_id("a");
        let sig = Packet::new(PacketTag::SIGNATURE, vec![0x01, 0x02]);

        let mut expected = Md5::new();
        expected.update([0, 0, 0, 2, 0, 0, 0, 2, 0x01, 0x02]);
        expected.update([0, 0, 0, 13, 0, 0, 0, 1, b'a']);
        let expected = hex::encode(expected.finalize());

        assert_eq!(sks_digest(&[uid, sig]).unwrap().to_string(), expected);
    }
}
