//! Property-Based Tests for Merge Planning
//!
//! These tests verify, for arbitrary material added to one primary key:
//! 1. The merged digest does not depend on which submission arrived first
//! 2. Re-submitting either input after a merge changes nothing
//! 3. A plan never supersedes the record it writes
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use keyhold_core::{testutil, Packet, PacketTag, PacketUnionMerger, ParsedKey};
use keyhold_store::merge::{plan_merge, MergePlan};
use keyhold_store::KeyRecord;
use proptest::prelude::*;

fn arb_packet() -> impl Strategy<Value = Packet> {
    (
        prop_oneof![
            Just(PacketTag::SIGNATURE),
            Just(PacketTag::USER_ID),
            Just(PacketTag::PUBLIC_SUBKEY),
        ],
        prop::collection::vec(any::<u8>(), 1..48),
    )
        .prop_map(|(tag, body)| Packet::new(tag, body))
}

/// Material for the Jenny primary key: its primary packet plus extras
fn arb_jenny_material() -> impl Strategy<Value = ParsedKey> {
    prop::collection::vec(arb_packet(), 0..6).prop_map(|extra| {
        let mut packets = vec![testutil::jenny_ondioline().packets()[0].clone()];
        packets.extend(extra);
        ParsedKey::new(packets).unwrap()
    })
}

fn record(key: &ParsedKey) -> KeyRecord {
    KeyRecord::from_key(key).unwrap()
}

/// Digest the store holds after applying `plan` on top of `stored`
fn resulting_digest(plan: MergePlan) -> keyhold_core::Digest {
    match plan {
        MergePlan::Unchanged(digest) => digest,
        MergePlan::Replace { record, .. } => record.digest,
    }
}

proptest! {
    /// Merging a into b or b into a ends on the same digest
    #[test]
    fn prop_merge_order_does_not_matter(a in arb_jenny_material(), b in arb_jenny_material()) {
        let ab = plan_merge(&[record(&a)], &b, &PacketUnionMerger).unwrap();
        let ba = plan_merge(&[record(&b)], &a, &PacketUnionMerger).unwrap();
        prop_assert_eq!(resulting_digest(ab), resulting_digest(ba));
    }

    /// Once merged, neither input adds anything
    #[test]
    fn prop_merged_record_absorbs_inputs(a in arb_jenny_material(), b in arb_jenny_material()) {
        let merged = match plan_merge(&[record(&a)], &b, &PacketUnionMerger).unwrap() {
            MergePlan::Unchanged(_) => record(&a),
            MergePlan::Replace { record, .. } => record,
        };

        for input in [&a, &b] {
            let plan = plan_merge(std::slice::from_ref(&merged), input, &PacketUnionMerger).unwrap();
            prop_assert!(
                matches!(plan, MergePlan::Unchanged(d) if d == merged.digest),
                "re-submitting an input must be a no-op"
            );
        }
    }

    /// The written record is never among the superseded ones, and every
    /// other stored digest is
    #[test]
    fn prop_plan_never_supersedes_its_own_record(
        stored in prop::collection::vec(arb_jenny_material(), 1..4),
        incoming in arb_jenny_material(),
    ) {
        let mut existing: Vec<KeyRecord> = stored.iter().map(record).collect();
        existing.sort_by_key(|r| r.digest);
        existing.dedup_by_key(|r| r.digest);

        if let MergePlan::Replace { record, superseded } =
            plan_merge(&existing, &incoming, &PacketUnionMerger).unwrap()
        {
            prop_assert!(!superseded.contains(&record.digest));
            for old in &existing {
                if old.digest != record.digest {
                    prop_assert!(superseded.contains(&old.digest));
                }
            }
        }
    }
}
