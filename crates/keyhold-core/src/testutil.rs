//! Shared key fixtures for tests

use crate::key::ParsedKey;
use crate::types::Fingerprint;

pub const JENNY_USER_ID: &str = "Jenny Ondioline <jennyo@transient.net>";
pub const JENNY_FINGERPRINT: &str = "7b70fa86ed4a4feaffcc5ea852690b73ce353cf4";
pub const JENNY_KEY_ID: &str = "52690b73ce353cf4";
pub const JENNY_DIGEST: &str = "b073e7597648383a457a1a6131d04f3c";

/// Digest of the Jenny key after merging `jenny_ondioline_update`
pub const JENNY_MERGED_DIGEST: &str = "d6cd6cf2ad7b4502184868eb342d2f39";

pub const JENNY_SECOND_USER_ID: &str = "Jenny O <jenny@example.org>";

// Trailing key material chosen so the short id comes out as ce353cf4
const JENNY_KEY_NONCE: [u8; 8] = [0x00, 0x00, 0x00, 0x01, 0xa6, 0x6f, 0x1d, 0xf3];

pub fn jenny_fingerprint() -> Fingerprint {
    JENNY_FINGERPRINT.parse().expect("fixture fingerprint is valid")
}

fn jenny_primary_body() -> Vec<u8> {
    let mut body = vec![0x04, 0x4e, 0x1c, 0x6a, 0x10, 0x01];
    body.extend(0u8..56);
    body.extend_from_slice(&JENNY_KEY_NONCE);
    body
}

fn jenny_subkey_body() -> Vec<u8> {
    let mut body = vec![0x04, 0x4e, 0x1c, 0x6a, 0x10, 0x01];
    body.extend(64u8..128);
    body
}

fn signature_body(class: u8, serial: u8, fill: u8) -> Vec<u8> {
    let mut body = vec![0x04, class, 0x01, serial];
    body.extend(std::iter::repeat(fill).take(32));
    body
}

/// Primary key, one user ID, one subkey, two signatures
pub fn jenny_ondioline() -> ParsedKey {
    ParsedKey::builder()
        .fingerprint(jenny_fingerprint())
        .primary_key(jenny_primary_body())
        .user_id(JENNY_USER_ID)
        .signature(signature_body(0x13, 0x02, 0xAB))
        .subkey(jenny_subkey_body())
        .signature(signature_body(0x18, 0x02, 0xCD))
        .build()
        .expect("fixture key is valid")
}

/// The same primary key carrying an extra user ID and its certification
pub fn jenny_ondioline_update() -> ParsedKey {
    ParsedKey::builder()
        .fingerprint(jenny_fingerprint())
        .primary_key(jenny_primary_body())
        .user_id(JENNY_SECOND_USER_ID)
        .signature(signature_body(0x13, 0x03, 0xEF))
        .build()
        .expect("fixture key is valid")
}

/// A v4 key with its own primary key material, distinct per `seed`
pub fn distinct_key(seed: u8, user_id: &str) -> ParsedKey {
    let mut primary = vec![0x04, 0x5e, 0xed, 0x00, seed, 0x16];
    primary.extend(std::iter::repeat(seed).take(24));
    ParsedKey::builder()
        .primary_key(primary)
        .user_id(user_id)
        .signature(signature_body(0x13, 0x01, seed))
        .build()
        .expect("fixture key is valid")
}

/// Two different v4 keys whose short ids are both `05813825`
pub fn short_id_twins() -> (ParsedKey, ParsedKey) {
    (
        twin_key(0x6d37, "Twin A <twin-a@example.com>"),
        twin_key(0x1_2a0f, "Twin B <twin-b@example.com>"),
    )
}

fn twin_key(counter: u64, user_id: &str) -> ParsedKey {
    let mut primary = vec![0x04, 0x5e, 0x10, 0x00, 0xa1, 0x16];
    primary.extend([0xa1; 24]);
    primary.extend_from_slice(&counter.to_be_bytes());
    ParsedKey::builder()
        .primary_key(primary)
        .user_id(user_id)
        .build()
        .expect("fixture key is valid")
}
