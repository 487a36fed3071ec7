//! Lookup request parsing
//!
//! A lookup is an op code plus a search term. Hex terms must carry a `0x`
//! prefix and are classified by length; anything else is user ID text.

use keyhold_core::{Digest, Fingerprint, KeyId, ShortId};
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceError;

/// What the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    /// Encoded keys
    Get,
    /// Encoded key by content digest
    HGet,
    /// Key listing
    Index,
    /// Verbose key listing
    VIndex,
}

impl FromStr for LookupOp {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(LookupOp::Get),
            "hget" => Ok(LookupOp::HGet),
            "index" => Ok(LookupOp::Index),
            "vindex" => Ok(LookupOp::VIndex),
            other => Err(ServiceError::BadRequest(format!("unsupported op '{other}'"))),
        }
    }
}

impl fmt::Display for LookupOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            LookupOp::Get => "get",
            LookupOp::HGet => "hget",
            LookupOp::Index => "index",
            LookupOp::VIndex => "vindex",
        };
        f.write_str(op)
    }
}

/// A classified search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    ShortId(ShortId),
    KeyId(KeyId),
    Fingerprint(Fingerprint),
    Digest(Digest),
    /// Free text matched against user IDs
    Text(String),
}

impl SearchTerm {
    /// Classify `search` for `op`
    ///
    /// `hget` takes only a digest, with or without the `0x` prefix.
    pub fn parse(op: LookupOp, search: &str) -> Result<Self, ServiceError> {
        let search = search.trim();
        if search.is_empty() {
            return Err(ServiceError::BadRequest("missing search term".into()));
        }

        if op == LookupOp::HGet {
            return search
                .parse()
                .map(SearchTerm::Digest)
                .map_err(|e| ServiceError::BadRequest(format!("hget needs a digest: {e}")));
        }

        let hex = match search.strip_prefix("0x").or_else(|| search.strip_prefix("0X")) {
            Some(hex) => hex,
            None => return Ok(SearchTerm::Text(search.to_string())),
        };

        let bad = |e: keyhold_core::KeyError| ServiceError::BadRequest(e.to_string());
        match hex.len() {
            8 => hex.parse().map(SearchTerm::ShortId).map_err(bad),
            16 => hex.parse().map(SearchTerm::KeyId).map_err(bad),
            40 | 64 => hex.parse().map(SearchTerm::Fingerprint).map_err(bad),
            n => Err(ServiceError::BadRequest(format!(
                "hex search term has {n} digits; expected 8, 16, 40 or 64"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_codes() {
        for op in ["get", "hget", "index", "vindex"] {
            assert_eq!(op.parse::<LookupOp>().unwrap().to_string(), op);
        }
        assert!(matches!("stats".parse::<LookupOp>(), Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn test_hex_terms_by_length() {
        assert_eq!(
            SearchTerm::parse(LookupOp::Get, "0xCE353CF4").unwrap(),
            SearchTerm::ShortId(ShortId::new(0xce35_3cf4))
        );
        assert_eq!(
            SearchTerm::parse(LookupOp::Index, "0xd8e7b1f0ce353cf4").unwrap(),
            SearchTerm::KeyId(KeyId::new(0xd8e7_b1f0_ce35_3cf4))
        );
        assert!(matches!(
            SearchTerm::parse(LookupOp::Get, "0x8a5f2e04c1b7d93e6f10a2c4d8e7b1f0ce353cf4").unwrap(),
            SearchTerm::Fingerprint(_)
        ));
    }

    #[test]
    fn test_unprefixed_text_is_user_id_search() {
        assert_eq!(
            SearchTerm::parse(LookupOp::Index, " jennyo@transient.net ").unwrap(),
            SearchTerm::Text("jennyo@transient.net".into())
        );
        // Without the prefix even hex-looking input is text
        assert_eq!(
            SearchTerm::parse(LookupOp::Get, "ce353cf4").unwrap(),
            SearchTerm::Text("ce353cf4".into())
        );
    }

    #[test]
    fn test_hget_requires_digest() {
        let term = SearchTerm::parse(LookupOp::HGet, "da84f40d830a7be2a3c0b7f2e146bfaa").unwrap();
        assert!(matches!(term, SearchTerm::Digest(_)));
        assert!(SearchTerm::parse(LookupOp::HGet, "0xda84f40d830a7be2a3c0b7f2e146bfaa").is_ok());
        assert!(SearchTerm::parse(LookupOp::HGet, "jenny").is_err());
    }

    #[test]
    fn test_rejects_bad_terms() {
        assert!(SearchTerm::parse(LookupOp::Get, "   ").is_err());
        assert!(SearchTerm::parse(LookupOp::Get, "0x123").is_err());
        assert!(SearchTerm::parse(LookupOp::Get, "0xzzzzzzzz").is_err());
    }
}
