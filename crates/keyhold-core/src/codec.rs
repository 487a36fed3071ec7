//! Key codec contract
//!
//! The store never looks at wire formats. A codec turns submitted text into
//! `ParsedKey`s and turns stored keys back into response bodies.

use serde::Deserialize;

use crate::error::{KeyError, Result};
use crate::key::{KeyDocument, ParsedKey};

/// Parses and serializes wire-format key material
pub trait KeyCodec: Send + Sync {
    /// Decode every key found in `input`
    fn decode(&self, input: &[u8]) -> Result<Vec<ParsedKey>>;

    /// Encode keys into a single response body
    fn encode(&self, keys: &[ParsedKey]) -> Result<Vec<u8>>;

    /// Media type of encoded output
    fn content_type(&self) -> &'static str;
}

/// JSON codec: a single key object or an array of them
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonKeyCodec;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(KeyDocument),
    Many(Vec<KeyDocument>),
}

impl KeyCodec for JsonKeyCodec {
    fn decode(&self, input: &[u8]) -> Result<Vec<ParsedKey>> {
        let parsed: OneOrMany =
            serde_json::from_slice(input).map_err(|e| KeyError::Codec(e.to_string()))?;
        let docs = match parsed {
            OneOrMany::One(doc) => vec![doc],
            OneOrMany::Many(docs) => docs,
        };
        // Structural errors surface as themselves, not as untagged mismatches
        docs.into_iter().map(ParsedKey::try_from).collect()
    }

    fn encode(&self, keys: &[ParsedKey]) -> Result<Vec<u8>> {
        serde_json::to_vec(keys).map_err(|e| KeyError::Codec(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}
