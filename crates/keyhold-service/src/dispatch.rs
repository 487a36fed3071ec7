//! Add and lookup dispatch
//!
//! Maps front-end requests onto the key store. Transport concerns (routing,
//! form parsing, status lines) stay with the caller; this layer decides what
//! to store, what to look up and how the result is encoded.

use keyhold_core::{KeyCodec, ParsedKey};
use keyhold_store::{AddOutcome, KeyRecord, KeyStore};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::query::{LookupOp, SearchTerm};

pub const INDEX_CONTENT_TYPE: &str = "text/plain";

/// Result of submitting key text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddSummary {
    /// Keys stored for the first time
    pub inserted: usize,
    /// Keys that were already stored
    pub unchanged: usize,
    /// Keys folded into existing records
    pub merged: usize,
    /// Resulting digest of each submitted key, in submission order
    pub digests: Vec<String>,
}

impl AddSummary {
    fn record(&mut self, outcome: &AddOutcome) {
        match outcome {
            AddOutcome::Inserted(_) => self.inserted += 1,
            AddOutcome::Unchanged(_) => self.unchanged += 1,
            AddOutcome::Merged { .. } => self.merged += 1,
        }
        self.digests.push(outcome.digest().to_string());
    }
}

/// Encoded lookup result
#[derive(Debug, Clone)]
pub struct LookupResponse {
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// The records the body was built from
    pub records: Vec<KeyRecord>,
}

/// Front-end dispatch over a key store
pub struct KeyService<C> {
    store: Arc<dyn KeyStore>,
    codec: C,
}

impl<C: KeyCodec> KeyService<C> {
    pub fn new(store: Arc<dyn KeyStore>, codec: C) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    // =========================================================================
    // Add
    // =========================================================================

    /// Decode `text` and add each key it holds
    ///
    /// Keys are added one at a time. The first store failure aborts the
    /// request; keys added before it stay stored.
    pub async fn add(&self, text: &[u8]) -> Result<AddSummary> {
        let keys = self
            .codec
            .decode(text)
            .map_err(|e| ServiceError::BadRequest(format!("could not decode keys: {e}")))?;
        if keys.is_empty() {
            return Err(ServiceError::BadRequest("no keys in submission".into()));
        }

        let mut summary = AddSummary::default();
        for key in &keys {
            let outcome = self.store.add(key).await.map_err(|e| {
                warn!(key_id = %key.key_id(), error = %e, "Add failed");
                ServiceError::from(e)
            })?;
            summary.record(&outcome);
        }

        info!(
            submitted = keys.len(),
            inserted = summary.inserted,
            unchanged = summary.unchanged,
            merged = summary.merged,
            "Processed key submission"
        );
        Ok(summary)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Run a lookup from raw op and search strings
    pub async fn lookup_raw(&self, op: &str, search: &str) -> Result<LookupResponse> {
        self.lookup(op.parse()?, search).await
    }

    /// Run a lookup and encode the result for `op`
    pub async fn lookup(&self, op: LookupOp, search: &str) -> Result<LookupResponse> {
        let term = SearchTerm::parse(op, search)?;
        debug!(op = %op, term = ?term, "Lookup");

        let records = self.find(&term).await?;
        if records.is_empty() {
            return Err(ServiceError::NotFound(format!("no keys match '{}'", search.trim())));
        }

        match op {
            LookupOp::Get | LookupOp::HGet => {
                if matches!(term, SearchTerm::ShortId(_)) && records.len() > 1 {
                    info!(search = %search.trim(), matches = records.len(), "Ambiguous short id");
                    return Err(ServiceError::AmbiguousShortId(records));
                }
                let keys = decode_records(&records)?;
                let body = self
                    .codec
                    .encode(&keys)
                    .map_err(|e| ServiceError::Codec(e.to_string()))?;
                Ok(LookupResponse {
                    content_type: self.codec.content_type(),
                    body,
                    records,
                })
            }
            LookupOp::Index | LookupOp::VIndex => {
                let keys = decode_records(&records)?;
                let body = render_index(&records, &keys, op == LookupOp::VIndex);
                Ok(LookupResponse {
                    content_type: INDEX_CONTENT_TYPE,
                    body: body.into_bytes(),
                    records,
                })
            }
        }
    }

    async fn find(&self, term: &SearchTerm) -> Result<Vec<KeyRecord>> {
        let records = match term {
            SearchTerm::Digest(digest) => {
                self.store.lookup_by_digest(digest).await?.into_iter().collect()
            }
            SearchTerm::KeyId(key_id) => {
                self.store.lookup_by_key_id(*key_id).await?.into_iter().collect()
            }
            SearchTerm::Fingerprint(fp) => {
                self.store.lookup_by_fingerprint(fp).await?.into_iter().collect()
            }
            SearchTerm::ShortId(short_id) => self.store.lookup_by_short_id(*short_id).await?,
            SearchTerm::Text(text) => self.store.lookup_by_user_id(text).await?,
        };
        Ok(records)
    }
}

fn decode_records(records: &[KeyRecord]) -> Result<Vec<ParsedKey>> {
    records
        .iter()
        .map(|r| r.key().map_err(ServiceError::from))
        .collect()
}

/// Percent-escape the index field separator
fn escape_field(s: &str) -> String {
    s.replace('%', "%25").replace(':', "%3A")
}

/// Colon-separated key listing, one `pub` line per key
fn render_index(records: &[KeyRecord], keys: &[ParsedKey], verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "info:1:{}", records.len());

    for (record, key) in records.iter().zip(keys) {
        let _ = writeln!(
            out,
            "pub:{}:{}:{}:{}",
            record.fingerprint,
            record.key_id,
            record.digest,
            record.created_at.timestamp()
        );
        for uid in key.user_ids() {
            let _ = writeln!(out, "uid:{}", escape_field(&uid));
        }
        if verbose {
            let _ = writeln!(out, "sub:{}", key.subkey_count());
            let _ = writeln!(out, "sig:{}", key.signature_count());
        }
    }
    out
}
