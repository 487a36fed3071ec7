//! Merge-on-add planning
//!
//! Backends call into this module while holding their write section (the
//! collection lock, or a database transaction), so the plan and its
//! application form one atomic step.

use keyhold_core::{Digest, KeyMerger, ParsedKey};

use crate::error::Result;
use crate::record::KeyRecord;

/// Result of an add
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A record with a previously unseen digest was stored
    Inserted(Digest),
    /// The digest was already stored; nothing changed
    Unchanged(Digest),
    /// New material was merged; `superseded` records were replaced by `digest`
    Merged {
        digest: Digest,
        superseded: Vec<Digest>,
    },
}

impl AddOutcome {
    /// Whether new state was committed
    pub fn inserted(&self) -> bool {
        !matches!(self, AddOutcome::Unchanged(_))
    }

    /// Digest of the record now holding the submitted material
    pub fn digest(&self) -> &Digest {
        match self {
            AddOutcome::Inserted(d) | AddOutcome::Unchanged(d) => d,
            AddOutcome::Merged { digest, .. } => digest,
        }
    }
}

/// What a backend must write to apply a merge
#[derive(Debug)]
pub enum MergePlan {
    /// Incoming material is already fully stored under this digest
    Unchanged(Digest),
    /// Delete `superseded` (if any) and insert `record`, atomically
    Replace {
        record: KeyRecord,
        superseded: Vec<Digest>,
    },
}

/// Plan how `incoming` is folded into the records already stored for its
/// primary fingerprint
///
/// `existing` must hold every stored record with the same fingerprint. With
/// no existing records the plan is a plain insert.
pub fn plan_merge(
    existing: &[KeyRecord],
    incoming: &ParsedKey,
    merger: &dyn KeyMerger,
) -> Result<MergePlan> {
    let incoming_record = KeyRecord::from_key(incoming)?;

    if existing.iter().any(|r| r.digest == incoming_record.digest) && existing.len() == 1 {
        return Ok(MergePlan::Unchanged(incoming_record.digest));
    }

    let mut ordered: Vec<&KeyRecord> = existing.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.digest.cmp(&b.digest)));

    let mut merged: Option<ParsedKey> = None;
    for record in &ordered {
        let stored = record.key()?;
        merged = Some(match merged {
            None => stored,
            Some(acc) => merger.merge(&acc, &stored)?,
        });
    }
    let merged = match merged {
        None => incoming.clone(),
        Some(acc) => merger.merge(&acc, incoming)?,
    };

    let mut record = KeyRecord::from_key(&merged)?;
    if let Some(first) = ordered.first() {
        record.created_at = first.created_at;
    }

    let superseded: Vec<Digest> = ordered
        .iter()
        .map(|r| r.digest)
        .filter(|d| *d != record.digest)
        .collect();

    if superseded.is_empty() && !ordered.is_empty() {
        return Ok(MergePlan::Unchanged(record.digest));
    }

    Ok(MergePlan::Replace { record, superseded })
}
