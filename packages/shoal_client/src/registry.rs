//! Skin Registry
//!
//! In-memory mapping from identity hash to a pair of asset references.
//! Updates merge: a slot is replaced only by a non-empty incoming value, so
//! partial updates are additive and never destroy what an earlier update
//! established. Entries live for the lifetime of the process; there is no
//! eviction (bounded by distinct identities seen).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

/// External asset loader hook, fire-and-forget. Must be idempotent: the
/// registry re-fires it on every upsert that leaves a slot populated.
pub trait AssetPrefetch: Send + Sync {
    fn prefetch(&self, reference: &str);
}

/// Prefetch hook that does nothing, for headless callers.
pub struct NullPrefetch;

impl AssetPrefetch for NullPrefetch {
    fn prefetch(&self, _reference: &str) {}
}

/// Two independent asset-reference slots for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkinRecord {
    pub s1: Option<String>,
    pub s2: Option<String>,
}

/// Identity hash → skin record.
///
/// The hash key is opaque here: it is computed elsewhere from the normalized
/// tag/nickname pair and never recomputed for correctness. Collisions resolve
/// last-writer-wins per field.
pub struct SkinRegistry {
    records: HashMap<String, SkinRecord>,
    prefetch: Arc<dyn AssetPrefetch>,
}

impl SkinRegistry {
    pub fn new(prefetch: Arc<dyn AssetPrefetch>) -> Self {
        Self {
            records: HashMap::new(),
            prefetch,
        }
    }

    /// Insert-or-merge one record under `hash`.
    ///
    /// Each provided slot replaces the stored field only when non-empty after
    /// trimming; absent or empty slots leave the field unchanged. Empty
    /// hashes are ignored. Every slot that ends up populated is handed to the
    /// prefetch hook so the asset is ready before anything renders it.
    pub fn upsert(&mut self, hash: &str, s1: Option<&str>, s2: Option<&str>) {
        if hash.is_empty() {
            return;
        }
        if !self.records.contains_key(hash) {
            debug!(%hash, "new skin record");
        }
        let record = self.records.entry(hash.to_string()).or_default();
        if let Some(v) = non_empty(s1) {
            record.s1 = Some(v.to_string());
        }
        if let Some(v) = non_empty(s2) {
            record.s2 = Some(v.to_string());
        }
        for slot in [&record.s1, &record.s2] {
            if let Some(reference) = slot {
                self.prefetch.prefetch(reference);
            }
        }
    }

    /// Current record for `hash`. Unknown keys are an explicit miss.
    pub fn get(&self, hash: &str) -> Option<&SkinRecord> {
        self.records.get(hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn non_empty(slot: Option<&str>) -> Option<&str> {
    slot.map(str::trim).filter(|v| !v.is_empty())
}
