//! Storage collaborator.
//!
//! The engine only needs per-entity key lookup, create/update/delete and an
//! ordered scan. [`Storage`] captures that contract; [`MemoryStorage`] and
//! [`SledStorage`] implement it.

mod envelope;
mod memory;
mod sled_store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub use envelope::Envelope;
pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

use crate::error::Error;
use crate::record::Record;

/// Page size used by [`Storage::scan_all`].
const SCAN_BATCH: usize = 256;

/// A stored record with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    /// Record contents.
    pub record: Record,
    /// Monotonic per-record version, starting at 1.
    pub version: u64,
}

/// One page of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Matching records in id order.
    pub records: Vec<Versioned>,
    /// Id to resume after, when more matches exist.
    pub next_cursor: Option<String>,
}

/// Write precondition for [`Storage::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Write unconditionally.
    Any,
    /// The record must not exist yet.
    Absent,
    /// The stored version must equal this value.
    Version(u64),
}

/// Predicate applied during scans.
pub type ScanPredicate<'a> = &'a dyn Fn(&Record) -> bool;

/// Blocking storage contract consumed by the engine.
///
/// Implementations report missing records as `Ok(None)` / `Ok(false)`, failed
/// preconditions as [`Error::Conflict`] and transient faults as
/// [`Error::Unavailable`].
pub trait Storage: Send + Sync {
    /// Fetch a record by id.
    fn get(&self, entity: &str, id: &str) -> Result<Option<Versioned>, Error>;

    /// Create or update a record, returning the new version.
    fn put(&self, entity: &str, record: &Record, expect: Expect) -> Result<u64, Error>;

    /// Delete a record. Returns whether it existed.
    fn delete(&self, entity: &str, id: &str) -> Result<bool, Error>;

    /// Scan records in id order after `cursor`, keeping those matching
    /// `predicate`, up to `limit`.
    fn scan(
        &self,
        entity: &str,
        predicate: ScanPredicate<'_>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, Error>;

    /// Collect every matching record.
    fn scan_all(&self, entity: &str, predicate: ScanPredicate<'_>) -> Result<Vec<Versioned>, Error> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.scan(entity, predicate, cursor.as_deref(), SCAN_BATCH)?;
            out.extend(page.records);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(out),
            }
        }
    }

    /// Check whether a record exists.
    fn exists(&self, entity: &str, id: &str) -> Result<bool, Error> {
        Ok(self.get(entity, id)?.is_some())
    }
}

/// Generate a new unique record id (hex, UUID v4 layout).
pub fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&now.to_be_bytes());
    id[8..16].copy_from_slice(&counter.to_le_bytes());

    id[6] = (id[6] & 0x0f) | 0x40;
    id[8] = (id[8] & 0x3f) | 0x80;

    hex::encode(id)
}

/// Check a write precondition against the currently stored version.
pub(crate) fn check_expect(
    entity: &str,
    id: &str,
    current: Option<u64>,
    expect: Expect,
) -> Result<(), Error> {
    let ok = match (expect, current) {
        (Expect::Any, _) => true,
        (Expect::Absent, None) => true,
        (Expect::Absent, Some(_)) => false,
        (Expect::Version(v), Some(c)) => v == c,
        (Expect::Version(_), None) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Conflict {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.len() == 32));
    }

    #[test]
    fn test_check_expect() {
        assert!(check_expect("E", "1", None, Expect::Any).is_ok());
        assert!(check_expect("E", "1", None, Expect::Absent).is_ok());
        assert!(check_expect("E", "1", Some(1), Expect::Absent).is_err());
        assert!(check_expect("E", "1", Some(3), Expect::Version(3)).is_ok());
        assert!(check_expect("E", "1", Some(4), Expect::Version(3)).is_err());
        assert!(check_expect("E", "1", None, Expect::Version(3)).is_err());
    }
}
