//! Sled-backed storage.

use std::ops::Bound;
use std::path::Path;

use sled::{Db, Tree};

use super::{check_expect, Envelope, Expect, ScanPage, ScanPredicate, Storage, Versioned};
use crate::error::Error;
use crate::record::Record;

/// Prefix for per-entity trees.
const ENTITY_TREE_PREFIX: &str = "entity:";

/// Storage keeping one sled tree per entity, keyed by record id.
pub struct SledStorage {
    db: Db,
}

impl SledStorage {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a temporary store, removed on drop.
    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, entity: &str) -> Result<Tree, Error> {
        Ok(self.db.open_tree(format!("{}{}", ENTITY_TREE_PREFIX, entity))?)
    }

    fn decode(bytes: &[u8]) -> Result<Versioned, Error> {
        let envelope = Envelope::from_bytes(bytes)?;
        Ok(Versioned {
            record: envelope.record()?,
            version: envelope.version,
        })
    }
}

impl Storage for SledStorage {
    fn get(&self, entity: &str, id: &str) -> Result<Option<Versioned>, Error> {
        match self.tree(entity)?.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, entity: &str, record: &Record, expect: Expect) -> Result<u64, Error> {
        let tree = self.tree(entity)?;
        let key = record.id.as_bytes();

        loop {
            let current = tree.get(key)?;
            let current_version = match &current {
                Some(bytes) => Some(Envelope::from_bytes(bytes)?.version),
                None => None,
            };
            check_expect(entity, &record.id, current_version, expect)?;

            let version = current_version.unwrap_or(0) + 1;
            let encoded = Envelope::wrap(record, version)?.to_bytes()?;

            match tree.compare_and_swap(key, current, Some(encoded))? {
                Ok(()) => return Ok(version),
                // Lost a race: unconditional writes retry, conditional ones conflict.
                Err(_) if expect == Expect::Any => continue,
                Err(_) => {
                    return Err(Error::Conflict {
                        entity: entity.to_string(),
                        id: record.id.clone(),
                    })
                }
            }
        }
    }

    fn delete(&self, entity: &str, id: &str) -> Result<bool, Error> {
        Ok(self.tree(entity)?.remove(id.as_bytes())?.is_some())
    }

    fn scan(
        &self,
        entity: &str,
        predicate: ScanPredicate<'_>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, Error> {
        let tree = self.tree(entity)?;
        let lower = match cursor {
            Some(c) => Bound::Excluded(c.as_bytes().to_vec()),
            None => Bound::Unbounded,
        };

        let mut page = ScanPage::default();
        for item in tree.range::<Vec<u8>, _>((lower, Bound::Unbounded)) {
            let (_, bytes) = item?;
            let stored = Self::decode(&bytes)?;
            if !predicate(&stored.record) {
                continue;
            }
            if page.records.len() == limit {
                page.next_cursor = page.records.last().map(|v| v.record.id.clone());
                break;
            }
            page.records.push(stored);
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = SledStorage::temporary().unwrap();
        let record = Record::new("p1").with("title", "Loft");

        assert_eq!(store.put("Property", &record, Expect::Absent).unwrap(), 1);
        assert_eq!(store.put("Property", &record, Expect::Any).unwrap(), 2);
        assert!(store
            .put("Property", &record, Expect::Version(1))
            .unwrap_err()
            .is_conflict());

        let stored = store.get("Property", "p1").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record.get_str("title"), Some("Loft"));

        assert!(store.delete("Property", "p1").unwrap());
        assert!(store.get("Property", "p1").unwrap().is_none());
    }

    #[test]
    fn test_scan_with_cursor() {
        let store = SledStorage::temporary().unwrap();
        for i in 0..4 {
            store
                .put("Image", &Record::new(format!("i{}", i)), Expect::Absent)
                .unwrap();
        }

        let first = store.scan("Image", &|_| true, None, 3).unwrap();
        assert_eq!(first.records.len(), 3);
        let second = store
            .scan("Image", &|_| true, first.next_cursor.as_deref(), 3)
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].record.id, "i3");
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStorage::open(dir.path()).unwrap();
            store
                .put("User", &Record::new("u1").with("displayName", "Ann"), Expect::Absent)
                .unwrap();
            store.flush().unwrap();
        }
        let store = SledStorage::open(dir.path()).unwrap();
        let user = store.get("User", "u1").unwrap().unwrap();
        assert_eq!(user.record.get_str("displayName"), Some("Ann"));
    }
}
