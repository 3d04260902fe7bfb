//! In-memory storage backend.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use parking_lot::RwLock;

use super::{check_expect, Expect, ScanPage, ScanPredicate, Storage, Versioned};
use crate::error::Error;
use crate::record::Record;

/// Storage backed by ordered in-memory maps, one per entity.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, BTreeMap<String, Versioned>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for an entity.
    pub fn count(&self, entity: &str) -> usize {
        self.tables.read().get(entity).map(BTreeMap::len).unwrap_or(0)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, entity: &str, id: &str) -> Result<Option<Versioned>, Error> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .and_then(|table| table.get(id))
            .cloned())
    }

    fn put(&self, entity: &str, record: &Record, expect: Expect) -> Result<u64, Error> {
        let mut tables = self.tables.write();
        let table = tables.entry(entity.to_string()).or_default();

        let current = table.get(&record.id).map(|v| v.version);
        check_expect(entity, &record.id, current, expect)?;

        let version = current.unwrap_or(0) + 1;
        table.insert(
            record.id.clone(),
            Versioned {
                record: record.clone(),
                version,
            },
        );
        Ok(version)
    }

    fn delete(&self, entity: &str, id: &str) -> Result<bool, Error> {
        Ok(self
            .tables
            .write()
            .get_mut(entity)
            .map(|table| table.remove(id).is_some())
            .unwrap_or(false))
    }

    fn scan(
        &self,
        entity: &str,
        predicate: ScanPredicate<'_>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, Error> {
        let tables = self.tables.read();
        let Some(table) = tables.get(entity) else {
            return Ok(ScanPage::default());
        };

        let lower = match cursor {
            Some(c) => Bound::Excluded(c.to_string()),
            None => Bound::Unbounded,
        };

        let mut page = ScanPage::default();
        for (_, stored) in table.range((lower, Bound::Unbounded)) {
            if !predicate(&stored.record) {
                continue;
            }
            if page.records.len() == limit {
                page.next_cursor = page.records.last().map(|v| v.record.id.clone());
                break;
            }
            page.records.push(stored.clone());
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStorage {
        let store = MemoryStorage::new();
        for i in 0..5 {
            let record = Record::new(format!("id-{}", i)).with("n", i as i64);
            store.put("Thing", &record, Expect::Absent).unwrap();
        }
        store
    }

    #[test]
    fn test_put_get_versions() {
        let store = MemoryStorage::new();
        let record = Record::new("a").with("name", "x");

        assert_eq!(store.put("Thing", &record, Expect::Absent).unwrap(), 1);
        assert_eq!(store.put("Thing", &record, Expect::Version(1)).unwrap(), 2);
        assert!(store.put("Thing", &record, Expect::Version(1)).unwrap_err().is_conflict());
        assert!(store.put("Thing", &record, Expect::Absent).is_err());

        let stored = store.get("Thing", "a").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record, record);
    }

    #[test]
    fn test_delete() {
        let store = seeded();
        assert!(store.delete("Thing", "id-1").unwrap());
        assert!(!store.delete("Thing", "id-1").unwrap());
        assert!(!store.delete("Other", "id-1").unwrap());
        assert_eq!(store.count("Thing"), 4);
    }

    #[test]
    fn test_scan_pages_with_predicate() {
        let store = seeded();
        let even = |r: &Record| r.get_i64("n").is_some_and(|n| n % 2 == 0);

        let first = store.scan("Thing", &even, None, 2).unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("id-2"));

        let second = store.scan("Thing", &even, first.next_cursor.as_deref(), 2).unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].record.id, "id-4");
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn test_scan_all() {
        let store = seeded();
        let all = store.scan_all("Thing", &|_| true).unwrap();
        assert_eq!(all.len(), 5);
        assert!(store.scan_all("Missing", &|_| true).unwrap().is_empty());
    }
}
