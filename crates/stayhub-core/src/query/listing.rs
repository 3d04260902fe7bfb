//! Paginated listings.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use super::cursor::Cursor;
use super::filter::PropertyFilter;
use crate::catalog::{AMENITY, PROPERTY};
use crate::config::ListingConfig;
use crate::error::Error;
use crate::record::{Record, Value};
use crate::security::{Decision, Operation, PolicyEngine, Principal};
use crate::storage::Storage;

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    /// Visible, redacted records.
    pub records: Vec<Record>,
    /// Token for the next page, when more results exist.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Read-side listing over any entity, plus the filtered property search.
///
/// Every record is authorized and redacted for the caller before any filter
/// is evaluated, so hidden records and fields never influence a result.
pub struct ListingService {
    storage: Arc<dyn Storage>,
    policy: Arc<PolicyEngine>,
    config: ListingConfig,
}

impl ListingService {
    /// Create a listing service.
    pub fn new(storage: Arc<dyn Storage>, policy: Arc<PolicyEngine>, config: ListingConfig) -> Self {
        Self {
            storage,
            policy,
            config,
        }
    }

    /// Get the listing configuration.
    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    fn visible(&self, principal: &Principal, entity: &str, record: &Record) -> Option<Record> {
        match self
            .policy
            .authorize(principal, Operation::List, entity, Some(record))
        {
            Decision::Allow(scope) => Some(scope.redact(record)),
            Decision::Deny => None,
        }
    }

    /// List records of `entity` whose fields equal `filter`, in id order.
    pub fn list(
        &self,
        principal: &Principal,
        entity: &str,
        filter: &BTreeMap<String, Value>,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<Page, Error> {
        self.policy.registry().describe(entity)?;
        let after = cursor.map(|c| Cursor::decode(entity, c)).transpose()?;
        let limit = self.config.page_size(page_size);

        let matches = |record: &Record| {
            self.visible(principal, entity, record).is_some_and(|visible| {
                filter
                    .iter()
                    .all(|(field, value)| visible.get(field).as_ref() == Some(value))
            })
        };
        let page = self.storage.scan(
            entity,
            &matches,
            after.as_ref().map(|c| c.id.as_str()),
            limit,
        )?;

        let records = page
            .records
            .iter()
            .filter_map(|v| self.visible(principal, entity, &v.record))
            .collect();
        Ok(Page {
            records,
            next_cursor: page
                .next_cursor
                .map(|id| Cursor::new(None, id).encode())
                .transpose()?,
        })
    }

    /// Serve a filtered, ordered page of properties.
    pub fn list_properties(
        &self,
        principal: &Principal,
        filter: &PropertyFilter,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<Page, Error> {
        filter.validate()?;
        let after = cursor.map(|c| Cursor::decode(PROPERTY, c)).transpose()?;
        let limit = self.config.page_size(page_size);
        let order = &self.config.order;

        let amenities = if filter.needs_amenities() {
            self.amenity_names(principal)?
        } else {
            HashMap::new()
        };
        let empty = BTreeSet::new();

        let mut matching: Vec<Record> = self
            .storage
            .scan_all(PROPERTY, &|_: &Record| true)?
            .into_iter()
            .filter_map(|v| self.visible(principal, PROPERTY, &v.record))
            .filter(|p| filter.matches(p, amenities.get(&p.id).unwrap_or(&empty)))
            .collect();
        matching.sort_by(|a, b| order.compare(a, b));

        let start = match &after {
            None => 0,
            Some(c) => matching.partition_point(|r| {
                order.compare_keys(
                    (order.key_of(r).as_ref(), &r.id),
                    (c.value.as_ref(), &c.id),
                ) != std::cmp::Ordering::Greater
            }),
        };

        let rest = matching.len().saturating_sub(start);
        let records: Vec<Record> = matching.into_iter().skip(start).take(limit).collect();
        let next_cursor = if rest > records.len() {
            records
                .last()
                .map(|last| Cursor::new(order.key_of(last), last.id.clone()).encode())
                .transpose()?
        } else {
            None
        };

        tracing::debug!(
            returned = records.len(),
            more = next_cursor.is_some(),
            "property listing served"
        );
        Ok(Page {
            records,
            next_cursor,
        })
    }

    /// Lowercase names of the amenities the caller can see, by property.
    fn amenity_names(&self, principal: &Principal) -> Result<HashMap<String, BTreeSet<String>>, Error> {
        let mut names: HashMap<String, BTreeSet<String>> = HashMap::new();
        for v in self.storage.scan_all(AMENITY, &|_: &Record| true)? {
            let Some(amenity) = self.visible(principal, AMENITY, &v.record) else {
                continue;
            };
            if let (Some(prop_id), Some(name)) = (amenity.get_str("propId"), amenity.get_str("name")) {
                names
                    .entry(prop_id.to_string())
                    .or_default()
                    .insert(name.to_lowercase());
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Registry;
    use crate::query::OrderBy;
    use crate::security::PolicyTable;
    use crate::storage::{Expect, MemoryStorage};

    fn service(storage: Arc<MemoryStorage>, config: ListingConfig) -> ListingService {
        let policy = PolicyEngine::new(
            Arc::new(Registry::listing()),
            Arc::new(PolicyTable::listing()),
        );
        ListingService::new(storage, Arc::new(policy), config)
    }

    fn put(storage: &MemoryStorage, entity: &str, record: Record) {
        storage.put(entity, &record, Expect::Absent).unwrap();
    }

    #[test]
    fn test_generic_list_filters_and_pages() {
        let storage = Arc::new(MemoryStorage::new());
        for i in 0..5 {
            let prop = if i % 2 == 0 { "p1" } else { "p2" };
            put(&storage, "Image", Record::new(format!("i{}", i)).with("propId", prop));
        }
        let listing = service(storage, ListingConfig::default());
        let filter = BTreeMap::from([("propId".to_string(), Value::from("p1"))]);

        let first = listing
            .list(&Principal::Anonymous, "Image", &filter, None, Some(2))
            .unwrap();
        assert_eq!(first.records.len(), 2);
        let second = listing
            .list(
                &Principal::Anonymous,
                "Image",
                &filter,
                first.next_cursor.as_deref(),
                Some(2),
            )
            .unwrap();
        let ids: Vec<&str> = first
            .records
            .iter()
            .chain(&second.records)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, ["i0", "i2", "i4"]);
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn test_unknown_entity() {
        let listing = service(Arc::new(MemoryStorage::new()), ListingConfig::default());
        assert!(matches!(
            listing.list(&Principal::Anonymous, "Todo", &BTreeMap::new(), None, None),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_amenity_join() {
        let storage = Arc::new(MemoryStorage::new());
        put(&storage, PROPERTY, Record::new("p1"));
        put(&storage, PROPERTY, Record::new("p2"));
        put(&storage, AMENITY, Record::new("a1").with("propId", "p1").with("name", "Pool"));
        put(&storage, AMENITY, Record::new("a2").with("propId", "p2").with("name", "Gym"));

        let listing = service(storage, ListingConfig::default());
        let page = listing
            .list_properties(
                &Principal::Anonymous,
                &PropertyFilter::new().with_amenity("pool"),
                None,
                None,
            )
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "p1");
    }

    #[test]
    fn test_ordering_config() {
        let storage = Arc::new(MemoryStorage::new());
        put(&storage, PROPERTY, Record::new("a").with("priceStart", 300));
        put(&storage, PROPERTY, Record::new("b").with("priceStart", 100));
        let config = ListingConfig {
            order: OrderBy::asc("priceStart"),
            ..ListingConfig::default()
        };
        let listing = service(storage, config);
        let page = listing
            .list_properties(&Principal::Anonymous, &PropertyFilter::new(), None, None)
            .unwrap();
        let ids: Vec<&str> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }
}
