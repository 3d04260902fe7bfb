//! Rating summary recomputation.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::catalog::{PROPERTY, RATING};
use crate::error::Error;
use crate::metrics::EngineMetrics;
use crate::record::Record;
use crate::storage::{Expect, Storage};

/// Derived property field holding the mean rating.
pub const RATING_STAR: &str = "ratingStar";
/// Derived property field holding the active rating count.
pub const RATING_COUNT: &str = "ratingCount";

/// Summary rating values for one property.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RatingSummary {
    /// Mean rating, rounded to one decimal. Zero when there are no ratings.
    #[serde(rename = "ratingStar")]
    pub rating_star: f64,
    /// Number of active ratings.
    #[serde(rename = "ratingCount")]
    pub rating_count: u64,
}

impl RatingSummary {
    /// Summarize the `rating` values of a set of active ratings.
    ///
    /// Every entry counts; the mean is taken over the values present.
    pub fn from_ratings(values: impl IntoIterator<Item = Option<i64>>) -> Self {
        let (sum, valued, count) = values.into_iter().fold(
            (0i64, 0u64, 0u64),
            |(sum, valued, count), v| match v {
                Some(v) => (sum + v, valued + 1, count + 1),
                None => (sum, valued, count + 1),
            },
        );
        let rating_star = if valued == 0 {
            0.0
        } else {
            ((sum as f64 / valued as f64) * 10.0).round() / 10.0
        };
        Self {
            rating_star,
            rating_count: count,
        }
    }

    /// Check whether a property already carries these values.
    pub fn matches(&self, property: &Record) -> bool {
        property.get_f64(RATING_STAR) == Some(self.rating_star)
            && property.get_i64(RATING_COUNT) == Some(self.rating_count as i64)
    }

    /// Write the values into a property record.
    pub fn apply_to(&self, property: &mut Record) {
        property.set(RATING_STAR, self.rating_star);
        property.set(RATING_COUNT, self.rating_count as i64);
    }
}

/// Recomputes `Property.ratingStar` / `ratingCount` from the full set of
/// active ratings.
///
/// At most one recomputation per property runs at a time; the derived-field
/// write is additionally guarded by a compare-and-set on the property version.
pub struct RatingAggregator {
    storage: Arc<dyn Storage>,
    active_statuses: BTreeSet<String>,
    max_conflict_retries: usize,
    locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: Arc<EngineMetrics>,
}

impl RatingAggregator {
    /// Create an aggregator.
    pub fn new(
        storage: Arc<dyn Storage>,
        active_statuses: BTreeSet<String>,
        max_conflict_retries: usize,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            storage,
            active_statuses,
            max_conflict_retries,
            locks: DashMap::new(),
            metrics,
        }
    }

    /// Check whether a rating counts toward its property's summary.
    ///
    /// A rating without a status is active.
    pub fn is_active(&self, rating: &Record) -> bool {
        match rating.get_str("status") {
            None => true,
            Some(status) => self.active_statuses.contains(&status.to_lowercase()),
        }
    }

    /// Recompute and store the summary for `prop_id`.
    ///
    /// Idempotent: repeating it without intervening rating changes yields the
    /// same summary and performs no write.
    pub fn recompute(&self, prop_id: &str) -> Result<RatingSummary, Error> {
        let lock = self.lock_for(prop_id);
        let result = {
            let _guard = lock.lock();
            self.recompute_locked(prop_id)
        };
        drop(lock);
        self.locks
            .remove_if(prop_id, |_, lock| Arc::strong_count(lock) == 1);

        match &result {
            Ok(summary) => {
                self.metrics.record_recompute();
                tracing::debug!(
                    prop_id,
                    rating_star = summary.rating_star,
                    rating_count = summary.rating_count,
                    "rating summary recomputed"
                );
            }
            Err(err) => {
                tracing::warn!(prop_id, error = %err, "rating recompute failed");
            }
        }
        result
    }

    /// Compute the summary without storing it.
    pub fn summarize(&self, prop_id: &str) -> Result<RatingSummary, Error> {
        let ratings = self.storage.scan_all(RATING, &|r: &Record| {
            r.get_str("propId") == Some(prop_id) && self.is_active(r)
        })?;
        Ok(RatingSummary::from_ratings(
            ratings.iter().map(|v| v.record.get_i64("rating")),
        ))
    }

    fn recompute_locked(&self, prop_id: &str) -> Result<RatingSummary, Error> {
        for _ in 0..=self.max_conflict_retries {
            let summary = self.summarize(prop_id)?;

            let current = self
                .storage
                .get(PROPERTY, prop_id)?
                .ok_or_else(|| Error::not_found(PROPERTY, prop_id))?;
            if summary.matches(&current.record) {
                return Ok(summary);
            }

            let mut property = current.record;
            summary.apply_to(&mut property);
            match self
                .storage
                .put(PROPERTY, &property, Expect::Version(current.version))
            {
                Ok(_) => return Ok(summary),
                Err(err) if err.is_conflict() => {
                    self.metrics.record_recompute_conflict();
                    tracing::debug!(prop_id, "property changed during recompute, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::Conflict {
            entity: PROPERTY.to_string(),
            id: prop_id.to_string(),
        })
    }

    fn lock_for(&self, prop_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(prop_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of properties with a recomputation in progress.
    pub fn in_progress(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn aggregator(storage: Arc<MemoryStorage>) -> RatingAggregator {
        RatingAggregator::new(
            storage,
            BTreeSet::from(["active".to_string()]),
            5,
            Arc::new(EngineMetrics::new()),
        )
    }

    fn rating(storage: &MemoryStorage, id: &str, prop: &str, value: i64, status: &str) {
        let record = Record::new(id)
            .with("propId", prop)
            .with("rating", value)
            .with("status", status);
        storage.put(RATING, &record, Expect::Any).unwrap();
    }

    #[test]
    fn test_summary_rounding() {
        let star = |values: &[i64]| {
            RatingSummary::from_ratings(values.iter().copied().map(Some)).rating_star
        };
        assert_eq!(RatingSummary::from_ratings([]), RatingSummary::default());
        assert_eq!(star(&[4, 5, 3]), 4.0);
        assert_eq!(star(&[4, 5]), 4.5);
        assert_eq!(star(&[5, 4, 4]), 4.3);
        assert_eq!(star(&[1, 2, 2]), 1.7);
    }

    #[test]
    fn test_valueless_rating_still_counts() {
        let summary = RatingSummary::from_ratings([Some(4), None]);
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.rating_star, 4.0);

        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(PROPERTY, &Record::new("p1"), Expect::Absent)
            .unwrap();
        rating(&storage, "r1", "p1", 4, "active");
        storage
            .put(
                RATING,
                &Record::new("r2").with("propId", "p1").with("status", "active"),
                Expect::Absent,
            )
            .unwrap();

        let summary = aggregator(storage).recompute("p1").unwrap();
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.rating_star, 4.0);
    }

    #[test]
    fn test_recompute_counts_only_active() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(PROPERTY, &Record::new("p1"), Expect::Absent)
            .unwrap();
        rating(&storage, "r1", "p1", 4, "active");
        rating(&storage, "r2", "p1", 2, "withdrawn");
        rating(&storage, "r3", "p1", 5, "ACTIVE");
        rating(&storage, "r4", "p2", 1, "active");

        let agg = aggregator(storage.clone());
        let summary = agg.recompute("p1").unwrap();
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.rating_star, 4.5);

        let stored = storage.get(PROPERTY, "p1").unwrap().unwrap();
        assert_eq!(stored.record.get_f64(RATING_STAR), Some(4.5));
        assert_eq!(stored.record.get_i64(RATING_COUNT), Some(2));
        assert_eq!(agg.in_progress(), 0);
    }

    #[test]
    fn test_recompute_is_idempotent_and_skips_write() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(PROPERTY, &Record::new("p1"), Expect::Absent)
            .unwrap();
        rating(&storage, "r1", "p1", 3, "active");

        let agg = aggregator(storage.clone());
        let first = agg.recompute("p1").unwrap();
        let version = storage.get(PROPERTY, "p1").unwrap().unwrap().version;
        let second = agg.recompute("p1").unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.get(PROPERTY, "p1").unwrap().unwrap().version, version);
    }

    #[test]
    fn test_missing_property() {
        let storage = Arc::new(MemoryStorage::new());
        let agg = aggregator(storage);
        assert!(matches!(agg.recompute("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_missing_status_is_active() {
        let agg = aggregator(Arc::new(MemoryStorage::new()));
        assert!(agg.is_active(&Record::new("r")));
        assert!(!agg.is_active(&Record::new("r").with("status", "withdrawn")));
    }
}
