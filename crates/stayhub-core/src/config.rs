//! Engine configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::integrity::CascadeConfig;
use crate::query::OrderBy;

/// Default listing page size.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a caller may request.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Default compare-and-set retries when writing derived rating fields.
pub const DEFAULT_MAX_CONFLICT_RETRIES: usize = 5;

/// Default attempts the background worker makes per property.
pub const DEFAULT_MAX_WORKER_ATTEMPTS: usize = 3;

/// Default background worker poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Rating status values counted as active by default.
pub const DEFAULT_ACTIVE_STATUS: &str = "active";

/// When rating summaries are recomputed relative to the triggering write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMode {
    /// Recompute before the triggering call returns.
    Inline,
    /// Hand the property id to a background worker.
    #[default]
    Background,
}

/// Rating aggregation settings.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Inline or background recomputation.
    pub mode: AggregationMode,
    /// Compare-and-set retries before a recompute surfaces `Conflict`.
    pub max_conflict_retries: usize,
    /// Attempts the worker makes per property before logging and dropping it.
    pub max_worker_attempts: usize,
    /// How long the worker waits for new work before polling again.
    pub poll_interval: Duration,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            max_worker_attempts: DEFAULT_MAX_WORKER_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Property listing settings.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    /// Page size when the caller gives none.
    pub default_page_size: usize,
    /// Upper bound on page size.
    pub max_page_size: usize,
    /// Result ordering.
    pub order: OrderBy,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            order: OrderBy::default(),
        }
    }
}

impl ListingConfig {
    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

/// Configuration for an [`EntityService`](crate::EntityService).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delete-cascade overrides.
    pub cascade: CascadeConfig,
    /// Rating aggregation settings.
    pub aggregation: AggregationConfig,
    /// Rating statuses counted as active, lowercase.
    pub active_statuses: BTreeSet<String>,
    /// Principal ids that own the platform lookup tables.
    pub platform_owners: BTreeSet<String>,
    /// Listing settings.
    pub listing: ListingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            cascade: CascadeConfig::default(),
            aggregation: AggregationConfig::default(),
            active_statuses: BTreeSet::from([DEFAULT_ACTIVE_STATUS.to_string()]),
            platform_owners: BTreeSet::new(),
            listing: ListingConfig::default(),
        }
    }

    /// Set the cascade configuration.
    pub fn with_cascade(mut self, cascade: CascadeConfig) -> Self {
        self.cascade = cascade;
        self
    }

    /// Set the aggregation mode.
    pub fn with_aggregation_mode(mut self, mode: AggregationMode) -> Self {
        self.aggregation.mode = mode;
        self
    }

    /// Recompute rating summaries inline.
    pub fn inline_aggregation(self) -> Self {
        self.with_aggregation_mode(AggregationMode::Inline)
    }

    /// Set the compare-and-set retry bound.
    pub fn with_max_conflict_retries(mut self, retries: usize) -> Self {
        self.aggregation.max_conflict_retries = retries;
        self
    }

    /// Set the worker poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.aggregation.poll_interval = interval;
        self
    }

    /// Replace the active rating statuses.
    pub fn with_active_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.active_statuses = statuses
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Add a platform owner.
    pub fn with_platform_owner(mut self, owner: impl Into<String>) -> Self {
        self.platform_owners.insert(owner.into());
        self
    }

    /// Set the listing configuration.
    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.aggregation.mode, AggregationMode::Background);
        assert_eq!(config.aggregation.max_conflict_retries, 5);
        assert!(config.active_statuses.contains("active"));
        assert!(config.platform_owners.is_empty());
        assert!(config.cascade.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .inline_aggregation()
            .with_active_statuses(["Active", "PUBLISHED"])
            .with_platform_owner("admin");

        assert_eq!(config.aggregation.mode, AggregationMode::Inline);
        assert!(config.active_statuses.contains("published"));
        assert!(config.platform_owners.contains("admin"));
    }

    #[test]
    fn test_page_size_clamped() {
        let listing = ListingConfig::default();
        assert_eq!(listing.page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(listing.page_size(Some(0)), 1);
        assert_eq!(listing.page_size(Some(10_000)), DEFAULT_MAX_PAGE_SIZE);
    }
}
