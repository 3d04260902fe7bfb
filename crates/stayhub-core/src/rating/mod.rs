//! Rating aggregation.
//!
//! Keeps `Property.ratingStar` and `Property.ratingCount` consistent with the
//! property's active ratings, either inline or through a background worker.

mod aggregator;
mod worker;

pub use aggregator::{RatingAggregator, RatingSummary, RATING_COUNT, RATING_STAR};
pub use worker::AggregationWorker;
