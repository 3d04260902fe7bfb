//! Read-side queries: generic entity listings and the filtered property
//! search.

mod cursor;
mod filter;
mod listing;
mod order;

pub use cursor::Cursor;
pub use filter::{haversine_km, GeoRadius, PropertyFilter, EARTH_RADIUS_KM};
pub use listing::{ListingService, Page};
pub use order::{OrderBy, SortDirection};
