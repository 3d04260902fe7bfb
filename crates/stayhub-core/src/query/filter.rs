//! Property listing predicates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::PROPERTY;
use crate::error::Error;
use crate::record::Record;

/// Mean earth radius used for distance checks, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A circle on the earth's surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRadius {
    /// Centre latitude in degrees.
    pub lat: f64,
    /// Centre longitude in degrees.
    pub lng: f64,
    /// Radius in kilometres.
    pub radius_km: f64,
}

impl GeoRadius {
    /// Create a radius filter.
    pub fn new(lat: f64, lng: f64, radius_km: f64) -> Self {
        Self { lat, lng, radius_km }
    }

    /// Check whether a point lies within the radius.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        haversine_km(self.lat, self.lng, lat, lng) <= self.radius_km
    }
}

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Predicates for property listings. Every set predicate must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    /// Lower bound of the wanted price range.
    pub min_price: Option<i64>,
    /// Upper bound of the wanted price range.
    pub max_price: Option<i64>,
    /// Geographic radius around a point.
    pub near: Option<GeoRadius>,
    /// Minimum `ratingStar`.
    pub min_rating: Option<f64>,
    /// Amenity names the property must have, case-insensitive.
    #[serde(default)]
    pub amenities: Vec<String>,
}

impl PropertyFilter {
    /// Create an empty filter matching every property.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require overlap with a price range.
    pub fn with_price_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    /// Require a location within `radius_km` of `(lat, lng)`.
    pub fn near(mut self, lat: f64, lng: f64, radius_km: f64) -> Self {
        self.near = Some(GeoRadius::new(lat, lng, radius_km));
        self
    }

    /// Require a minimum rating.
    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    /// Require an amenity by name.
    pub fn with_amenity(mut self, name: impl Into<String>) -> Self {
        self.amenities.push(name.into());
        self
    }

    /// Check whether the filter needs the amenity join.
    pub fn needs_amenities(&self) -> bool {
        !self.amenities.is_empty()
    }

    /// Reject filters that can never be evaluated.
    pub fn validate(&self) -> Result<(), Error> {
        let mut faults = Vec::new();
        if let Some(near) = &self.near {
            let finite = near.lat.is_finite() && near.lng.is_finite() && near.radius_km.is_finite();
            if !finite || near.lat.abs() > 90.0 || near.lng.abs() > 180.0 || near.radius_km < 0.0 {
                faults.push("near".to_string());
            }
        }
        if self.min_rating.is_some_and(|r| !r.is_finite()) {
            faults.push("min_rating".to_string());
        }
        if faults.is_empty() {
            Ok(())
        } else {
            Err(Error::schema(PROPERTY, faults))
        }
    }

    /// Evaluate the filter against a (redacted) property and the lowercase
    /// names of its visible amenities.
    pub fn matches(&self, property: &Record, amenities: &BTreeSet<String>) -> bool {
        self.matches_price(property)
            && self.matches_location(property)
            && self.matches_rating(property)
            && self.matches_amenities(amenities)
    }

    fn matches_price(&self, property: &Record) -> bool {
        if self.min_price.is_none() && self.max_price.is_none() {
            return true;
        }
        let (Some(start), Some(end)) = (property.get_f64("priceStart"), property.get_f64("priceEnd"))
        else {
            return false;
        };
        self.max_price.map_or(true, |max| start <= max as f64)
            && self.min_price.map_or(true, |min| end >= min as f64)
    }

    fn matches_location(&self, property: &Record) -> bool {
        let Some(near) = &self.near else {
            return true;
        };
        match (property.get_f64("lat"), property.get_f64("lng")) {
            (Some(lat), Some(lng)) => near.contains(lat, lng),
            _ => false,
        }
    }

    fn matches_rating(&self, property: &Record) -> bool {
        self.min_rating
            .map_or(true, |min| property.get_f64("ratingStar").unwrap_or(0.0) >= min)
    }

    fn matches_amenities(&self, amenities: &BTreeSet<String>) -> bool {
        self.amenities
            .iter()
            .all(|name| amenities.contains(&name.to_lowercase()))
    }
}
