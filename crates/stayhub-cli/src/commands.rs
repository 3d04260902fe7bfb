//! Command execution.

use std::collections::BTreeMap;

use serde_json::json;
use stayhub_core::{EntityService, PropertyFilter, Principal, Record, Value};

use crate::config::Command;
use crate::error::{CliError, Result};

/// Parse a record argument. It must be a JSON object.
pub fn parse_record(json: &str) -> Result<Record> {
    Record::from_json(json).map_err(|e| CliError::InvalidJson(e.to_string()))
}

/// Parse a `field=value` filter. Values that read as JSON scalars keep their
/// type; anything else is a string.
pub fn parse_filter(pair: &str) -> Result<(String, Value)> {
    let (field, raw) = pair
        .split_once('=')
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| CliError::InvalidArgument(format!("expected FIELD=VALUE, got '{}'", pair)))?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw));
    Ok((field.to_string(), value))
}

/// Run one command and return its JSON output.
pub fn execute(
    service: &EntityService,
    principal: &Principal,
    command: Command,
) -> Result<serde_json::Value> {
    let output = match command {
        Command::Create { entity, json } => {
            let record = service.create(principal, &entity, parse_record(&json)?)?;
            serde_json::to_value(record)?
        }
        Command::Get { entity, id } => serde_json::to_value(service.read(principal, &entity, &id)?)?,
        Command::Update { entity, id, json } => {
            let record = service.update(principal, &entity, &id, parse_record(&json)?)?;
            serde_json::to_value(record)?
        }
        Command::Delete { entity, id } => {
            serde_json::to_value(service.delete(principal, &entity, &id)?)?
        }
        Command::List {
            entity,
            filters,
            cursor,
            limit,
        } => {
            let filter = filters
                .iter()
                .map(|pair| parse_filter(pair))
                .collect::<Result<BTreeMap<_, _>>>()?;
            let page = service.list(principal, &entity, &filter, cursor.as_deref(), limit)?;
            serde_json::to_value(page)?
        }
        Command::Properties {
            min_price,
            max_price,
            lat,
            lng,
            radius_km,
            min_rating,
            amenities,
            cursor,
            limit,
        } => {
            let mut filter = PropertyFilter::new().with_price_range(min_price, max_price);
            if let (Some(lat), Some(lng), Some(radius)) = (lat, lng, radius_km) {
                filter = filter.near(lat, lng, radius);
            }
            if let Some(rating) = min_rating {
                filter = filter.with_min_rating(rating);
            }
            for amenity in amenities {
                filter = filter.with_amenity(amenity);
            }
            let page = service.list_properties(principal, &filter, cursor.as_deref(), limit)?;
            serde_json::to_value(page)?
        }
        Command::Recompute { prop_id } => {
            serde_json::to_value(service.recompute(principal, &prop_id)?)?
        }
        Command::Describe { entity } => {
            let registry = service.registry();
            json!({
                "entity": registry.describe(&entity)?,
                "references": registry.relations_from(&entity),
                "dependents": registry.relations_to(&entity),
            })
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("propId=p1").unwrap(),
            ("propId".to_string(), Value::from("p1"))
        );
        assert_eq!(
            parse_filter("rating=4").unwrap(),
            ("rating".to_string(), Value::Int(4))
        );
        assert_eq!(
            parse_filter("verified=true").unwrap(),
            ("verified".to_string(), Value::Bool(true))
        );
        assert!(parse_filter("novalue").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn test_parse_record_rejects_non_object() {
        assert!(parse_record("[1,2]").is_err());
        assert!(parse_record(r#"{"title":"Loft"}"#).is_ok());
    }
}
