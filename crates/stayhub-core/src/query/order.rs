//! Stable result ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::record::{Record, Value};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Ordering key for listings. Ties always break by id ascending and records
/// missing the sort field come last in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::desc("ratingStar")
    }
}

impl OrderBy {
    /// Ascending order on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending order on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Extract the sort value of a record.
    pub fn key_of(&self, record: &Record) -> Option<Value> {
        record.get(&self.field).filter(|v| !v.is_null())
    }

    /// Compare two records.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.compare_keys(
            (self.key_of(a).as_ref(), &a.id),
            (self.key_of(b).as_ref(), &b.id),
        )
    }

    /// Compare two `(sort value, id)` positions.
    pub fn compare_keys(&self, a: (Option<&Value>, &str), b: (Option<&Value>, &str)) -> Ordering {
        let by_value = match (a.0, b.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y);
                match self.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        };
        by_value.then_with(|| a.1.cmp(b.1))
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => kind_rank(a).cmp(&kind_rank(b)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_rating_desc_with_id_ties() {
        let order = OrderBy::default();
        let mut records = vec![
            Record::new("c").with("ratingStar", 4.0),
            Record::new("a").with("ratingStar", 4.0),
            Record::new("b").with("ratingStar", 4.5),
            Record::new("d"),
        ];
        records.sort_by(|a, b| order.compare(a, b));
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c", "d"]);
    }

    #[test]
    fn test_missing_last_when_ascending() {
        let order = OrderBy::asc("priceStart");
        let mut records = vec![
            Record::new("x"),
            Record::new("y").with("priceStart", 90),
            Record::new("z").with("priceStart", 10.5),
        ];
        records.sort_by(|a, b| order.compare(a, b));
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["z", "y", "x"]);
    }
}
