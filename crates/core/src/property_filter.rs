//! Property reduction for controlling which attributes survive into tiles.
//!
//! Features arrive with the full attribute table of the source dataset; tiles
//! only need the handful of fields the map client displays. The filter keeps
//! allow-listed fields that are present and non-null and silently drops
//! everything else. A missing allow-listed field is the expected case for
//! sparse parcel data, not an anomaly, so it is never warned about.

use std::collections::HashSet;

use geojson::JsonObject;

/// Allow-list filter over a feature's attribute mapping.
///
/// Construction order and duplicate field names are irrelevant; reduction is
/// a pure function of (input, allow-list) and never mutates its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    allowed: HashSet<String>,
}

impl PropertyFilter {
    /// Create a filter from allow-listed field names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: fields.into_iter().map(|s| s.into()).collect(),
        }
    }

    /// Check if a field survives reduction.
    pub fn should_include(&self, field_name: &str) -> bool {
        self.allowed.contains(field_name)
    }

    /// Reduce an attribute mapping to the allow-listed fields.
    ///
    /// Fields absent from the source, or present with a null value, are
    /// dropped without error.
    pub fn reduce(&self, properties: &JsonObject) -> JsonObject {
        properties
            .iter()
            .filter(|(name, value)| self.should_include(name) && !value.is_null())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parcel_properties() -> JsonObject {
        let value = json!({
            "APN": "302-44-117",
            "StreetNumb": 2214,
            "StreetName": "Desert Vista",
            "OwnerName": "REDACTED",
            "Shape_Area": 812.5,
        });
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_reduce_keeps_only_allow_listed_fields() {
        let filter = PropertyFilter::new(["APN", "StreetNumb", "StreetName"]);
        let reduced = filter.reduce(&parcel_properties());

        assert_eq!(reduced.len(), 3);
        assert_eq!(reduced["APN"], json!("302-44-117"));
        assert_eq!(reduced["StreetNumb"], json!(2214));
        assert!(!reduced.contains_key("OwnerName"));
        assert!(!reduced.contains_key("Shape_Area"));
    }

    #[test]
    fn test_reduce_missing_allow_listed_field_is_silent() {
        let filter = PropertyFilter::new(["APN", "ZipCode"]);
        let reduced = filter.reduce(&parcel_properties());

        // ZipCode is absent from the source; only APN survives.
        assert_eq!(reduced.len(), 1);
        assert!(reduced.contains_key("APN"));
    }

    #[test]
    fn test_reduce_drops_null_values() {
        let filter = PropertyFilter::new(["APN", "City"]);
        let mut properties = parcel_properties();
        properties.insert("City".to_string(), serde_json::Value::Null);

        let reduced = filter.reduce(&properties);
        assert_eq!(reduced.len(), 1);
        assert!(!reduced.contains_key("City"));
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let filter = PropertyFilter::new(["APN", "StreetName", "City"]);
        let once = filter.reduce(&parcel_properties());
        let twice = filter.reduce(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_reduce_never_mutates_input() {
        let filter = PropertyFilter::new(["APN"]);
        let properties = parcel_properties();
        let before = properties.clone();

        let _ = filter.reduce(&properties);
        assert_eq!(properties, before);
    }

    #[test]
    fn test_duplicate_allow_list_entries_are_harmless() {
        let a = PropertyFilter::new(["APN", "APN", "City"]);
        let b = PropertyFilter::new(["City", "APN"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_allow_list_drops_everything() {
        let filter = PropertyFilter::new(Vec::<String>::new());
        let reduced = filter.reduce(&parcel_properties());
        assert!(reduced.is_empty());
    }

    #[test]
    fn test_field_matching_is_case_sensitive() {
        let filter = PropertyFilter::new(["apn"]);
        let reduced = filter.reduce(&parcel_properties());
        assert!(reduced.is_empty());
    }
}
