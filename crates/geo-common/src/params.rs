//! Filter parameter sets derived from query strings.
//!
//! A [`FilterSet`] is the canonical form of the data-relevant query
//! parameters of a request: transport-only keys are dropped, keys are
//! ordered, and multi-values are sorted, so that two semantically equal
//! parameter sets always compare (and hash) identically.

use std::collections::BTreeMap;

/// Query keys that never influence the cached payload and are excluded
/// before cache key computation.
pub const EXCLUDED_PARAMS: [&str; 4] = ["csrfmiddlewaretoken", "page", "next", "format"];

/// An ordered, multi-valued filter parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: BTreeMap<String, Vec<String>>,
}

impl FilterSet {
    /// Build a filter set from raw query pairs, in arrival order.
    ///
    /// Transport-only keys ([`EXCLUDED_PARAMS`]) are dropped and values for
    /// each remaining key are sorted, making the result independent of
    /// submission order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            if EXCLUDED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            entries.entry(key).or_default().push(value.into());
        }
        for values in entries.values_mut() {
            values.sort();
        }
        Self { entries }
    }

    /// True if no data-relevant parameters remain.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values for a filter field, if present.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    /// Iterate over fields and their sorted values, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Stable textual form used for digest computation.
    ///
    /// Singleton values serialize as scalars, multi-values as arrays; keys
    /// are emitted in sorted order. The output is identical for any two
    /// semantically equal parameter sets.
    pub fn canonical_json(&self) -> String {
        let mut map = serde_json::Map::new();
        for (key, values) in &self.entries {
            let value = if values.len() == 1 {
                serde_json::Value::String(values[0].clone())
            } else {
                serde_json::Value::Array(
                    values
                        .iter()
                        .map(|v| serde_json::Value::String(v.clone()))
                        .collect(),
                )
            };
            map.insert(key.clone(), value);
        }
        serde_json::Value::Object(map).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_params_dropped() {
        let filters = FilterSet::from_pairs([
            ("csrfmiddlewaretoken", "abc123"),
            ("page", "2"),
            ("next", "/somewhere"),
            ("format", "json"),
        ]);
        assert!(filters.is_empty());
    }

    #[test]
    fn test_multi_values_sorted() {
        let a = FilterSet::from_pairs([("bezirk", "Altona"), ("bezirk", "Harburg")]);
        let b = FilterSet::from_pairs([("bezirk", "Harburg"), ("bezirk", "Altona")]);
        assert_eq!(a, b);
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn test_canonical_json_scalar_vs_array() {
        let single = FilterSet::from_pairs([("country", "DE")]);
        assert_eq!(single.canonical_json(), r#"{"country":"DE"}"#);

        let multi = FilterSet::from_pairs([("country", "DK"), ("country", "DE")]);
        assert_eq!(multi.canonical_json(), r#"{"country":["DE","DK"]}"#);
    }

    #[test]
    fn test_key_order_independent() {
        let a = FilterSet::from_pairs([("gattung", "Tilia"), ("bezirk", "Altona")]);
        let b = FilterSet::from_pairs([("bezirk", "Altona"), ("gattung", "Tilia")]);
        assert_eq!(a.canonical_json(), b.canonical_json());
    }
}
