use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceError};

/// Column order of the baseline extractor's training schema.
pub const BASELINE_FEATURES: [&str; 20] = [
    "meanfreq", "sd", "median", "Q25", "Q75", "IQR", "skew", "kurt", "sp_ent", "sfm", "centroid",
    "peakf", "meanfun", "minfun", "maxfun", "meandom", "mindom", "maxdom", "dfrange", "modindx",
];

/// Column order of the calibrated extractor's training schema.
pub const CALIBRATED_FEATURES: [&str; 20] = [
    "meanfreq", "sd", "median", "Q25", "Q75", "IQR", "skew", "kurt", "sp.ent", "sfm", "mode",
    "centroid", "meanfun", "minfun", "maxfun", "meandom", "mindom", "maxdom", "dfrange", "modindx",
];

/// Named scalar features produced by one extraction. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureMap(BTreeMap<String, f64>);

impl FeatureMap {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureMap {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        FeatureMap(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

/// Ordered feature names a model was fitted against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn baseline() -> Self {
        Self::new(BASELINE_FEATURES)
    }

    pub fn calibrated() -> Self {
        Self::new(CALIBRATED_FEATURES)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in the schema that `map` does not provide.
    pub fn missing_from(&self, map: &FeatureMap) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !map.contains(name))
            .cloned()
            .collect()
    }

    /// `(name, value)` pairs in schema order, absent names as 0.0.
    pub fn ordered_values<'a>(&'a self, map: &FeatureMap) -> Vec<(&'a str, f64)> {
        self.names
            .iter()
            .map(|name| (name.as_str(), map.get(name).unwrap_or(0.0)))
            .collect()
    }
}

/// What to do when the feature map lacks a schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Fail with `VoiceError::SchemaMismatch`
    #[default]
    Strict,
    /// Fill the position with 0.0
    Lenient,
}

impl SchemaPolicy {
    pub fn vectorize(self, map: &FeatureMap, schema: &FeatureSchema) -> Result<Array1<f64>> {
        match self {
            SchemaPolicy::Strict => vectorize_strict(map, schema),
            SchemaPolicy::Lenient => {
                let missing = schema.missing_from(map);
                if !missing.is_empty() {
                    tracing::warn!(
                        missing = %missing.join(","),
                        "feature map lacks schema entries; using 0.0"
                    );
                }
                Ok(vectorize(map, schema))
            }
        }
    }
}

/// Project `map` onto `schema`: position i holds `map[schema[i]]`, or 0.0
/// when the map has no such entry.
pub fn vectorize(map: &FeatureMap, schema: &FeatureSchema) -> Array1<f64> {
    schema
        .names
        .iter()
        .map(|name| map.get(name).unwrap_or(0.0))
        .collect()
}

/// Like [`vectorize`], but every schema name must be present in `map`.
pub fn vectorize_strict(map: &FeatureMap, schema: &FeatureSchema) -> Result<Array1<f64>> {
    let missing = schema.missing_from(map);
    if !missing.is_empty() {
        return Err(VoiceError::SchemaMismatch { missing });
    }
    Ok(vectorize(map, schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> FeatureMap {
        [("meanfreq", 0.2), ("sd", 0.05), ("extra", 9.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn builtin_schemas_differ_only_in_known_columns() {
        let baseline = FeatureSchema::baseline();
        let calibrated = FeatureSchema::calibrated();
        assert_eq!(baseline.len(), 20);
        assert_eq!(calibrated.len(), 20);
        assert!(baseline.names().iter().any(|n| n == "peakf"));
        assert!(calibrated.names().iter().any(|n| n == "mode"));
        assert!(calibrated.names().iter().any(|n| n == "sp.ent"));
        assert!(!calibrated.names().iter().any(|n| n == "sp_ent"));
    }

    #[test]
    fn lenient_vectorize_fills_missing_with_zero() {
        let schema = FeatureSchema::new(["sd", "missing", "meanfreq"]);
        let vector = vectorize(&sample_map(), &schema);
        assert_eq!(vector.to_vec(), vec![0.05, 0.0, 0.2]);
    }

    #[test]
    fn vectorize_handles_empty_inputs() {
        let empty = FeatureMap::default();
        assert_eq!(vectorize(&empty, &FeatureSchema::baseline()).len(), 20);
        assert!(vectorize(&sample_map(), &FeatureSchema::new(Vec::<String>::new())).is_empty());
    }

    #[test]
    fn strict_vectorize_lists_every_missing_name() {
        let schema = FeatureSchema::new(["meanfreq", "Q25", "sd", "Q75"]);
        match vectorize_strict(&sample_map(), &schema) {
            Err(VoiceError::SchemaMismatch { missing }) => {
                assert_eq!(missing, vec!["Q25".to_string(), "Q75".to_string()]);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn policies_agree_when_map_is_complete() {
        let schema = FeatureSchema::new(["sd", "meanfreq"]);
        let strict = SchemaPolicy::Strict.vectorize(&sample_map(), &schema).unwrap();
        let lenient = SchemaPolicy::Lenient.vectorize(&sample_map(), &schema).unwrap();
        assert_eq!(strict, lenient);
        assert_eq!(SchemaPolicy::default(), SchemaPolicy::Strict);
    }

    #[test]
    fn ordered_values_follow_schema() {
        let schema = FeatureSchema::new(["sd", "nope"]);
        assert_eq!(
            schema.ordered_values(&sample_map()),
            vec![("sd", 0.05), ("nope", 0.0)]
        );
    }
}
