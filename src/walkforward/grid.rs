//! Parameter ranges and grid expansion.
//!
//! Ranges are declared in order; the grid enumerates their Cartesian product
//! lexicographically in that order, with the last parameter varying fastest.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::ConfigError;

/// A single candidate value for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    /// Integer view; floats are rounded to the nearest integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(v.round() as i64),
            Self::Float(_) => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Candidate values for one named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub name: String,
    pub values: Vec<ParamValue>,
}

impl ParameterRange {
    pub fn new<V: Into<ParamValue>>(name: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered collection of parameter ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterRanges {
    ranges: Vec<ParameterRange>,
}

impl ParameterRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style range declaration.
    pub fn with<V: Into<ParamValue>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.ranges.push(ParameterRange::new(name, values));
        self
    }

    pub fn push(&mut self, range: ParameterRange) {
        self.ranges.push(range);
    }

    pub fn names(&self) -> Vec<String> {
        self.ranges.iter().map(|r| r.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Product of range lengths; zero if any range is empty.
    pub fn total_combinations(&self) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges.iter().map(|r| r.values.len()).product()
    }

    /// Check declared names: at least one, no duplicates, and when
    /// `accepted` is given, exactly the evaluator's parameter set.
    pub fn validate(&self, accepted: Option<&[&str]>) -> Result<(), ConfigError> {
        if self.ranges.is_empty() {
            return Err(ConfigError::NoParameters);
        }

        let mut seen = HashSet::new();
        for range in &self.ranges {
            if !seen.insert(range.name.as_str()) {
                return Err(ConfigError::DuplicateParameter(range.name.clone()));
            }
        }

        if let Some(accepted) = accepted {
            if let Some(unknown) = self
                .ranges
                .iter()
                .find(|r| !accepted.contains(&r.name.as_str()))
            {
                return Err(ConfigError::UnknownParameter(unknown.name.clone()));
            }
            if let Some(missing) = accepted.iter().find(|name| !seen.contains(**name)) {
                return Err(ConfigError::MissingParameter(missing.to_string()));
            }
        }

        Ok(())
    }

    /// Expand every combination into a grid.
    pub fn grid(&self) -> ParameterGrid {
        let total = self.total_combinations();
        let names = self.names();
        let mut sets = Vec::with_capacity(total);

        if total > 0 {
            // Odometer over range indices, rightmost digit fastest.
            let mut indices = vec![0usize; self.ranges.len()];
            'odometer: loop {
                let values = self
                    .ranges
                    .iter()
                    .zip(&indices)
                    .map(|(range, &i)| (range.name.clone(), range.values[i]))
                    .collect();
                sets.push(ParameterSet { values });

                let mut pos = self.ranges.len();
                loop {
                    if pos == 0 {
                        break 'odometer;
                    }
                    pos -= 1;
                    indices[pos] += 1;
                    if indices[pos] < self.ranges[pos].values.len() {
                        break;
                    }
                    indices[pos] = 0;
                }
            }
        }

        ParameterGrid { names, sets }
    }
}

impl FromIterator<ParameterRange> for ParameterRanges {
    fn from_iter<I: IntoIterator<Item = ParameterRange>>(iter: I) -> Self {
        Self {
            ranges: iter.into_iter().collect(),
        }
    }
}

/// One concrete parameter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Builder-style insert; replaces an existing value of the same name.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.set(name, value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: ParamValue) {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(n, v)| format!("{}: {}", n, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Every parameter combination, in enumeration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    names: Vec<String>,
    sets: Vec<ParameterSet>,
}

impl ParameterGrid {
    /// Parameter names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sets(&self) -> &[ParameterSet] {
        &self.sets
    }

    pub fn get(&self, index: usize) -> Option<&ParameterSet> {
        self.sets.get(index)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSet> {
        self.sets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ma_ranges() -> ParameterRanges {
        ParameterRanges::new()
            .with("fast_ma", [5_i64, 10, 15, 20])
            .with("slow_ma", [20_i64, 30, 40, 50])
    }

    #[test]
    fn test_grid_size_is_product_of_ranges() {
        let ranges = ma_ranges();
        let grid = ranges.grid();

        assert_eq!(ranges.total_combinations(), 16);
        assert_eq!(grid.len(), 16);
        for set in grid.iter() {
            assert_eq!(set.len(), 2);
            assert!(set.get("fast_ma").is_some());
            assert!(set.get("slow_ma").is_some());
        }
    }

    #[test]
    fn test_grid_enumeration_order() {
        let grid = ma_ranges().grid();

        let first: Vec<_> = grid.sets()[..5]
            .iter()
            .map(|s| (s.get_i64("fast_ma").unwrap(), s.get_i64("slow_ma").unwrap()))
            .collect();
        assert_eq!(first, vec![(5, 20), (5, 30), (5, 40), (5, 50), (10, 20)]);

        let last = grid.sets().last().unwrap();
        assert_eq!(last.get_i64("fast_ma"), Some(20));
        assert_eq!(last.get_i64("slow_ma"), Some(50));
        assert_eq!(grid.names(), &["fast_ma".to_string(), "slow_ma".to_string()]);
    }

    #[test]
    fn test_key_order_matches_declaration() {
        let grid = ParameterRanges::new()
            .with("slow_ma", [30_i64])
            .with("fast_ma", [10_i64])
            .grid();
        let names: Vec<_> = grid.sets()[0].names().collect();
        assert_eq!(names, vec!["slow_ma", "fast_ma"]);
    }

    #[test]
    fn test_empty_range_yields_empty_grid() {
        let ranges = ParameterRanges::new()
            .with("fast_ma", [5_i64, 10])
            .with("slow_ma", Vec::<i64>::new());

        assert_eq!(ranges.total_combinations(), 0);
        assert!(ranges.grid().is_empty());
        assert!(ranges.validate(None).is_ok());
    }

    #[test]
    fn test_duplicate_values_are_kept() {
        let grid = ParameterRanges::new().with("fast_ma", [5_i64, 5]).grid();
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_declarations() {
        assert_eq!(
            ParameterRanges::new().validate(None),
            Err(ConfigError::NoParameters)
        );

        let dup = ParameterRanges::new()
            .with("fast_ma", [5_i64])
            .with("fast_ma", [10_i64]);
        assert_eq!(
            dup.validate(None),
            Err(ConfigError::DuplicateParameter("fast_ma".into()))
        );

        let accepted = ["fast_ma", "slow_ma"];
        let missing = ParameterRanges::new().with("fast_ma", [5_i64]);
        assert_eq!(
            missing.validate(Some(&accepted)),
            Err(ConfigError::MissingParameter("slow_ma".into()))
        );

        let unknown = ma_ranges().with("stop_loss", [1.5]);
        assert_eq!(
            unknown.validate(Some(&accepted)),
            Err(ConfigError::UnknownParameter("stop_loss".into()))
        );

        assert!(ma_ranges().validate(Some(&accepted)).is_ok());
    }

    #[test]
    fn test_parameter_set_accessors() {
        let params = ParameterSet::new()
            .with("fast_ma", 10_i64)
            .with("threshold", 0.5)
            .with("fast_ma", 12.6);

        assert_eq!(params.len(), 2);
        assert_eq!(params.get_i64("fast_ma"), Some(13));
        assert_eq!(params.get_f64("threshold"), Some(0.5));
        assert_eq!(params.to_string(), "{fast_ma: 12.6, threshold: 0.5}");
    }

    #[test]
    fn test_ranges_deserialize_from_toml_shape() {
        let json = r#"[{"name": "fast_ma", "values": [5, 10]}, {"name": "band", "values": [0.5, 1.5]}]"#;
        let ranges: ParameterRanges = serde_json::from_str(json).unwrap();

        assert_eq!(ranges.len(), 2);
        let grid = ranges.grid();
        assert_eq!(grid.sets()[0].get("fast_ma"), Some(ParamValue::Int(5)));
        assert_eq!(grid.sets()[0].get("band"), Some(ParamValue::Float(0.5)));
    }
}
