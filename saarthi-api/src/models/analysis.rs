//! Analysis result types
//!
//! Summary tables serialize as objects keyed by column name in header order,
//! matching the shape the frontend already renders.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Per-column values in header order
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTable<T>(Vec<(String, T)>);

impl<T> ColumnTable<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, column: impl Into<String>, value: T) {
        self.0.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&T> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// `None` when the table has no columns
    pub fn non_empty(self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl<T> Default for ColumnTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for ColumnTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Serialize> Serialize for ColumnTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Descriptive statistics of a numeric column
///
/// Undefined values (mean of no observations, std of one) are `None`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Descriptive statistics of a categorical column
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    /// Most frequent value; ties go to the value seen first
    pub top: Option<String>,
    #[serde(rename = "freq")]
    pub frequency: Option<usize>,
}

/// Statistics for both column families
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub numeric: Option<ColumnTable<NumericSummary>>,
    pub categorical: Option<ColumnTable<CategoricalSummary>>,
}

/// Per-column missing cell counts
#[derive(Debug, Clone, PartialEq)]
pub struct MissingReport {
    pub missing_values: ColumnTable<usize>,
    pub missing_present: bool,
}

impl MissingReport {
    pub fn from_counts(missing_values: ColumnTable<usize>) -> Self {
        let missing_present = missing_values.iter().any(|(_, count)| *count > 0);
        Self {
            missing_values,
            missing_present,
        }
    }
}

/// Header plus leading rows, cells typed per column
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub original_filename: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// Full EDA bundle
#[derive(Debug, Clone, PartialEq)]
pub struct EdaResult {
    pub summary: Summary,
    pub correlation_matrix_url: Option<String>,
    pub box_plot_url: Option<String>,
    pub histogram_url: Option<String>,
    pub count_plot_url: Option<String>,
    /// True when charts came from the session's cache
    pub from_cache: bool,
}
