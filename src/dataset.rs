//! In-memory dataset: one time axis shared by named value columns

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{RawSeries, Result, TrendError};

/// Named value columns sampled on a common time axis (seconds).
///
/// Columns are kept in name order so every pass over a dataset is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "DatasetFields")]
pub struct Dataset {
    time: Vec<f64>,
    columns: BTreeMap<String, Vec<f64>>,
}

/// Unchecked wire form, validated through [`Dataset::with_column`]
#[derive(Deserialize)]
struct DatasetFields {
    time: Vec<f64>,
    #[serde(default)]
    columns: BTreeMap<String, Vec<f64>>,
}

impl TryFrom<DatasetFields> for Dataset {
    type Error = TrendError;

    fn try_from(fields: DatasetFields) -> Result<Self> {
        fields
            .columns
            .into_iter()
            .try_fold(Dataset::new(fields.time), |ds, (name, values)| ds.with_column(name, values))
    }
}

impl Dataset {
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            columns: BTreeMap::new(),
        }
    }

    /// Add or replace a column; its length must match the time axis.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.time.len() {
            return Err(TrendError::InvalidArgument(format!(
                "column '{name}' has {} values but the time axis has {}",
                values.len(),
                self.time.len()
            )));
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    #[inline]
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of samples per column
    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

impl RawSeries for Dataset {
    fn values(&self, name: &str) -> Option<&[f64]> {
        self.column(name)
    }
}
