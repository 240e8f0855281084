use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::domain::{FlowRef, Key};

/// Level of detail requested for a data query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataDetail {
    #[default]
    Full,
    DataOnly,
    SeriesKeysOnly,
    NoData,
}

impl DataDetail {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DataOnly => "data_only",
            Self::SeriesKeysOnly => "series_keys_only",
            Self::NoData => "no_data",
        }
    }

    pub const fn is_data_requested(self) -> bool {
        matches!(self, Self::Full | Self::DataOnly)
    }

    pub const fn is_meta_requested(self) -> bool {
        matches!(self, Self::Full | Self::NoData)
    }

    /// Strips the parts of a series this detail level did not ask for.
    pub fn apply(self, mut series: Series) -> Series {
        if !self.is_data_requested() {
            series.obs.clear();
        }
        if !self.is_meta_requested() {
            series.meta.clear();
        }
        series
    }
}

impl Display for DataDetail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Series selection plus level of detail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataQuery {
    pub key: Key,
    pub detail: DataDetail,
}

impl DataQuery {
    pub fn new(key: Key, detail: DataDetail) -> Self {
        Self { key, detail }
    }

    pub fn all() -> Self {
        Self::new(Key::all(), DataDetail::Full)
    }
}

/// Single observation; the period is kept as the driver received it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obs {
    pub period: String,
    pub value: Option<f64>,
}

impl Obs {
    pub fn new(period: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            period: period.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub key: Key,
    pub meta: BTreeMap<String, String>,
    pub obs: Vec<Obs>,
}

impl Series {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            meta: BTreeMap::new(),
            obs: Vec::new(),
        }
    }

    pub fn with_meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(name.into(), value.into());
        self
    }

    pub fn with_obs(mut self, period: impl Into<String>, value: f64) -> Self {
        self.obs.push(Obs::new(period, Some(value)));
        self
    }
}

/// Series returned for one flow and query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub flow: FlowRef,
    pub query: DataQuery,
    pub data: Vec<Series>,
}

/// Optional connection capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Server-side filtering by series key.
    DataQueryKey,
    /// Server-side filtering by level of detail.
    DataQueryDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_strips_unrequested_parts() {
        let series = Series::new(Key::parse("M.USD"))
            .with_meta("TITLE", "US dollar")
            .with_obs("2024-01", 1.09);

        let keys_only = DataDetail::SeriesKeysOnly.apply(series.clone());
        assert!(keys_only.obs.is_empty());
        assert!(keys_only.meta.is_empty());

        let no_data = DataDetail::NoData.apply(series.clone());
        assert!(no_data.obs.is_empty());
        assert_eq!(no_data.meta.len(), 1);

        assert_eq!(DataDetail::Full.apply(series.clone()), series);
    }
}
