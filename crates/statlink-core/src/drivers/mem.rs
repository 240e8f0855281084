use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::domain::{DataQuery, Feature, Flow, FlowRef, Series, Structure};
use crate::driver::{Connection, DataStream, Driver, SourceError};
use crate::{DriverContext, Source};

pub const MEM_DRIVER_ID: &str = "MEM";
const MEM_RANK: i32 = 0;

#[derive(Debug, Clone, Default)]
struct Dataset {
    flows: Vec<Flow>,
    structures: BTreeMap<FlowRef, Structure>,
    series: BTreeMap<FlowRef, Vec<Series>>,
}

impl Dataset {
    fn flow(&self, wanted: &FlowRef) -> Option<&Flow> {
        self.flows.iter().find(|flow| wanted.matches(&flow.reference))
    }
}

/// Deterministic driver serving flows, structures and series held in memory.
///
/// Useful for offline use and as a reference implementation of the driver
/// contract: keys are validated against the flow's structure and the detail
/// level is applied to every returned series.
#[derive(Debug, Clone)]
pub struct MemDriver {
    id: String,
    rank: i32,
    dialect: Option<String>,
    sources: Vec<Source>,
    properties: BTreeSet<String>,
    dataset: Arc<Dataset>,
}

impl Default for MemDriver {
    fn default() -> Self {
        Self {
            id: String::from(MEM_DRIVER_ID),
            rank: MEM_RANK,
            dialect: None,
            sources: Vec::new(),
            properties: BTreeSet::new(),
            dataset: Arc::new(Dataset::default()),
        }
    }
}

impl MemDriver {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>) -> Self {
        self.properties.insert(key.into());
        self
    }

    /// Registers a flow together with its structure and series.
    pub fn with_flow(mut self, flow: Flow, structure: Structure, series: Vec<Series>) -> Self {
        let dataset = Arc::make_mut(&mut self.dataset);
        dataset.structures.insert(flow.reference.clone(), structure);
        dataset.series.insert(flow.reference.clone(), series);
        dataset.flows.push(flow);
        self
    }
}

impl Driver for MemDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn rank(&self) -> i32 {
        self.rank
    }

    fn default_sources(&self) -> Vec<Source> {
        self.sources.clone()
    }

    fn supported_properties(&self) -> BTreeSet<String> {
        self.properties.clone()
    }

    fn default_dialect(&self) -> Option<String> {
        self.dialect.clone()
    }

    fn connect(
        &self,
        source: &Source,
        _context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SourceError> {
        if source.driver() != self.id {
            return Err(SourceError::invalid_request(format!(
                "source '{}' targets driver '{}', not '{}'",
                source.id(),
                source.driver(),
                self.id
            )));
        }
        tracing::debug!(source = source.id(), driver = %self.id, "opening in-memory connection");
        Ok(Box::new(MemConnection {
            source: source.id().to_owned(),
            dataset: Arc::clone(&self.dataset),
        }))
    }
}

struct MemConnection {
    source: String,
    dataset: Arc<Dataset>,
}

impl MemConnection {
    fn lookup(&self, wanted: &FlowRef) -> Result<&Flow, SourceError> {
        self.dataset.flow(wanted).ok_or_else(|| {
            SourceError::invalid_request(format!(
                "flow '{wanted}' not found in source '{}'",
                self.source
            ))
        })
    }
}

impl Connection for MemConnection {
    fn get_flows(&self) -> Result<Vec<Flow>, SourceError> {
        Ok(self.dataset.flows.clone())
    }

    fn get_flow(&self, flow: &FlowRef) -> Result<Flow, SourceError> {
        self.lookup(flow).cloned()
    }

    fn get_structure(&self, flow: &FlowRef) -> Result<Structure, SourceError> {
        let found = self.lookup(flow)?;
        self.dataset
            .structures
            .get(&found.reference)
            .cloned()
            .ok_or_else(|| {
                SourceError::invalid_request(format!("structure of flow '{flow}' not found"))
            })
    }

    fn get_data_stream(
        &self,
        flow: &FlowRef,
        query: &DataQuery,
    ) -> Result<DataStream, SourceError> {
        let structure = self.get_structure(flow)?;
        query.key.validate(&structure)?;

        let found = self.lookup(flow)?;
        let detail = query.detail;
        let selected = self
            .dataset
            .series
            .get(&found.reference)
            .into_iter()
            .flatten()
            .filter(|series| query.key.contains(&series.key))
            .cloned()
            .map(move |series| Ok::<_, SourceError>(detail.apply(series)))
            .collect::<Vec<_>>();
        Ok(Box::new(selected.into_iter()))
    }

    fn test_connection(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn supported_features(&self) -> Result<BTreeSet<Feature>, SourceError> {
        Ok(BTreeSet::from([Feature::DataQueryKey, Feature::DataQueryDetail]))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::domain::{DataDetail, Dimension, Key};
    use crate::SourceErrorKind;

    fn exr() -> MemDriver {
        let reference = FlowRef::new("ECB", "EXR", "1.0");
        let structure = Structure::new(FlowRef::new("ECB", "ECB_EXR1", "1.0"), "Exchange rates")
            .with_dimension(
                Dimension::new("FREQ", 1, "Frequency")
                    .with_code("D", "Daily")
                    .with_code("M", "Monthly"),
            )
            .with_dimension(
                Dimension::new("CURRENCY", 2, "Currency")
                    .with_code("USD", "US dollar")
                    .with_code("GBP", "Pound sterling"),
            );
        MemDriver::new("D").with_flow(
            Flow::new(reference, structure.reference.clone(), "Exchange rates"),
            structure,
            vec![
                Series::new(Key::parse("D.USD"))
                    .with_meta("TITLE", "US dollar")
                    .with_obs("2024-01-02", 1.0956),
                Series::new(Key::parse("D.GBP")).with_obs("2024-01-02", 0.8646),
                Series::new(Key::parse("M.USD")).with_obs("2024-01", 1.0905),
            ],
        )
    }

    fn connect(driver: &MemDriver) -> Box<dyn Connection> {
        let source =
            Source::new("ECB", "D", Url::parse("mem://ecb").expect("url")).expect("source");
        driver
            .connect(&source, &DriverContext::default())
            .ok()
            .expect("connection")
    }

    #[test]
    fn filters_series_by_key_and_applies_detail() {
        let connection = connect(&exr());
        let query = DataQuery::new(Key::parse("D."), DataDetail::SeriesKeysOnly);

        let data = connection
            .get_data(&FlowRef::parse("EXR").expect("ref"), &query)
            .expect("data");

        let keys = data
            .data
            .iter()
            .map(|series| series.key.to_string())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["D.USD", "D.GBP"]);
        assert!(data.data.iter().all(|series| series.obs.is_empty()));
        assert!(data.data.iter().all(|series| series.meta.is_empty()));
    }

    #[test]
    fn invalid_key_is_an_invalid_request() {
        let connection = connect(&exr());
        let query = DataQuery::new(Key::parse("W.USD"), DataDetail::Full);

        let err = connection
            .get_data(&FlowRef::new("ECB", "EXR", "1.0"), &query)
            .expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::InvalidRequest);
    }

    #[test]
    fn unknown_flow_is_an_invalid_request() {
        let connection = connect(&exr());
        let err = connection
            .get_structure(&FlowRef::parse("IMF,CPI").expect("ref"))
            .expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::InvalidRequest);
    }

    #[test]
    fn rejects_sources_of_other_drivers() {
        let source =
            Source::new("IMF", "OTHER", Url::parse("mem://imf").expect("url")).expect("source");
        let result = exr().connect(&source, &DriverContext::default());
        assert!(matches!(result, Err(error) if error.kind() == SourceErrorKind::InvalidRequest));
    }
}
