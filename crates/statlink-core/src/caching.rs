//! Read-through caching in front of a connection.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::domain::{DataQuery, DataSet, Feature, Flow, FlowRef, Languages, Structure};
use crate::driver::{Connection, DataStream, Operation, SourceError};

/// Remote result stored in the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedResponse {
    Flows(Vec<Flow>),
    Flow(Flow),
    Structure(Structure),
    Data(DataSet),
}

/// Canonical cache key of a request.
///
/// The same source, operation, arguments and language priority always yield
/// the same key.
pub fn request_key(
    source_id: &str,
    operation: Operation,
    arguments: &[&str],
    languages: &Languages,
) -> String {
    let mut key = format!("{source_id}|{operation}");
    for argument in arguments {
        key.push('|');
        key.push_str(argument);
    }
    key.push_str("|lang=");
    key.push_str(&languages.to_string());
    key
}

/// Connection decorator that consults a [`Cache`] before remote calls.
///
/// Flows, single flows, structures and collected data sets are cached.
/// Streams and connection tests always reach the delegate. A cache failure is
/// logged and the request falls through to the delegate.
pub struct CachingConnection {
    source_id: String,
    languages: Languages,
    cache: Arc<dyn Cache<CachedResponse>>,
    ttl: Duration,
    delegate: Box<dyn Connection>,
}

impl CachingConnection {
    pub fn new(
        source_id: impl Into<String>,
        languages: Languages,
        cache: Arc<dyn Cache<CachedResponse>>,
        ttl: Duration,
        delegate: Box<dyn Connection>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            languages,
            cache,
            ttl,
            delegate,
        }
    }

    fn cached<T: Clone>(
        &self,
        operation: Operation,
        arguments: &[&str],
        unpack: fn(CachedResponse) -> Option<T>,
        pack: fn(T) -> CachedResponse,
        load: impl FnOnce(&dyn Connection) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let key = request_key(&self.source_id, operation, arguments, &self.languages);

        match self.cache.get(&key) {
            Ok(Some(hit)) => {
                if let Some(value) = unpack(hit) {
                    tracing::trace!(source = %self.source_id, %operation, "cache hit");
                    return Ok(value);
                }
                tracing::warn!(
                    source = %self.source_id,
                    %operation,
                    "cached response has unexpected shape"
                );
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(source = %self.source_id, %operation, %error, "cache read failed");
            }
        }

        let value = load(self.delegate.as_ref())?;
        if let Err(error) = self.cache.put(&key, pack(value.clone()), self.ttl) {
            tracing::warn!(source = %self.source_id, %operation, %error, "cache write failed");
        }
        Ok(value)
    }
}

impl Connection for CachingConnection {
    fn get_flows(&self) -> Result<Vec<Flow>, SourceError> {
        self.cached(
            Operation::GetFlows,
            &[],
            |hit| match hit {
                CachedResponse::Flows(flows) => Some(flows),
                _ => None,
            },
            CachedResponse::Flows,
            |delegate| delegate.get_flows(),
        )
    }

    fn get_flow(&self, flow: &FlowRef) -> Result<Flow, SourceError> {
        let reference = flow.to_string();
        self.cached(
            Operation::GetFlow,
            &[reference.as_str()],
            |hit| match hit {
                CachedResponse::Flow(flow) => Some(flow),
                _ => None,
            },
            CachedResponse::Flow,
            |delegate| delegate.get_flow(flow),
        )
    }

    fn get_structure(&self, flow: &FlowRef) -> Result<Structure, SourceError> {
        let reference = flow.to_string();
        self.cached(
            Operation::GetStructure,
            &[reference.as_str()],
            |hit| match hit {
                CachedResponse::Structure(structure) => Some(structure),
                _ => None,
            },
            CachedResponse::Structure,
            |delegate| delegate.get_structure(flow),
        )
    }

    fn get_data(&self, flow: &FlowRef, query: &DataQuery) -> Result<DataSet, SourceError> {
        let reference = flow.to_string();
        let key = query.key.to_string();
        self.cached(
            Operation::GetData,
            &[reference.as_str(), key.as_str(), query.detail.as_str()],
            |hit| match hit {
                CachedResponse::Data(data) => Some(data),
                _ => None,
            },
            CachedResponse::Data,
            |delegate| delegate.get_data(flow, query),
        )
    }

    fn get_data_stream(
        &self,
        flow: &FlowRef,
        query: &DataQuery,
    ) -> Result<DataStream, SourceError> {
        self.delegate.get_data_stream(flow, query)
    }

    fn test_connection(&self) -> Result<(), SourceError> {
        self.delegate.test_connection()
    }

    fn supported_features(&self) -> Result<BTreeSet<Feature>, SourceError> {
        self.delegate.supported_features()
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.delegate.close()
    }

    fn type_name(&self) -> &'static str {
        self.delegate.type_name()
    }
}
