//! Driver contract and structured source errors.
//!
//! This module defines the plugin boundary: a [`Driver`] knows how to open a
//! [`Connection`] to a family of endpoints, and a connection serves flows,
//! structures and data for one [`Source`].
//!
//! # Operations
//!
//! | Operation | Kind | Failsafe default |
//! |-----------|------|------------------|
//! | [`Driver::id`] | advisory | implementation type name |
//! | [`Driver::rank`] | advisory | [`UNKNOWN_RANK`] |
//! | [`Driver::is_available`] | advisory | `false` |
//! | [`Driver::default_sources`] | advisory | empty |
//! | [`Driver::supported_properties`] | advisory | empty |
//! | [`Driver::default_dialect`] | advisory | none |
//! | [`Driver::connect`] | required | error |
//! | [`Connection`] data methods | required | error |
//!
//! Plugins are not trusted to honor this contract. The manager wraps every
//! driver and connection in the adapters of [`crate::failsafe`].

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::domain::{DataQuery, DataSet, Feature, Flow, FlowRef, Series, Structure};
use crate::{DriverContext, FailsafeDriver, Source, ValidationError};

/// Rank reported by drivers that cannot tell their own priority.
pub const UNKNOWN_RANK: i32 = -1;

/// Lazily produced series; each item may fail independently.
pub type DataStream = Box<dyn Iterator<Item = Result<Series, SourceError>> + Send>;

/// Delegated operation, used to build diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetId,
    GetRank,
    IsAvailable,
    GetDefaultSources,
    GetSupportedProperties,
    GetDefaultDialect,
    Connect,
    GetFlows,
    GetFlow,
    GetStructure,
    GetData,
    GetDataStream,
    TestConnection,
    GetSupportedFeatures,
    Close,
    GetReport,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetId => "get_id",
            Self::GetRank => "get_rank",
            Self::IsAvailable => "is_available",
            Self::GetDefaultSources => "get_default_sources",
            Self::GetSupportedProperties => "get_supported_properties",
            Self::GetDefaultDialect => "get_default_dialect",
            Self::Connect => "connect",
            Self::GetFlows => "get_flows",
            Self::GetFlow => "get_flow",
            Self::GetStructure => "get_structure",
            Self::GetData => "get_data",
            Self::GetDataStream => "get_data_stream",
            Self::TestConnection => "test_connection",
            Self::GetSupportedFeatures => "get_supported_features",
            Self::Close => "close",
            Self::GetReport => "get_report",
        }
    }

    /// Human-readable verb phrase for error messages.
    pub const fn verb(self) -> &'static str {
        match self {
            Self::GetId => "while getting id",
            Self::GetRank => "while getting rank",
            Self::IsAvailable => "while checking availability",
            Self::GetDefaultSources => "while getting default sources",
            Self::GetSupportedProperties => "while getting supported properties",
            Self::GetDefaultDialect => "while getting default dialect",
            Self::Connect => "while connecting",
            Self::GetFlows => "while getting flows",
            Self::GetFlow => "while getting flow",
            Self::GetStructure => "while getting structure",
            Self::GetData => "while getting data",
            Self::GetDataStream => "while getting data stream",
            Self::TestConnection => "while testing connection",
            Self::GetSupportedFeatures => "while getting supported features",
            Self::Close => "while closing",
            Self::GetReport => "while getting monitor report",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    MissingSource,
    MissingDriver,
    MissingMonitor,
    MissingMonitoring,
    ConnectionClosed,
    UnexpectedPluginFailure,
    UnexpectedPluginNull,
    InvalidRequest,
    Io,
    Unsupported,
}

/// Structured error returned by the manager, drivers and connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    pub fn missing_source(name: &str) -> Self {
        Self::new(
            SourceErrorKind::MissingSource,
            format!("source '{name}' not found"),
        )
    }

    pub fn missing_driver(source: &str, driver: &str) -> Self {
        Self::new(
            SourceErrorKind::MissingDriver,
            format!("driver '{driver}' of source '{source}' is not registered"),
        )
    }

    pub fn missing_monitor(source: &str) -> Self {
        Self::new(
            SourceErrorKind::MissingMonitor,
            format!("source '{source}' does not declare a monitor"),
        )
    }

    pub fn missing_monitoring(source: &str, scheme: &str) -> Self {
        Self::new(
            SourceErrorKind::MissingMonitoring,
            format!("no monitoring registered for scheme '{scheme}' of source '{source}'"),
        )
    }

    pub fn connection_closed(source: &str, operation: Operation) -> Self {
        Self::new(
            SourceErrorKind::ConnectionClosed,
            format!("connection to '{source}' is closed {}", operation.verb()),
        )
    }

    pub fn unexpected_failure(
        source: &str,
        type_name: &str,
        operation: Operation,
        detail: &str,
    ) -> Self {
        Self::new(
            SourceErrorKind::UnexpectedPluginFailure,
            format!(
                "unexpected failure in '{type_name}' {} on '{source}': {detail}",
                operation.verb()
            ),
        )
    }

    pub fn unexpected_null(
        source: &str,
        type_name: &str,
        operation: Operation,
        contract: &str,
    ) -> Self {
        Self::new(
            SourceErrorKind::UnexpectedPluginNull,
            format!(
                "unexpected null from '{type_name}' {} on '{source}': {contract}",
                operation.verb()
            ),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Io, message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unsupported, message.into())
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for failures of the I/O category (transport, closed connection, wrapped plugin faults).
    pub const fn is_io(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Io
                | SourceErrorKind::ConnectionClosed
                | SourceErrorKind::UnexpectedPluginFailure
                | SourceErrorKind::UnexpectedPluginNull
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::MissingSource => "source.missing_source",
            SourceErrorKind::MissingDriver => "source.missing_driver",
            SourceErrorKind::MissingMonitor => "source.missing_monitor",
            SourceErrorKind::MissingMonitoring => "source.missing_monitoring",
            SourceErrorKind::ConnectionClosed => "source.connection_closed",
            SourceErrorKind::UnexpectedPluginFailure => "source.unexpected_plugin_failure",
            SourceErrorKind::UnexpectedPluginNull => "source.unexpected_plugin_null",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Io => "source.io",
            SourceErrorKind::Unsupported => "source.unsupported",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

/// Open session with one source.
///
/// Connections move through `open -> closed` exactly once. Implementations are
/// not required to be `Sync`; callers confine a connection to one sequence of
/// operations at a time.
pub trait Connection: Send {
    fn get_flows(&self) -> Result<Vec<Flow>, SourceError>;

    /// Looks a flow up by reference. The default scans [`Connection::get_flows`].
    fn get_flow(&self, flow: &FlowRef) -> Result<Flow, SourceError> {
        self.get_flows()?
            .into_iter()
            .find(|candidate| flow.matches(&candidate.reference))
            .ok_or_else(|| SourceError::invalid_request(format!("flow '{flow}' not found")))
    }

    fn get_structure(&self, flow: &FlowRef) -> Result<Structure, SourceError>;

    /// Collects the stream returned by [`Connection::get_data_stream`].
    fn get_data(&self, flow: &FlowRef, query: &DataQuery) -> Result<DataSet, SourceError> {
        let data = self
            .get_data_stream(flow, query)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DataSet {
            flow: flow.clone(),
            query: query.clone(),
            data,
        })
    }

    fn get_data_stream(&self, flow: &FlowRef, query: &DataQuery)
        -> Result<DataStream, SourceError>;

    fn test_connection(&self) -> Result<(), SourceError>;

    fn supported_features(&self) -> Result<BTreeSet<Feature>, SourceError> {
        Ok(BTreeSet::new())
    }

    /// Releases underlying resources. Must be safe to call more than once.
    fn close(&mut self) -> Result<(), SourceError>;

    /// Name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    #[doc(hidden)]
    fn is_failsafe(&self) -> bool {
        false
    }
}

/// Backend family able to open connections.
///
/// Implementations must be `Send + Sync`: one driver instance serves every
/// thread of the process.
pub trait Driver: Send + Sync {
    /// Identifier matching [`Source::driver`], e.g. `RI_SDMX21`.
    fn id(&self) -> &str;

    /// Priority among drivers; higher wins when loading.
    fn rank(&self) -> i32;

    /// Whether the driver can run in this environment.
    fn is_available(&self) -> bool {
        true
    }

    fn default_sources(&self) -> Vec<Source>;

    /// Property keys this driver understands on a [`Source`].
    fn supported_properties(&self) -> BTreeSet<String>;

    fn default_dialect(&self) -> Option<String>;

    fn connect(
        &self,
        source: &Source,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SourceError>;

    /// Name used in diagnostics and as the failsafe fallback id.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    #[doc(hidden)]
    fn is_failsafe(&self) -> bool {
        false
    }
}

/// Checks a driver id against the `WORD(_WORD)*` upper-case pattern.
pub fn validate_driver_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyDriverId);
    }

    let valid = value.split('_').all(|word| {
        !word.is_empty()
            && word
                .chars()
                .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    });
    if !valid {
        return Err(ValidationError::InvalidDriverId {
            value: value.to_owned(),
        });
    }
    Ok(())
}

/// Prepares candidate drivers for registration.
///
/// Each candidate is wrapped in a [`FailsafeDriver`] and unavailable ones are
/// dropped. Registration order is kept: it decides which driver's default
/// source wins on duplicate ids and which driver serves a source first.
#[derive(Debug, Default)]
pub struct DriverLoader;

impl DriverLoader {
    pub fn load(candidates: Vec<Arc<dyn Driver>>) -> Vec<Arc<dyn Driver>> {
        candidates
            .into_iter()
            .map(FailsafeDriver::wrap)
            .filter(|driver| {
                let available = driver.is_available();
                if !available {
                    tracing::debug!(driver = driver.id(), "skipping unavailable driver");
                }
                available
            })
            .collect()
    }

    /// Copy of `drivers` stable-sorted by descending rank.
    pub fn by_rank(drivers: &[Arc<dyn Driver>]) -> Vec<Arc<dyn Driver>> {
        let mut ranked = drivers.to_vec();
        ranked.sort_by_key(|driver| std::cmp::Reverse(driver.rank()));
        ranked
    }
}
