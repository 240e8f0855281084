//! Adapters that shield the manager from misbehaving plugins.
//!
//! Every delegated call runs under [`std::panic::catch_unwind`]. A panic is
//! logged once at `warn` with the plugin's type name and the operation, then
//! converted: advisory operations fall back to a safe default, required
//! operations fail with [`SourceErrorKind::UnexpectedPluginFailure`].
//! Missing values (empty identifiers where one is mandatory) are handled the
//! same way and surface as [`SourceErrorKind::UnexpectedPluginNull`].
//! Errors a plugin returns on purpose pass through untouched.
//!
//! The process panic hook still runs for contained panics. Call
//! [`quiet_plugin_panics`] once at startup to keep those reports out of
//! stderr and rely on the `warn!` event alone.
//!
//! [`SourceErrorKind::UnexpectedPluginFailure`]: crate::SourceErrorKind::UnexpectedPluginFailure
//! [`SourceErrorKind::UnexpectedPluginNull`]: crate::SourceErrorKind::UnexpectedPluginNull

use std::any::Any;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use crate::domain::{DataQuery, DataSet, Feature, Flow, FlowRef, Series, Structure};
use crate::driver::{Connection, DataStream, Driver, Operation, SourceError, UNKNOWN_RANK};
use crate::monitor::{MonitorReport, Monitoring};
use crate::{DriverContext, Source};

const UNKNOWN_TYPE: &str = "<unknown>";

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn in_guard() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

/// Runs `call`, turning a panic into its message.
fn guard<T>(call: impl FnOnce() -> T) -> Result<T, String> {
    GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = catch_unwind(AssertUnwindSafe(call));
    GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
    result.map_err(|payload| panic_detail(payload.as_ref()))
}

/// Installs a panic hook that stays silent for panics raised inside a
/// failsafe adapter and forwards every other panic to the hook it replaces.
///
/// The hook is process-wide and installed at most once; later calls do nothing.
pub fn quiet_plugin_panics() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !in_guard() {
                previous(info);
            }
        }));
    });
}

fn is_failsafe(check: impl FnOnce() -> bool) -> bool {
    guard(check).unwrap_or(false)
}

fn type_name_of(lookup: impl FnOnce() -> &'static str) -> &'static str {
    guard(lookup).unwrap_or(UNKNOWN_TYPE)
}

fn log_failure(type_name: &str, scope: &str, operation: Operation, detail: &str) {
    tracing::warn!(
        plugin = type_name,
        scope,
        operation = %operation,
        "unexpected plugin failure {}: {detail}",
        operation.verb()
    );
}

fn log_null(type_name: &str, scope: &str, operation: Operation, contract: &str) {
    tracing::warn!(
        plugin = type_name,
        scope,
        operation = %operation,
        "unexpected missing value {}: {contract}",
        operation.verb()
    );
}

/// [`Driver`] wrapper with advisory fallbacks and guarded `connect`.
pub struct FailsafeDriver {
    delegate: Arc<dyn Driver>,
    type_name: &'static str,
}

impl FailsafeDriver {
    /// Wraps `driver` unless it is already failsafe.
    pub fn wrap(driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        if is_failsafe(|| driver.is_failsafe()) {
            return driver;
        }
        let type_name = type_name_of(|| driver.type_name());
        Arc::new(Self {
            delegate: driver,
            type_name,
        })
    }

    fn advisory<T>(
        &self,
        operation: Operation,
        fallback: impl FnOnce() -> T,
        call: impl FnOnce() -> T,
    ) -> T {
        guard(call).unwrap_or_else(|detail| {
            log_failure(self.type_name, "driver", operation, &detail);
            fallback()
        })
    }
}

impl Driver for FailsafeDriver {
    fn id(&self) -> &str {
        let id = self.advisory(Operation::GetId, || self.type_name, || self.delegate.id());
        if id.is_empty() {
            log_null(self.type_name, "driver", Operation::GetId, "id must not be empty");
            return self.type_name;
        }
        id
    }

    fn rank(&self) -> i32 {
        self.advisory(Operation::GetRank, || UNKNOWN_RANK, || self.delegate.rank())
    }

    fn is_available(&self) -> bool {
        self.advisory(Operation::IsAvailable, || false, || self.delegate.is_available())
    }

    fn default_sources(&self) -> Vec<Source> {
        let sources = self.advisory(Operation::GetDefaultSources, Vec::new, || {
            self.delegate.default_sources()
        });
        sources
            .into_iter()
            .filter(|source| match source.validate() {
                Ok(()) => true,
                Err(error) => {
                    log_null(
                        self.type_name,
                        "driver",
                        Operation::GetDefaultSources,
                        &error.to_string(),
                    );
                    false
                }
            })
            .collect()
    }

    fn supported_properties(&self) -> BTreeSet<String> {
        self.advisory(Operation::GetSupportedProperties, BTreeSet::new, || {
            self.delegate.supported_properties()
        })
    }

    fn default_dialect(&self) -> Option<String> {
        self.advisory(Operation::GetDefaultDialect, || None, || {
            self.delegate.default_dialect()
        })
        .filter(|dialect| !dialect.is_empty())
    }

    fn connect(
        &self,
        source: &Source,
        context: &DriverContext,
    ) -> Result<Box<dyn Connection>, SourceError> {
        match guard(|| self.delegate.connect(source, context)) {
            Ok(result) => {
                result.map(|connection| FailsafeConnection::wrap(source.id(), connection))
            }
            Err(detail) => {
                log_failure(self.type_name, source.id(), Operation::Connect, &detail);
                Err(SourceError::unexpected_failure(
                    source.id(),
                    self.type_name,
                    Operation::Connect,
                    &detail,
                ))
            }
        }
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn is_failsafe(&self) -> bool {
        true
    }
}

/// [`Connection`] wrapper enforcing the `open -> closed` state machine.
///
/// Once closed, every data operation fails with `ConnectionClosed` and further
/// `close` calls succeed without reaching the delegate. Dropping an open
/// connection closes it.
pub struct FailsafeConnection {
    source: String,
    delegate: Box<dyn Connection>,
    type_name: &'static str,
    closed: Arc<AtomicBool>,
}

impl FailsafeConnection {
    /// Wraps `connection` unless it is already failsafe.
    pub fn wrap(
        source: impl Into<String>,
        connection: Box<dyn Connection>,
    ) -> Box<dyn Connection> {
        if is_failsafe(|| connection.is_failsafe()) {
            return connection;
        }
        let type_name = type_name_of(|| connection.type_name());
        Box::new(Self {
            source: source.into(),
            delegate: connection,
            type_name,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn failure(&self, operation: Operation, detail: &str) -> SourceError {
        log_failure(self.type_name, &self.source, operation, detail);
        SourceError::unexpected_failure(&self.source, self.type_name, operation, detail)
    }

    fn null(&self, operation: Operation, contract: &str) -> SourceError {
        log_null(self.type_name, &self.source, operation, contract);
        SourceError::unexpected_null(&self.source, self.type_name, operation, contract)
    }

    fn required<T>(
        &self,
        operation: Operation,
        call: impl FnOnce(&dyn Connection) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        if self.is_closed() {
            return Err(SourceError::connection_closed(&self.source, operation));
        }
        guard(|| call(self.delegate.as_ref()))
            .unwrap_or_else(|detail| Err(self.failure(operation, &detail)))
    }

    fn check_flow(&self, operation: Operation, flow: &Flow) -> Result<(), SourceError> {
        if flow.reference.is_empty() {
            return Err(self.null(operation, "flow reference must not be empty"));
        }
        Ok(())
    }
}

impl Connection for FailsafeConnection {
    fn get_flows(&self) -> Result<Vec<Flow>, SourceError> {
        let flows = self.required(Operation::GetFlows, |delegate| delegate.get_flows())?;
        for flow in &flows {
            self.check_flow(Operation::GetFlows, flow)?;
        }
        Ok(flows)
    }

    fn get_flow(&self, flow: &FlowRef) -> Result<Flow, SourceError> {
        let found = self.required(Operation::GetFlow, |delegate| delegate.get_flow(flow))?;
        self.check_flow(Operation::GetFlow, &found)?;
        Ok(found)
    }

    fn get_structure(&self, flow: &FlowRef) -> Result<Structure, SourceError> {
        let structure =
            self.required(Operation::GetStructure, |delegate| delegate.get_structure(flow))?;
        if structure.reference.is_empty() {
            return Err(self.null(
                Operation::GetStructure,
                "structure reference must not be empty",
            ));
        }
        Ok(structure)
    }

    fn get_data(&self, flow: &FlowRef, query: &DataQuery) -> Result<DataSet, SourceError> {
        let data = self.required(Operation::GetData, |delegate| delegate.get_data(flow, query))?;
        if data.flow.is_empty() {
            return Err(self.null(Operation::GetData, "data set flow must not be empty"));
        }
        Ok(data)
    }

    fn get_data_stream(
        &self,
        flow: &FlowRef,
        query: &DataQuery,
    ) -> Result<DataStream, SourceError> {
        let stream = self.required(Operation::GetDataStream, |delegate| {
            delegate.get_data_stream(flow, query)
        })?;
        Ok(Box::new(FailsafeStream {
            source: self.source.clone(),
            type_name: self.type_name,
            closed: Arc::clone(&self.closed),
            inner: Some(stream),
        }))
    }

    fn test_connection(&self) -> Result<(), SourceError> {
        self.required(Operation::TestConnection, |delegate| delegate.test_connection())
    }

    fn supported_features(&self) -> Result<BTreeSet<Feature>, SourceError> {
        if self.is_closed() {
            return Err(SourceError::connection_closed(
                &self.source,
                Operation::GetSupportedFeatures,
            ));
        }
        match guard(|| self.delegate.supported_features()) {
            Ok(result) => result,
            Err(detail) => {
                log_failure(
                    self.type_name,
                    &self.source,
                    Operation::GetSupportedFeatures,
                    &detail,
                );
                Ok(BTreeSet::new())
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let delegate = &mut self.delegate;
        match guard(|| delegate.close()) {
            Ok(result) => result,
            Err(detail) => Err(self.failure(Operation::Close, &detail)),
        }
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn is_failsafe(&self) -> bool {
        true
    }
}

impl Drop for FailsafeConnection {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(error) = self.close() {
                tracing::debug!(source = %self.source, %error, "close on drop failed");
            }
        }
    }
}

/// Stream wrapper sharing its connection's state.
///
/// A panicking item ends the stream with one error. Once the connection is
/// closed the next item is a single `ConnectionClosed` error and the delegate
/// stream is dropped without being polled again.
struct FailsafeStream {
    source: String,
    type_name: &'static str,
    closed: Arc<AtomicBool>,
    inner: Option<DataStream>,
}

impl Iterator for FailsafeStream {
    type Item = Result<Series, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed.load(Ordering::Acquire) {
            return self.inner.take().map(|_| {
                Err(SourceError::connection_closed(
                    &self.source,
                    Operation::GetDataStream,
                ))
            });
        }
        let inner = self.inner.as_mut()?;
        match guard(|| inner.next()) {
            Ok(item) => item,
            Err(detail) => {
                self.inner = None;
                log_failure(self.type_name, &self.source, Operation::GetDataStream, &detail);
                Some(Err(SourceError::unexpected_failure(
                    &self.source,
                    self.type_name,
                    Operation::GetDataStream,
                    &detail,
                )))
            }
        }
    }
}

/// [`Monitoring`] wrapper with a guarded `get_report`.
pub struct FailsafeMonitoring {
    delegate: Arc<dyn Monitoring>,
    type_name: &'static str,
}

impl FailsafeMonitoring {
    pub fn wrap(monitoring: Arc<dyn Monitoring>) -> Arc<dyn Monitoring> {
        if is_failsafe(|| monitoring.is_failsafe()) {
            return monitoring;
        }
        let type_name = type_name_of(|| monitoring.type_name());
        Arc::new(Self {
            delegate: monitoring,
            type_name,
        })
    }
}

impl Monitoring for FailsafeMonitoring {
    fn id(&self) -> &str {
        match guard(|| self.delegate.id()) {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                log_null(self.type_name, "monitoring", Operation::GetId, "id must not be empty");
                self.type_name
            }
            Err(detail) => {
                log_failure(self.type_name, "monitoring", Operation::GetId, &detail);
                self.type_name
            }
        }
    }

    fn get_report(
        &self,
        source: &Source,
        context: &DriverContext,
    ) -> Result<MonitorReport, SourceError> {
        let report = match guard(|| self.delegate.get_report(source, context)) {
            Ok(result) => result?,
            Err(detail) => {
                log_failure(self.type_name, source.id(), Operation::GetReport, &detail);
                return Err(SourceError::unexpected_failure(
                    source.id(),
                    self.type_name,
                    Operation::GetReport,
                    &detail,
                ));
            }
        };
        if report.source.is_empty() {
            let contract = "report source must not be empty";
            log_null(self.type_name, source.id(), Operation::GetReport, contract);
            return Err(SourceError::unexpected_null(
                source.id(),
                self.type_name,
                Operation::GetReport,
                contract,
            ));
        }
        Ok(report)
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn is_failsafe(&self) -> bool {
        true
    }
}
