//! Entry point resolving source names to open connections.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::cache::{Cache, CacheEntry, FileCache, NoopCache};
use crate::caching::{CachedResponse, CachingConnection};
use crate::catalog::SourceCatalog;
use crate::codec::CodecRegistry;
use crate::config::StatlinkConfig;
use crate::context::DEFAULT_CACHE_TTL;
use crate::domain::Languages;
use crate::failsafe::{FailsafeConnection, FailsafeMonitoring};
use crate::monitor::{MonitorReport, Monitoring};
use crate::network::{DefaultNetwork, Network};
use crate::{
    Authenticator, Authenticators, Connection, CoreError, Driver, DriverContext, DriverLoader,
    EventListener, EventSink, Source, SourceError,
};

/// Immutable registry of drivers, sources and capabilities.
///
/// The source catalog and the driver context are computed on first use and
/// shared afterwards. A manager is `Send + Sync`; connections it returns are
/// owned by the caller.
pub struct SdmxManager {
    drivers: Vec<Arc<dyn Driver>>,
    ranked_drivers: Vec<Arc<dyn Driver>>,
    custom_sources: Vec<Source>,
    monitorings: Vec<Arc<dyn Monitoring>>,
    cache: Option<Arc<dyn Cache<CachedResponse>>>,
    cache_ttl: Duration,
    network: Arc<dyn Network>,
    authenticators: Authenticators,
    events: EventSink,
    languages: Languages,
    catalog: OnceLock<SourceCatalog>,
    context: OnceLock<DriverContext>,
}

impl SdmxManager {
    pub fn builder() -> SdmxManagerBuilder {
        SdmxManagerBuilder::new()
    }

    /// Opens a connection to the source registered under `name` (id or alias).
    pub fn get_connection(&self, name: &str) -> Result<Box<dyn Connection>, SourceError> {
        let source = self.resolve(name)?;
        self.get_connection_for(source)
    }

    /// Opens a connection to `source`, registered or not.
    pub fn get_connection_for(&self, source: &Source) -> Result<Box<dyn Connection>, SourceError> {
        let driver = self.driver_for(source)?;
        self.check_properties(source, driver.as_ref());

        let context = self.context();
        let connection = driver.connect(source, context)?;
        let connection: Box<dyn Connection> = match &self.cache {
            Some(cache) => Box::new(CachingConnection::new(
                source.id(),
                self.languages.clone(),
                Arc::clone(cache),
                self.cache_ttl,
                connection,
            )),
            None => connection,
        };
        tracing::debug!(source = source.id(), driver = driver.id(), "connection opened");
        Ok(FailsafeConnection::wrap(source.id(), connection))
    }

    /// Dialect of `source`, falling back to its driver's default.
    pub fn get_dialect(&self, source: &Source) -> Result<Option<String>, SourceError> {
        if let Some(dialect) = source.dialect() {
            return Ok(Some(dialect.to_owned()));
        }
        Ok(self.driver_for(source)?.default_dialect())
    }

    /// Every known source keyed by id, aliases included.
    pub fn get_sources(&self) -> &BTreeMap<String, Source> {
        self.catalog().sources()
    }

    /// Registered drivers, best rank first. Equal ranks keep registration order.
    pub fn get_drivers(&self) -> &[Arc<dyn Driver>] {
        &self.ranked_drivers
    }

    pub fn get_monitorings(&self) -> &[Arc<dyn Monitoring>] {
        &self.monitorings
    }

    pub fn get_monitor_report(&self, name: &str) -> Result<MonitorReport, SourceError> {
        let source = self.resolve(name)?;
        self.get_monitor_report_for(source)
    }

    /// Asks the monitoring handling the scheme of `source.monitor()` for a report.
    pub fn get_monitor_report_for(&self, source: &Source) -> Result<MonitorReport, SourceError> {
        let monitor = source
            .monitor()
            .ok_or_else(|| SourceError::missing_monitor(source.id()))?;
        let scheme = monitor.scheme();
        let monitoring = self
            .monitorings
            .iter()
            .find(|monitoring| monitoring.id() == scheme)
            .ok_or_else(|| SourceError::missing_monitoring(source.id(), scheme))?;
        monitoring.get_report(source, self.context())
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn catalog(&self) -> &SourceCatalog {
        self.catalog
            .get_or_init(|| SourceCatalog::build(&self.custom_sources, &self.drivers))
    }

    pub fn context(&self) -> &DriverContext {
        self.context.get_or_init(|| {
            let cache: Arc<dyn Cache<CachedResponse>> = match &self.cache {
                Some(cache) => Arc::clone(cache),
                None => Arc::new(NoopCache::new()),
            };
            DriverContext::new()
                .with_cache(cache)
                .with_cache_ttl(self.cache_ttl)
                .with_network(Arc::clone(&self.network))
                .with_authenticators(self.authenticators.clone())
                .with_events(self.events.clone())
                .with_languages(self.languages.clone())
        })
    }

    fn resolve(&self, name: &str) -> Result<&Source, SourceError> {
        self.catalog()
            .resolve(name)
            .ok_or_else(|| SourceError::missing_source(name))
    }

    fn driver_for(&self, source: &Source) -> Result<&Arc<dyn Driver>, SourceError> {
        self.drivers
            .iter()
            .find(|driver| driver.id() == source.driver())
            .ok_or_else(|| SourceError::missing_driver(source.id(), source.driver()))
    }

    fn check_properties(&self, source: &Source, driver: &dyn Driver) {
        if !self.events.is_enabled() {
            return;
        }
        let supported = driver.supported_properties();
        let unknown = source
            .properties()
            .keys()
            .filter(|key| !supported.contains(*key))
            .map(String::as_str)
            .collect::<Vec<_>>();
        if !unknown.is_empty() {
            self.events.emit(
                source,
                &format!(
                    "unexpected properties [{}] for driver '{}'",
                    unknown.join(", "),
                    driver.id()
                ),
            );
        }
    }
}

impl Debug for SdmxManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdmxManager")
            .field(
                "drivers",
                &self.drivers.iter().map(|driver| driver.id()).collect::<Vec<_>>(),
            )
            .field("custom_sources", &self.custom_sources.len())
            .field("monitorings", &self.monitorings.len())
            .field("cache_enabled", &self.cache.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("events", &self.events)
            .field("languages", &self.languages.to_string())
            .finish()
    }
}

/// Builder for [`SdmxManager`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use statlink_core::{MemDriver, SdmxManager, Source};
/// use url::Url;
///
/// let ecb = Source::new("ECB", "D", Url::parse("mem://ecb")?)?;
/// let manager = SdmxManager::builder()
///     .driver(Arc::new(MemDriver::new("D").with_dialect("sdmx21").with_source(ecb)))
///     .build();
///
/// assert!(manager.get_sources().contains_key("ECB"));
/// assert!(manager.get_connection("unknown").is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SdmxManagerBuilder {
    drivers: Vec<Arc<dyn Driver>>,
    custom_sources: Vec<Source>,
    monitorings: Vec<Arc<dyn Monitoring>>,
    cache: Option<Arc<dyn Cache<CachedResponse>>>,
    cache_ttl: Duration,
    network: Arc<dyn Network>,
    authenticators: Authenticators,
    events: EventSink,
    languages: Languages,
}

impl Default for SdmxManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SdmxManagerBuilder {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
            custom_sources: Vec::new(),
            monitorings: Vec::new(),
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            network: Arc::new(DefaultNetwork::new()),
            authenticators: Authenticators::default(),
            events: EventSink::disabled(),
            languages: Languages::any(),
        }
    }

    /// Starts from environment configuration: custom sources file, language
    /// priority and a file cache under `<home>/cache` unless disabled.
    pub fn from_config(config: &StatlinkConfig) -> Result<Self, CoreError> {
        let builder = Self::new()
            .custom_sources(config.load_custom_sources()?)
            .languages(config.languages.clone())
            .cache_ttl(config.cache_ttl);
        if !config.cache_enabled {
            return Ok(builder);
        }

        let registry =
            CodecRegistry::standard::<CacheEntry<CachedResponse>>(config.cache_compression);
        let cache = FileCache::<CachedResponse>::open(config.cache_dir(), &registry)?;
        Ok(builder.cache(Arc::new(cache)))
    }

    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    pub fn drivers(mut self, drivers: impl IntoIterator<Item = Arc<dyn Driver>>) -> Self {
        self.drivers.extend(drivers);
        self
    }

    pub fn custom_source(mut self, source: Source) -> Self {
        self.custom_sources.push(source);
        self
    }

    pub fn custom_sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.custom_sources.extend(sources);
        self
    }

    pub fn monitoring(mut self, monitoring: Arc<dyn Monitoring>) -> Self {
        self.monitorings.push(FailsafeMonitoring::wrap(monitoring));
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache<CachedResponse>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = network;
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.push(authenticator);
        self
    }

    pub fn event_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.events = EventSink::new(listener);
        self
    }

    pub fn languages(mut self, languages: Languages) -> Self {
        self.languages = languages;
        self
    }

    /// Loads the drivers (failsafe-wrapped, available only) and freezes the
    /// configuration. Source lookup and driver dispatch follow registration
    /// order; rank only orders [`SdmxManager::get_drivers`].
    pub fn build(self) -> SdmxManager {
        let drivers = DriverLoader::load(self.drivers);
        let ranked_drivers = DriverLoader::by_rank(&drivers);
        tracing::debug!(
            drivers = drivers.len(),
            custom_sources = self.custom_sources.len(),
            cache = self.cache.is_some(),
            "built source manager"
        );
        SdmxManager {
            drivers,
            ranked_drivers,
            custom_sources: self.custom_sources,
            monitorings: self.monitorings,
            cache: self.cache,
            cache_ttl: self.cache_ttl,
            network: self.network,
            authenticators: self.authenticators,
            events: self.events,
            languages: self.languages,
            catalog: OnceLock::new(),
            context: OnceLock::new(),
        }
    }
}
