use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, NoopCache};
use crate::caching::CachedResponse;
use crate::domain::Languages;
use crate::network::{DefaultNetwork, Network};
use crate::{Authenticators, EventSink};

/// Default time-to-live for cached remote responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Capabilities handed to [`crate::Driver::connect`] and monitorings.
#[derive(Clone)]
pub struct DriverContext {
    cache: Arc<dyn Cache<CachedResponse>>,
    cache_ttl: Duration,
    network: Arc<dyn Network>,
    authenticators: Authenticators,
    events: EventSink,
    languages: Languages,
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            cache: Arc::new(NoopCache::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
            network: Arc::new(DefaultNetwork::new()),
            authenticators: Authenticators::default(),
            events: EventSink::disabled(),
            languages: Languages::any(),
        }
    }
}

impl DriverContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache<CachedResponse>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = network;
        self
    }

    pub fn with_authenticators(mut self, authenticators: Authenticators) -> Self {
        self.authenticators = authenticators;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_languages(mut self, languages: Languages) -> Self {
        self.languages = languages;
        self
    }

    pub fn cache(&self) -> &Arc<dyn Cache<CachedResponse>> {
        &self.cache
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }

    pub fn authenticators(&self) -> &Authenticators {
        &self.authenticators
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }
}

impl Debug for DriverContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("cache_ttl", &self.cache_ttl)
            .field("network", &self.network)
            .field("authenticators", &self.authenticators)
            .field("events", &self.events)
            .field("languages", &self.languages.to_string())
            .finish()
    }
}
