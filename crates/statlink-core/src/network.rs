//! Transport configuration handed to drivers.
//!
//! The core never performs HTTP itself. Drivers ask the [`Network`] capability
//! how to reach a source (proxy, certificate checks, timeout) and can use
//! [`http_client`] to turn that into a blocking `reqwest` client.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::time::Duration;

use url::Url;

use crate::{Source, SourceError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("statlink/", env!("CARGO_PKG_VERSION"));

/// Per-endpoint transport settings.
pub trait Network: Send + Sync + Debug {
    /// Proxy to use for `url`, if any.
    fn proxy_for(&self, url: &Url) -> Option<Url>;

    /// Whether certificate and host name checks are relaxed for `url`.
    fn accept_invalid_certs(&self, url: &Url) -> bool {
        let _ = url;
        false
    }

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

/// Static network settings.
#[derive(Debug, Clone)]
pub struct DefaultNetwork {
    proxy: Option<Url>,
    no_proxy: BTreeSet<String>,
    insecure_hosts: BTreeSet<String>,
    timeout: Duration,
}

impl Default for DefaultNetwork {
    fn default() -> Self {
        Self {
            proxy: None,
            no_proxy: BTreeSet::new(),
            insecure_hosts: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DefaultNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Hosts reached directly even when a proxy is configured.
    pub fn with_no_proxy(mut self, host: impl Into<String>) -> Self {
        self.no_proxy.insert(host.into().to_ascii_lowercase());
        self
    }

    /// Hosts whose certificates are not verified.
    pub fn with_insecure_host(mut self, host: impl Into<String>) -> Self {
        self.insecure_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Network for DefaultNetwork {
    fn proxy_for(&self, url: &Url) -> Option<Url> {
        let host = url.host_str()?.to_ascii_lowercase();
        if self.no_proxy.contains(&host) {
            return None;
        }
        self.proxy.clone()
    }

    fn accept_invalid_certs(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.insecure_hosts.contains(&host.to_ascii_lowercase()))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builds a blocking HTTP client configured for `source`.
pub fn http_client(
    network: &dyn Network,
    source: &Source,
) -> Result<reqwest::blocking::Client, SourceError> {
    let endpoint = source.endpoint();
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(network.timeout())
        .danger_accept_invalid_certs(network.accept_invalid_certs(endpoint));

    builder = match network.proxy_for(endpoint) {
        Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy.as_str()).map_err(|error| {
            SourceError::io(format!(
                "invalid proxy '{proxy}' for source '{}': {error}",
                source.id()
            ))
        })?),
        None => builder.no_proxy(),
    };

    builder.build().map_err(|error| {
        SourceError::io(format!(
            "failed to build http client for source '{}': {error}",
            source.id()
        ))
    })
}
