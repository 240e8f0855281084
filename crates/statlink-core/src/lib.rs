//! # Statlink Core
//!
//! Source resolution, driver dispatch and response caching for federated
//! statistical-data clients.
//!
//! ## Overview
//!
//! Dozens of statistical web services (central banks, statistical offices)
//! speak incompatible dialects. This crate puts them behind one connection
//! abstraction:
//!
//! - **Source catalog** merging user-declared sources with driver defaults,
//!   expanding aliases and deduplicating ids
//! - **Driver registry** picking the driver and dialect that serve a source
//! - **Failsafe adapters** turning plugin panics and missing values into
//!   structured errors or safe defaults
//! - **TTL caches** (memory or file) with a ranked codec registry
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Credentials and authenticator chain |
//! | [`cache`] | `Cache` trait, clocks, memory and file caches |
//! | [`caching`] | Read-through caching connection decorator |
//! | [`catalog`] | Merged source lookup table |
//! | [`codec`] | Typed codecs and the codec registry |
//! | [`config`] | Environment configuration |
//! | [`domain`] | Flows, structures, keys, series, languages |
//! | [`driver`] | Driver and connection contracts, source errors |
//! | [`drivers`] | Built-in drivers |
//! | [`event`] | Diagnostic event listeners |
//! | [`failsafe`] | Panic-safe driver, connection and monitoring wrappers |
//! | [`manager`] | `SdmxManager` and its builder |
//! | [`monitor`] | Monitoring backends and reports |
//! | [`network`] | Proxy, TLS and timeout settings for drivers |
//! | [`source`] | Source descriptors |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use statlink_core::{MemDriver, SdmxManager, Source, SourceErrorKind};
//! use url::Url;
//!
//! let driver = MemDriver::new("D")
//!     .with_dialect("sdmx21")
//!     .with_source(Source::new("ECB", "D", Url::parse("mem://ecb")?)?);
//! let manager = SdmxManager::builder().driver(Arc::new(driver)).build();
//!
//! let mut connection = manager.get_connection("ECB")?;
//! connection.close()?;
//! assert_eq!(
//!     connection.get_flows().unwrap_err().kind(),
//!     SourceErrorKind::ConnectionClosed
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  SdmxManager    │──── SourceCatalog (custom + driver defaults)
//! └────────┬────────┘
//!          │ get_connection(name)
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ FailsafeDriver  │────▶│ Driver (plugin)  │
//! └────────┬────────┘     └──────────────────┘
//!          │ connect
//!          ▼
//! ┌─────────────────────┐     ┌──────────────────┐
//! │ FailsafeConnection  │────▶│ CachingConnection│──── Cache<CachedResponse>
//! └─────────────────────┘     └────────┬─────────┘
//!                                      ▼
//!                             ┌──────────────────┐
//!                             │ Connection       │
//!                             │ (plugin)         │
//!                             └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Source operations return [`SourceError`], classified by
//! [`SourceErrorKind`]:
//!
//! ```rust
//! use statlink_core::{SourceError, SourceErrorKind};
//!
//! fn handle_error(error: SourceError) {
//!     match error.kind() {
//!         SourceErrorKind::MissingSource | SourceErrorKind::MissingDriver => {
//!             // Configuration problem
//!         }
//!         SourceErrorKind::UnexpectedPluginFailure | SourceErrorKind::UnexpectedPluginNull => {
//!             // Driver bug, already logged
//!         }
//!         _ if error.is_io() => {
//!             // Transport trouble, may be worth retrying
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod caching;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod context;
pub mod domain;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod event;
pub mod failsafe;
pub mod manager;
pub mod monitor;
pub mod network;
pub mod source;

// Capabilities
pub use auth::{Authenticator, Authenticators, Credentials, EnvAuthenticator};
pub use event::{EventListener, EventSink, TracingEventListener};
pub use network::{http_client, DefaultNetwork, Network};

// Caching
pub use cache::{Cache, CacheEntry, Clock, FileCache, ManualClock, MemCache, NoopCache, SystemClock};
pub use caching::{CachedResponse, CachingConnection};
pub use codec::{BincodeCodec, Codec, CodecError, CodecRegistry, GzipCodec, JsonCodec};

// Configuration
pub use config::StatlinkConfig;
pub use context::{DriverContext, DEFAULT_CACHE_TTL};

// Domain values
pub use domain::{
    Attribute, DataDetail, DataQuery, DataSet, Dimension, Feature, Flow, FlowRef, Key, Languages,
    Obs, Series, Structure,
};

// Driver contract
pub use driver::{
    validate_driver_id, Connection, DataStream, Driver, DriverLoader, Operation, SourceError,
    SourceErrorKind, UNKNOWN_RANK,
};
pub use drivers::{MemDriver, MEM_DRIVER_ID};
pub use failsafe::{
    quiet_plugin_panics, FailsafeConnection, FailsafeDriver, FailsafeMonitoring,
};

// Errors
pub use error::{CacheError, CoreError, ValidationError};

// Manager
pub use catalog::SourceCatalog;
pub use manager::{SdmxManager, SdmxManagerBuilder};
pub use monitor::{MonitorReport, MonitorStatus, Monitoring};
pub use source::{Confidentiality, Source};
