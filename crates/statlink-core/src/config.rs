//! Environment-driven configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `STATLINK_HOME` | `~/.statlink` | Root of cache and configuration files |
//! | `STATLINK_NO_CACHE` | unset | Any of `1`, `true`, `yes` disables caching |
//! | `STATLINK_CACHE_TTL_SECS` | `300` | Time-to-live of cached responses |
//! | `STATLINK_CACHE_COMPRESSION` | `true` | Gzip cache files |
//! | `STATLINK_LANGUAGES` | `*` | Language priority list, e.g. `fr,en;q=0.8` |
//! | `STATLINK_SOURCES` | unset | JSON file with custom source definitions |

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::DEFAULT_CACHE_TTL;
use crate::domain::Languages;
use crate::{CoreError, Source};

pub const HOME_VAR: &str = "STATLINK_HOME";
pub const NO_CACHE_VAR: &str = "STATLINK_NO_CACHE";
pub const CACHE_TTL_VAR: &str = "STATLINK_CACHE_TTL_SECS";
pub const CACHE_COMPRESSION_VAR: &str = "STATLINK_CACHE_COMPRESSION";
pub const LANGUAGES_VAR: &str = "STATLINK_LANGUAGES";
pub const SOURCES_VAR: &str = "STATLINK_SOURCES";

#[derive(Debug, Clone, PartialEq)]
pub struct StatlinkConfig {
    pub home: PathBuf,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_compression: bool,
    pub languages: Languages,
    pub sources_file: Option<PathBuf>,
}

impl Default for StatlinkConfig {
    fn default() -> Self {
        Self {
            home: default_home(env::var_os("HOME").map(PathBuf::from)),
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_compression: true,
            languages: Languages::any(),
            sources_file: None,
        }
    }
}

impl StatlinkConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            home: default_home(get("HOME").map(PathBuf::from)),
            ..Self::default()
        };

        if let Some(home) = get(HOME_VAR) {
            config.home = PathBuf::from(home);
        }
        if let Some(value) = get(NO_CACHE_VAR) {
            config.cache_enabled = !parse_flag(NO_CACHE_VAR, &value)?;
        }
        if let Some(value) = get(CACHE_TTL_VAR) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| CoreError::InvalidSetting {
                    name: CACHE_TTL_VAR,
                    value: value.clone(),
                })?;
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(value) = get(CACHE_COMPRESSION_VAR) {
            config.cache_compression = parse_flag(CACHE_COMPRESSION_VAR, &value)?;
        }
        if let Some(value) = get(LANGUAGES_VAR) {
            config.languages = Languages::parse(&value)?;
        }
        config.sources_file = get(SOURCES_VAR).map(PathBuf::from);

        Ok(config)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Reads custom sources from [`StatlinkConfig::sources_file`], if set.
    pub fn load_custom_sources(&self) -> Result<Vec<Source>, CoreError> {
        match &self.sources_file {
            Some(path) => load_sources(path),
            None => Ok(Vec::new()),
        }
    }
}

/// Parses a JSON array of sources and validates each entry.
pub fn load_sources(path: &Path) -> Result<Vec<Source>, CoreError> {
    let content = fs::read_to_string(path)?;
    let sources: Vec<Source> = serde_json::from_str(&content)?;
    for source in &sources {
        source.validate()?;
    }
    tracing::debug!(path = %path.display(), count = sources.len(), "loaded custom sources");
    Ok(sources)
}

fn default_home(user_home: Option<PathBuf>) -> PathBuf {
    match user_home {
        Some(home) if !home.as_os_str().is_empty() => home.join(".statlink"),
        _ => PathBuf::from(".statlink"),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, CoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::InvalidSetting {
            name,
            value: value.to_owned(),
        }),
    }
}
