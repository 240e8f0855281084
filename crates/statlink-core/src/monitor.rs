use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{DriverContext, Source, SourceError};

/// Availability reported by a monitoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl MonitorStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for MonitorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health snapshot of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub source: String,
    pub status: MonitorStatus,
    pub uptime_ratio: Option<f64>,
    pub average_response_time_ms: Option<u64>,
}

impl MonitorReport {
    pub fn new(source: impl Into<String>, status: MonitorStatus) -> Self {
        Self {
            source: source.into(),
            status,
            uptime_ratio: None,
            average_response_time_ms: None,
        }
    }

    pub fn with_uptime_ratio(mut self, ratio: f64) -> Self {
        self.uptime_ratio = Some(ratio.clamp(0.0, 1.0));
        self
    }

    pub fn with_average_response_time_ms(mut self, millis: u64) -> Self {
        self.average_response_time_ms = Some(millis);
        self
    }
}

/// Monitoring backend addressed by the URI scheme of [`Source::monitor`].
pub trait Monitoring: Send + Sync {
    /// URI scheme handled by this backend, e.g. `upptime`.
    fn id(&self) -> &str;

    fn get_report(
        &self,
        source: &Source,
        context: &DriverContext,
    ) -> Result<MonitorReport, SourceError>;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    #[doc(hidden)]
    fn is_failsafe(&self) -> bool {
        false
    }
}
