use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const DEFAULT_AGENCY: &str = "all";
const DEFAULT_VERSION: &str = "latest";

/// Reference to a dataflow, written `AGENCY,ID,VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowRef {
    pub agency: String,
    pub id: String,
    pub version: String,
}

impl FlowRef {
    pub fn new(
        agency: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            agency: agency.into(),
            id: id.into(),
            version: version.into(),
        }
    }

    /// Parses `ID`, `AGENCY,ID` or `AGENCY,ID,VERSION`; blank parts take defaults.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidFlowRef {
            value: input.to_owned(),
        };

        let parts = input.trim().split(',').map(str::trim).collect::<Vec<_>>();
        let (agency, id, version) = match parts.as_slice() {
            [id] => (DEFAULT_AGENCY, *id, DEFAULT_VERSION),
            [agency, id] => (*agency, *id, DEFAULT_VERSION),
            [agency, id, version] => (*agency, *id, *version),
            _ => return Err(invalid()),
        };

        if id.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(
            if agency.is_empty() { DEFAULT_AGENCY } else { agency },
            id,
            if version.is_empty() { DEFAULT_VERSION } else { version },
        ))
    }

    /// True when the reference carries no usable identifier.
    pub fn is_empty(&self) -> bool {
        self.id.trim().is_empty()
    }

    /// True when `other` is selected by this reference, treating the default
    /// agency and version as wildcards.
    pub fn matches(&self, other: &FlowRef) -> bool {
        self.id == other.id
            && (self.agency == DEFAULT_AGENCY || self.agency == other.agency)
            && (self.version == DEFAULT_VERSION || self.version == other.version)
    }
}

impl Display for FlowRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.agency, self.id, self.version)
    }
}

impl FromStr for FlowRef {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Dataflow metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub reference: FlowRef,
    pub structure: FlowRef,
    pub name: String,
    pub description: Option<String>,
}

impl Flow {
    pub fn new(reference: FlowRef, structure: FlowRef, name: impl Into<String>) -> Self {
        Self {
            reference,
            structure,
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
