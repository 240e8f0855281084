//! Source descriptors.
//!
//! A [`Source`] is an addressable remote endpoint plus the id of the driver
//! that knows how to talk to it. Values are immutable: every `with_*` method
//! consumes the source and returns an updated copy.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ValidationError;

/// Access level declared by a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidentiality {
    #[default]
    Public,
    Restricted,
    Secret,
}

impl Confidentiality {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Restricted => "restricted",
            Self::Secret => "secret",
        }
    }
}

impl Display for Confidentiality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote statistical endpoint bound to a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    id: String,
    #[serde(default)]
    names: Vec<(String, String)>,
    driver: String,
    #[serde(default)]
    dialect: Option<String>,
    endpoint: Url,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    aliases: BTreeSet<String>,
    #[serde(default)]
    confidentiality: Confidentiality,
    #[serde(default)]
    website: Option<Url>,
    #[serde(default)]
    monitor: Option<Url>,
    #[serde(default)]
    monitor_website: Option<Url>,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        driver: impl Into<String>,
        endpoint: Url,
    ) -> Result<Self, ValidationError> {
        let source = Self {
            id: id.into(),
            names: Vec::new(),
            driver: driver.into(),
            dialect: None,
            endpoint,
            properties: BTreeMap::new(),
            aliases: BTreeSet::new(),
            confidentiality: Confidentiality::Public,
            website: None,
            monitor: None,
            monitor_website: None,
        };
        source.validate()?;
        Ok(source)
    }

    /// Checks invariants that serde cannot enforce on deserialized values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_source_id(&self.id)?;
        for alias in &self.aliases {
            validate_source_id(alias)?;
        }
        Ok(())
    }

    /// Adds a display name; a repeated language replaces the earlier text in place.
    pub fn with_name(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        let language = language.into();
        let text = text.into();
        match self.names.iter_mut().find(|(lang, _)| *lang == language) {
            Some(entry) => entry.1 = text,
            None => self.names.push((language, text)),
        }
        self
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Result<Self, ValidationError> {
        let alias = alias.into();
        validate_source_id(&alias)?;
        self.aliases.insert(alias);
        Ok(self)
    }

    pub fn with_confidentiality(mut self, confidentiality: Confidentiality) -> Self {
        self.confidentiality = confidentiality;
        self
    }

    pub fn with_website(mut self, website: Url) -> Self {
        self.website = Some(website);
        self
    }

    pub fn with_monitor(mut self, monitor: Url) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_monitor_website(mut self, monitor_website: Url) -> Self {
        self.monitor_website = Some(monitor_website);
        self
    }

    /// Returns a copy of this source addressed by one of its aliases.
    pub fn alias(&self, new_id: &str) -> Result<Self, ValidationError> {
        if !self.aliases.contains(new_id) {
            return Err(ValidationError::UnknownAlias {
                source_id: self.id.clone(),
                alias: new_id.to_owned(),
            });
        }
        Ok(Self {
            id: new_id.to_owned(),
            ..self.clone()
        })
    }

    pub fn is_alias(&self) -> bool {
        self.aliases.contains(&self.id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .map(|(lang, text)| (lang.as_str(), text.as_str()))
    }

    pub fn name(&self, language: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|(lang, _)| lang == language)
            .map(|(_, text)| text.as_str())
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn dialect(&self) -> Option<&str> {
        self.dialect.as_deref()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub const fn confidentiality(&self) -> Confidentiality {
        self.confidentiality
    }

    pub fn website(&self) -> Option<&Url> {
        self.website.as_ref()
    }

    pub fn monitor(&self) -> Option<&Url> {
        self.monitor.as_ref()
    }

    pub fn monitor_website(&self) -> Option<&Url> {
        self.monitor_website.as_ref()
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

fn validate_source_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptySourceId);
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::SourceIdWhitespace {
            value: value.to_owned(),
        });
    }
    Ok(())
}
