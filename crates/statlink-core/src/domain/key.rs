use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Structure;
use crate::ValidationError;

const ALL: &str = "all";

/// Series key such as `M.USD+GBP.EUR..A`.
///
/// Each dot-separated segment targets one dimension; an empty segment is a
/// wildcard and `+` joins alternative codes. The literal `all` selects every
/// series regardless of the structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Key(Vec<String>);

impl Key {
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
            return Self::all();
        }
        Self(trimmed.split('.').map(|part| part.trim().to_owned()).collect())
    }

    pub fn of(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// True when no segment restricts its dimension.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }

    /// Checks the key against a structure's dimensions and code lists.
    pub fn validate(&self, structure: &Structure) -> Result<(), ValidationError> {
        if self.is_all() {
            return Ok(());
        }

        if self.0.len() != structure.dimensions.len() {
            return Err(ValidationError::KeyDimensionMismatch {
                expected: structure.dimensions.len(),
                actual: self.0.len(),
            });
        }

        for (segment, dimension) in self.0.iter().zip(&structure.dimensions) {
            if segment.is_empty() {
                continue;
            }
            if let Some(code) = segment.split('+').find(|code| !dimension.allows(code)) {
                return Err(ValidationError::KeyInvalidCode {
                    dimension: dimension.id.clone(),
                    code: code.to_owned(),
                });
            }
        }

        Ok(())
    }

    /// True when `series` (a fully specified key) is selected by this key.
    pub fn contains(&self, series: &Key) -> bool {
        if self.is_all() {
            return true;
        }
        self.0.len() == series.0.len()
            && self.0.iter().zip(&series.0).all(|(wanted, actual)| {
                wanted.is_empty() || wanted.split('+').any(|code| code == actual)
            })
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_all() {
            return f.write_str(ALL);
        }
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Key> for String {
    fn from(value: Key) -> Self {
        value.to_string()
    }
}
