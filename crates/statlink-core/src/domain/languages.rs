use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Language priority list in the `Accept-Language` style: `fr,en;q=0.8,*;q=0.1`.
///
/// Ranges are kept sorted by weight, ties in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Languages(Vec<(String, f32)>);

impl Languages {
    pub const ANY: &'static str = "*";

    pub fn any() -> Self {
        Self(vec![(String::from(Self::ANY), 1.0)])
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let mut ranges = Vec::new();
        for item in input.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let mut parts = item.split(';').map(str::trim);
            let range = parts.next().unwrap_or_default();
            if !is_valid_range(range) {
                return Err(ValidationError::InvalidLanguage {
                    value: range.to_owned(),
                });
            }

            let mut weight = 1.0_f32;
            for param in parts {
                let Some(value) = param.strip_prefix("q=") else {
                    return Err(ValidationError::InvalidLanguageWeight {
                        value: param.to_owned(),
                    });
                };
                weight = value
                    .parse::<f32>()
                    .ok()
                    .filter(|weight| (0.0..=1.0).contains(weight))
                    .ok_or_else(|| ValidationError::InvalidLanguageWeight {
                        value: value.to_owned(),
                    })?;
            }
            ranges.push((range.to_ascii_lowercase(), weight));
        }

        if ranges.is_empty() {
            return Ok(Self::any());
        }

        ranges.sort_by(|left, right| right.1.total_cmp(&left.1));
        Ok(Self(ranges))
    }

    /// Language ranges from most to least preferred.
    pub fn ranges(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(range, _)| range.as_str())
    }

    /// Picks the best text among localized candidates, falling back to the first one.
    pub fn select<'a>(
        &self,
        candidates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Option<&'a str> {
        let candidates = candidates.into_iter().collect::<Vec<_>>();
        for range in self.ranges() {
            let found = candidates.iter().find(|(lang, _)| {
                range == Self::ANY
                    || lang.eq_ignore_ascii_case(range)
                    || lang
                        .split('-')
                        .next()
                        .is_some_and(|primary| primary.eq_ignore_ascii_case(range))
            });
            if let Some((_, text)) = found {
                return Some(*text);
            }
        }
        candidates.first().map(|(_, text)| *text)
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self::any()
    }
}

impl Display for Languages {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|(range, weight)| {
                if (*weight - 1.0).abs() < f32::EPSILON {
                    range.clone()
                } else {
                    format!("{range};q={weight}")
                }
            })
            .collect::<Vec<_>>();
        f.write_str(&rendered.join(","))
    }
}

impl FromStr for Languages {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Languages {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Languages> for String {
    fn from(value: Languages) -> Self {
        value.to_string()
    }
}

fn is_valid_range(range: &str) -> bool {
    if range == Languages::ANY {
        return true;
    }
    !range.is_empty()
        && range.split('-').all(|part| {
            (1..=8).contains(&part.len()) && part.chars().all(|ch| ch.is_ascii_alphanumeric())
        })
}
