use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::FlowRef;

/// Series dimension with its code list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    pub position: usize,
    pub label: String,
    /// Allowed codes mapped to their labels; empty means unconstrained.
    pub codes: BTreeMap<String, String>,
}

impl Dimension {
    pub fn new(id: impl Into<String>, position: usize, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position,
            label: label.into(),
            codes: BTreeMap::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.codes.insert(code.into(), label.into());
        self
    }

    pub fn allows(&self, code: &str) -> bool {
        self.codes.is_empty() || self.codes.contains_key(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub label: String,
}

/// Data structure definition of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub reference: FlowRef,
    pub label: String,
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
    pub time_dimension: Option<String>,
    pub primary_measure: String,
}

impl Structure {
    pub fn new(reference: FlowRef, label: impl Into<String>) -> Self {
        Self {
            reference,
            label: label.into(),
            dimensions: Vec::new(),
            attributes: Vec::new(),
            time_dimension: Some(String::from("TIME_PERIOD")),
            primary_measure: String::from("OBS_VALUE"),
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self.dimensions.sort_by_key(|dimension| dimension.position);
        self
    }

    pub fn with_attribute(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            id: id.into(),
            label: label.into(),
        });
        self
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|dimension| dimension.id == id)
    }
}
