use crate::core::{data_type::DataType, value::Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named, typed column of nullable values. Labels identify the series a
/// field belongs to after long-form data has been split or pivoted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub data_type: DataType,
    pub nullable: bool,
    pub values: Vec<Option<Value>>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Field {
            name: name.into(),
            labels: BTreeMap::new(),
            data_type,
            nullable,
            values: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Same name/type/labels, no values. Used when a schema is reused
    /// across batches.
    pub fn empty_like(&self) -> Self {
        Field {
            name: self.name.clone(),
            labels: self.labels.clone(),
            data_type: self.data_type,
            nullable: self.nullable,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx).and_then(|v| v.as_ref())
    }

    /// True if every value is concrete. A nullable field with no nulls can
    /// be rewritten as non-nullable.
    pub fn all_concrete(&self) -> bool {
        self.values.iter().all(|v| v.is_some())
    }
}
