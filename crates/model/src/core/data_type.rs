use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive column type of a frame field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Uint,
    Float,
    Boolean,
    String,
    Time,
}

impl DataType {
    /// Numeric types can back a time-series value column.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Uint | DataType::Float)
    }

    /// Value-bearing types for time-series classification. Booleans graph
    /// fine as 0/1, so they count.
    pub fn is_value(&self) -> bool {
        self.is_numeric() || matches!(self, DataType::Boolean)
    }

    pub fn is_time(&self) -> bool {
        matches!(self, DataType::Time)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Uint => "uint",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::Time => "time",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
