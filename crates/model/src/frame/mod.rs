pub mod field;
pub mod meta;

use crate::frame::{
    field::Field,
    meta::{FrameMeta, VisType},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("field '{field}' has {len} values, expected {expected}")]
    MismatchedFieldLengths {
        field: String,
        len: usize,
        expected: usize,
    },

    #[error("row has {got} cells, frame has {want} fields")]
    RowWidthMismatch { got: usize, want: usize },
}

/// Time-series shape of a frame, as far as reshaping cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSeriesType {
    /// No time column or no value columns; not reshapeable.
    Not,
    /// One row per (time, label set): a time column, value columns, and at
    /// least one string label column.
    Long,
    /// One row per time value, one column per series; no string columns.
    Wide,
}

/// A columnar batch of query results. All fields hold the same number of
/// values; a frame with zero rows is valid but normally discarded upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub name: String,
    pub ref_id: String,
    pub fields: Vec<Field>,
    pub meta: Option<FrameMeta>,
}

impl Frame {
    pub fn new(fields: Vec<Field>) -> Self {
        Frame {
            name: String::new(),
            ref_id: String::new(),
            fields,
            meta: None,
        }
    }

    /// Terminal error frame: no data, just provenance, so the client can
    /// show which query failed.
    pub fn error_frame(ref_id: &str, executed_sql: &str) -> Self {
        let mut meta = FrameMeta::default();
        meta.executed_query_string = executed_sql.to_string();
        Frame {
            name: ref_id.to_string(),
            ref_id: ref_id.to_string(),
            fields: Vec::new(),
            meta: Some(meta),
        }
    }

    /// Number of rows, enforcing the equal-length invariant across fields.
    pub fn row_len(&self) -> Result<usize, FrameError> {
        let Some(first) = self.fields.first() else {
            return Ok(0);
        };
        let expected = first.len();
        for field in &self.fields[1..] {
            if field.len() != expected {
                return Err(FrameError::MismatchedFieldLengths {
                    field: field.name.clone(),
                    len: field.len(),
                    expected,
                });
            }
        }
        Ok(expected)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.first().is_none_or(|f| f.values.is_empty())
    }

    /// Append one row of cells in field order.
    pub fn push_row(&mut self, cells: Vec<Option<crate::core::value::Value>>) -> Result<(), FrameError> {
        if cells.len() != self.fields.len() {
            return Err(FrameError::RowWidthMismatch {
                got: cells.len(),
                want: self.fields.len(),
            });
        }
        for (field, cell) in self.fields.iter_mut().zip(cells) {
            field.values.push(cell);
        }
        Ok(())
    }

    pub fn size_bytes(&self) -> usize {
        self.fields
            .iter()
            .flat_map(|f| f.values.iter())
            .map(|v| v.as_ref().map_or(0, |v| v.size_bytes()))
            .sum()
    }

    /// Index of the first time field, if any.
    pub fn time_field_index(&self) -> Option<usize> {
        self.fields.iter().position(|f| f.data_type.is_time())
    }

    pub fn time_series_type(&self) -> TimeSeriesType {
        if self.time_field_index().is_none() {
            return TimeSeriesType::Not;
        }
        let has_values = self.fields.iter().any(|f| f.data_type.is_value());
        if !has_values {
            return TimeSeriesType::Not;
        }
        let has_labels = self
            .fields
            .iter()
            .any(|f| f.data_type == crate::core::data_type::DataType::String);
        if has_labels {
            TimeSeriesType::Long
        } else {
            TimeSeriesType::Wide
        }
    }

    pub fn meta_mut(&mut self) -> &mut FrameMeta {
        self.meta.get_or_insert_with(FrameMeta::default)
    }

    /// Stamp provenance metadata onto the frame.
    pub fn stamp(&mut self, ref_id: &str, executed_sql: &str, vis: VisType) {
        self.name = ref_id.to_string();
        self.ref_id = ref_id.to_string();
        let meta = self.meta_mut();
        meta.executed_query_string = executed_sql.to_string();
        meta.preferred_visualization = vis;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{data_type::DataType, value::Value};
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Value {
        Value::Time(Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn row_len_rejects_ragged_fields() {
        let mut time = Field::new("time", DataType::Time, false);
        time.values.push(Some(ts(1)));
        let value = Field::new("value", DataType::Float, true);
        let frame = Frame::new(vec![time, value]);
        assert!(matches!(
            frame.row_len(),
            Err(FrameError::MismatchedFieldLengths { .. })
        ));
    }

    #[test]
    fn classifies_long_and_wide() {
        let time = Field::new("time", DataType::Time, false);
        let value = Field::new("value", DataType::Float, true);
        let label = Field::new("host", DataType::String, true);

        let wide = Frame::new(vec![time.clone(), value.clone()]);
        assert_eq!(wide.time_series_type(), TimeSeriesType::Wide);

        let long = Frame::new(vec![time, value, label.clone()]);
        assert_eq!(long.time_series_type(), TimeSeriesType::Long);

        let not = Frame::new(vec![label]);
        assert_eq!(not.time_series_type(), TimeSeriesType::Not);
    }

    #[test]
    fn push_row_checks_width() {
        let mut frame = Frame::new(vec![Field::new("a", DataType::Int, true)]);
        assert!(frame.push_row(vec![Some(Value::Int(1)), None]).is_err());
        frame.push_row(vec![Some(Value::Int(1))]).unwrap();
        assert_eq!(frame.row_len().unwrap(), 1);
    }
}
