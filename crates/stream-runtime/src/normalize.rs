use chrono::{DateTime, Utc};
use model::{
    core::{data_type::DataType, value::Value},
    frame::{
        Frame, TimeSeriesType,
        field::Field,
        meta::{FrameType, FrameTypeVersion, VisType},
    },
    query::{FillMode, FillPolicy, FormatOption, StreamQuery},
};
use std::collections::{BTreeMap, HashMap};
use stream_core::error::NormalizeError;

/// Reshape a raw long-form batch into the deliverable shape for the
/// requested format. Zero-row input for a format that needs rows yields
/// the distinguished `NoResults` outcome, checked before anything else.
pub fn normalize(
    mut frame: Frame,
    query: &StreamQuery,
    fill: Option<FillPolicy>,
) -> Result<Vec<Frame>, NormalizeError> {
    frame.stamp(&query.ref_id, &query.raw_sql, VisType::Graph);
    let rows = frame.row_len()?;

    match query.format {
        FormatOption::Multi => {
            if rows == 0 {
                return Err(NormalizeError::NoResults);
            }
            if frame.time_series_type() == TimeSeriesType::Long {
                let time_idx = force_concrete_time(&mut frame)?;
                let meta = frame.meta_mut();
                meta.frame_type = Some(FrameType::TimeSeriesLong);
                meta.type_version = Some(FrameTypeVersion(0, 1));
                return long_to_multi(frame, time_idx);
            }
            Ok(vec![frame])
        }
        FormatOption::TimeSeries => {
            if rows == 0 {
                return Err(NormalizeError::NoResults);
            }
            if frame.time_series_type() == TimeSeriesType::Long {
                let time_idx = force_concrete_time(&mut frame)?;
                return Ok(vec![long_to_wide(frame, time_idx, fill)?]);
            }
            Ok(vec![frame])
        }
        FormatOption::Table => {
            frame.meta_mut().preferred_visualization = VisType::Table;
            Ok(vec![frame])
        }
        FormatOption::Logs => {
            frame.meta_mut().preferred_visualization = VisType::Logs;
            Ok(vec![frame])
        }
        FormatOption::Trace => {
            frame.meta_mut().preferred_visualization = VisType::Trace;
            Ok(vec![frame])
        }
    }
}

/// Rewrite the leading time field as non-nullable. A null time value
/// cannot be widened or split, so it is a reshape error.
fn force_concrete_time(frame: &mut Frame) -> Result<usize, NormalizeError> {
    let idx = frame
        .time_field_index()
        .ok_or(NormalizeError::MissingTimeField)?;
    let field = &mut frame.fields[idx];
    for value in &field.values {
        match value {
            None => return Err(NormalizeError::NullTimeValue),
            Some(Value::Time(_)) => {}
            Some(_) => {
                return Err(NormalizeError::InvalidTimeValue {
                    field: field.name.clone(),
                });
            }
        }
    }
    field.nullable = false;
    Ok(idx)
}

fn series_key(frame: &Frame, label_idxs: &[usize], row: usize) -> Vec<(String, String)> {
    label_idxs
        .iter()
        .map(|&idx| {
            let field = &frame.fields[idx];
            let value = field.at(row).map(|v| v.as_string()).unwrap_or_default();
            (field.name.clone(), value)
        })
        .collect()
}

fn labels_of(key: &[(String, String)]) -> BTreeMap<String, String> {
    key.iter().cloned().collect()
}

fn time_at(frame: &Frame, time_idx: usize, row: usize) -> Result<DateTime<Utc>, NormalizeError> {
    match frame.fields[time_idx].at(row) {
        Some(Value::Time(t)) => Ok(*t),
        _ => Err(NormalizeError::NullTimeValue),
    }
}

/// Split a long-form frame into one frame per distinct series key, in
/// first-appearance order of the label sets.
fn long_to_multi(frame: Frame, time_idx: usize) -> Result<Vec<Frame>, NormalizeError> {
    let rows = frame.row_len()?;
    let label_idxs: Vec<usize> = frame
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type == DataType::String)
        .map(|(i, _)| i)
        .collect();
    let value_idxs: Vec<usize> = frame
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type.is_value())
        .map(|(i, _)| i)
        .collect();

    let mut order: Vec<Frame> = Vec::new();
    let mut by_key: HashMap<Vec<(String, String)>, usize> = HashMap::new();

    for row in 0..rows {
        let key = series_key(&frame, &label_idxs, row);
        let series_idx = match by_key.get(&key) {
            Some(&idx) => idx,
            None => {
                let labels = labels_of(&key);
                let mut fields =
                    Vec::with_capacity(1 + value_idxs.len());
                fields.push(frame.fields[time_idx].empty_like());
                for &idx in &value_idxs {
                    fields.push(
                        frame.fields[idx]
                            .empty_like()
                            .with_labels(labels.clone()),
                    );
                }
                let mut series = Frame::new(fields);
                series.name = frame.name.clone();
                series.ref_id = frame.ref_id.clone();
                series.meta = frame.meta.clone();
                if let Some(meta) = &mut series.meta {
                    meta.frame_type = Some(FrameType::TimeSeriesMulti);
                }
                order.push(series);
                by_key.insert(key, order.len() - 1);
                order.len() - 1
            }
        };

        let series = &mut order[series_idx];
        series.fields[0]
            .values
            .push(Some(Value::Time(time_at(&frame, time_idx, row)?)));
        for (pos, &idx) in value_idxs.iter().enumerate() {
            series.fields[pos + 1]
                .values
                .push(frame.fields[idx].values[row].clone());
        }
    }

    Ok(order)
}

/// Pivot a long-form frame to wide form: one shared time column, one
/// value column per (value field, series key) pair. Buckets a series is
/// missing are synthesized per the fill policy.
fn long_to_wide(
    frame: Frame,
    time_idx: usize,
    fill: Option<FillPolicy>,
) -> Result<Frame, NormalizeError> {
    let rows = frame.row_len()?;
    let label_idxs: Vec<usize> = frame
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type == DataType::String)
        .map(|(i, _)| i)
        .collect();
    let value_idxs: Vec<usize> = frame
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type.is_value())
        .map(|(i, _)| i)
        .collect();

    // Outer None marks a bucket the series never reported; inner value is
    // whatever the row carried, nulls included.
    struct WideColumn {
        template: Field,
        cells: Vec<Option<Option<Value>>>,
    }

    let mut times: Vec<DateTime<Utc>> = Vec::new();
    let mut bucket_of: HashMap<DateTime<Utc>, usize> = HashMap::new();
    let mut columns: Vec<WideColumn> = Vec::new();
    let mut column_of: HashMap<(Vec<(String, String)>, usize), usize> = HashMap::new();

    for row in 0..rows {
        let t = time_at(&frame, time_idx, row)?;
        let bucket = match bucket_of.get(&t) {
            Some(&b) => b,
            None => {
                times.push(t);
                bucket_of.insert(t, times.len() - 1);
                for col in &mut columns {
                    col.cells.push(None);
                }
                times.len() - 1
            }
        };

        let key = series_key(&frame, &label_idxs, row);
        for &value_idx in &value_idxs {
            let col_idx = match column_of.get(&(key.clone(), value_idx)) {
                Some(&c) => c,
                None => {
                    let template = frame.fields[value_idx]
                        .empty_like()
                        .with_labels(labels_of(&key));
                    columns.push(WideColumn {
                        template,
                        cells: vec![None; times.len()],
                    });
                    column_of.insert((key.clone(), value_idx), columns.len() - 1);
                    columns.len() - 1
                }
            };
            columns[col_idx].cells[bucket] = Some(frame.fields[value_idx].values[row].clone());
        }
    }

    let mut time_field = frame.fields[time_idx].empty_like();
    time_field.nullable = false;
    time_field.values = times.into_iter().map(|t| Some(Value::Time(t))).collect();

    let mut fields = Vec::with_capacity(1 + columns.len());
    fields.push(time_field);
    for col in columns {
        let mut field = col.template;
        field.values = apply_fill(col.cells, fill, field.data_type);
        fields.push(field);
    }

    let mut wide = Frame::new(fields);
    wide.name = frame.name;
    wide.ref_id = frame.ref_id;
    wide.meta = frame.meta;
    if let Some(meta) = &mut wide.meta {
        meta.frame_type = Some(FrameType::TimeSeriesWide);
    }
    Ok(wide)
}

fn apply_fill(
    cells: Vec<Option<Option<Value>>>,
    fill: Option<FillPolicy>,
    data_type: DataType,
) -> Vec<Option<Value>> {
    let policy = fill.unwrap_or_default();
    let mut out = Vec::with_capacity(cells.len());
    let mut previous: Option<Value> = None;

    for cell in cells {
        let value = match cell {
            Some(present) => {
                previous = present.clone();
                present
            }
            None => match policy.mode {
                FillMode::Null => None,
                FillMode::Previous => previous.clone(),
                FillMode::Value => Some(fill_constant(policy.value, data_type)),
            },
        };
        out.push(value);
    }
    out
}

fn fill_constant(value: f64, data_type: DataType) -> Value {
    match data_type {
        DataType::Int => Value::Int(value as i64),
        DataType::Uint => Value::Uint(value as u64),
        DataType::Boolean => Value::Boolean(value != 0.0),
        _ => Value::Float(value),
    }
}
