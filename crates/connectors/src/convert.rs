use crate::{cursor::ColumnInfo, error::ConvertError};
use lazy_static::lazy_static;
use model::{
    core::{data_type::DataType, value::Value},
    frame::field::Field,
};

/// How a converter decides whether it handles a native column type.
/// Matching is case-insensitive; parenthesized size suffixes are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMatch {
    Exact(&'static str),
    Prefix(&'static str),
    Any,
}

impl TypeMatch {
    fn matches(&self, native_type: &str) -> bool {
        let normalized = normalize_type_name(native_type);
        match self {
            TypeMatch::Exact(name) => normalized == *name,
            TypeMatch::Prefix(prefix) => normalized.starts_with(prefix),
            TypeMatch::Any => true,
        }
    }
}

fn normalize_type_name(native_type: &str) -> String {
    let trimmed = native_type.trim().to_ascii_lowercase();
    match trimmed.split_once('(') {
        Some((base, _)) => base.trim().to_string(),
        None => trimmed,
    }
}

/// Maps one native column type to a typed frame field and coerces scanned
/// cells into that type.
#[derive(Debug, Clone, Copy)]
pub struct Converter {
    pub name: &'static str,
    pub input_type: TypeMatch,
    pub data_type: DataType,
    pub nullable: bool,
    coerce: fn(Value) -> Option<Value>,
}

impl Converter {
    pub fn new(
        name: &'static str,
        input_type: TypeMatch,
        data_type: DataType,
        coerce: fn(Value) -> Option<Value>,
    ) -> Self {
        Converter {
            name,
            input_type,
            data_type,
            nullable: true,
            coerce,
        }
    }

    pub fn field_for(&self, column: &ColumnInfo) -> Field {
        Field::new(column.name.clone(), self.data_type, self.nullable)
    }

    /// Coerce one scanned cell into this converter's column type.
    pub fn convert(
        &self,
        column: &str,
        cell: Option<Value>,
    ) -> Result<Option<Value>, ConvertError> {
        let Some(value) = cell else {
            if !self.nullable {
                return Err(ConvertError::UnexpectedNull {
                    column: column.to_string(),
                });
            }
            return Ok(None);
        };
        let found = value.data_type().as_str();
        match (self.coerce)(value) {
            Some(converted) => Ok(Some(converted)),
            None => Err(ConvertError::TypeMismatch {
                column: column.to_string(),
                found,
                expected: self.data_type.as_str(),
            }),
        }
    }
}

fn coerce_time(value: Value) -> Option<Value> {
    value.as_time().map(Value::Time)
}

fn coerce_int(value: Value) -> Option<Value> {
    match value {
        Value::Int(v) => Some(Value::Int(v)),
        Value::Uint(v) => i64::try_from(v).ok().map(Value::Int),
        other => other.as_i64().map(Value::Int),
    }
}

fn coerce_uint(value: Value) -> Option<Value> {
    match value {
        Value::Uint(v) => Some(Value::Uint(v)),
        Value::Int(v) => u64::try_from(v).ok().map(Value::Uint),
        other => other.as_i64().and_then(|v| u64::try_from(v).ok()).map(Value::Uint),
    }
}

fn coerce_float(value: Value) -> Option<Value> {
    value.as_f64().map(Value::Float)
}

fn coerce_bool(value: Value) -> Option<Value> {
    value.as_bool().map(Value::Boolean)
}

fn coerce_string(value: Value) -> Option<Value> {
    Some(Value::String(value.as_string()))
}

lazy_static! {
    static ref DEFAULT_CONVERTERS: Vec<Converter> = vec![
        Converter::new("timestamp", TypeMatch::Prefix("timestamp"), DataType::Time, coerce_time),
        Converter::new("datetime", TypeMatch::Prefix("datetime"), DataType::Time, coerce_time),
        Converter::new("date", TypeMatch::Exact("date"), DataType::Time, coerce_time),
        Converter::new("uint", TypeMatch::Prefix("uint"), DataType::Uint, coerce_uint),
        Converter::new("unsigned", TypeMatch::Prefix("unsigned"), DataType::Uint, coerce_uint),
        Converter::new("bigint", TypeMatch::Exact("bigint"), DataType::Int, coerce_int),
        Converter::new("int", TypeMatch::Prefix("int"), DataType::Int, coerce_int),
        Converter::new("smallint", TypeMatch::Exact("smallint"), DataType::Int, coerce_int),
        Converter::new("tinyint", TypeMatch::Exact("tinyint"), DataType::Int, coerce_int),
        Converter::new("float", TypeMatch::Prefix("float"), DataType::Float, coerce_float),
        Converter::new("double", TypeMatch::Prefix("double"), DataType::Float, coerce_float),
        Converter::new("real", TypeMatch::Exact("real"), DataType::Float, coerce_float),
        Converter::new("decimal", TypeMatch::Prefix("decimal"), DataType::Float, coerce_float),
        Converter::new("numeric", TypeMatch::Prefix("numeric"), DataType::Float, coerce_float),
        Converter::new("bool", TypeMatch::Prefix("bool"), DataType::Boolean, coerce_bool),
    ];
    static ref FALLBACK_CONVERTER: Converter =
        Converter::new("string", TypeMatch::Any, DataType::String, coerce_string);
}

/// Ordered list of converters; the first matching entry wins, with a
/// string fallback for anything unrecognized.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: Vec<Converter>,
}

impl ConverterRegistry {
    pub fn new(converters: Vec<Converter>) -> Self {
        ConverterRegistry { converters }
    }

    pub fn with_defaults() -> Self {
        ConverterRegistry::new(DEFAULT_CONVERTERS.clone())
    }

    /// Driver-specific converters are consulted before the defaults.
    pub fn with_extra(extra: Vec<Converter>) -> Self {
        let mut converters = extra;
        converters.extend(DEFAULT_CONVERTERS.iter().copied());
        ConverterRegistry::new(converters)
    }

    pub fn converter_for(&self, column: &ColumnInfo) -> Converter {
        self.converters
            .iter()
            .find(|c| c.input_type.matches(&column.native_type))
            .copied()
            .unwrap_or(*FALLBACK_CONVERTER)
    }

    /// Resolve one converter per column and build the matching empty
    /// fields, in column order.
    pub fn make_schema(&self, columns: &[ColumnInfo]) -> (Vec<Field>, Vec<Converter>) {
        let converters: Vec<Converter> =
            columns.iter().map(|c| self.converter_for(c)).collect();
        let fields = columns
            .iter()
            .zip(&converters)
            .map(|(column, converter)| converter.field_for(column))
            .collect();
        (fields, converters)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        ConverterRegistry::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn first_match_wins_and_fallback_is_string() {
        let registry = ConverterRegistry::with_defaults();

        let ts = registry.converter_for(&ColumnInfo::new("t", "Timestamp(3)"));
        assert_eq!(ts.data_type, DataType::Time);

        let num = registry.converter_for(&ColumnInfo::new("v", "DOUBLE PRECISION"));
        assert_eq!(num.data_type, DataType::Float);

        let unknown = registry.converter_for(&ColumnInfo::new("x", "geometry"));
        assert_eq!(unknown.data_type, DataType::String);
    }

    #[test]
    fn extra_converters_take_precedence() {
        fn as_float(value: Value) -> Option<Value> {
            value.as_f64().map(Value::Float)
        }
        let registry = ConverterRegistry::with_extra(vec![Converter::new(
            "bigint-as-float",
            TypeMatch::Exact("bigint"),
            DataType::Float,
            as_float,
        )]);
        let c = registry.converter_for(&ColumnInfo::new("v", "BIGINT"));
        assert_eq!(c.data_type, DataType::Float);
    }

    #[test]
    fn converts_epoch_millis_into_time() {
        let registry = ConverterRegistry::with_defaults();
        let c = registry.converter_for(&ColumnInfo::new("t", "timestamp"));
        let out = c.convert("t", Some(Value::Int(1_700_000_000_000))).unwrap();
        assert_eq!(
            out,
            Some(Value::Time(
                Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
            ))
        );
    }

    #[test]
    fn mismatch_is_an_error() {
        let registry = ConverterRegistry::with_defaults();
        let c = registry.converter_for(&ColumnInfo::new("v", "float64"));
        let err = c
            .convert("v", Some(Value::Time(Utc::now())))
            .unwrap_err();
        assert!(matches!(err, ConvertError::TypeMismatch { .. }));
    }
}
