use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested output shape, immutable for the query's lifetime. Serialized
/// as the numeric codes the client has always sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FormatOption {
    #[default]
    TimeSeries,
    Table,
    Logs,
    Trace,
    Multi,
}

impl TryFrom<u8> for FormatOption {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FormatOption::TimeSeries),
            1 => Ok(FormatOption::Table),
            2 => Ok(FormatOption::Logs),
            3 => Ok(FormatOption::Trace),
            4 => Ok(FormatOption::Multi),
            other => Err(format!("unknown format option: {other}")),
        }
    }
}

impl From<FormatOption> for u8 {
    fn from(value: FormatOption) -> Self {
        match value {
            FormatOption::TimeSeries => 0,
            FormatOption::Table => 1,
            FormatOption::Logs => 2,
            FormatOption::Trace => 3,
            FormatOption::Multi => 4,
        }
    }
}

impl fmt::Display for FormatOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatOption::TimeSeries => "time_series",
            FormatOption::Table => "table",
            FormatOption::Logs => "logs",
            FormatOption::Trace => "trace",
            FormatOption::Multi => "multi",
        };
        f.write_str(name)
    }
}

/// How to synthesize values for time buckets a series is missing during
/// the long-to-wide pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FillMode {
    #[default]
    Null,
    Previous,
    Value,
}

impl TryFrom<u8> for FillMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FillMode::Null),
            1 => Ok(FillMode::Previous),
            2 => Ok(FillMode::Value),
            other => Err(format!("unknown fill mode: {other}")),
        }
    }
}

impl From<FillMode> for u8 {
    fn from(value: FillMode) -> Self {
        match value {
            FillMode::Null => 0,
            FillMode::Previous => 1,
            FillMode::Value => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillPolicy {
    pub mode: FillMode,
    /// Only consulted when `mode` is `Value`.
    #[serde(default)]
    pub value: f64,
}

impl FillPolicy {
    pub fn null() -> Self {
        FillPolicy::default()
    }

    pub fn previous() -> Self {
        FillPolicy {
            mode: FillMode::Previous,
            value: 0.0,
        }
    }

    pub fn constant(value: f64) -> Self {
        FillPolicy {
            mode: FillMode::Value,
            value,
        }
    }
}

/// Parsed session request payload. Deserialized once, before the core
/// runs; field names are fixed by the client wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub ref_id: String,
    #[serde(default)]
    pub query_type: String,
    #[serde(default)]
    pub format: FormatOption,
    #[serde(default)]
    pub from_time: i64,
    #[serde(default)]
    pub to_time: i64,
    #[serde(default)]
    pub interval_ms: i64,
    #[serde(default)]
    pub max_data_points: i64,
    pub raw_sql: String,
    #[serde(default)]
    pub fill_mode: Option<FillPolicy>,
}

impl StreamQuery {
    pub fn new(ref_id: impl Into<String>, raw_sql: impl Into<String>) -> Self {
        StreamQuery {
            ref_id: ref_id.into(),
            query_type: String::new(),
            format: FormatOption::default(),
            from_time: 0,
            to_time: 0,
            interval_ms: 0,
            max_data_points: 0,
            raw_sql: raw_sql.into(),
            fill_mode: None,
        }
    }

    pub fn with_format(mut self, format: FormatOption) -> Self {
        self.format = format;
        self
    }

    pub fn with_fill(mut self, fill: FillPolicy) -> Self {
        self.fill_mode = Some(fill);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_client_payload() {
        let raw = r#"{
            "refId": "A",
            "queryType": "sql",
            "format": 4,
            "fromTime": 1700000000000,
            "toTime": 1700003600000,
            "intervalMs": 1000,
            "maxDataPoints": 500,
            "rawSql": "SELECT 1",
            "fillMode": {"mode": 2, "value": 1.5}
        }"#;
        let q: StreamQuery = serde_json::from_str(raw).unwrap();
        assert_eq!(q.ref_id, "A");
        assert_eq!(q.format, FormatOption::Multi);
        assert_eq!(q.fill_mode, Some(FillPolicy::constant(1.5)));
    }

    #[test]
    fn missing_optional_fields_default() {
        let q: StreamQuery =
            serde_json::from_str(r#"{"refId": "B", "rawSql": "SELECT 2"}"#).unwrap();
        assert_eq!(q.format, FormatOption::TimeSeries);
        assert!(q.fill_mode.is_none());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let res: Result<FormatOption, _> = serde_json::from_str("9");
        assert!(res.is_err());
    }
}
