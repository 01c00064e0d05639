use serde::{Deserialize, Serialize};
use std::fmt;

/// Preferred visualization hint carried to the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisType {
    #[default]
    Graph,
    Table,
    Logs,
    Trace,
}

impl VisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisType::Graph => "graph",
            VisType::Table => "table",
            VisType::Logs => "logs",
            VisType::Trace => "trace",
        }
    }
}

impl fmt::Display for VisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame shape marker, set when a frame has been normalized into a known
/// time-series layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FrameType {
    TimeSeriesLong,
    TimeSeriesWide,
    TimeSeriesMulti,
}

/// Version tag of the frame schema, bumped when the layout contract
/// changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameTypeVersion(pub u16, pub u16);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FrameMeta {
    pub executed_query_string: String,
    pub preferred_visualization: VisType,
    pub frame_type: Option<FrameType>,
    pub type_version: Option<FrameTypeVersion>,
}
