//! Wire schema for out-of-band stream messages. This is the single owner
//! of the packet shapes; field names are part of the client contract and
//! must not drift.

use serde::{Deserialize, Serialize};

/// Bumped when any packet layout changes incompatibly.
pub const WIRE_SCHEMA_VERSION: u16 = 1;

/// Point-in-time execution progress. Counters are monotonic
/// non-decreasing within one query; packets carry no ordering guarantee
/// relative to frame delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressPacket {
    pub query_id: String,
    pub rows: u64,
    pub bytes: u64,
    pub elapsed_ms: u64,
}

/// Terminal end-of-stream marker, sent exactly once per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedPacket {
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPacket {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_field_names_are_stable() {
        let progress = ProgressPacket {
            query_id: "q1".into(),
            rows: 10,
            bytes: 256,
            elapsed_ms: 42,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"query_id": "q1", "rows": 10, "bytes": 256, "elapsed_ms": 42})
        );

        let completed = serde_json::to_value(CompletedPacket { completed: true }).unwrap();
        assert_eq!(completed, serde_json::json!({"completed": true}));

        let error = serde_json::to_value(ErrorPacket {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(error, serde_json::json!({"error": "boom"}));
    }
}
