//! Record decoding. A line that fails structured decode is never
//! dropped: it is synthesized into a visible error record carrying the
//! raw text, so the transcript never silently loses a line.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use agentdock_core::record::{ErrorRecord, StreamRecord};

/// Decode one newline-delimited line, or synthesize an error record.
pub fn parse_line(line: &str) -> StreamRecord {
    match serde_json::from_str::<StreamRecord>(line) {
        Ok(record) => record,
        Err(e) => {
            debug!("undecodable stream line ({e}): {line}");
            synthesize_error(line)
        }
    }
}

/// Decode one live-delivered record value, or synthesize.
pub fn parse_value(value: &Value) -> StreamRecord {
    match serde_json::from_value::<StreamRecord>(value.clone()) {
        Ok(record) => record,
        Err(e) => {
            debug!("undecodable stream record ({e})");
            synthesize_error(&value.to_string())
        }
    }
}

/// Decode one historical element. Elements may arrive pre-parsed as
/// structured data or as a JSON string; both are accepted. Anything
/// else is skipped with a log line. Returns the record together with
/// its newline-ledger form.
pub fn parse_history_element(value: &Value) -> Option<(StreamRecord, String)> {
    match value {
        Value::String(line) => Some((parse_line(line), line.clone())),
        Value::Object(_) => Some((parse_value(value), value.to_string())),
        other => {
            warn!("skipping non-record history element: {other}");
            None
        }
    }
}

fn synthesize_error(raw: &str) -> StreamRecord {
    StreamRecord::Error(ErrorRecord {
        message: Some("unrecognized stream record".to_owned()),
        raw_content: Some(raw.to_owned()),
        extra: Map::new(),
    })
}
