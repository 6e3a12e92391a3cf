//! Stream-record model: the tagged sum type over the closed record-kind
//! set emitted by a session process, plus the cumulative usage counters.
//!
//! Unknown fields are preserved in a flattened `extra` map so a wire
//! addition never fails decode; new record *kinds* are a compile-time
//! decision (exhaustive match at the parse boundary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Usage ────────────────────────────────────────────────────────

/// Token counters carried by a record. Cumulative across a session,
/// not per-record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// ─── Record bodies ────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Raw text for lines that could not be decoded structurally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRecord {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One streamed fragment of a tool call. `index` is stable for the
/// lifetime of the block and keys the partial accumulator.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The fragment delivered by this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_delta: Option<String>,
    /// Concatenation-so-far, attached by the reconciler so downstream
    /// consumers need not re-derive it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accumulated: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Raw text for lines that could not be decoded structurally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfoRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ─── Record ───────────────────────────────────────────────────────

/// One record of a session's append-only output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    System(SystemRecord),
    Assistant(MessageRecord),
    User(MessageRecord),
    Result(ResultRecord),
    Start(StartRecord),
    Partial(PartialRecord),
    Response(ResponseRecord),
    Error(ErrorRecord),
    SessionInfo(SessionInfoRecord),
}

impl StreamRecord {
    /// Wire name of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::Assistant(_) => "assistant",
            Self::User(_) => "user",
            Self::Result(_) => "result",
            Self::Start(_) => "start",
            Self::Partial(_) => "partial",
            Self::Response(_) => "response",
            Self::Error(_) => "error",
            Self::SessionInfo(_) => "session_info",
        }
    }

    /// Cumulative usage carried by this record, wherever the producer
    /// put it: a top-level `usage` object, or nested under `message`.
    pub fn usage(&self) -> Option<TokenUsage> {
        let (top, message) = match self {
            Self::Assistant(m) | Self::User(m) => (m.usage, m.message.as_ref()),
            Self::Result(r) => (r.usage, None),
            Self::Response(r) => (r.usage, None),
            _ => (None, None),
        };
        top.or_else(|| {
            message
                .and_then(|m| m.get("usage"))
                .and_then(|u| serde_json::from_value(u.clone()).ok())
        })
    }

    /// Producer timestamp, when present in the record's extra fields.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.extra()
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    fn extra(&self) -> &Map<String, Value> {
        match self {
            Self::System(r) => &r.extra,
            Self::Assistant(r) | Self::User(r) => &r.extra,
            Self::Result(r) => &r.extra,
            Self::Start(r) => &r.extra,
            Self::Partial(r) => &r.extra,
            Self::Response(r) => &r.extra,
            Self::Error(r) => &r.extra,
            Self::SessionInfo(r) => &r.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_decode_by_kind() {
        let rec: StreamRecord =
            serde_json::from_str(r#"{"type":"system","subtype":"init","session_id":"s-1"}"#)
                .expect("decode");
        assert_eq!(rec.kind(), "system");
        match rec {
            StreamRecord::System(sys) => {
                assert_eq!(sys.subtype.as_deref(), Some("init"));
                assert_eq!(sys.session_id.as_deref(), Some("s-1"));
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let raw = r#"{"type":"assistant","message":{"role":"assistant"},"model_hint":"fast"}"#;
        let rec: StreamRecord = serde_json::from_str(raw).expect("decode");
        let json = serde_json::to_value(&rec).expect("encode");
        assert_eq!(json["model_hint"], "fast");
        assert_eq!(json["type"], "assistant");
    }

    #[test]
    fn usage_from_top_level() {
        let rec: StreamRecord = serde_json::from_str(
            r#"{"type":"response","usage":{"input_tokens":120,"output_tokens":40}}"#,
        )
        .expect("decode");
        let usage = rec.usage().expect("usage present");
        assert_eq!(usage.total(), 160);
    }

    #[test]
    fn usage_nested_under_message() {
        let rec: StreamRecord = serde_json::from_str(
            r#"{"type":"assistant","message":{"usage":{"input_tokens":7,"output_tokens":3}}}"#,
        )
        .expect("decode");
        let usage = rec.usage().expect("usage present");
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.output_tokens, 3);
    }

    #[test]
    fn usage_absent_on_non_carriers() {
        let rec: StreamRecord = serde_json::from_str(r#"{"type":"start"}"#).expect("decode");
        assert!(rec.usage().is_none());
    }

    #[test]
    fn partial_fragment_decode() {
        let rec: StreamRecord = serde_json::from_str(
            r#"{"type":"partial","tool_calls":[{"index":2,"name":"bash","arguments_delta":"ls"}]}"#,
        )
        .expect("decode");
        match rec {
            StreamRecord::Partial(p) => {
                assert_eq!(p.tool_calls.len(), 1);
                assert_eq!(p.tool_calls[0].index, 2);
                assert_eq!(p.tool_calls[0].arguments_delta.as_deref(), Some("ls"));
                assert!(p.tool_calls[0].accumulated.is_none());
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn timestamp_parsed_from_extra() {
        let rec: StreamRecord = serde_json::from_str(
            r#"{"type":"user","timestamp":"2026-03-01T10:30:00Z"}"#,
        )
        .expect("decode");
        let ts = rec.timestamp().expect("timestamp");
        assert_eq!(ts.to_rfc3339(), "2026-03-01T10:30:00+00:00");
    }

    #[test]
    fn session_info_wire_name() {
        let rec: StreamRecord =
            serde_json::from_str(r#"{"type":"session_info","session_id":"s-9","project_id":"p-1"}"#)
                .expect("decode");
        assert_eq!(rec.kind(), "session_info");
    }

    #[test]
    fn unknown_kind_fails_decode() {
        let err = serde_json::from_str::<StreamRecord>(r#"{"type":"hologram"}"#);
        assert!(err.is_err());
    }
}
