//! Headless transcript inspection: feed a recorded record batch through
//! the reconciler and print what a session tab would have shown.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use agentdock_core::record::StreamRecord;
use agentdock_stream::metrics::RunMetrics;
use agentdock_stream::session::SessionStream;

const EXCERPT_LEN: usize = 80;

pub async fn cmd_replay(transcript: &Path, show_metrics: bool) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(transcript)
        .await
        .with_context(|| format!("reading transcript {}", transcript.display()))?;

    let mut stream = SessionStream::new();
    stream.ingest_batch(&raw);

    for record in stream.messages() {
        println!("{}", describe(record));
    }

    if let Some(session_id) = stream.current_session_id() {
        println!("--- session: {session_id}");
    }
    if show_metrics {
        let metrics = RunMetrics::from_records(stream.messages());
        println!(
            "--- {} records, {} tokens, cost {}, duration {}",
            metrics.message_count,
            metrics.total_tokens,
            metrics
                .cost_usd
                .map_or("n/a".to_owned(), |c| format!("${c:.4}")),
            metrics
                .duration_ms
                .map_or("n/a".to_owned(), |ms| format!("{ms}ms")),
        );
    }
    Ok(())
}

fn describe(record: &StreamRecord) -> String {
    let detail = match record {
        StreamRecord::System(sys) => sys.subtype.clone().unwrap_or_default(),
        StreamRecord::Assistant(msg) | StreamRecord::User(msg) => msg
            .message
            .as_ref()
            .map(message_excerpt)
            .unwrap_or_default(),
        StreamRecord::Result(res) => res
            .subtype
            .clone()
            .or_else(|| res.raw_content.clone())
            .unwrap_or_default(),
        StreamRecord::Start(_) => String::new(),
        StreamRecord::Partial(partial) => partial
            .tool_calls
            .iter()
            .map(|f| {
                format!(
                    "tool-{} +{}b",
                    f.index,
                    f.arguments_delta.as_deref().map_or(0, str::len)
                )
            })
            .collect::<Vec<_>>()
            .join(" "),
        StreamRecord::Response(_) => String::new(),
        StreamRecord::Error(err) => err
            .message
            .clone()
            .or_else(|| err.raw_content.clone())
            .unwrap_or_default(),
        StreamRecord::SessionInfo(info) => info.session_id.clone().unwrap_or_default(),
    };
    format!("[{:>12}] {}", record.kind(), truncate(&detail))
}

/// Pull a readable excerpt out of a message body: a plain string
/// `content`, or the first text block of a structured content array.
fn message_excerpt(message: &Value) -> String {
    match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .find_map(|b| b.get("text").and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned(),
        _ => String::new(),
    }
}

fn truncate(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= EXCERPT_LEN {
        flat
    } else {
        let head: String = flat.chars().take(EXCERPT_LEN - 1).collect();
        format!("{head}\u{2026}")
    }
}
