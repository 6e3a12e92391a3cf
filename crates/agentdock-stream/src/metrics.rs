//! Run metrics derived from a reconstructed record set: message count,
//! token total, reported cost, and wall-clock duration.

use serde_json::Value;

use agentdock_core::record::StreamRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub message_count: usize,
    /// Cumulative token total. Usage counters are cumulative across the
    /// session, so the last usage-bearing record wins — never summed.
    pub total_tokens: u64,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<i64>,
}

impl RunMetrics {
    pub fn from_records(records: &[StreamRecord]) -> Self {
        let total_tokens = records
            .iter()
            .rev()
            .find_map(|r| r.usage())
            .map(|u| u.total())
            .unwrap_or(0);

        let cost_usd = records.iter().rev().find_map(reported_cost);

        let mut timestamps = records.iter().filter_map(StreamRecord::timestamp);
        let first = timestamps.next();
        let last = timestamps.last().or(first);
        let duration_ms = match (first, last) {
            (Some(a), Some(b)) => Some((b - a).num_milliseconds()),
            _ => None,
        };

        Self {
            message_count: records.len(),
            total_tokens,
            cost_usd,
            duration_ms,
        }
    }
}

fn reported_cost(record: &StreamRecord) -> Option<f64> {
    let extra = match record {
        StreamRecord::Result(r) => &r.extra,
        StreamRecord::Response(r) => &r.extra,
        _ => return None,
    };
    extra
        .get("total_cost_usd")
        .or_else(|| extra.get("cost_usd"))
        .and_then(Value::as_f64)
}
