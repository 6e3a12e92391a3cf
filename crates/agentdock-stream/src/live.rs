//! Live subscription pump: applies backend-delivered records in order
//! to an owned [`SessionStream`] and publishes snapshots and notices.
//! Cancellation is fire-and-forget — aborting the pump never blocks,
//! and an in-flight delivery is simply discarded.

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use agentdock_core::backend::RunBackend;
use agentdock_core::error::BackendError;

use crate::session::{SessionStream, StreamNotice, StreamSnapshot};

/// Handle to a running listener. Tracked per tab/run and explicitly
/// invoked on removal.
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn unsubscribe(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A live, reconciling view over one run's event stream.
#[derive(Debug)]
pub struct LiveStream {
    snapshots: watch::Receiver<StreamSnapshot>,
    notices: UnboundedReceiver<StreamNotice>,
    handle: ListenerHandle,
}

impl LiveStream {
    /// Subscribe to `run_id` and start the pump task.
    pub async fn attach<B: RunBackend>(backend: &B, run_id: &str) -> Result<Self, BackendError> {
        let records = backend.subscribe(run_id).await?;
        let (snapshot_tx, snapshot_rx) = watch::channel(StreamSnapshot::default());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let run_id = run_id.to_owned();
        let task = tokio::spawn(async move {
            pump(records, snapshot_tx, notice_tx).await;
            debug!("live stream for {run_id} ended");
        });

        Ok(Self {
            snapshots: snapshot_rx,
            notices: notice_rx,
            handle: ListenerHandle { task },
        })
    }

    /// Current and future snapshots. Each send replaces the previous
    /// value; readers always observe the newest state.
    pub fn snapshots(&self) -> watch::Receiver<StreamSnapshot> {
        self.snapshots.clone()
    }

    /// Next out-of-band notice, or `None` once the stream has ended.
    pub async fn next_notice(&mut self) -> Option<StreamNotice> {
        self.notices.recv().await
    }

    pub fn unsubscribe(&self) {
        self.handle.unsubscribe();
    }
}

async fn pump(
    mut records: UnboundedReceiver<Value>,
    snapshot_tx: watch::Sender<StreamSnapshot>,
    notice_tx: UnboundedSender<StreamNotice>,
) {
    let mut stream = SessionStream::new();
    while let Some(value) = records.recv().await {
        for notice in stream.ingest_value(&value) {
            if notice_tx.send(notice).is_err() {
                // All consumers gone; keep reconciling for snapshot readers.
                break;
            }
        }
        if snapshot_tx.send(stream.snapshot()).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_core::types::RunningUnit;
    use std::sync::Mutex;

    /// Backend double: hands out pre-wired record receivers.
    struct ScriptedBackend {
        receivers: Mutex<Vec<UnboundedReceiver<Value>>>,
    }

    impl ScriptedBackend {
        fn with_channel() -> (Self, UnboundedSender<Value>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    receivers: Mutex::new(vec![rx]),
                },
                tx,
            )
        }
    }

    impl RunBackend for ScriptedBackend {
        async fn list_running_units(&self) -> Result<Vec<RunningUnit>, BackendError> {
            Ok(Vec::new())
        }

        async fn fetch_raw_output(&self, _run_id: &str) -> Result<String, BackendError> {
            Ok(String::new())
        }

        async fn subscribe(&self, run_id: &str) -> Result<UnboundedReceiver<Value>, BackendError> {
            self.receivers
                .lock()
                .expect("lock")
                .pop()
                .ok_or_else(|| BackendError::Subscribe {
                    run_id: run_id.to_owned(),
                    detail: "no channel scripted".into(),
                })
        }

        async fn fetch_history(
            &self,
            _session_id: &str,
            _project_id: Option<&str>,
        ) -> Result<Vec<Value>, BackendError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn delivers_records_in_order() {
        let (backend, tx) = ScriptedBackend::with_channel();
        let live = LiveStream::attach(&backend, "run-1").await.expect("attach");
        let mut snapshots = live.snapshots();

        tx.send(serde_json::json!({"type": "start"})).expect("send");
        tx.send(serde_json::json!({"type": "assistant", "message": {"content": "hi"}}))
            .expect("send");

        let snapshot = loop {
            snapshots.changed().await.expect("changed");
            let snap = snapshots.borrow().clone();
            if snap.messages.len() == 2 {
                break snap;
            }
        };
        assert_eq!(snapshot.messages[0].kind(), "start");
        assert_eq!(snapshot.messages[1].kind(), "assistant");
        assert!(snapshot.is_streaming);
    }

    #[tokio::test]
    async fn notices_flow_through() {
        let (backend, tx) = ScriptedBackend::with_channel();
        let mut live = LiveStream::attach(&backend, "run-1").await.expect("attach");

        tx.send(serde_json::json!({
            "type": "session_info", "session_id": "s-1", "project_id": "p-1"
        }))
        .expect("send");

        match live.next_notice().await.expect("notice") {
            StreamNotice::SessionInfo(info) => assert_eq!(info.session_id, "s-1"),
            other => panic!("unexpected notice: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_stops_the_pump() {
        let (backend, tx) = ScriptedBackend::with_channel();
        let live = LiveStream::attach(&backend, "run-1").await.expect("attach");
        live.unsubscribe();

        // Give the abort a chance to land, then confirm the task is gone.
        tokio::task::yield_now().await;
        for _ in 0..100 {
            if live.handle.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert!(live.handle.is_finished());
        drop(tx);
    }

    #[tokio::test]
    async fn subscribe_failure_propagates() {
        let backend = ScriptedBackend {
            receivers: Mutex::new(Vec::new()),
        };
        let err = LiveStream::attach(&backend, "run-x")
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("run-x"));
    }
}
