//! Background reconciliation loop. The external running-set query is
//! authoritative for liveness; each tick force-refreshes reported runs
//! and collects entries whose run vanished without a terminal status.
//!
//! The tick is a free function so tests drive it directly; the loop is
//! a spawned task stepped by `tokio::time`, deterministic under a
//! paused test clock.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};
use tracing::{debug, warn};

use agentdock_core::backend::RunBackend;
use agentdock_core::error::BackendError;

use crate::cache::{CachedOutput, OutputCache};

/// Reference poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// One reconciliation pass over the cache.
pub async fn poll_tick<B: RunBackend>(
    backend: &B,
    cache: &Mutex<OutputCache>,
) -> Result<(), BackendError> {
    // 1. Authoritative liveness.
    let units = backend.list_running_units().await?;

    // 2. Force-refresh every reported run from its raw output.
    for unit in &units {
        match backend.fetch_raw_output(&unit.id).await {
            Ok(raw) => {
                let entry = CachedOutput::from_raw(&raw, unit.status);
                cache.lock().await.set(unit.id.clone(), entry);
            }
            Err(e) => warn!(run_id = %unit.id, "output refresh failed: {e}"),
        }
    }

    // 3. Collect entries whose run vanished mid-flight.
    let reported: HashSet<String> = units.into_iter().map(|u| u.id).collect();
    cache.lock().await.evict_vanished(&reported);
    Ok(())
}

/// Owned polling loop with an explicit start/stop lifecycle.
pub struct BackgroundPoller<B: RunBackend> {
    backend: Arc<B>,
    cache: Arc<Mutex<OutputCache>>,
    poll_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl<B: RunBackend> BackgroundPoller<B> {
    pub fn new(backend: Arc<B>, cache: Arc<Mutex<OutputCache>>) -> Self {
        Self {
            backend,
            cache,
            poll_interval: DEFAULT_POLL_INTERVAL,
            task: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn cache(&self) -> Arc<Mutex<OutputCache>> {
        Arc::clone(&self.cache)
    }

    /// Start polling. Idempotent: a live loop is left running.
    pub fn start(&mut self) {
        if self.is_polling() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let poll_interval = self.poll_interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                // A failed tick is logged and skipped; the cache is
                // never cleared by a failed query.
                match poll_tick(backend.as_ref(), &cache).await {
                    Ok(()) => debug!("poll tick complete"),
                    Err(e) => warn!("poll tick failed: {e}"),
                }
            }
        }));
    }

    /// Stop polling. Idempotent; never blocks.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<B: RunBackend> Drop for BackgroundPoller<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_core::types::{RunStatus, RunningUnit};
    use chrono::Utc;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn unit(id: &str, status: RunStatus) -> RunningUnit {
        RunningUnit {
            id: id.to_owned(),
            name: "reviewer".into(),
            task: "review the diff".into(),
            model: "default".into(),
            project_path: "/tmp/project".into(),
            session_id: Some(format!("sess-{id}")),
            status,
            started_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        units: StdMutex<Vec<RunningUnit>>,
        outputs: StdMutex<HashMap<String, String>>,
        list_calls: AtomicUsize,
        fail_listing: AtomicBool,
    }

    impl FakeBackend {
        fn report(&self, units: Vec<RunningUnit>) {
            *self.units.lock().expect("lock") = units;
        }

        fn output(&self, run_id: &str, raw: &str) {
            self.outputs
                .lock()
                .expect("lock")
                .insert(run_id.to_owned(), raw.to_owned());
        }
    }

    impl RunBackend for FakeBackend {
        async fn list_running_units(&self) -> Result<Vec<RunningUnit>, BackendError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(BackendError::Query("process registry offline".into()));
            }
            Ok(self.units.lock().expect("lock").clone())
        }

        async fn fetch_raw_output(&self, run_id: &str) -> Result<String, BackendError> {
            Ok(self
                .outputs
                .lock()
                .expect("lock")
                .get(run_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn subscribe(&self, run_id: &str) -> Result<UnboundedReceiver<Value>, BackendError> {
            Err(BackendError::Subscribe {
                run_id: run_id.to_owned(),
                detail: "not scripted".into(),
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
    async fn tick_refreshes_reported_runs() {
        let backend = FakeBackend::default();
        backend.report(vec![unit("run-1", RunStatus::Running)]);
        backend.output("run-1", "{\"type\":\"start\"}\n{\"type\":\"assistant\"}\n");
        let cache = Mutex::new(OutputCache::new());

        poll_tick(&backend, &cache).await.expect("tick");

        let guard = cache.lock().await;
        let entry = guard.get("run-1").expect("entry");
        assert_eq!(entry.messages.len(), 2);
        assert_eq!(entry.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn tick_overwrites_stale_entries() {
        let backend = FakeBackend::default();
        backend.report(vec![unit("run-1", RunStatus::Running)]);
        backend.output("run-1", "{\"type\":\"start\"}\n");
        let cache = Mutex::new(OutputCache::new());
        cache
            .lock()
            .await
            .set("run-1", CachedOutput::from_raw("stale", RunStatus::Pending));

        poll_tick(&backend, &cache).await.expect("tick");

        let guard = cache.lock().await;
        let entry = guard.get("run-1").expect("entry");
        assert_eq!(entry.messages.len(), 1);
        assert_eq!(entry.messages[0].kind(), "start");
        assert!(!entry.output.contains("stale"));
    }

    #[tokio::test]
    async fn tick_evicts_vanished_running_but_keeps_terminal() {
        let backend = FakeBackend::default();
        let cache = Mutex::new(OutputCache::new());
        cache
            .lock()
            .await
            .set("gone-running", CachedOutput::from_raw("", RunStatus::Running));
        cache.lock().await.set(
            "done",
            CachedOutput::from_raw("", RunStatus::Completed),
        );

        poll_tick(&backend, &cache).await.expect("tick");

        let guard = cache.lock().await;
        assert!(guard.get("gone-running").is_none());
        assert!(guard.get("done").is_some());
    }

    #[tokio::test]
    async fn failed_tick_leaves_cache_untouched() {
        let backend = FakeBackend::default();
        backend.fail_listing.store(true, Ordering::SeqCst);
        let cache = Mutex::new(OutputCache::new());
        cache
            .lock()
            .await
            .set("run-1", CachedOutput::from_raw("", RunStatus::Running));

        let err = poll_tick(&backend, &cache).await.expect_err("must fail");
        assert!(err.to_string().contains("offline"));
        assert!(cache.lock().await.get("run-1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_on_interval_and_stops() {
        let backend = Arc::new(FakeBackend::default());
        let cache = Arc::new(Mutex::new(OutputCache::new()));
        let mut poller = BackgroundPoller::new(Arc::clone(&backend), cache)
            .with_interval(Duration::from_secs(3));

        poller.start();
        assert!(poller.is_polling());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let ticks = backend.list_calls.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected >= 3 ticks, got {ticks}");

        poller.stop();
        assert!(!poller.is_polling());
        let after_stop = backend.list_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let backend = Arc::new(FakeBackend::default());
        let cache = Arc::new(Mutex::new(OutputCache::new()));
        let mut poller = BackgroundPoller::new(Arc::clone(&backend), cache)
            .with_interval(Duration::from_secs(3));

        poller.start();
        poller.start();
        assert!(poller.is_polling());

        tokio::time::sleep(Duration::from_secs(4)).await;
        // One loop, not two: at most the immediate tick plus one interval.
        assert!(backend.list_calls.load(Ordering::SeqCst) <= 2);

        poller.stop();
        poller.stop();
        assert!(!poller.is_polling());
    }

    #[tokio::test]
    async fn failing_loop_keeps_polling() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_listing.store(true, Ordering::SeqCst);
        let cache = Arc::new(Mutex::new(OutputCache::new()));
        let mut poller = BackgroundPoller::new(Arc::clone(&backend), cache)
            .with_interval(Duration::from_millis(5));

        poller.start();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(poller.is_polling(), "loop must survive failed ticks");
        assert!(backend.list_calls.load(Ordering::SeqCst) >= 2);
        poller.stop();
    }
}
