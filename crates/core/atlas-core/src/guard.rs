//! Stage-keyed exclusivity guards with retry.
//!
//! Fetches issued by one discovery stage are serialized process-wide through
//! a per-stage mutex, regardless of which address the stage is working on.
//! Distinct stages proceed concurrently. The table is an explicit registry
//! constructed at pipeline startup and passed by reference into every stage
//! context; entries are created lazily on first use and never torn down.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;

/// Registry mapping stage identifier → its exclusivity mutex.
#[derive(Default)]
pub struct GuardTable {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GuardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the mutex guarding the named stage.
    pub fn guard(&self, stage: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.inner.lock().expect("guard table poisoned");
        if let Some(existing) = table.get(stage) {
            return existing.clone();
        }
        tracing::debug!(target: "atlas_core", stage, "created exclusivity guard");
        let guard = Arc::new(tokio::sync::Mutex::new(()));
        table.insert(stage.to_string(), guard.clone());
        guard
    }
}

/// Run `op` while holding the named stage's mutex, retrying up to `retries`
/// attempts with `backoff` between them.
///
/// The lock is held across retries so a failing action cannot interleave
/// with another fetch of the same stage. Exhausting every attempt returns
/// the last error; callers treat that as "no fresh data" rather than a
/// pass failure.
pub async fn run_guarded<T, F, Fut>(
    guards: &GuardTable,
    stage: &str,
    retries: usize,
    backoff: Duration,
    op: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mutex = guards.guard(stage);
    let _held = mutex.lock().await;

    let attempts = retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                tracing::warn!(
                    target: "atlas_core",
                    stage,
                    attempt,
                    error = ?err,
                    "guarded action failed, backing off"
                );
                sleep(backoff).await;
            }
            Err(err) => {
                tracing::warn!(
                    target: "atlas_core",
                    stage,
                    attempts,
                    error = ?err,
                    "guarded action exhausted retries"
                );
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn same_stage_windows_never_overlap() {
        let guards = Arc::new(GuardTable::new());
        let windows = Arc::new(Mutex::new(Vec::<(Instant, Instant)>::new()));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let guards = guards.clone();
            let windows = windows.clone();
            tasks.push(tokio::spawn(async move {
                run_guarded(&guards, "contracts", 1, Duration::ZERO, || {
                    let windows = windows.clone();
                    async move {
                        let start = Instant::now();
                        sleep(Duration::from_millis(20)).await;
                        windows.lock().unwrap().push((start, Instant::now()));
                        Ok(())
                    }
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut windows = windows.lock().unwrap().clone();
        windows.sort_by_key(|(start, _)| *start);
        for pair in windows.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "guarded call windows overlap: {pair:?}"
            );
        }
    }

    #[tokio::test]
    async fn different_stages_do_not_serialize() {
        let guards = GuardTable::new();
        let a = guards.guard("contracts");
        let b = guards.guard("multisigs");
        // Holding one stage's guard must not block another stage.
        let _held = a.lock().await;
        assert!(b.try_lock().is_ok());
        // Same stage name resolves to the same mutex.
        assert!(guards.guard("contracts").try_lock().is_err());
    }

    #[tokio::test]
    async fn retries_then_surfaces_last_error() {
        let guards = GuardTable::new();
        let calls = AtomicUsize::new(0);
        let result: Result<()> = run_guarded(&guards, "contracts", 3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("upstream down") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let guards = GuardTable::new();
        let calls = AtomicUsize::new(0);
        let result = run_guarded(&guards, "contracts", 3, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    anyhow::bail!("rate limited")
                }
                Ok(42)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
