//! Periodic background jobs (token sweep, lock pruning)
//!
//! Each job runs on its own interval until [`BackgroundTasks::shutdown`].
//! A panicking run is logged and the next tick runs again.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct PeriodicJob {
    name: &'static str,
    period: Duration,
    handle: JoinHandle<()>,
}

/// Owns the periodic jobs and their shared shutdown signal.
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.spawn_periodic("token_sweep", Duration::from_secs(300), move || {
///     let tokens = tokens.clone();
///     async move { let _ = tokens.sweep().await; }
/// });
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    jobs: Vec<PeriodicJob>,
    shutdown: CancellationToken,
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Run `job` every `period` until shutdown. The first run happens after
    /// one full period; a slow run delays the next tick instead of bursting.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // skip immediate

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(panic) = AssertUnwindSafe(job()).catch_unwind().await {
                            tracing::error!(
                                job = name,
                                panic = %panic_message(panic.as_ref()),
                                "Periodic job panicked"
                            );
                        }
                    }
                }
            }
            tracing::debug!(job = name, "Periodic job stopped");
        });

        tracing::debug!(job = name, period_secs = period.as_secs(), "Registered periodic job");
        self.jobs.push(PeriodicJob {
            name,
            period,
            handle,
        });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn log_summary(&self) {
        for job in &self.jobs {
            tracing::info!(job = job.name, period_secs = job.period.as_secs(), "Periodic job scheduled");
        }
    }

    /// Cancel every job and wait for the in-flight runs to finish.
    pub async fn shutdown(self) {
        tracing::info!("Stopping {} periodic jobs...", self.jobs.len());
        self.shutdown.cancel();

        for job in self.jobs {
            if let Err(e) = job.handle.await {
                tracing::error!(job = job.name, error = ?e, "Periodic job ended abnormally");
            }
        }

        tracing::info!("All periodic jobs stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn periodic_job_runs_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut tasks = BackgroundTasks::new();
        let counter = runs.clone();
        tasks.spawn_periodic("tick", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        tasks.shutdown().await;

        let seen = runs.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several runs, got {seen}");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn panicking_run_does_not_stop_the_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut tasks = BackgroundTasks::new();
        let counter = runs.clone();
        tasks.spawn_periodic("flaky", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        tasks.shutdown().await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
