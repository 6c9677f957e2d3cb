//! Periodic background jobs.
//!
//! Each [`PeriodicJob`] runs on its own tokio task driven by an interval.
//! A tick that fails is expected to log and return; the loop itself only
//! ends on shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest period a job may run at. Shorter periods, zero included, are
/// raised to this.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// A unit of recurring background work.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Time between two ticks.
    fn period(&self) -> Duration;

    /// Run one iteration. Callable directly in tests.
    async fn tick(&self);
}

/// Owns the tasks running periodic jobs.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
    running: AtomicBool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
        }
    }

    /// Start running `job` every `job.period()`.
    ///
    /// The first tick fires one full period after spawning.
    pub async fn spawn(&self, job: Arc<dyn PeriodicJob>) {
        if !self.is_running() {
            warn!("Scheduler is shut down, not starting {}", job.name());
            return;
        }

        let name = job.name().to_string();
        let mut period = job.period();
        if period < MIN_PERIOD {
            warn!(
                "Periodic job {} asked for {:?}, running every {:?} instead",
                name, period, MIN_PERIOD
            );
            period = MIN_PERIOD;
        }
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => job.tick().await,
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("Periodic job {} stopped", job.name());
        });

        info!("Started periodic job {} every {:?}", name, period);
        self.handles.lock().await.push((name, handle));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of job tasks still alive.
    pub async fn active_jobs(&self) -> usize {
        self.handles
            .lock()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Signal every job to stop and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<(String, JoinHandle<()>)> =
            self.handles.lock().await.drain(..).collect();
        let results = futures::future::join_all(
            handles
                .into_iter()
                .map(|(name, handle)| async move { (name, handle.await) }),
        )
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                warn!("Periodic job {} ended abnormally: {}", name, e);
            }
        }
        info!("Scheduler stopped");
    }
}
