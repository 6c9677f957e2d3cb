//! Control plane wiring.
//!
//! Owns the shared pending table and the components built around it, and
//! drives their lifecycle against one bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::ack::AckReconciler;
use crate::bus::BusClient;
use crate::command::RequestId;
use crate::config::{ControlConfig, TimingConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{BusResult, ControlResult};
use crate::mirror::StatusMirror;
use crate::pending::PendingRequestTable;
use crate::scheduler::Scheduler;
use crate::status::StatusStore;
use crate::sweeper::ExpirySweeper;
use crate::topic::Topics;

/// A dispatcher, reconciler, sweeper and status mirror sharing one bus.
pub struct ControlPlane {
    bus: Arc<dyn BusClient>,
    topics: Topics,
    pending: Arc<PendingRequestTable>,
    status: Arc<dyn StatusStore>,
    dispatcher: Arc<Dispatcher>,
    reconciler: Arc<AckReconciler>,
    sweeper: Arc<ExpirySweeper>,
    mirror: Arc<StatusMirror>,
    scheduler: Scheduler,
    started: AtomicBool,
}

impl ControlPlane {
    pub fn new(
        bus: Arc<dyn BusClient>,
        status: Arc<dyn StatusStore>,
        topics: Topics,
        timing: &TimingConfig,
    ) -> Self {
        let pending = Arc::new(PendingRequestTable::new());
        let dispatcher = Arc::new(Dispatcher::new(pending.clone(), bus.clone(), topics.clone()));
        let reconciler = Arc::new(AckReconciler::new(pending.clone(), bus.clone(), topics.clone()));
        let sweeper = Arc::new(ExpirySweeper::new(
            pending.clone(),
            timing.expiry(),
            timing.sweep_interval(),
        ));
        let mirror = Arc::new(StatusMirror::new(
            status.clone(),
            bus.clone(),
            topics.status_topic.clone(),
            timing.status_interval(),
        ));

        Self {
            bus,
            topics,
            pending,
            status,
            dispatcher,
            reconciler,
            sweeper,
            mirror,
            scheduler: Scheduler::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        config: &ControlConfig,
        bus: Arc<dyn BusClient>,
        status: Arc<dyn StatusStore>,
    ) -> Self {
        Self::new(bus, status, config.topics.clone(), &config.timing)
    }

    /// Subscribe to acknowledgments and start the background jobs.
    ///
    /// Calling it again is a no-op.
    pub async fn start(&self) -> BusResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let filter = self.topics.ack_filter();
        if let Err(e) = self.bus.subscribe(&filter, self.reconciler.clone()).await {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.scheduler.spawn(self.sweeper.clone()).await;
        self.scheduler.spawn(self.mirror.clone()).await;

        info!("Control plane started on {}", self.topics);
        Ok(())
    }

    /// Stop the background jobs. Pending requests are left in place.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!(
            "Control plane stopped with {} request(s) still pending",
            self.pending.len()
        );
    }

    pub async fn dispatch(&self, device_id: &str, action: &str) -> ControlResult<RequestId> {
        self.dispatcher.dispatch(device_id, action).await
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn pending(&self) -> &Arc<PendingRequestTable> {
        &self.pending
    }

    pub fn status_store(&self) -> &Arc<dyn StatusStore> {
        &self.status
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn reconciler(&self) -> &Arc<AckReconciler> {
        &self.reconciler
    }

    pub fn sweeper(&self) -> &Arc<ExpirySweeper> {
        &self.sweeper
    }

    pub fn mirror(&self) -> &Arc<StatusMirror> {
        &self.mirror
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
