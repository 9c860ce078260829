use anyhow::{Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::WatchError;
use crate::metrics::{MetricsCollector, MetricsSnapshot};

use super::config::WatchConfig;
use super::loop_worker::{watch_loop, RunContext, WatchStatus};
use super::providers::Providers;
use super::state::WatchPhase;
use super::target::CaptureTarget;

/// Owns the background watch task: Idle → Running → {Done, Stopped} → Idle.
pub struct WatchController {
    handle: Option<JoinHandle<WatchPhase>>,
    cancel_token: Option<CancellationToken>,
    status_tx: watch::Sender<WatchStatus>,
    metrics: MetricsCollector,
}

impl WatchController {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(WatchStatus::default());
        Self {
            handle: None,
            cancel_token: None,
            status_tx,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> WatchStatus {
        self.status_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Validates the run and spawns the loop with a fresh run state.
    ///
    /// Invalid configuration never reaches `Running`.
    pub async fn start(
        &mut self,
        target: CaptureTarget,
        config: WatchConfig,
        providers: Providers,
    ) -> Result<Uuid, WatchError> {
        if self.is_running() {
            return Err(WatchError::AlreadyRunning);
        }
        config.validate()?;
        target.validate()?;

        // A finished run may still be parked here; drop it before replacing.
        self.handle = None;
        self.cancel_token = None;
        self.metrics.reset().await;

        let run_id = Uuid::new_v4();
        let cancel_token = CancellationToken::new();
        let ctx = RunContext {
            run_id,
            target,
            config,
            providers,
            status_tx: self.status_tx.clone(),
            metrics: self.metrics.clone(),
        };

        let handle = tokio::spawn(watch_loop(ctx, cancel_token.clone()));
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(run_id)
    }

    /// Cancels the run (if any) and waits for it to wind down.
    pub async fn stop(&mut self) -> Result<WatchPhase> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
            info!("Stop signal sent to watch loop");
        }
        self.join().await
    }

    /// Waits for the current run to reach a terminal phase on its own.
    pub async fn wait(&mut self) -> Result<WatchPhase> {
        let phase = self.join().await;
        self.cancel_token = None;
        phase
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.metrics.get_snapshot().await
    }

    async fn join(&mut self) -> Result<WatchPhase> {
        match self.handle.take() {
            Some(handle) => handle.await.context("watch loop task failed to join"),
            None => Ok(self.status().phase),
        }
    }
}

impl Default for WatchController {
    fn default() -> Self {
        Self::new()
    }
}
