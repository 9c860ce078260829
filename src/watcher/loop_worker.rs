use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::WatchError;
use crate::metrics::{CycleMetrics, MetricsCollector};

use super::config::WatchConfig;
use super::fingerprint::{binarize, PixelFingerprint};
use super::providers::Providers;
use super::state::{RunState, Verdict, WatchPhase};
use super::target::CaptureTarget;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const STEP_TIMEOUT_SECS: u64 = 10;
const NOTIFY_WAIT_SECS: u64 = 2;

/// What the control surface sees of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatus {
    pub phase: WatchPhase,
    pub message: String,
    pub cycles: u64,
}

impl Default for WatchStatus {
    fn default() -> Self {
        Self {
            phase: WatchPhase::Idle,
            message: "Idle".into(),
            cycles: 0,
        }
    }
}

pub struct RunContext {
    pub run_id: Uuid,
    pub target: CaptureTarget,
    pub config: WatchConfig,
    pub providers: Providers,
    pub status_tx: watch::Sender<WatchStatus>,
    pub metrics: MetricsCollector,
}

impl RunContext {
    fn publish(&self, phase: WatchPhase, message: String, cycles: u64) {
        self.status_tx.send_replace(WatchStatus {
            phase,
            message,
            cycles,
        });
    }
}

/// One flag per blocking step, set while a worker for that step is alive.
///
/// A step that timed out keeps its worker thread until the provider call
/// returns; later cycles skip instead of stacking more workers behind it.
#[derive(Default)]
struct StepWorkers {
    capture: Arc<AtomicBool>,
    fingerprint: Arc<AtomicBool>,
    ocr: Arc<AtomicBool>,
}

/// Clears a step's busy flag when its worker finishes, even by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs cycles until the target settles or `cancel_token` fires.
///
/// Returns the terminal phase. The only suspension between cycles is the
/// poll sleep, which is raced against cancellation.
pub async fn watch_loop(ctx: RunContext, cancel_token: CancellationToken) -> WatchPhase {
    let poll = ctx.config.poll_interval();
    let mut state = RunState::new(Instant::now());
    let workers = StepWorkers::default();
    let mut cycles: u64 = 0;

    log_info!(
        "watch {} started on {} (poll={:?}, stable={:?})",
        ctx.run_id,
        ctx.target,
        poll,
        ctx.config.stable_threshold()
    );
    ctx.publish(
        WatchPhase::Running,
        format!("Watching ({})...", ctx.target.mode()),
        cycles,
    );

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        cycles += 1;
        match run_cycle(&ctx, &workers, &mut state).await {
            Ok(verdict) => {
                log_debug!(
                    "watch {} cycle {}: pixels_changed={} text_changed={} {}",
                    ctx.run_id,
                    cycles,
                    verdict.pixels_changed,
                    verdict.text_changed,
                    verdict.status_line()
                );
                ctx.publish(WatchPhase::Running, verdict.status_line(), cycles);

                if verdict.done {
                    notify_once(&ctx).await;
                    log_info!("watch {} done after {} cycles", ctx.run_id, cycles);
                    ctx.publish(
                        WatchPhase::Done,
                        format!("Done. {}", verdict.status_line()),
                        cycles,
                    );
                    return WatchPhase::Done;
                }
            }
            Err(err) => {
                log_warn!("watch {} cycle {} skipped: {err}", ctx.run_id, cycles);
                ctx.publish(WatchPhase::Running, err.to_string(), cycles);
            }
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(poll) => {}
        }
    }

    log_info!("watch {} stopped after {} cycles", ctx.run_id, cycles);
    ctx.publish(WatchPhase::Stopped, "Stopped.".into(), cycles);
    WatchPhase::Stopped
}

/// One capture → fingerprint → OCR → decide pass.
///
/// A capture failure skips the cycle; a recognition failure keeps the
/// previous text snapshot.
async fn run_cycle(
    ctx: &RunContext,
    workers: &StepWorkers,
    state: &mut RunState,
) -> Result<Verdict, WatchError> {
    let cycle_start = Instant::now();

    let capture_start = Instant::now();
    let frames = Arc::clone(&ctx.providers.frames);
    let target = ctx.target;
    let captured = run_blocking(
        &workers.capture,
        step_timeout(),
        WatchError::CaptureUnavailable,
        move || frames.capture(&target),
    )
    .await;
    let capture_ms = elapsed_ms(capture_start);

    let image = match captured {
        Ok(image) => image,
        Err(err) => {
            record(ctx, capture_ms, 0, None, Some(err.to_string()), false, cycle_start).await;
            return Err(err);
        }
    };

    let fingerprint_start = Instant::now();
    let (fingerprint, binary) = run_blocking(
        &workers.fingerprint,
        step_timeout(),
        WatchError::CaptureUnavailable,
        move || Ok((PixelFingerprint::from_image(&image), binarize(&image))),
    )
    .await?;
    let fingerprint_ms = elapsed_ms(fingerprint_start);

    let ocr_start = Instant::now();
    let recognizer = Arc::clone(&ctx.providers.recognizer);
    let recognized = run_blocking(
        &workers.ocr,
        step_timeout(),
        WatchError::RecognitionFailure,
        move || recognizer.recognize(&binary),
    )
    .await;
    let text = match recognized {
        Ok(text) => Some(text),
        Err(err) => {
            log_warn!("watch {}: {err}; keeping previous text", ctx.run_id);
            None
        }
    };
    let ocr_ms = elapsed_ms(ocr_start);

    let verdict = state.observe(fingerprint, text.as_deref(), Instant::now(), &ctx.config);

    record(
        ctx,
        capture_ms,
        fingerprint_ms,
        Some(ocr_ms),
        None,
        text.is_none(),
        cycle_start,
    )
    .await;

    Ok(verdict)
}

fn step_timeout() -> Duration {
    Duration::from_secs(STEP_TIMEOUT_SECS)
}

/// Runs `work` on the blocking pool under `timeout`, unless the previous
/// worker for the same step is still stuck.
///
/// Join failures, timeouts and the busy case are reported through
/// `classify` so they land in the same bucket as the step's own errors.
async fn run_blocking<T, F>(
    busy: &Arc<AtomicBool>,
    timeout: Duration,
    classify: fn(String) -> WatchError,
    work: F,
) -> Result<T, WatchError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, WatchError> + Send + 'static,
{
    if busy.swap(true, Ordering::SeqCst) {
        return Err(classify("previous call has not returned yet".into()));
    }
    let guard = BusyGuard(Arc::clone(busy));
    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work()
    });
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(classify(format!("worker join failed: {join_err}"))),
        Err(_) => Err(classify(format!("timed out after {}s", timeout.as_secs_f64()))),
    }
}

/// Fires the notifier off the async workers with a bounded wait, so a hung
/// audio device cannot hold the loop open.
async fn notify_once(ctx: &RunContext) {
    let notifier = Arc::clone(&ctx.providers.notifier);
    let task = tokio::task::spawn_blocking(move || notifier.notify());
    if tokio::time::timeout(Duration::from_secs(NOTIFY_WAIT_SECS), task)
        .await
        .is_err()
    {
        log_warn!("watch {}: notifier still running after {NOTIFY_WAIT_SECS}s", ctx.run_id);
    }
}

async fn record(
    ctx: &RunContext,
    capture_ms: u64,
    fingerprint_ms: u64,
    ocr_ms: Option<u64>,
    skipped_reason: Option<String>,
    ocr_failed: bool,
    cycle_start: Instant,
) {
    let (cpu_percent, memory_mb) = ctx.metrics.sample_system_metrics().await;
    ctx.metrics
        .record_cycle(CycleMetrics {
            timestamp: Utc::now(),
            capture_ms,
            fingerprint_ms,
            ocr_ms,
            skipped_reason,
            ocr_failed,
            total_ms: elapsed_ms(cycle_start),
            cpu_percent,
            memory_mb,
        })
        .await;
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
