use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use cronbeat_core::config::{
    EngineSettings, DEFAULT_IDLE_DELAY_MS, DEFAULT_NEXT_DELAY_MS, DEFAULT_TICK_DELAY_MS,
};
use cronbeat_core::{Job, JobPatch};
use cronbeat_store::{ClaimQuery, JobPredicate, JobStore};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::events::{CronEvent, EventBus};
use crate::handler::{HandlerError, JobHandler};
use crate::schedule;

/// Engine knobs.
#[derive(Clone)]
pub struct CronConfig {
    /// Wait between heartbeats when no job is eligible. Default 1 s.
    pub idle_delay: Duration,
    /// Minimum gap before the same job can be claimed again. Default 0.
    pub next_delay: Duration,
    /// Gap between a completed heartbeat and the next one. Default 0 —
    /// the next claim is issued immediately.
    pub tick_delay: Duration,
    /// Extra eligibility predicate merged into every claim.
    pub extra_filter: Option<JobPredicate>,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(DEFAULT_IDLE_DELAY_MS),
            next_delay: Duration::from_millis(DEFAULT_NEXT_DELAY_MS),
            tick_delay: Duration::from_millis(DEFAULT_TICK_DELAY_MS),
            extra_filter: None,
        }
    }
}

impl From<&EngineSettings> for CronConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            idle_delay: Duration::from_millis(settings.idle_delay_ms),
            next_delay: Duration::from_millis(settings.next_delay_ms),
            tick_delay: Duration::from_millis(settings.tick_delay_ms),
            extra_filter: None,
        }
    }
}

/// One scheduler instance: a single-flight heartbeat loop over a shared
/// store.
///
/// The engine owns only its timer and configuration — every scheduling
/// decision is re-derived from the freshly claimed record, and the store's
/// atomic claim is the sole coordination with other instances. Run as many
/// engines against one store as you like; no job is ever processed by two
/// of them at once.
///
/// There is no lease renewal: a job claimed by an instance that crashes
/// stays locked until an operator clears it
/// (`JobPatch::new().unlock()` via [`JobStore::update`]).
pub struct CronEngine {
    shared: Arc<Shared>,
    loop_state: Mutex<Option<LoopHandle>>,
}

struct LoopHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CronEngine {
    pub fn new(store: Arc<dyn JobStore>, handler: Arc<dyn JobHandler>, config: CronConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                handler,
                config,
                events: EventBus::new(),
            }),
            loop_state: Mutex::new(None),
        }
    }

    /// Start the heartbeat loop. No-op while already running. The first
    /// tick fires immediately unless `initial_delay` is given.
    pub fn start(&self, initial_delay: Option<Duration>) {
        let mut state = self.loop_state.lock().unwrap();
        if state.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.shared.clone(), shutdown_rx, initial_delay));
        *state = Some(LoopHandle { shutdown_tx, task });
    }

    /// Stop the loop: the pending inter-tick sleep is cancelled, an
    /// in-flight handler invocation is not interrupted (the task drains the
    /// current tick in the background, see [`CronEngine::shutdown`] to wait
    /// for it).
    pub fn stop(&self) {
        if let Some(handle) = self.loop_state.lock().unwrap().take() {
            let _ = handle.shutdown_tx.send(true);
        }
    }

    /// Stop the loop and wait for the in-flight tick to drain.
    pub async fn shutdown(&self) {
        let handle = self.loop_state.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.shutdown_tx.send(true);
            if let Err(e) = handle.task.await {
                error!(error = %e, "engine task panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.loop_state.lock().unwrap().is_some()
    }

    /// Observe lifecycle events; dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CronEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for CronEngine {
    fn drop(&mut self) {
        // signal the loop task so a dropped engine does not tick forever
        self.stop();
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
    initial_delay: Option<Duration>,
) {
    info!("cron engine started");
    if let Some(delay) = initial_delay {
        if wait_or_shutdown(delay, &mut shutdown).await {
            info!("cron engine stopped");
            return;
        }
    }
    loop {
        if *shutdown.borrow() {
            break;
        }
        let delay = shared.tick().await;
        if delay.is_zero() {
            // keep zero-delay loops cooperative
            tokio::task::yield_now().await;
        } else if wait_or_shutdown(delay, &mut shutdown).await {
            break;
        }
    }
    info!("cron engine stopped");
}

/// True when the engine should exit instead of ticking again.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

struct Shared {
    store: Arc<dyn JobStore>,
    handler: Arc<dyn JobHandler>,
    config: CronConfig,
    events: EventBus,
}

struct TickFailure {
    error: EngineError,
    job: Option<Job>,
}

impl TickFailure {
    fn bare(error: EngineError) -> Self {
        Self { error, job: None }
    }

    fn claimed(error: EngineError, job: Job) -> Self {
        Self {
            error,
            job: Some(job),
        }
    }
}

impl Shared {
    /// One heartbeat. Returns the delay before the next one; failures are
    /// classified and recovered here, the loop itself never sees an error.
    async fn tick(&self) -> Duration {
        let (delay, job_id) = match self.try_tick().await {
            Ok(job_id) => (self.config.tick_delay, Some(job_id)),
            Err(failure) => {
                let job_id = failure.job.as_ref().map(|job| job.id.clone());
                (self.recover(failure).await, job_id)
            }
        };
        self.events.emit(CronEvent::TickCompleted { job_id });
        delay
    }

    async fn try_tick(&self) -> std::result::Result<String, TickFailure> {
        let now = Utc::now();
        let mut query = ClaimQuery::at(now);
        query.extra = self.config.extra_filter.clone();

        let job = self
            .store
            .claim_next(&query)
            .await
            .map_err(|e| TickFailure::bare(e.into()))?
            .ok_or_else(|| TickFailure::bare(EngineError::NoEligibleJob))?;

        debug!(job_id = %job.id, name = %job.name, "job claimed");

        if let Err(err) = self.invoke_handler(job.clone()).await {
            return Err(TickFailure::claimed(
                EngineError::Handler(err.to_string()),
                job,
            ));
        }
        if let Err(err) = self.reschedule(&job).await {
            return Err(TickFailure::claimed(err.into(), job));
        }
        Ok(job.id)
    }

    /// The handler runs in its own task so a panic is contained and
    /// reported like a returned failure. No timeout bounds the invocation:
    /// a stuck handler stalls this instance's further claims, and only this
    /// instance's.
    async fn invoke_handler(&self, job: Job) -> std::result::Result<(), HandlerError> {
        let handler = self.handler.clone();
        match tokio::spawn(async move { handler.handle(job).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(format!("handler panicked: {join_err}").into()),
        }
    }

    async fn reschedule(&self, job: &Job) -> cronbeat_store::Result<()> {
        let now = Utc::now();
        match schedule::next_start(&job.cron, self.config.next_delay, now) {
            Some(next) => {
                let patch = JobPatch::new()
                    .unlock()
                    .clear_error()
                    .processed_at(now)
                    .start_at(next)
                    .bump_processed();
                self.store.update(&job.id, &patch).await
            }
            None if job.cron.remove_expired => {
                info!(job_id = %job.id, "no further occurrence, removing job");
                self.store.delete(&job.id).await
            }
            None => {
                info!(job_id = %job.id, "no further occurrence, retiring job");
                let patch = JobPatch::new()
                    .clear_enabled()
                    .unlock()
                    .clear_error()
                    .processed_at(now);
                self.store.update(&job.id, &patch).await
            }
        }
    }

    /// Decide the next-heartbeat delay and persist what the failure calls
    /// for. A persistence failure here degrades once to the no-job branch,
    /// which writes nothing and therefore cannot fail again — the loop can
    /// never halt on a secondary failure.
    async fn recover(&self, failure: TickFailure) -> Duration {
        let TickFailure { error, job } = failure;
        if matches!(error, EngineError::NoEligibleJob) {
            return self.config.idle_delay;
        }

        // persist the handler's own message, not the classification wrapper
        let message = match &error {
            EngineError::Handler(msg) => msg.clone(),
            other => other.to_string(),
        };
        match job {
            Some(job) => {
                warn!(job_id = %job.id, error = %message, "tick failed, parking job");
                let patch = JobPatch::new()
                    .clear_enabled()
                    .unlock()
                    .set_error(message.clone());
                if let Err(persist_err) = self.store.update(&job.id, &patch).await {
                    error!(job_id = %job.id, error = %persist_err, "recovery persistence failed");
                    self.events.emit(CronEvent::JobError {
                        job: None,
                        message: persist_err.to_string(),
                    });
                } else {
                    self.events.emit(CronEvent::JobError {
                        job: Some(job),
                        message,
                    });
                }
            }
            None => {
                warn!(error = %message, "tick failed with no claimed job");
                self.events.emit(CronEvent::JobError { job: None, message });
            }
        }
        self.config.tick_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_documentation() {
        let config = CronConfig::default();
        assert_eq!(config.idle_delay, Duration::from_secs(1));
        assert_eq!(config.next_delay, Duration::ZERO);
        assert_eq!(config.tick_delay, Duration::ZERO);
        assert!(config.extra_filter.is_none());
    }

    #[test]
    fn config_from_settings_converts_milliseconds() {
        let settings = EngineSettings {
            idle_delay_ms: 250,
            next_delay_ms: 50,
            tick_delay_ms: 10,
        };
        let config = CronConfig::from(&settings);
        assert_eq!(config.idle_delay, Duration::from_millis(250));
        assert_eq!(config.next_delay, Duration::from_millis(50));
        assert_eq!(config.tick_delay, Duration::from_millis(10));
    }
}
