use cronbeat_core::Job;
use tokio::sync::broadcast;

/// Slow observers lose the oldest events rather than stalling the loop.
const EVENT_CAPACITY: usize = 256;

/// Lifecycle notifications — side-channel only, nothing in the scheduling
/// path depends on whether anyone listens.
///
/// Subscribe with [`CronEngine::subscribe`](crate::CronEngine::subscribe);
/// dropping the receiver unsubscribes.
#[derive(Debug, Clone)]
pub enum CronEvent {
    /// One heartbeat finished, whether or not a job was found. Carries the
    /// claimed job's id when one was claimed.
    TickCompleted { job_id: Option<String> },
    /// A tick failed. `job` is present when the failure happened after a
    /// successful claim; a bare store failure carries no job.
    JobError { job: Option<Job>, message: String },
}

#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<CronEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<CronEvent> {
        self.tx.subscribe()
    }

    /// A send failure just means nobody is listening right now.
    pub(crate) fn emit(&self, event: CronEvent) {
        let _ = self.tx.send(event);
    }
}
