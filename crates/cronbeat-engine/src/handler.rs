use std::future::Future;

use async_trait::async_trait;
use cronbeat_core::Job;

/// Error type handlers report back to the engine. Anything message-bearing
/// works; the message ends up in the job's `last_error`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback invoked once per claimed job.
///
/// Handlers may be long-running; the engine suspends on the invocation and
/// enforces no timeout. A returned `Err` and a panic inside the handler are
/// treated identically: the job is parked with `last_error` set.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job) -> std::result::Result<(), HandlerError>;
}

/// Adapt an async closure into a [`JobHandler`].
///
/// ```rust,no_run
/// use cronbeat_engine::handler_fn;
///
/// let handler = handler_fn(|job| async move {
///     println!("processing {}", job.name);
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
{
    FnHandler(f)
}

/// Closure-backed [`JobHandler`], built with [`handler_fn`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
{
    async fn handle(&self, job: Job) -> std::result::Result<(), HandlerError> {
        (self.0)(job).await
    }
}
