//! Periodic background jobs with explicit start/stop.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A named job that runs every `period` until stopped.
///
/// The first run happens immediately after `start`. Ticks missed while a
/// run is still in progress are skipped rather than bursted.
pub struct ScheduledTask {
    name: String,
    period: Duration,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    #[must_use]
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Uses an externally owned token, so a parent shutdown also stops this task.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawns the job loop. Calling `start` on a running task is a no-op.
    pub fn start<F, Fut>(&mut self, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            tracing::warn!("Scheduled task {} already running", self.name);
            return;
        }

        let token = self.token.clone();
        let name = self.name.clone();
        let period = self.period.max(Duration::from_millis(1));

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!("Scheduled task {} started (every {:?})", name, period);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            () = token.cancelled() => break,
                            () = job() => {}
                        }
                    }
                }
            }

            tracing::info!("Scheduled task {} stopped", name);
        }));
    }

    /// Cancels the loop and waits for the current run to wind down.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Scheduled task {} panicked: {}", self.name, e);
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
