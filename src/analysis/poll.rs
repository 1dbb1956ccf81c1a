//! Polling a submitted analysis until it completes, fails, or runs out of time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::kayenta::{AnalysisApi, AnalysisStatus, ClientError};

use super::hooks::{ProgressObserver, SharedObserver};

/// Smallest tick the poller will use; tokio intervals need a non-zero period.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Lifecycle of one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling,
    Complete,
    TimedOut,
    Errored,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::TimedOut | Self::Errored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Complete => "complete",
            Self::TimedOut => "timed_out",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    /// A fetch failed. Fatal to the session; nothing is retried.
    #[error("failed to fetch analysis status: {0}")]
    Transport(#[from] ClientError),

    /// The deadline passed before the analysis reported completion.
    /// The analysis itself may still be running.
    #[error("analysis did not complete within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The polling task went away without producing a result.
    #[error("polling task ended without a result: {0}")]
    Aborted(String),
}

impl PollError {
    /// Terminal state the session ended in.
    pub fn state(&self) -> PollState {
        match self {
            Self::Timeout { .. } => PollState::TimedOut,
            Self::Transport(_) | Self::Aborted(_) => PollState::Errored,
        }
    }
}

/// Repeatedly fetches an execution on a fixed tick until `complete` is set.
///
/// Each call to [`CompletionPoller::poll`] runs the tick loop on its own tokio
/// task and waits for its single terminal value on a oneshot channel. Fetches
/// are strictly sequential: the next tick is not taken until the previous
/// response (or error) has been handled.
pub struct CompletionPoller<C: AnalysisApi + ?Sized + 'static> {
    client: Arc<C>,
    interval: Duration,
}

impl<C: AnalysisApi + ?Sized + 'static> CompletionPoller<C> {
    pub fn new(client: Arc<C>, interval: Duration) -> Self {
        Self {
            client,
            interval: interval.max(MIN_TICK),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until `timeout` from now.
    pub async fn poll_for(
        &self,
        execution_id: &str,
        timeout: Duration,
        observer: Option<SharedObserver>,
    ) -> Result<AnalysisStatus, PollError> {
        self.poll(execution_id, Instant::now() + timeout, observer)
            .await
    }

    /// Poll until the execution completes or `deadline` passes.
    ///
    /// `observer` sees every non-terminal snapshot, once per tick; the final
    /// complete snapshot is returned instead of being observed.
    pub async fn poll(
        &self,
        execution_id: &str,
        deadline: Instant,
        observer: Option<SharedObserver>,
    ) -> Result<AnalysisStatus, PollError> {
        let (done_tx, done_rx) = oneshot::channel();
        let session = PollSession {
            client: Arc::clone(&self.client),
            execution_id: execution_id.to_string(),
            interval: self.interval,
            deadline,
            timeout: deadline.saturating_duration_since(Instant::now()),
            observer,
        };

        let handle = tokio::spawn(async move {
            let outcome = session.run().await;
            // The receiver only disappears if the caller was dropped.
            let _ = done_tx.send(outcome);
        });
        // Dropping this future (an outer timeout, a cancelled select) must
        // stop the session too, or it keeps fetching until its own deadline.
        let _guard = AbortOnDrop(handle.abort_handle());

        match done_rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                let reason = match handle.await {
                    Err(e) => e.to_string(),
                    Ok(()) => "completion signal dropped".to_string(),
                };
                Err(PollError::Aborted(reason))
            }
        }
    }
}

/// Aborts the spawned session when the awaiting caller goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct PollSession<C: ?Sized> {
    client: Arc<C>,
    execution_id: String,
    interval: Duration,
    deadline: Instant,
    timeout: Duration,
    observer: Option<SharedObserver>,
}

impl<C: AnalysisApi + ?Sized> PollSession<C> {
    async fn run(self) -> Result<AnalysisStatus, PollError> {
        let mut state = PollState::Submitted;
        self.transition(&mut state, PollState::Polling);
        if let Some(observer) = &self.observer {
            observer.on_start();
        }

        let outcome = self.tick_until_done(&mut state).await;

        if let Some(observer) = &self.observer {
            observer.on_finish(state);
        }
        outcome
    }

    async fn tick_until_done(&self, state: &mut PollState) -> Result<AnalysisStatus, PollError> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = sleep_until(self.deadline) => {
                    self.transition(state, PollState::TimedOut);
                    return Err(PollError::Timeout { timeout: self.timeout });
                }
                _ = ticker.tick() => {}
            }

            ticks += 1;
            let fetched = self.client.fetch(&self.execution_id).await;

            if Instant::now() >= self.deadline {
                debug!(
                    execution_id = %self.execution_id,
                    tick = ticks,
                    "discarding fetch that finished after the deadline"
                );
                self.transition(state, PollState::TimedOut);
                return Err(PollError::Timeout {
                    timeout: self.timeout,
                });
            }

            match fetched {
                Err(e) => {
                    warn!(
                        execution_id = %self.execution_id,
                        tick = ticks,
                        code = e.code(),
                        error = %e,
                        "status fetch failed"
                    );
                    self.transition(state, PollState::Errored);
                    return Err(PollError::Transport(e));
                }
                Ok(status) if status.complete => {
                    info!(
                        execution_id = %self.execution_id,
                        status = %status.status,
                        ticks,
                        "execution is complete"
                    );
                    self.transition(state, PollState::Complete);
                    return Ok(status);
                }
                Ok(status) => {
                    debug!(
                        execution_id = %self.execution_id,
                        tick = ticks,
                        status = %status.status,
                        "execution is still running"
                    );
                    if let Some(observer) = &self.observer {
                        observer.on_progress(&status);
                    }
                }
            }
        }
    }

    fn transition(&self, state: &mut PollState, next: PollState) {
        debug_assert!(!state.is_terminal(), "poll session left a terminal state");
        debug!(
            execution_id = %self.execution_id,
            from = %state,
            to = %next,
            "poll state transition"
        );
        *state = next;
    }
}

/// Observer adapter so plain closures can be passed where a
/// [`SharedObserver`] is expected.
pub fn observer_fn<F>(f: F) -> SharedObserver
where
    F: Fn(&AnalysisStatus) + Send + Sync + 'static,
{
    Arc::new(f) as Arc<dyn ProgressObserver>
}
