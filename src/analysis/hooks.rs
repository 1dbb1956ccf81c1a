//! Progress hooks invoked by the completion poller.
//!
//! The poller stays rendering-agnostic. Callers can inject:
//! - A terminal view (see [`super::progress::StageTablePrinter`])
//! - A spinner (see [`super::progress::SpinnerObserver`])
//! - Plain log lines ([`LoggingObserver`])
//! - Nothing at all ([`NoopObserver`])

use std::sync::Arc;

use tracing::info;

use crate::kayenta::AnalysisStatus;

use super::poll::PollState;

/// Receives every non-terminal status snapshot.
///
/// Called synchronously on the polling task, once per tick, so implementations
/// must return quickly. Each call should fully redraw whatever the observer
/// shows; snapshots are not deltas.
pub trait ProgressObserver: Send + Sync {
    /// Polling has begun; nothing has been fetched yet.
    fn on_start(&self) {}

    fn on_progress(&self, status: &AnalysisStatus);

    /// The session ended on its own in `state`, after the last `on_progress`.
    /// Not called when the caller drops the poll future.
    fn on_finish(&self, _state: PollState) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&AnalysisStatus) + Send + Sync,
{
    fn on_progress(&self, status: &AnalysisStatus) {
        self(status)
    }
}

pub type SharedObserver = Arc<dyn ProgressObserver>;

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _status: &AnalysisStatus) {}
}

/// Emits one log line per snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ProgressObserver for LoggingObserver {
    fn on_progress(&self, status: &AnalysisStatus) {
        let running = status
            .stages
            .iter()
            .filter(|s| s.status.eq_ignore_ascii_case("RUNNING"))
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>();
        info!(
            status = %status.status,
            execution_status = %status.execution_status,
            running_stages = %running.join(", "),
            "execution is still running"
        );
    }
}
