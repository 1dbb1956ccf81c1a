//! Canary analysis orchestration: building the request, waiting for the
//! execution to finish, and turning the outcome into a verdict.

pub mod classify;
pub mod hooks;
pub mod poll;
pub mod progress;
pub mod report;
pub mod request;
pub mod scope;
pub mod thresholds;

pub use classify::{classify, Classification};
pub use hooks::{LoggingObserver, NoopObserver, ProgressObserver, SharedObserver};
pub use poll::{observer_fn, CompletionPoller, PollError, PollState};
pub use progress::{stage_table, SpinnerObserver, StageTablePrinter};
pub use report::{render_report_pretty, write_report, ReportError, ReportFormat};
pub use request::{build_execution_request, build_scope, AnalysisParams, RequestError, Side};
pub use scope::{resolve_scope, MalformedScopeError, ScopeCoordinate};
pub use thresholds::parse_thresholds;
