#![forbid(unsafe_code)]

//! # kayentactl
//!
//! Run a Kayenta standalone canary analysis and turn its outcome into a
//! pass/fail verdict.
//!
//! A run resolves the control and experiment identifiers into scope
//! coordinates, builds the execution request, submits it with the canary
//! config, then polls the service on a fixed tick until the execution reports
//! `complete` or the deadline passes. Every intermediate snapshot goes to a
//! [`ProgressObserver`]; the final one is classified and rendered as a report.

pub mod analysis;
pub mod canary_config;
pub mod duration;
pub mod kayenta;

pub use analysis::{
    build_execution_request, classify, parse_thresholds, resolve_scope, write_report,
    AnalysisParams, Classification, CompletionPoller, LoggingObserver, MalformedScopeError,
    NoopObserver, PollError, PollState, ProgressObserver, ReportError, ReportFormat,
    RequestError, ScopeCoordinate, SharedObserver, SpinnerObserver, StageTablePrinter,
};
pub use canary_config::{load_canary_config, CanaryConfigError};
pub use duration::parse_duration;
pub use kayenta::{
    AnalysisApi, AnalysisStatus, CanaryConfigApi, ClientConfig, ClientError, CredentialsApi,
    KayentaAdapter,
};
