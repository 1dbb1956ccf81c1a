//! Construction of the execution request for a standalone analysis.

use std::fmt;
use std::time::Duration;

use crate::kayenta::{ExecutionRequest, Scope, Threshold, DEFAULT_SCOPE_NAME};

use super::scope::{resolve_scope, MalformedScopeError};

/// Which side of the comparison an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Control,
    Experiment,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Control => "control",
            Side::Experiment => "experiment",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("could not build scope for {side}: {source}")]
    Scope {
        side: Side,
        #[source]
        source: MalformedScopeError,
    },
}

/// Everything needed to derive an [`ExecutionRequest`].
///
/// Built once per invocation by the caller and passed down by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisParams {
    pub control: String,
    pub experiment: String,
    pub start_time_iso: String,
    pub end_time_iso: String,
    pub control_offset: Duration,
    pub analysis_interval: Duration,
    pub lifetime: Duration,
    pub thresholds: Threshold,
}

/// Resolve both identifiers and assemble the single-scope execution request.
///
/// Durations are truncated to whole minutes.
pub fn build_execution_request(params: &AnalysisParams) -> Result<ExecutionRequest, RequestError> {
    let mut scope = build_scope(&params.control, &params.experiment)?;
    scope.start_time_iso = params.start_time_iso.clone();
    scope.end_time_iso = params.end_time_iso.clone();
    scope.control_offset_minutes = whole_minutes(params.control_offset);

    Ok(ExecutionRequest {
        scopes: vec![scope],
        lifetime_duration_minutes: whole_minutes(params.lifetime),
        begin_after_minutes: 0,
        analysis_interval_minutes: whole_minutes(params.analysis_interval),
        thresholds: params.thresholds.clone(),
    })
}

/// Build the `default` scope from a control and an experiment identifier.
pub fn build_scope(control: &str, experiment: &str) -> Result<Scope, RequestError> {
    let control = resolve_scope(control).map_err(|source| RequestError::Scope {
        side: Side::Control,
        source,
    })?;
    let experiment = resolve_scope(experiment).map_err(|source| RequestError::Scope {
        side: Side::Experiment,
        source,
    })?;

    Ok(Scope {
        scope_name: DEFAULT_SCOPE_NAME.to_string(),
        control_scope: control.scope,
        control_location: control.location,
        experiment_scope: experiment.scope,
        experiment_location: experiment.location,
        ..Default::default()
    })
}

fn whole_minutes(d: Duration) -> i64 {
    i64::try_from(d.as_secs() / 60).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AnalysisParams {
        AnalysisParams {
            control: "us-east-1/myapp".into(),
            experiment: "myapp".into(),
            start_time_iso: "2020-12-20T14:49:31.647Z".into(),
            end_time_iso: "2020-12-20T15:49:31.647Z".into(),
            control_offset: Duration::from_secs(10 * 60),
            analysis_interval: Duration::from_secs(5 * 60),
            lifetime: Duration::from_secs(60 * 60),
            thresholds: Threshold::default(),
        }
    }

    #[test]
    fn builds_single_default_scope() {
        let req = build_execution_request(&params()).unwrap();
        assert_eq!(req.scopes.len(), 1);

        let scope = &req.scopes[0];
        assert_eq!(scope.scope_name, "default");
        assert_eq!(scope.control_location, "us-east-1");
        assert_eq!(scope.control_scope, "myapp");
        assert_eq!(scope.experiment_location, "");
        assert_eq!(scope.experiment_scope, "myapp");
        assert_eq!(scope.start_time_iso, "2020-12-20T14:49:31.647Z");
        assert_eq!(scope.control_offset_minutes, 10);
        assert_eq!(req.lifetime_duration_minutes, 60);
        assert_eq!(req.analysis_interval_minutes, 5);
    }

    #[test]
    fn parsed_thresholds_reach_the_request() {
        let mut p = params();
        p.thresholds =
            crate::analysis::parse_thresholds("marginal=50,pass=90", &Threshold::default());

        let req = build_execution_request(&p).unwrap();
        let scope = &req.scopes[0];
        assert_eq!(
            (scope.control_location.as_str(), scope.control_scope.as_str()),
            ("us-east-1", "myapp")
        );
        assert_eq!(
            (scope.experiment_location.as_str(), scope.experiment_scope.as_str()),
            ("", "myapp")
        );
        assert_eq!(req.thresholds.marginal, "50");
        assert_eq!(req.thresholds.pass, "90");

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["thresholds"], serde_json::json!({"marginal": "50", "pass": "90"}));
    }

    #[test]
    fn minutes_are_truncated() {
        let mut p = params();
        p.lifetime = Duration::from_secs(5 * 60 + 59);
        p.analysis_interval = Duration::from_secs(59);
        p.control_offset = Duration::from_millis(119_999);

        let req = build_execution_request(&p).unwrap();
        assert_eq!(req.lifetime_duration_minutes, 5);
        assert_eq!(req.analysis_interval_minutes, 0);
        assert_eq!(req.scopes[0].control_offset_minutes, 1);
    }

    #[test]
    fn reports_which_side_failed() {
        let mut p = params();
        p.experiment = String::new();

        let err = build_execution_request(&p).unwrap_err();
        let RequestError::Scope { side, .. } = &err;
        assert_eq!(*side, Side::Experiment);
        assert!(err.to_string().starts_with("could not build scope for experiment"));

        p.control = "east/".into();
        let RequestError::Scope { side, .. } = build_execution_request(&p).unwrap_err();
        assert_eq!(side, Side::Control);
    }

    #[test]
    fn building_twice_gives_equal_requests() {
        let p = params();
        assert_eq!(
            build_execution_request(&p).unwrap(),
            build_execution_request(&p).unwrap()
        );
    }
}
