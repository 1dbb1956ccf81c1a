//! Wire types for the Kayenta standalone canary analysis API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// CANARY CONFIG
// =============================================================================

/// Canary configuration document sent alongside an execution request.
///
/// Only the fields this crate inspects are typed; everything else the service
/// understands is carried in `extra` and forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeConfig>,
    #[serde(default)]
    pub metrics: Vec<CanaryMetricConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<CanaryClassifierConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub judge_configurations: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryMetricConfig {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub query: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub analysis_configurations: Value,
    #[serde(default = "default_scope_name")]
    pub scope_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryClassifierConfig {
    /// Group name to weight. The service accepts numbers or numeric strings,
    /// so values are kept exactly as written.
    #[serde(default)]
    pub group_weights: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_scope_name() -> String {
    DEFAULT_SCOPE_NAME.to_string()
}

/// Scope name used for the single scope of a standalone request.
pub const DEFAULT_SCOPE_NAME: &str = "default";

// =============================================================================
// EXECUTION REQUEST
// =============================================================================

/// Score boundaries used by the judge to classify the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub marginal: String,
    pub pass: String,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            marginal: "50".to_string(),
            pass: "90".to_string(),
        }
    }
}

/// Control/experiment coordinates plus the analysis window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub scope_name: String,
    pub control_scope: String,
    pub control_location: String,
    #[serde(rename = "controlOffsetInMinutes")]
    pub control_offset_minutes: i64,
    pub experiment_scope: String,
    pub experiment_location: String,
    #[serde(default)]
    pub step: i64,
    pub start_time_iso: String,
    pub end_time_iso: String,
    #[serde(default)]
    pub extended_scope_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub scopes: Vec<Scope>,
    #[serde(rename = "lifetimeDurationMins")]
    pub lifetime_duration_minutes: i64,
    #[serde(rename = "beginAfterMins", default)]
    pub begin_after_minutes: i64,
    #[serde(rename = "analysisIntervalMins")]
    pub analysis_interval_minutes: i64,
    pub thresholds: Threshold,
}

/// Body and query parameters for starting a standalone analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneCanaryAnalysisInput {
    #[serde(skip)]
    pub user: Option<String>,
    #[serde(skip)]
    pub application: Option<String>,
    #[serde(skip)]
    pub metrics_account_name: Option<String>,
    #[serde(skip)]
    pub storage_account_name: Option<String>,

    pub canary_config: CanaryConfig,
    pub execution_request: ExecutionRequest,
}

impl StandaloneCanaryAnalysisInput {
    pub fn new(canary_config: CanaryConfig, execution_request: ExecutionRequest) -> Self {
        Self {
            canary_config,
            execution_request,
            ..Default::default()
        }
    }

    /// Non-empty query parameters, in the order the service documents them.
    pub fn query_params(&self) -> Vec<(&'static str, &str)> {
        [
            ("metricsAccountName", self.metrics_account_name.as_deref()),
            ("storageAccountName", self.storage_account_name.as_deref()),
            ("user", self.user.as_deref()),
            ("application", self.application.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value {
            Some(v) if !v.is_empty() => Some((key, v)),
            _ => None,
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub canary_analysis_execution_id: String,
}

/// Body returned by canary config create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryConfigUpdateResponse {
    #[serde(default)]
    pub canary_config_id: String,
}

// =============================================================================
// ANALYSIS STATUS
// =============================================================================

/// Snapshot of a standalone analysis, replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub execution_status: String,
    #[serde(default)]
    pub pipeline_id: String,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub stages: Vec<StageStatus>,
    #[serde(
        rename = "canaryAnalysisExecutionResult",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_result: Option<ExecutionResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatus {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub stage_type: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub did_pass_thresholds: bool,
    #[serde(default)]
    pub has_warnings: bool,
    #[serde(rename = "canaryScoreMessage", default)]
    pub score_message: String,
    #[serde(rename = "canaryScores", default)]
    pub scores: Vec<f64>,
    #[serde(rename = "canaryExecutionResults", default)]
    pub per_execution_results: Vec<CanaryExecutionResult>,
}

impl ExecutionResult {
    /// Score of the most recent interval, if the judge produced any.
    pub fn final_score(&self) -> Option<f64> {
        self.scores.last().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryExecutionResult {
    #[serde(default)]
    pub execution_id: String,
    #[serde(default)]
    pub execution_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CanaryResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryResult {
    #[serde(default)]
    pub judge_result: JudgeResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResult {
    #[serde(default)]
    pub judge_name: String,
    #[serde(default)]
    pub results: Vec<MetricResult>,
    #[serde(default)]
    pub group_scores: Vec<GroupScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<JudgeScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub classification_reason: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupScore {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub classification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeScore {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub classification_reason: String,
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// An account configured on the Kayenta service (metrics, storage, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredential {
    pub name: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub supported_types: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountCredential {
    /// Whether this account serves the given type, either as its primary
    /// type or as one of its supported types.
    pub fn supports(&self, kind: &str) -> bool {
        self.account_type.eq_ignore_ascii_case(kind)
            || self
                .supported_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(kind))
    }
}

/// Expand the CLI shorthands `metrics`, `config` and `object` into the
/// account type names the service uses. Anything else is passed through.
pub fn expand_account_type(kind: &str) -> String {
    match kind.trim().to_ascii_lowercase().as_str() {
        "metrics" => "METRICS_STORE".to_string(),
        "config" => "CONFIGURATION_STORE".to_string(),
        "object" => "OBJECT_STORE".to_string(),
        _ => kind.trim().to_string(),
    }
}
