//! Turning a terminal status into a pass/fail verdict.

use std::process::ExitCode;

use crate::kayenta::AnalysisStatus;

const SUCCEEDED: &str = "succeeded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub success: bool,
    pub message: String,
}

impl Classification {
    /// Numeric exit status for this verdict: 0 on success, 1 otherwise.
    pub fn exit_status(&self) -> u8 {
        if self.success {
            0
        } else {
            1
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

/// Classify a terminal status.
///
/// The analysis succeeded only when the pipeline finished with status
/// `succeeded` and the judge reported the thresholds as passed. On failure the
/// message comes from the judge's score message, or from the raw status when
/// the pipeline ended before the judge produced anything.
///
/// An all-default `canaryAnalysisExecutionResult` (no message, no scores, not
/// passed) counts as no result, the same as an absent one.
pub fn classify(status: &AnalysisStatus) -> Classification {
    let succeeded = status.status.eq_ignore_ascii_case(SUCCEEDED);
    let result = status
        .execution_result
        .as_ref()
        .filter(|r| !r.score_message.is_empty() || !r.scores.is_empty() || r.did_pass_thresholds);
    let passed = result.is_some_and(|r| r.did_pass_thresholds);

    if succeeded && passed {
        return Classification {
            success: true,
            message: "analysis was successful".to_string(),
        };
    }

    let message = match result {
        Some(r) if !r.score_message.is_empty() => {
            format!("analysis failed: {}", r.score_message)
        }
        Some(r) => match r.final_score() {
            Some(score) => format!(
                "analysis failed with status {} and final score {score}",
                display_status(status)
            ),
            None => format!("analysis failed. result: {}", display_status(status)),
        },
        None => format!("analysis failed. result: {}", display_status(status)),
    };

    Classification {
        success: false,
        message,
    }
}

fn display_status(status: &AnalysisStatus) -> &str {
    if status.status.is_empty() {
        &status.execution_status
    } else {
        &status.status
    }
}
