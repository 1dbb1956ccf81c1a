//! Report generation for a finished analysis.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use colored::Colorize;
use thiserror::Error;

use crate::kayenta::{AnalysisStatus, ExecutionResult, JudgeResult};

use super::progress::{render_table, stage_table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Pretty,
    Json,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "ascii" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{other}' (expected pretty or json)")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    /// Only JSON can describe an execution that is still running.
    #[error("execution is still in analysis")]
    NotComplete,

    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `status` to `out` in the requested format.
pub fn write_report<W: Write + ?Sized>(
    status: &AnalysisStatus,
    format: ReportFormat,
    out: &mut W,
) -> Result<(), ReportError> {
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, status)?;
            out.write_all(b"\n")?;
        }
        ReportFormat::Pretty => {
            if !status.complete {
                return Err(ReportError::NotComplete);
            }
            out.write_all(render_report_pretty(status).as_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Human-readable report of a complete execution.
pub fn render_report_pretty(status: &AnalysisStatus) -> String {
    let empty = ExecutionResult::default();
    let result = status.execution_result.as_ref().unwrap_or(&empty);

    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n\n",
        "Analysis Report For Execution ID:".bold(),
        status.pipeline_id
    ));

    out.push_str(&format!("{}\n", "Summary".bold().underline()));
    out.push_str(&format!("  Status:       {}\n", paint_status(&status.status)));
    out.push_str(&format!(
        "  Final Score:  {}\n",
        result.final_score().unwrap_or(0.0)
    ));
    if !result.score_message.is_empty() {
        out.push_str(&format!("  Message:      {}\n", result.score_message));
    }
    out.push_str(&format!("  Passed:       {}\n", result.did_pass_thresholds));
    out.push_str(&format!("  HasWarnings:  {}\n", result.has_warnings));

    if let Some(judge) = last_judge_result(result) {
        if !judge.results.is_empty() {
            out.push_str(&format!("\n{}\n", "Measurements".bold().underline()));
            out.push_str(&measurements_table(judge));
        }

        if !judge.group_scores.is_empty() {
            out.push_str(&format!("\n{}\n", "Group Results".bold().underline()));
            out.push_str(&group_table(judge));
        }
    }

    if !status.stages.is_empty() {
        out.push_str(&format!("\n{}\n", "Stages".bold().underline()));
        out.push_str(&stage_table(&status.stages));
    }

    out
}

fn last_judge_result(result: &ExecutionResult) -> Option<&JudgeResult> {
    result
        .per_execution_results
        .iter()
        .rev()
        .find_map(|r| r.result.as_ref())
        .map(|r| &r.judge_result)
}

fn measurements_table(judge: &JudgeResult) -> String {
    let rows = judge
        .results
        .iter()
        .map(|metric| {
            [
                metric.name.clone(),
                metric.groups.join(", "),
                paint_classification(&metric.classification).to_string(),
                metric.classification_reason.clone(),
            ]
        })
        .collect();
    render_table(["Name", "Groups", "Result", "Reason"], rows)
}

fn group_table(judge: &JudgeResult) -> String {
    let rows = judge
        .group_scores
        .iter()
        .map(|group| [group.name.clone(), group.score.to_string()])
        .collect();
    render_table(["Group", "Score"], rows)
}

fn paint_classification(classification: &str) -> colored::ColoredString {
    match classification.to_ascii_lowercase().as_str() {
        "pass" => classification.green().bold(),
        "high" | "low" | "fail" => classification.red().bold(),
        "nodata" => classification.yellow().bold(),
        _ => classification.normal(),
    }
}

fn paint_status(status: &str) -> colored::ColoredString {
    if status.eq_ignore_ascii_case("succeeded") {
        status.green().bold()
    } else if status.eq_ignore_ascii_case("running") {
        status.blue().bold()
    } else {
        status.red().bold()
    }
}
