//! Live terminal views of an analysis while it runs.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::warn;

use crate::kayenta::{AnalysisStatus, StageStatus};

use super::hooks::ProgressObserver;
use super::poll::PollState;

const SPINNER_TICK: Duration = Duration::from_millis(100);

/// Rounded table with bold upper-cased headers, followed by a newline.
///
/// Cells may already carry ANSI colour; widths are measured without it.
pub(crate) fn render_table<const N: usize>(headers: [&str; N], rows: Vec<[String; N]>) -> String {
    let mut builder = Builder::default();
    builder.push_record(headers.map(|h| h.to_uppercase().bold().to_string()));
    for row in rows {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    format!("{table}\n")
}

/// Render the NAME / TYPE / STATUS table for a status snapshot.
pub fn stage_table(stages: &[StageStatus]) -> String {
    let rows = stages
        .iter()
        .map(|stage| {
            [
                stage.name.clone(),
                stage.stage_type.clone(),
                paint_stage(&stage.status).to_string(),
            ]
        })
        .collect();
    render_table(["Name", "Type", "Status"], rows)
}

fn paint_stage(status: &str) -> ColoredString {
    match status.to_ascii_uppercase().as_str() {
        "RUNNING" => status.blue().bold(),
        "SUCCEEDED" => status.green().bold(),
        "TERMINAL" => status.red().bold(),
        _ => status.bold(),
    }
}

struct PrinterState {
    out: Box<dyn Write + Send>,
    checks: usize,
    drawn_lines: usize,
}

/// Redraws the stage table in place on every tick.
///
/// The previous frame is erased by moving the cursor up over the lines it
/// occupied, so the writer should be a terminal for the effect to look right.
pub struct StageTablePrinter {
    state: Mutex<PrinterState>,
}

impl StageTablePrinter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(PrinterState {
                out,
                checks: 0,
                drawn_lines: 0,
            }),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Number of snapshots drawn so far.
    pub fn checks(&self) -> usize {
        self.lock().checks
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PrinterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn draw(state: &mut PrinterState, status: &AnalysisStatus) -> io::Result<()> {
        state.checks += 1;
        let mut frame = format!(
            "status: {} (check #{})\n",
            display_or(&status.execution_status, &status.status),
            state.checks
        );
        frame.push_str(&stage_table(&status.stages));

        if state.drawn_lines > 0 {
            write!(state.out, "\x1b[{}A\x1b[0G\x1b[0J", state.drawn_lines)?;
        }
        state.out.write_all(frame.as_bytes())?;
        state.out.flush()?;
        state.drawn_lines = frame.matches('\n').count();
        Ok(())
    }
}

impl ProgressObserver for StageTablePrinter {
    fn on_progress(&self, status: &AnalysisStatus) {
        let mut state = self.lock();
        if let Err(e) = Self::draw(&mut state, status) {
            warn!(error = %e, "failed to draw progress table");
        }
    }
}

/// Single-line spinner on stderr that names the current status and stage.
///
/// Ticks on its own thread from [`ProgressObserver::on_start`] and is
/// cleared when the session finishes, whatever the outcome.
pub struct SpinnerObserver {
    bar: ProgressBar,
    checks: AtomicUsize,
}

impl SpinnerObserver {
    pub fn stderr() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    /// Drive an existing bar; `ProgressBar::hidden()` draws nothing.
    pub fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message("waiting for the first status check");
        Self {
            bar,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

impl ProgressObserver for SpinnerObserver {
    fn on_start(&self) {
        self.bar.enable_steady_tick(SPINNER_TICK);
    }

    fn on_progress(&self, status: &AnalysisStatus) {
        let check = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        let mut message = format!(
            "{} (check #{check})",
            display_or(&status.execution_status, &status.status)
        );
        if let Some(stage) = status
            .stages
            .iter()
            .find(|s| s.status.eq_ignore_ascii_case("RUNNING"))
        {
            message.push_str(&format!(": {}", stage.name));
        }
        self.bar.set_message(message);
    }

    fn on_finish(&self, _state: PollState) {
        self.bar.finish_and_clear();
    }
}

impl Drop for SpinnerObserver {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn display_or<'a>(primary: &'a str, fallback: &'a str) -> &'a str {
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}
