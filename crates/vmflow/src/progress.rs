use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use vmflow_pipeline::{HealthReport, Observer, PipelineError, Stage};

/// Spinner per stage, finished with a one-line verdict
pub struct StageProgress {
    current: Mutex<Option<ProgressBar>>,
}

impl StageProgress {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn finish(&self, line: String) {
        let bar = self.current.lock().ok().and_then(|mut slot| slot.take());
        match bar {
            Some(bar) => bar.finish_with_message(line),
            None => eprintln!("{}", line),
        }
    }
}

impl Observer for StageProgress {
    fn stage_started(&self, stage: Stage) {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
            bar.set_style(style);
        }
        bar.set_message(format!("{}...", stage));
        bar.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut slot) = self.current.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn stage_completed(&self, stage: Stage, note: &str) {
        self.finish(format!("{} {:<14} {}", "✓".green(), stage.to_string(), note));
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        self.finish(format!(
            "{} {:<14} {}",
            "-".dimmed(),
            stage.to_string(),
            reason.dimmed()
        ));
    }

    fn stage_failed(&self, stage: Stage, error: &PipelineError) {
        self.finish(format!(
            "{} {:<14} {}",
            "✗".red(),
            stage.to_string(),
            error.to_string().red()
        ));
    }

    fn health_report(&self, report: &HealthReport) {
        let mark = if report.healthy {
            "✓".green()
        } else if report.required {
            "✗".red()
        } else {
            "⚠".yellow()
        };
        let line = format!(
            "    {} {:<11} {} ({} ms) {}",
            mark,
            report.endpoint,
            report.target.dimmed(),
            report.elapsed_ms,
            report.detail
        );

        match self.current.lock().ok().and_then(|slot| slot.clone()) {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }
}
