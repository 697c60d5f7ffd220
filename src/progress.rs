//! Progress bar reporting executor steps

use colored::Colorize;
use fruitkit::{Error, ExecuteSummary, ProgressCallback, Step};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// Plan listing and a progress bar over the steps of one run
///
/// With `verbose`, every finished step is also printed. With `quiet`, only
/// the plan and failures are shown.
pub struct StepProgress {
    bar: ProgressBar,
    verbose: bool,
    quiet: bool,
    emoji: bool,
}

impl StepProgress {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            verbose,
            quiet,
            emoji: ui::is_tty(),
        }
    }
}

impl ProgressCallback for StepProgress {
    fn on_plan(&mut self, steps: &[Step]) {
        ui::print_plan(steps);
    }

    fn on_run_start(&mut self, count: usize) {
        if self.quiet {
            return;
        }
        self.bar = ProgressBar::new(count as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        self.bar.set_style(style);
    }

    fn on_step_start(&mut self, step: &Step) {
        self.bar.set_message(ui::step_line(step, self.emoji));
    }

    fn on_step_complete(&mut self, step: &Step) {
        if self.verbose && !self.quiet {
            let line = ui::step_line(step, self.emoji);
            self.bar.suspend(|| println!("  {} {line}", "✓".green()));
        }
        self.bar.inc(1);
    }

    fn on_step_failed(&mut self, step: &Step, error: &Error) {
        self.bar.finish_and_clear();
        ui::error(&format!("{} failed: {error}", ui::step_line(step, self.emoji)));
    }

    fn on_run_complete(&mut self, _summary: &ExecuteSummary) {
        self.bar.finish_and_clear();
    }
}
