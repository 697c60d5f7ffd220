//! Progress and confirmation seams
//!
//! These traits let the core report and ask without depending on a
//! particular terminal UI.

use crate::error::Error;
use crate::types::{ExecuteSummary, Step};
use anyhow::Result;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called with the planned steps before anything is confirmed or run
    fn on_plan(&mut self, _steps: &[Step]) {}

    /// Called once before the first step
    fn on_run_start(&mut self, count: usize);

    /// Called when a step starts
    fn on_step_start(&mut self, step: &Step);

    /// Called when a step finished successfully
    fn on_step_complete(&mut self, step: &Step);

    /// Called when a step failed; the run stops right after
    fn on_step_failed(&mut self, step: &Step, error: &Error);

    /// Called once after the last step succeeded
    fn on_run_complete(&mut self, summary: &ExecuteSummary);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _count: usize) {}
    fn on_step_start(&mut self, _step: &Step) {}
    fn on_step_complete(&mut self, _step: &Step) {}
    fn on_step_failed(&mut self, _step: &Step, _error: &Error) {}
    fn on_run_complete(&mut self, _summary: &ExecuteSummary) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
