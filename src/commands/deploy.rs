//! `tutti-frutti deploy` - plan, confirm, and execute

use anyhow::Result;
use fruitkit::{AutoConfirm, ConfirmCallback, reconcile};
use std::path::Path;

use crate::Context;
use crate::compiler::BundleCompiler;
use crate::progress::StepProgress;
use crate::ui;

/// Asks on the terminal
struct Prompt;

impl ConfirmCallback for Prompt {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

pub async fn run(ctx: &Context, manifest: &Path, state_dir: Option<&Path>, yes: bool) -> Result<()> {
    let collection = super::collect(manifest, state_dir)?;

    let mut progress = StepProgress::new(ctx.verbose > 0, ctx.quiet);
    let mut confirm: Box<dyn ConfirmCallback> = if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(Prompt)
    };
    let summary =
        reconcile::deploy(&collection, &BundleCompiler, &mut progress, confirm.as_mut()).await?;

    if summary.total() == 0 {
        return Ok(());
    }
    if summary.total_changes() == 0 {
        ui::warn("Deploy cancelled");
    }
    if !ctx.quiet {
        ui::print_summary(&summary);
    }
    Ok(())
}
