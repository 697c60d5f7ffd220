//! `tutti-frutti plan` - show the steps a deploy would execute

use anyhow::Result;
use fruitkit::reconcile;
use std::path::Path;

use crate::Context;
use crate::compiler::BundleCompiler;
use crate::ui;

pub async fn run(_ctx: &Context, manifest: &Path, state_dir: Option<&Path>) -> Result<()> {
    let collection = super::collect(manifest, state_dir)?;
    let steps = reconcile::plan(&collection, &BundleCompiler).await?;
    ui::print_plan(&steps);
    Ok(())
}
