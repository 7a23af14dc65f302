use super::Context;
use crate::ui;
use crate::vcvars::HarvestOutcome;
use anyhow::Result;

pub fn execute(ctx: &Context) -> Result<()> {
    match ctx.harvest()? {
        HarvestOutcome::Applied {
            from_cache,
            variables,
        } => {
            let source = if from_cache { "cache" } else { "vcvarsall.bat" };
            ui::success("Loaded", format!("{variables} variables from {source}"));
        }
        HarvestOutcome::NotApplied(reason) => {
            ui::warn(format!("Compiler environment not loaded: {reason}"));
        }
    }
    Ok(())
}
