use super::{prepare, Context};
use crate::ui;
use anyhow::{Context as _, Result};

pub fn execute(ctx: &Context, dependencies: bool) -> Result<()> {
    let toolset = prepare(ctx, dependencies)?;
    let config = ctx.build_config();
    let manager_args = ctx
        .package_manager(&toolset)?
        .configure_args(&config.mode)
        .context("Failed to collect package manager arguments")?;

    let progress = ui::Progress::new("Rebuilding", config.mode.to_string());
    match ctx
        .configurator(&toolset)
        .rebuild(&config, &manager_args, &ctx.generator(&toolset))
    {
        Ok(()) => {
            progress.success("Rebuilt");
            Ok(())
        }
        Err(err) => {
            progress.fail("Failed", &err);
            Err(err.into())
        }
    }
}
