use super::{prepare, Context};
use crate::tools::Toolset;
use crate::ui;
use crate::workspace::normalize_path;
use anyhow::{Context as _, Result};

pub fn execute(ctx: &Context, dependencies: bool) -> Result<()> {
    let toolset = prepare(ctx, dependencies)?;
    run(ctx, &toolset)
}

pub(crate) fn run(ctx: &Context, toolset: &Toolset) -> Result<()> {
    let config = ctx.build_config();
    let manager_args = ctx
        .package_manager(toolset)?
        .configure_args(&config.mode)
        .context("Failed to collect package manager arguments")?;

    ctx.configurator(toolset)
        .configure(&config, &manager_args, &ctx.generator(toolset))?;

    ui::success(
        "Configured",
        format!("{} in {}", config.mode, normalize_path(&config.config_files_path())),
    );
    Ok(())
}
