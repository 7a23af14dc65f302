use super::Context;
use crate::tools::Toolset;
use crate::ui;
use anyhow::{Context as _, Result};

pub fn execute(ctx: &Context) -> Result<()> {
    let toolset = ctx.toolset()?;
    ctx.load_compiler_environment()?;
    install(ctx, &toolset)
}

/// Create profiles and install dependencies for the configured mode.
pub(crate) fn install(ctx: &Context, toolset: &Toolset) -> Result<()> {
    let mode = &ctx.settings.mode;
    let manager = ctx.package_manager(toolset)?;

    manager
        .create_profiles(mode, &ctx.runner)
        .with_context(|| format!("Failed to create {} profiles", manager.name()))?;
    manager
        .install_dependencies(mode, &ctx.runner)
        .with_context(|| format!("Failed to install {} dependencies", manager.name()))?;

    ui::success("Installed", format!("{} dependencies for {mode}", manager.name()));
    Ok(())
}
