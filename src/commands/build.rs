use super::{configure, prepare, Context};
use crate::cmake::BuildState;
use crate::ui;
use anyhow::Result;

pub fn execute(ctx: &Context, dependencies: bool) -> Result<()> {
    let toolset = prepare(ctx, dependencies)?;
    let config = ctx.build_config();

    if BuildState::detect(&config) == BuildState::Unconfigured {
        ui::info(format!("{} is not configured yet; configuring first", config.mode));
        configure::run(ctx, &toolset)?;
    }

    let progress = ui::Progress::new("Building", config.mode.to_string());
    match ctx.configurator(&toolset).build(&config) {
        Ok(()) => {
            progress.success("Built");
            Ok(())
        }
        Err(err) => {
            progress.fail("Failed", &err);
            Err(err.into())
        }
    }
}
