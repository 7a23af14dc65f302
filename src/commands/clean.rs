use super::Context;
use crate::cmake;
use crate::ui;
use crate::workspace::normalize_path;
use anyhow::Result;

pub fn execute(ctx: &Context) -> Result<()> {
    let config = ctx.build_config();
    let path = normalize_path(&config.config_files_path());

    if cmake::delete_cache(&config)? {
        ui::success("Removed", path);
    } else {
        ui::info(format!("Nothing to clean for {} ({path})", config.mode));
    }
    Ok(())
}
