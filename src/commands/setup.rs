use super::Context;
use crate::ui;
use crate::workspace::normalize_path;
use anyhow::Result;

pub fn execute(ctx: &Context) -> Result<()> {
    let toolset = ctx.toolset()?;
    for tool in toolset.all() {
        ui::success(
            "Ready",
            format!(
                "{} ({}) {}",
                tool.name,
                tool.origin,
                normalize_path(&tool.executable)
            ),
        );
    }
    Ok(())
}
