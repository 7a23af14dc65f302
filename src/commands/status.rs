use super::Context;
use crate::cmake::{BuildState, GeneratorChoice};
use crate::lockfile::Lockfile;
use crate::package::conan;
use crate::ui;
use crate::workspace::{normalize_path, WorkspacePath};
use anyhow::Result;

pub fn execute(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let layout = &ctx.layout;
    let config = ctx.build_config();

    ui::status("Project", normalize_path(layout.project_dir()));
    ui::status("Workspace", normalize_path(&layout.path(WorkspacePath::Root)));
    ui::status("Mode", &settings.mode);
    ui::status("Packages", settings.package_manager);
    ui::status(
        "Build",
        format!(
            "{} ({})",
            BuildState::detect(&config),
            normalize_path(&config.config_files_path())
        ),
    );
    if settings.package_manager.uses_conan() {
        ui::status(
            "Toolchain",
            conan::toolchain_file(
                &settings.mode,
                layout,
                GeneratorChoice::is_ninja_generator(settings.generator.as_deref(), settings.ninja),
                ctx.platform.os,
            ),
        );
    }

    let lockfile = Lockfile::load_or_default(&layout.path(WorkspacePath::Receipts))?;
    let mut receipts = lockfile.tool_receipts().peekable();
    if receipts.peek().is_none() {
        ui::info("No tools downloaded into this workspace");
    }
    for receipt in receipts {
        ui::status(
            "Tool",
            format!(
                "{} {} {} (installed {})",
                receipt.name,
                receipt.version,
                normalize_path(&receipt.executable),
                receipt.installed_at
            ),
        );
    }
    Ok(())
}
