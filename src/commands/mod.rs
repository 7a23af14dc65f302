use anyhow::{bail, Context as _, Result};
use std::env;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::cmake::{BuildConfig, Configurator, GeneratorChoice};
use crate::config::Settings;
use crate::package::{self, PackageManager};
use crate::process::SystemRunner;
use crate::tools::download::HttpFetcher;
use crate::tools::{Installer, Platform, Toolset};
use crate::vcvars::{HarvestOutcome, Harvester};
use crate::workspace::{WorkspaceLayout, WorkspacePath};

mod build;
mod clean;
mod configure;
mod deps;
mod rebuild;
mod setup;
mod status;
mod vcvars;

pub fn execute(cli: Cli) -> Result<()> {
    let ctx = Context::load(&cli.global)?;
    let dependencies = cli.global.dependencies;

    match cli.command {
        Commands::Setup => setup::execute(&ctx),
        Commands::Deps => deps::execute(&ctx),
        Commands::Configure => configure::execute(&ctx, dependencies),
        Commands::Build => build::execute(&ctx, dependencies),
        Commands::Rebuild => rebuild::execute(&ctx, dependencies),
        Commands::Clean => clean::execute(&ctx),
        Commands::Status => status::execute(&ctx),
        Commands::Vcvars => vcvars::execute(&ctx),
    }
}

/// Everything a command needs, resolved once per invocation.
pub struct Context {
    pub settings: Settings,
    pub layout: WorkspaceLayout,
    pub platform: Platform,
    pub runner: SystemRunner,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let cwd = env::current_dir().context("Failed to read the current directory")?;
        let project_dir = match &global.workdir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        };
        if !project_dir.is_dir() {
            bail!("project directory {:?} does not exist", project_dir);
        }

        let settings = Settings::load(project_dir, global.overrides())
            .context("Failed to load project settings")?;
        let layout = settings.layout();

        Ok(Self {
            settings,
            layout,
            platform: Platform::current(),
            runner: SystemRunner,
        })
    }

    fn with_installer<T>(&self, f: impl FnOnce(&Installer<'_>) -> Result<T>) -> Result<T> {
        self.layout.ensure()?;
        let fetcher = HttpFetcher::new()?;
        let installer = Installer::new(&self.layout, &fetcher, self.platform.clone())
            .use_system_tools(self.settings.use_system_tools);
        f(&installer)
    }

    pub fn toolset(&self) -> Result<Toolset> {
        self.with_installer(|installer| {
            Toolset::ensure(installer, &self.settings).context("Failed to prepare build tools")
        })
    }

    /// Run the compiler environment harvester when it applies to this host.
    pub fn load_compiler_environment(&self) -> Result<HarvestOutcome> {
        if !self.platform.is_windows() {
            return Ok(HarvestOutcome::NotApplied("not a Windows host".to_string()));
        }
        if !self.settings.vcvarsall {
            return Ok(HarvestOutcome::NotApplied("disabled by configuration".to_string()));
        }
        self.harvest()
    }

    pub fn harvest(&self) -> Result<HarvestOutcome> {
        let harvester = Harvester::new(
            &self.layout,
            &self.runner,
            self.settings.vcvars_arch.as_str(),
            self.platform.os,
        );
        self.with_installer(|installer| Ok(harvester.harvest(installer)?))
    }

    pub fn build_config(&self) -> BuildConfig {
        let mut config = BuildConfig::new(
            &self.settings.project_dir,
            self.layout.path(WorkspacePath::Build),
            self.settings.mode.clone(),
        );
        config.extra_prefix_paths = self.settings.prefix_paths.clone();
        config
    }

    pub fn generator(&self, toolset: &Toolset) -> GeneratorChoice {
        GeneratorChoice {
            name: self.settings.generator.clone(),
            ninja: toolset.ninja.as_ref().map(|ninja| ninja.executable.clone()),
        }
    }

    pub fn package_manager<'a>(
        &'a self,
        toolset: &'a Toolset,
    ) -> Result<Box<dyn PackageManager + 'a>> {
        Ok(package::for_settings(
            &self.settings,
            &self.layout,
            toolset,
            self.platform.os,
        )?)
    }

    pub fn configurator(&self, toolset: &Toolset) -> Configurator<'_> {
        Configurator::new(&toolset.cmake.executable, &self.runner)
    }
}

/// Tools plus compiler environment, for commands that run CMake.
fn prepare(ctx: &Context, dependencies: bool) -> Result<Toolset> {
    let toolset = ctx.toolset()?;
    ctx.load_compiler_environment()?;
    if dependencies {
        deps::install(ctx, &toolset)?;
    }
    Ok(toolset)
}
