use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Overrides, ToolOverrides};
use crate::package::PackageManagerKind;

/// C++ build bootstrapper
///
/// cxxboot installs pinned CMake, Conan, vcpkg and Ninja into a workspace
/// inside your project, installs the project's dependencies and drives
/// CMake configure and build with the right toolchain wiring. Defaults can
/// be kept in `cxxboot.toml` next to the sources.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'w', long, global = true, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Name of the workspace directory inside the project
    #[arg(long, global = true, value_name = "NAME")]
    pub workspace_dir_name: Option<String>,

    /// Build mode: Debug, Release, RelWithDebInfo, MinSizeRel or a custom name
    #[arg(short, long, global = true, value_name = "MODE")]
    pub mode: Option<String>,

    /// Package manager to use
    #[arg(long, global = true, value_enum, value_name = "MANAGER")]
    pub package_manager: Option<PackageManagerKind>,

    /// CMake executable (path or name on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub cmake_path: Option<String>,

    /// Conan executable (path or name on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub conan: Option<String>,

    /// vcpkg executable (path or name on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub vcpkg: Option<String>,

    /// Use the Ninja generator
    #[arg(long, global = true)]
    pub ninja: bool,

    /// Ninja executable (path or name on PATH); implies --ninja
    #[arg(long, global = true, value_name = "PATH")]
    pub ninja_path: Option<String>,

    /// CMake generator name, passed as -G
    #[arg(short = 'G', long, global = true, value_name = "GENERATOR")]
    pub generator: Option<String>,

    /// Always use workspace tools; skip the PATH lookup
    #[arg(long, global = true)]
    pub workspace_tools: bool,

    /// Do not load the Visual Studio environment on Windows
    #[arg(long, global = true)]
    pub no_vcvarsall: bool,

    /// Install dependencies before configure, build or rebuild
    #[arg(short, long, global = true)]
    pub dependencies: bool,
}

impl GlobalArgs {
    /// Command-line values for the settings merge. Flags that were not
    /// given stay `None` so `cxxboot.toml` can supply them.
    pub fn overrides(&self) -> Overrides {
        let ninja = self.ninja || self.ninja_path.is_some();
        Overrides {
            workspace_dir_name: self.workspace_dir_name.clone(),
            mode: self.mode.clone(),
            package_manager: self.package_manager,
            generator: self.generator.clone(),
            ninja: ninja.then_some(true),
            use_system_tools: self.workspace_tools.then_some(false),
            vcvarsall: self.no_vcvarsall.then_some(false),
            tools: ToolOverrides {
                cmake: self.cmake_path.clone(),
                conan: self.conan.clone(),
                vcpkg: self.vcpkg.clone(),
                ninja: self.ninja_path.clone(),
            },
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ensure CMake, the package manager(s) and Ninja are available
    Setup,

    /// Create Conan profiles and install the project's dependencies
    Deps,

    /// Run CMake configure for the selected mode
    Configure,

    /// Build the selected mode, configuring first if needed
    Build,

    /// Delete the mode's CMake cache, then configure and build
    Rebuild,

    /// Delete the mode's CMake cache
    Clean,

    /// Show workspace, build state and installed tools
    Status,

    /// Load the Visual Studio compiler environment and cache it
    Vcvars,
}
