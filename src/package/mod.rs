//! Conan and vcpkg behind one interface.
//!
//! A manager contributes two things to a CMake configure: an optional
//! toolchain file and a list of prefix paths. With both managers active,
//! Conan supplies the toolchain file and vcpkg the prefix paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::cmake::GeneratorChoice;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::mode::BuildMode;
use crate::process::ProcessRunner;
use crate::tools::{Os, Toolset};
use crate::workspace::WorkspaceLayout;

pub mod conan;
pub mod profile;
pub mod vcpkg;

pub use conan::Conan;
pub use vcpkg::Vcpkg;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    #[default]
    Conan,
    Vcpkg,
    /// Conan and vcpkg together.
    #[serde(rename = "all")]
    #[value(name = "all")]
    Both,
}

impl PackageManagerKind {
    pub fn uses_conan(&self) -> bool {
        matches!(self, PackageManagerKind::Conan | PackageManagerKind::Both)
    }

    pub fn uses_vcpkg(&self) -> bool {
        matches!(self, PackageManagerKind::Vcpkg | PackageManagerKind::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerKind::Conan => "conan",
            PackageManagerKind::Vcpkg => "vcpkg",
            PackageManagerKind::Both => "all",
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manager contributions to one configure call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureArgs {
    pub toolchain_file: Option<String>,
    pub prefix_paths: Vec<String>,
}

impl ConfigureArgs {
    /// Combine two contributions. At most one toolchain file survives.
    pub fn merge(mut self, other: ConfigureArgs) -> Self {
        if let Some(theirs) = other.toolchain_file {
            if self.toolchain_file.is_none() {
                self.toolchain_file = Some(theirs);
            } else if self.toolchain_file.as_deref() != Some(theirs.as_str()) {
                warn!(
                    "Ignoring second toolchain file {theirs}; keeping {}",
                    self.toolchain_file.as_deref().unwrap_or_default()
                );
            }
        }
        for path in other.prefix_paths {
            if !self.prefix_paths.contains(&path) {
                self.prefix_paths.push(path);
            }
        }
        self
    }
}

pub trait PackageManager {
    fn name(&self) -> &'static str;

    /// `CMAKE_TOOLCHAIN_FILE` for `mode`, if this manager provides one.
    fn toolchain_file(&self, mode: &BuildMode) -> Option<String>;

    /// Directories to add to `CMAKE_PREFIX_PATH`.
    fn prefix_paths(&self) -> Result<Vec<String>>;

    /// Prepare per-mode profiles ahead of installation.
    fn create_profiles(&self, _mode: &BuildMode, _runner: &dyn ProcessRunner) -> Result<()> {
        Ok(())
    }

    fn install_dependencies(&self, mode: &BuildMode, runner: &dyn ProcessRunner) -> Result<()>;

    fn configure_args(&self, mode: &BuildMode) -> Result<ConfigureArgs> {
        Ok(ConfigureArgs {
            toolchain_file: self.toolchain_file(mode),
            prefix_paths: self.prefix_paths()?,
        })
    }
}

/// Runs several managers in order and merges what they produce.
pub struct Composite<'a> {
    managers: Vec<Box<dyn PackageManager + 'a>>,
}

impl<'a> Composite<'a> {
    pub fn new(managers: Vec<Box<dyn PackageManager + 'a>>) -> Self {
        Self { managers }
    }
}

impl PackageManager for Composite<'_> {
    fn name(&self) -> &'static str {
        "all"
    }

    fn toolchain_file(&self, mode: &BuildMode) -> Option<String> {
        self.managers
            .iter()
            .find_map(|manager| manager.toolchain_file(mode))
    }

    fn prefix_paths(&self) -> Result<Vec<String>> {
        let mut merged = ConfigureArgs::default();
        for manager in &self.managers {
            merged = merged.merge(ConfigureArgs {
                toolchain_file: None,
                prefix_paths: manager.prefix_paths()?,
            });
        }
        Ok(merged.prefix_paths)
    }

    fn create_profiles(&self, mode: &BuildMode, runner: &dyn ProcessRunner) -> Result<()> {
        for manager in &self.managers {
            manager.create_profiles(mode, runner)?;
        }
        Ok(())
    }

    fn install_dependencies(&self, mode: &BuildMode, runner: &dyn ProcessRunner) -> Result<()> {
        for manager in &self.managers {
            manager.install_dependencies(mode, runner)?;
        }
        Ok(())
    }

    fn configure_args(&self, mode: &BuildMode) -> Result<ConfigureArgs> {
        let mut merged = ConfigureArgs::default();
        for manager in &self.managers {
            merged = merged.merge(manager.configure_args(mode)?);
        }
        Ok(merged)
    }
}

/// Build the manager (or composite) selected in `settings`.
pub fn for_settings<'a>(
    settings: &'a Settings,
    layout: &'a WorkspaceLayout,
    toolset: &'a Toolset,
    os: Os,
) -> Result<Box<dyn PackageManager + 'a>> {
    let conan = || -> Result<Box<dyn PackageManager + 'a>> {
        let tool = toolset
            .conan
            .as_ref()
            .ok_or_else(|| Error::ToolNotFound("conan".to_string()))?;
        Ok(Box::new(Conan::new(
            layout,
            tool.executable.clone(),
            toolset.cmake.executable.clone(),
            toolset.ninja.as_ref().map(|ninja| ninja.executable.clone()),
            GeneratorChoice::is_ninja_generator(
                settings.generator.as_deref(),
                toolset.ninja.is_some(),
            ),
            settings.cppstd.clone(),
            os,
        )))
    };
    let vcpkg = || -> Result<Box<dyn PackageManager + 'a>> {
        let tool = toolset
            .vcpkg
            .as_ref()
            .ok_or_else(|| Error::ToolNotFound("vcpkg".to_string()))?;
        Ok(Box::new(Vcpkg::new(
            layout,
            tool.clone(),
            settings.allow_unresolved_dependencies,
        )))
    };

    match settings.package_manager {
        PackageManagerKind::Conan => conan(),
        PackageManagerKind::Vcpkg => vcpkg(),
        PackageManagerKind::Both => Ok(Box::new(Composite::new(vec![conan()?, vcpkg()?]))),
    }
}
