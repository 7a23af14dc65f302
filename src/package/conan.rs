use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::profile::ConanProfile;
use super::PackageManager;
use crate::error::{Error, Result};
use crate::mode::BuildMode;
use crate::process::{Invocation, ProcessRunner};
use crate::tools::Os;
use crate::workspace::{normalize_path, WorkspaceLayout, WorkspacePath};

const PROJECT_FILES: [&str; 2] = ["conanfile.txt", "conanfile.py"];

/// `conan_toolchain.cmake` location for `mode`.
///
/// Conan's CMake layout adds a per-configuration directory for single-config
/// generators: always on non-Windows hosts, and on Windows when Ninja is used.
pub fn toolchain_file(mode: &BuildMode, layout: &WorkspaceLayout, ninja: bool, os: Os) -> String {
    let mut path = output_folder(layout, mode).join("build");
    if os != Os::Windows || ninja {
        path.push(mode.as_str());
    }
    normalize_path(&path.join("generators").join("conan_toolchain.cmake"))
}

fn output_folder(layout: &WorkspaceLayout, mode: &BuildMode) -> PathBuf {
    layout
        .path(WorkspacePath::ConanDependencies)
        .join(mode.dir_name())
}

/// Profile-based manager: one Conan profile and output folder per mode.
pub struct Conan<'a> {
    layout: &'a WorkspaceLayout,
    executable: PathBuf,
    cmake: PathBuf,
    ninja: Option<PathBuf>,
    ninja_generator: bool,
    cppstd: String,
    os: Os,
}

impl<'a> Conan<'a> {
    pub fn new(
        layout: &'a WorkspaceLayout,
        executable: PathBuf,
        cmake: PathBuf,
        ninja: Option<PathBuf>,
        ninja_generator: bool,
        cppstd: String,
        os: Os,
    ) -> Self {
        Self {
            layout,
            executable,
            cmake,
            ninja,
            ninja_generator,
            cppstd,
            os,
        }
    }

    /// Base invocation: `CONAN_HOME` always set, Ninja's directory on PATH.
    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut invocation = Invocation::new(&self.executable, self.layout.project_dir())
            .args(args)
            .env("CONAN_HOME", self.layout.path(WorkspacePath::ConanHome));
        if let Some(dir) = self.ninja.as_deref().and_then(Path::parent) {
            invocation = invocation.prepend_path(dir);
        }
        invocation
    }

    /// Profile for `mode`, derived from the detected default profile.
    pub fn profile_for(&self, detected: &ConanProfile, mode: &BuildMode) -> ConanProfile {
        let mut profile = detected.clone();
        profile.set("settings", "build_type", mode.as_str());
        profile.set("settings", "compiler.cppstd", self.cppstd.as_str());
        profile.set("conf", "tools.cmake:cmake_program", normalize_path(&self.cmake));
        if self.ninja_generator {
            profile.set("conf", "tools.cmake.cmaketoolchain:generator", "Ninja");
        }
        profile
    }

    fn check_project_file(&self) -> Result<()> {
        let project_dir = self.layout.project_dir();
        if PROJECT_FILES.iter().any(|name| project_dir.join(name).is_file()) {
            Ok(())
        } else {
            Err(Error::MissingProjectFile {
                manager: "conan",
                expected: "conanfile.txt or conanfile.py",
                project_dir: project_dir.to_path_buf(),
            })
        }
    }
}

impl PackageManager for Conan<'_> {
    fn name(&self) -> &'static str {
        "conan"
    }

    fn toolchain_file(&self, mode: &BuildMode) -> Option<String> {
        Some(toolchain_file(mode, self.layout, self.ninja_generator, self.os))
    }

    fn prefix_paths(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn create_profiles(&self, mode: &BuildMode, runner: &dyn ProcessRunner) -> Result<()> {
        runner.run(&self.invocation(["profile", "detect", "--force"]))?;

        let profiles_dir = self.layout.path(WorkspacePath::ConanProfiles);
        let default_path = profiles_dir.join("default");
        let detected = fs::read_to_string(&default_path).map_err(|e| {
            Error::io(format!("Failed to read detected profile {:?}", default_path), e)
        })?;
        let detected = ConanProfile::parse(&detected);

        let mut modes = BuildMode::CANONICAL.to_vec();
        if !mode.is_canonical() {
            modes.push(mode.clone());
        }
        for mode in &modes {
            let path = profiles_dir.join(mode.dir_name());
            fs::write(&path, self.profile_for(&detected, mode).to_string())
                .map_err(|e| Error::io(format!("Failed to write profile {:?}", path), e))?;
        }
        info!("Wrote {} Conan profiles to {:?}", modes.len(), profiles_dir);
        Ok(())
    }

    fn install_dependencies(&self, mode: &BuildMode, runner: &dyn ProcessRunner) -> Result<()> {
        self.check_project_file()?;
        let output = normalize_path(&output_folder(self.layout, mode));
        info!("Installing Conan dependencies for {mode} into {output}");
        runner.run(&self.invocation([
            "install".to_string(),
            ".".to_string(),
            "--build".to_string(),
            "missing".to_string(),
            "--profile".to_string(),
            mode.dir_name(),
            "--output-folder".to_string(),
            output,
        ]))
    }
}
