use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use super::PackageManager;
use crate::error::{Error, Result};
use crate::mode::BuildMode;
use crate::process::{Invocation, ProcessRunner};
use crate::resolver::{self, DependencyManifest};
use crate::tools::VcpkgTool;
use crate::workspace::{normalize_path, WorkspaceLayout, WorkspacePath};

const MANIFEST_FILE: &str = "vcpkg.json";

/// Manifest-based manager. Installs into one shared root for every mode and
/// contributes prefix paths instead of a toolchain file.
pub struct Vcpkg<'a> {
    layout: &'a WorkspaceLayout,
    tool: VcpkgTool,
    allow_unresolved: bool,
}

impl<'a> Vcpkg<'a> {
    pub fn new(layout: &'a WorkspaceLayout, tool: VcpkgTool, allow_unresolved: bool) -> Self {
        Self {
            layout,
            tool,
            allow_unresolved,
        }
    }

    fn manifest_path(&self) -> Result<PathBuf> {
        let path = self.layout.project_dir().join(MANIFEST_FILE);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::MissingProjectFile {
                manager: "vcpkg",
                expected: MANIFEST_FILE,
                project_dir: self.layout.project_dir().to_path_buf(),
            })
        }
    }
}

impl PackageManager for Vcpkg<'_> {
    fn name(&self) -> &'static str {
        "vcpkg"
    }

    fn toolchain_file(&self, _mode: &BuildMode) -> Option<String> {
        None
    }

    fn prefix_paths(&self) -> Result<Vec<String>> {
        let manifest = DependencyManifest::load(&self.manifest_path()?)?;
        let search_root = self.layout.path(WorkspacePath::VcpkgInstall);
        let resolution = resolver::resolve_manifest(&manifest, &search_root);

        let directories = if self.allow_unresolved {
            if !resolution.is_complete() {
                warn!(
                    "vcpkg dependencies not found under {:?}: {}",
                    search_root,
                    resolution.unresolved.join(", ")
                );
            }
            resolution.directories()
        } else {
            resolution.into_result(&search_root)?
        };

        Ok(directories.iter().map(|dir| normalize_path(dir)).collect())
    }

    fn install_dependencies(&self, _mode: &BuildMode, runner: &dyn ProcessRunner) -> Result<()> {
        self.manifest_path()?;

        let install = self.layout.path(WorkspacePath::VcpkgInstall);
        let buildtrees = self.layout.path(WorkspacePath::VcpkgBuildtrees);
        let packages = self.layout.path(WorkspacePath::VcpkgPackages);
        for dir in [&install, &buildtrees, &packages] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("Failed to create directory {:?}", dir), e))?;
        }

        info!("Installing vcpkg dependencies into {}", normalize_path(&install));
        let invocation = Invocation::new(self.tool.executable(), self.layout.project_dir())
            .env("VCPKG_ROOT", &self.tool.root)
            .args([
                "install".to_string(),
                "--x-install-root".to_string(),
                normalize_path(&install),
                "--x-buildtrees-root".to_string(),
                normalize_path(&buildtrees),
                "--x-packages-root".to_string(),
                normalize_path(&packages),
                "--clean-downloads-after-build".to_string(),
                "--clean-buildtrees-after-build".to_string(),
                "--clean-after-build".to_string(),
                "--clean-packages-after-build".to_string(),
            ]);
        runner.run(&invocation)
    }
}
