use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default name of the workspace directory inside the project.
pub const DEFAULT_WORKSPACE_DIR_NAME: &str = ".workspace";

/// Workspace path types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspacePath {
    /// Workspace root: <project>/<workspace_dir_name>
    Root,
    /// Scratch space for in-flight downloads: workspace/downloads
    Downloads,
    /// Conan home (CONAN_HOME): workspace/conan2_home
    ConanHome,
    /// Conan profiles: workspace/conan2_home/profiles
    ConanProfiles,
    /// Per-mode Conan output folders: workspace/conan2_home/dependencies
    ConanDependencies,
    /// Shared vcpkg install root: workspace/vcpkg/install
    VcpkgInstall,
    /// vcpkg build trees: workspace/vcpkg/buildtrees
    VcpkgBuildtrees,
    /// vcpkg package staging: workspace/vcpkg/packages
    VcpkgPackages,
    /// vswhere state: workspace/vswhere
    Vswhere,
    /// Cached compiler environment: workspace/vswhere/environment-cache.json
    EnvironmentCache,
    /// Build output root, one directory per mode: workspace/build
    Build,
    /// Tool receipts: workspace/tools.lock
    Receipts,
}

/// Directory layout of one project's workspace.
///
/// Every path is derived from the project directory and the workspace
/// directory name. Nothing here touches the filesystem except
/// [`WorkspaceLayout::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    project_dir: PathBuf,
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(project_dir: impl Into<PathBuf>, workspace_dir_name: &str) -> Self {
        let project_dir = project_dir.into();
        let root = project_dir.join(workspace_dir_name);
        Self { project_dir, root }
    }

    /// Directory holding the project's sources and manifests.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Get path for a specific workspace location
    pub fn path(&self, path_type: WorkspacePath) -> PathBuf {
        match path_type {
            WorkspacePath::Root => self.root.clone(),
            WorkspacePath::Downloads => self.root.join("downloads"),
            WorkspacePath::ConanHome => self.root.join("conan2_home"),
            WorkspacePath::ConanProfiles => self.root.join("conan2_home").join("profiles"),
            WorkspacePath::ConanDependencies => {
                self.root.join("conan2_home").join("dependencies")
            }
            WorkspacePath::VcpkgInstall => self.root.join("vcpkg").join("install"),
            WorkspacePath::VcpkgBuildtrees => self.root.join("vcpkg").join("buildtrees"),
            WorkspacePath::VcpkgPackages => self.root.join("vcpkg").join("packages"),
            WorkspacePath::Vswhere => self.root.join("vswhere"),
            WorkspacePath::EnvironmentCache => {
                self.root.join("vswhere").join("environment-cache.json")
            }
            WorkspacePath::Build => self.root.join("build"),
            WorkspacePath::Receipts => self.root.join("tools.lock"),
        }
    }

    /// Install directory for a pinned tool: workspace/<name>/<name>-<version>
    pub fn tool_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(format!("{name}-{version}"))
    }

    /// Create the workspace root if needed.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::io(format!("Failed to create workspace {:?}", self.root), e))
    }
}

/// Render a path with forward slashes and no repeated separators.
///
/// Used for every path handed to CMake, Conan profiles and log lines so the
/// output is identical across hosts.
pub fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut normalized = String::with_capacity(raw.len());
    let mut previous_slash = false;
    for (index, ch) in raw.chars().enumerate() {
        if ch == '/' {
            // Keep a leading "//" for UNC shares.
            if previous_slash && index > 1 {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(ch);
    }
    normalized
}
