use std::fmt;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::lockfile::{ArtifactDigest, Lockfile};
use crate::ui;
use crate::workspace::{normalize_path, WorkspaceLayout, WorkspacePath};

pub mod archive;
pub mod catalog;
pub mod download;

use archive::{ArchiveFormat, ExtractPolicy};
use download::{format_digest, Fetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Os::Windows,
            "linux" => Os::Linux,
            "macos" => Os::MacOs,
            _ => Os::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::MacOs => "macos",
            Os::Other => std::env::consts::OS,
        }
    }
}

/// Host the tools are installed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: String,
}

impl Platform {
    pub fn new(os: Os, arch: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(Os::current(), std::env::consts::ARCH)
    }

    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.as_str(), self.arch)
    }
}

/// One downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub url: String,
    pub format: ArchiveFormat,
    /// Subdirectory of the tool directory receiving the content.
    pub target: String,
    /// Installed name for [`ArchiveFormat::Executable`] artifacts.
    pub file_name: Option<String>,
    pub policy: ExtractPolicy,
}

impl Artifact {
    pub fn archive(url: impl Into<String>, format: ArchiveFormat) -> Self {
        Self {
            url: url.into(),
            format,
            target: String::new(),
            file_name: None,
            policy: ExtractPolicy::default(),
        }
    }

    pub fn executable(url: impl Into<String>, file_name: &str) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            ..Self::archive(url, ArchiveFormat::Executable)
        }
    }

    pub fn policy(mut self, policy: ExtractPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    /// File name of the scratch download, taken from the URL.
    fn scratch_name(&self, tool: &str, index: usize) -> String {
        let last_segment = url::Url::parse(&self.url).ok().and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
                .filter(|segment| !segment.is_empty())
        });
        match last_segment {
            Some(segment) => format!("{tool}-{index}-{segment}"),
            None => format!("{tool}-{index}.download"),
        }
    }
}

/// Per-OS content of a pinned tool (x86_64 only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Executable path relative to the tool directory, with platform suffix.
    pub executable: String,
    pub artifacts: Vec<Artifact>,
}

impl Release {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
            artifacts: Vec::new(),
        }
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub version: &'static str,
    releases: Vec<(Os, Release)>,
}

impl ToolSpec {
    pub fn new(name: &'static str, version: &'static str) -> Self {
        Self {
            name,
            version,
            releases: Vec::new(),
        }
    }

    pub fn release(mut self, os: Os, release: Release) -> Self {
        self.releases.push((os, release));
        self
    }

    pub fn release_for(&self, platform: &Platform) -> Result<&Release> {
        let unsupported = || Error::UnsupportedPlatform {
            tool: self.name.to_string(),
            os: platform.os.as_str().to_string(),
            arch: platform.arch.clone(),
        };
        if platform.arch != "x86_64" {
            return Err(unsupported());
        }
        self.releases
            .iter()
            .find(|(os, _)| *os == platform.os)
            .map(|(_, release)| release)
            .ok_or_else(unsupported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    /// Found on PATH
    System,
    /// Given on the command line or in cxxboot.toml
    Explicit,
    /// Already present in the workspace
    Workspace,
    /// Downloaded by this invocation
    Downloaded,
}

impl fmt::Display for ToolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolOrigin::System => "system",
            ToolOrigin::Explicit => "explicit",
            ToolOrigin::Workspace => "workspace",
            ToolOrigin::Downloaded => "downloaded",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    pub name: String,
    pub executable: PathBuf,
    /// Tool directory inside the workspace, for workspace-managed tools.
    pub root: Option<PathBuf>,
    pub origin: ToolOrigin,
}

impl InstalledTool {
    /// Directory containing the executable.
    pub fn bin_dir(&self) -> PathBuf {
        self.executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Resolve an explicit tool override. Values containing a path separator
/// must name an existing file; bare names are looked up on PATH.
pub fn resolve_override(value: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(value)
        .map_err(|e| Error::Config(format!("cannot expand tool path {value:?}: {e}")))?;
    let expanded = expanded.as_ref();

    if expanded.contains('/') || expanded.contains(MAIN_SEPARATOR) {
        let path = PathBuf::from(expanded);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::ToolNotFound(expanded.to_string()))
        }
    } else {
        which::which(expanded).map_err(|_| Error::ToolNotFound(expanded.to_string()))
    }
}

/// Presence check, pinned download, and extraction of workspace tools.
pub struct Installer<'a> {
    layout: &'a WorkspaceLayout,
    fetcher: &'a dyn Fetcher,
    platform: Platform,
    use_system_tools: bool,
}

impl<'a> Installer<'a> {
    pub fn new(layout: &'a WorkspaceLayout, fetcher: &'a dyn Fetcher, platform: Platform) -> Self {
        Self {
            layout,
            fetcher,
            platform,
            use_system_tools: true,
        }
    }

    /// Whether PATH is consulted before the workspace.
    pub fn use_system_tools(mut self, enabled: bool) -> Self {
        self.use_system_tools = enabled;
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Canonical executable of `spec` inside the workspace.
    pub fn canonical_executable(&self, spec: &ToolSpec) -> Result<PathBuf> {
        let release = spec.release_for(&self.platform)?;
        Ok(self
            .layout
            .tool_dir(spec.name, spec.version)
            .join(&release.executable))
    }

    /// Ensure `spec` is available: explicit override, then PATH, then the
    /// workspace copy, then a fresh download.
    pub fn ensure(&self, spec: &ToolSpec, explicit: Option<&str>) -> Result<InstalledTool> {
        if let Some(value) = explicit {
            let executable = resolve_override(value)?;
            info!("Using {} from {}", spec.name, normalize_path(&executable));
            return Ok(InstalledTool {
                name: spec.name.to_string(),
                executable,
                root: None,
                origin: ToolOrigin::Explicit,
            });
        }

        if self.use_system_tools {
            if let Ok(executable) = which::which(spec.name) {
                info!("{} found on PATH at {}", spec.name, normalize_path(&executable));
                return Ok(InstalledTool {
                    name: spec.name.to_string(),
                    executable,
                    root: None,
                    origin: ToolOrigin::System,
                });
            }
        }

        let release = spec.release_for(&self.platform)?;
        let root = self.layout.tool_dir(spec.name, spec.version);
        let executable = root.join(&release.executable);

        if self.is_complete(&root, release) {
            debug!("{} {} already in workspace", spec.name, spec.version);
            return Ok(InstalledTool {
                name: spec.name.to_string(),
                executable,
                root: Some(root),
                origin: ToolOrigin::Workspace,
            });
        }

        self.download(spec, release, &root)?;
        Ok(InstalledTool {
            name: spec.name.to_string(),
            executable,
            root: Some(root),
            origin: ToolOrigin::Downloaded,
        })
    }

    fn is_complete(&self, root: &Path, release: &Release) -> bool {
        root.join(&release.executable).is_file()
            && release
                .artifacts
                .iter()
                .filter(|artifact| !artifact.target.is_empty())
                .all(|artifact| root.join(&artifact.target).is_dir())
    }

    fn download(&self, spec: &ToolSpec, release: &Release, root: &Path) -> Result<()> {
        if root.exists() {
            info!("Previous {} download exists. Deleting...", spec.name);
            fs::remove_dir_all(root)
                .map_err(|e| Error::io(format!("Failed to remove stale install {:?}", root), e))?;
        }

        let scratch_dir = self.layout.path(WorkspacePath::Downloads);
        let progress = ui::Progress::new("Downloading", format!("{} {}", spec.name, spec.version));

        let mut digests = Vec::with_capacity(release.artifacts.len());
        for (index, artifact) in release.artifacts.iter().enumerate() {
            let scratch = scratch_dir.join(artifact.scratch_name(spec.name, index));
            let digest = match self.install_artifact(artifact, &scratch, root) {
                Ok(digest) => digest,
                Err(err) => {
                    progress.fail("Failed", &err);
                    return Err(err);
                }
            };
            digests.push(ArtifactDigest {
                url: artifact.url.clone(),
                sha256: format_digest(&digest),
            });
        }

        let executable = root.join(&release.executable);
        if !executable.is_file() {
            let err = Error::Archive {
                path: root.to_path_buf(),
                reason: format!("{} is missing after extraction", release.executable),
            };
            progress.fail("Failed", &err);
            return Err(err);
        }
        progress.success("Installed");

        let receipts_path = self.layout.path(WorkspacePath::Receipts);
        let mut lockfile = Lockfile::load_or_default(&receipts_path)?;
        lockfile.record_tool_install(spec.name, spec.version, executable, digests);
        lockfile.save(&receipts_path)
    }

    fn install_artifact(&self, artifact: &Artifact, scratch: &Path, root: &Path) -> Result<[u8; 32]> {
        info!("Downloading {}", artifact.url);
        let digest = self.fetcher.fetch(&artifact.url, scratch)?;

        let target = root.join(&artifact.target);
        match artifact.format {
            ArchiveFormat::Executable => {
                let name = artifact
                    .file_name
                    .as_deref()
                    .ok_or_else(|| Error::Config(format!("{} has no file name", artifact.url)))?;
                archive::install_executable(scratch, &target.join(name))?;
            }
            format => {
                archive::extract(scratch, format, &target, &artifact.policy)?;
            }
        }

        if let Err(err) = fs::remove_file(scratch) {
            warn!("Failed to remove scratch file {:?}: {err}", scratch);
        }
        Ok(digest)
    }
}

/// vcpkg executable plus the root it is run with (`VCPKG_ROOT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcpkgTool {
    pub tool: InstalledTool,
    pub root: PathBuf,
}

impl VcpkgTool {
    pub fn new(tool: InstalledTool) -> Self {
        let root = match &tool.root {
            Some(install_dir) => install_dir.join(catalog::VCPKG_REGISTRY_DIR),
            None => tool.bin_dir(),
        };
        Self { tool, root }
    }

    pub fn executable(&self) -> &Path {
        &self.tool.executable
    }
}

/// Tools one invocation works with.
#[derive(Debug, Clone)]
pub struct Toolset {
    pub cmake: InstalledTool,
    pub conan: Option<InstalledTool>,
    pub vcpkg: Option<VcpkgTool>,
    pub ninja: Option<InstalledTool>,
}

impl Toolset {
    /// Ensure every tool the settings call for.
    pub fn ensure(installer: &Installer<'_>, settings: &Settings) -> Result<Self> {
        let overrides = &settings.tools;
        let cmake = installer.ensure(&catalog::cmake(), overrides.cmake.as_deref())?;

        let conan = if settings.package_manager.uses_conan() {
            Some(installer.ensure(&catalog::conan(), overrides.conan.as_deref())?)
        } else {
            None
        };

        let vcpkg = if settings.package_manager.uses_vcpkg() {
            let tool = installer.ensure(&catalog::vcpkg(), overrides.vcpkg.as_deref())?;
            Some(VcpkgTool::new(tool))
        } else {
            None
        };

        let ninja = if settings.ninja {
            Some(installer.ensure(&catalog::ninja(), overrides.ninja.as_deref())?)
        } else {
            None
        };

        Ok(Self {
            cmake,
            conan,
            vcpkg,
            ninja,
        })
    }

    pub fn all(&self) -> impl Iterator<Item = &InstalledTool> {
        std::iter::once(&self.cmake)
            .chain(self.conan.iter())
            .chain(self.vcpkg.iter().map(|vcpkg| &vcpkg.tool))
            .chain(self.ninja.iter())
    }
}
