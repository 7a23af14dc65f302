use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::mode::BuildMode;
use crate::package::PackageManagerKind;
use crate::workspace::{WorkspaceLayout, DEFAULT_WORKSPACE_DIR_NAME};

/// Project-local configuration file name.
pub const FILE_NAME: &str = "cxxboot.toml";

const DEFAULT_CPPSTD: &str = "23";
const DEFAULT_VCVARS_ARCH: &str = "x64";

/// Explicit tool locations, from `[tools]` or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolOverrides {
    pub cmake: Option<String>,
    pub conan: Option<String>,
    pub vcpkg: Option<String>,
    pub ninja: Option<String>,
}

impl ToolOverrides {
    /// Fill every unset entry from `fallback`.
    fn or(self, fallback: ToolOverrides) -> Self {
        Self {
            cmake: self.cmake.or(fallback.cmake),
            conan: self.conan.or(fallback.conan),
            vcpkg: self.vcpkg.or(fallback.vcpkg),
            ninja: self.ninja.or(fallback.ninja),
        }
    }
}

/// Contents of `cxxboot.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub workspace_dir_name: Option<String>,
    pub mode: Option<BuildMode>,
    pub package_manager: Option<PackageManagerKind>,
    pub generator: Option<String>,
    pub ninja: Option<bool>,
    pub use_system_tools: Option<bool>,
    pub vcvarsall: Option<bool>,
    pub vcvars_arch: Option<String>,
    pub cppstd: Option<String>,
    pub allow_unresolved_dependencies: Option<bool>,
    pub prefix_paths: Vec<String>,
    pub tools: ToolOverrides,
}

impl ProjectConfig {
    /// Missing or blank files load as the default configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read config file {:?}", path), e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {:?}: {e}", path)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create config directory {:?}", parent), e)
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)
            .map_err(|e| Error::io(format!("Failed to write config file {:?}", path), e))
    }
}

/// Values given on the command line. `None` defers to the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workspace_dir_name: Option<String>,
    pub mode: Option<String>,
    pub package_manager: Option<PackageManagerKind>,
    pub generator: Option<String>,
    pub ninja: Option<bool>,
    pub use_system_tools: Option<bool>,
    pub vcvarsall: Option<bool>,
    pub tools: ToolOverrides,
}

/// Immutable settings for one invocation: command line over file over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub workspace_dir_name: String,
    pub mode: BuildMode,
    pub package_manager: PackageManagerKind,
    pub generator: Option<String>,
    pub ninja: bool,
    pub use_system_tools: bool,
    pub vcvarsall: bool,
    pub vcvars_arch: String,
    pub cppstd: String,
    pub allow_unresolved_dependencies: bool,
    pub prefix_paths: Vec<String>,
    pub tools: ToolOverrides,
}

impl Settings {
    pub fn merge(project_dir: PathBuf, file: ProjectConfig, cli: Overrides) -> Result<Self> {
        let workspace_dir_name = cli
            .workspace_dir_name
            .or(file.workspace_dir_name)
            .unwrap_or_else(|| DEFAULT_WORKSPACE_DIR_NAME.to_string());
        if workspace_dir_name.trim().is_empty() {
            return Err(Error::Config(
                "workspace directory name must not be empty".to_string(),
            ));
        }

        let mode = match cli.mode {
            Some(mode) => BuildMode::parse(&mode),
            None => file.mode.unwrap_or_default(),
        };
        mode.validate()?;

        Ok(Self {
            project_dir,
            workspace_dir_name,
            mode,
            package_manager: cli
                .package_manager
                .or(file.package_manager)
                .unwrap_or_default(),
            generator: cli.generator.or(file.generator),
            ninja: cli.ninja.or(file.ninja).unwrap_or(false),
            use_system_tools: cli
                .use_system_tools
                .or(file.use_system_tools)
                .unwrap_or(true),
            vcvarsall: cli.vcvarsall.or(file.vcvarsall).unwrap_or(true),
            vcvars_arch: file
                .vcvars_arch
                .unwrap_or_else(|| DEFAULT_VCVARS_ARCH.to_string()),
            cppstd: file.cppstd.unwrap_or_else(|| DEFAULT_CPPSTD.to_string()),
            allow_unresolved_dependencies: file.allow_unresolved_dependencies.unwrap_or(false),
            prefix_paths: file.prefix_paths,
            tools: cli.tools.or(file.tools),
        })
    }

    /// Load `cxxboot.toml` from `project_dir` and merge the command line over it.
    pub fn load(project_dir: PathBuf, cli: Overrides) -> Result<Self> {
        let file = ProjectConfig::load(&project_dir.join(FILE_NAME))?;
        Self::merge(project_dir, file, cli)
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(&self.project_dir, &self.workspace_dir_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_empty_files_are_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(FILE_NAME);
        assert_eq!(ProjectConfig::load(&path).unwrap(), ProjectConfig::default());

        fs::write(&path, "\n  \n").unwrap();
        assert_eq!(ProjectConfig::load(&path).unwrap(), ProjectConfig::default());
    }

    #[test]
    fn test_load_full_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(FILE_NAME);
        fs::write(
            &path,
            r#"
workspace_dir_name = ".ws"
mode = "release"
package_manager = "all"
ninja = true
cppstd = "20"
prefix_paths = ["/opt/qt6"]

[tools]
cmake = "~/tools/cmake/bin/cmake"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.workspace_dir_name.as_deref(), Some(".ws"));
        assert_eq!(config.mode, Some(BuildMode::Release));
        assert_eq!(config.package_manager, Some(PackageManagerKind::Both));
        assert_eq!(config.ninja, Some(true));
        assert_eq!(config.prefix_paths, vec!["/opt/qt6".to_string()]);
        assert_eq!(config.tools.cmake.as_deref(), Some("~/tools/cmake/bin/cmake"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(FILE_NAME);
        fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert!(matches!(ProjectConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(FILE_NAME);
        let config = ProjectConfig {
            mode: Some(BuildMode::RelWithDebInfo),
            generator: Some("Unix Makefiles".to_string()),
            ..ProjectConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(ProjectConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::merge(PathBuf::from("/app"), ProjectConfig::default(), Overrides::default())
                .unwrap();

        assert_eq!(settings.workspace_dir_name, DEFAULT_WORKSPACE_DIR_NAME);
        assert_eq!(settings.mode, BuildMode::Debug);
        assert_eq!(settings.package_manager, PackageManagerKind::Conan);
        assert_eq!(settings.cppstd, "23");
        assert_eq!(settings.vcvars_arch, "x64");
        assert!(settings.use_system_tools);
        assert!(settings.vcvarsall);
        assert!(!settings.ninja);
        assert!(!settings.allow_unresolved_dependencies);
    }

    #[test]
    fn test_command_line_wins_over_file() {
        let file = ProjectConfig {
            mode: Some(BuildMode::Release),
            ninja: Some(true),
            package_manager: Some(PackageManagerKind::Vcpkg),
            tools: ToolOverrides {
                cmake: Some("/file/cmake".to_string()),
                conan: Some("/file/conan".to_string()),
                ..ToolOverrides::default()
            },
            ..ProjectConfig::default()
        };
        let cli = Overrides {
            mode: Some("minsizerel".to_string()),
            ninja: Some(false),
            tools: ToolOverrides {
                cmake: Some("/cli/cmake".to_string()),
                ..ToolOverrides::default()
            },
            ..Overrides::default()
        };

        let settings = Settings::merge(PathBuf::from("/app"), file, cli).unwrap();

        assert_eq!(settings.mode, BuildMode::MinSizeRel);
        assert!(!settings.ninja);
        assert_eq!(settings.package_manager, PackageManagerKind::Vcpkg);
        assert_eq!(settings.tools.cmake.as_deref(), Some("/cli/cmake"));
        assert_eq!(settings.tools.conan.as_deref(), Some("/file/conan"));
    }

    #[test]
    fn test_empty_workspace_name_is_rejected() {
        let cli = Overrides {
            workspace_dir_name: Some("  ".to_string()),
            ..Overrides::default()
        };
        let err = Settings::merge(PathBuf::from("/app"), ProjectConfig::default(), cli);
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_path_like_mode_is_rejected() {
        for mode in ["..", "", "/some/dir"] {
            let cli = Overrides {
                mode: Some(mode.to_string()),
                ..Overrides::default()
            };
            let err = Settings::merge(PathBuf::from("/app"), ProjectConfig::default(), cli);
            assert!(matches!(err, Err(Error::Config(_))), "mode {mode:?}");
        }

        let file: ProjectConfig = toml::from_str("mode = \"../outside\"").unwrap();
        let err = Settings::merge(PathBuf::from("/app"), file, Overrides::default());
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_layout_uses_workspace_name() {
        let cli = Overrides {
            workspace_dir_name: Some("build-ws".to_string()),
            ..Overrides::default()
        };
        let settings =
            Settings::merge(PathBuf::from("/app"), ProjectConfig::default(), cli).unwrap();
        assert_eq!(
            settings.layout().path(crate::workspace::WorkspacePath::Root),
            PathBuf::from("/app/build-ws")
        );
    }
}
