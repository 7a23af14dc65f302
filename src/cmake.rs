use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::mode::BuildMode;
use crate::package::ConfigureArgs;
use crate::process::{Invocation, ProcessRunner};
use crate::workspace::normalize_path;

/// Where and how one configuration is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub source_dir: PathBuf,
    pub build_root: PathBuf,
    pub mode: BuildMode,
    /// Prefix paths added on top of what the package managers provide.
    pub extra_prefix_paths: Vec<String>,
}

impl BuildConfig {
    pub fn new(source_dir: impl Into<PathBuf>, build_root: impl Into<PathBuf>, mode: BuildMode) -> Self {
        Self {
            source_dir: source_dir.into(),
            build_root: build_root.into(),
            mode,
            extra_prefix_paths: Vec::new(),
        }
    }

    /// CMake binary directory for this mode: `<build_root>/<Mode>`.
    pub fn config_files_path(&self) -> PathBuf {
        self.build_root.join(self.mode.as_str())
    }
}

/// Written into the config directory after a successful build.
const BUILT_MARKER: &str = ".cxxboot-built";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unconfigured,
    Configured,
    Built,
}

impl BuildState {
    /// A config directory holding a `CMakeCache.txt` is configured; one that
    /// also carries the build marker has been built since its last configure.
    pub fn detect(config: &BuildConfig) -> Self {
        let config_dir = config.config_files_path();
        if !config_dir.join("CMakeCache.txt").is_file() {
            BuildState::Unconfigured
        } else if config_dir.join(BUILT_MARKER).is_file() {
            BuildState::Built
        } else {
            BuildState::Configured
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Unconfigured => f.write_str("unconfigured"),
            BuildState::Configured => f.write_str("configured"),
            BuildState::Built => f.write_str("built"),
        }
    }
}

/// Generator selection for a configure call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorChoice {
    /// Explicit `-G` value.
    pub name: Option<String>,
    /// Ninja executable when the fast generator is active.
    pub ninja: Option<PathBuf>,
}

impl GeneratorChoice {
    /// Generator CMake will be given: the explicit name, else Ninja when available.
    fn effective_name(&self) -> Option<&str> {
        match (&self.name, &self.ninja) {
            (Some(name), _) => Some(name.as_str()),
            (None, Some(_)) => Some("Ninja"),
            (None, None) => None,
        }
    }

    /// Whether an explicit generator name (or its absence, with Ninja
    /// available) selects one of CMake's Ninja generators.
    pub fn is_ninja_generator(name: Option<&str>, ninja_available: bool) -> bool {
        match name {
            Some(name) => name.starts_with("Ninja"),
            None => ninja_available,
        }
    }

    pub fn is_ninja(&self) -> bool {
        Self::is_ninja_generator(self.name.as_deref(), self.ninja.is_some())
    }

    fn arguments(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(name) = self.effective_name() {
            args.push("-G".to_string());
            args.push(name.to_string());
        }
        if let Some(ninja) = &self.ninja {
            if self.is_ninja() {
                args.push(format!("-DCMAKE_MAKE_PROGRAM={}", normalize_path(ninja)));
            }
        }
        args
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Drives `cmake` through configure, build and cache deletion.
pub struct Configurator<'a> {
    cmake: PathBuf,
    runner: &'a dyn ProcessRunner,
}

impl<'a> Configurator<'a> {
    pub fn new(cmake: impl Into<PathBuf>, runner: &'a dyn ProcessRunner) -> Self {
        Self {
            cmake: cmake.into(),
            runner,
        }
    }

    /// The configure invocation, without running it.
    pub fn configure_command(
        &self,
        config: &BuildConfig,
        manager_args: &ConfigureArgs,
        generator: &GeneratorChoice,
    ) -> Invocation {
        let mut args = vec![
            "-B".to_string(),
            normalize_path(&config.config_files_path()),
            "-S".to_string(),
            normalize_path(&config.source_dir),
            format!("-DCMAKE_BUILD_TYPE={}", config.mode),
        ];

        if let Some(toolchain) = &manager_args.toolchain_file {
            args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", escape_quotes(toolchain)));
        }

        let mut prefix_paths: Vec<String> = Vec::new();
        for path in manager_args
            .prefix_paths
            .iter()
            .chain(&config.extra_prefix_paths)
        {
            if !prefix_paths.contains(path) {
                prefix_paths.push(path.clone());
            }
        }
        if !prefix_paths.is_empty() {
            let joined = prefix_paths
                .iter()
                .map(|path| escape_quotes(path))
                .collect::<Vec<_>>()
                .join(";");
            args.push(format!("-DCMAKE_PREFIX_PATH={joined}"));
        }

        args.extend(generator.arguments());
        Invocation::new(&self.cmake, &config.build_root).args(args)
    }

    pub fn configure(
        &self,
        config: &BuildConfig,
        manager_args: &ConfigureArgs,
        generator: &GeneratorChoice,
    ) -> Result<()> {
        info!("Configuring project for '{}'", config.mode);
        fs::create_dir_all(&config.build_root).map_err(|e| {
            Error::io(format!("Failed to create build directory {:?}", config.build_root), e)
        })?;
        clear_built_marker(config)?;
        self.runner
            .run(&self.configure_command(config, manager_args, generator))
    }

    pub fn build(&self, config: &BuildConfig) -> Result<()> {
        info!("Building project for '{}'", config.mode);
        let config_dir = config.config_files_path();
        if !config_dir.is_dir() {
            return Err(Error::NotConfigured(config_dir));
        }
        let invocation = Invocation::new(&self.cmake, &config_dir).args([
            "--build".to_string(),
            ".".to_string(),
            "--config".to_string(),
            config.mode.to_string(),
        ]);
        clear_built_marker(config)?;
        self.runner.run(&invocation)?;

        let marker = config_dir.join(BUILT_MARKER);
        fs::write(&marker, chrono::Utc::now().to_rfc3339())
            .map_err(|e| Error::io(format!("Failed to write build marker {:?}", marker), e))
    }

    /// Delete the cache, configure, then build.
    pub fn rebuild(
        &self,
        config: &BuildConfig,
        manager_args: &ConfigureArgs,
        generator: &GeneratorChoice,
    ) -> Result<()> {
        delete_cache(config)?;
        self.configure(config, manager_args, generator)?;
        self.build(config)
    }
}

/// Remove the mode's config directory. Returns whether anything was deleted.
pub fn delete_cache(config: &BuildConfig) -> Result<bool> {
    config.mode.validate()?;
    let config_dir = config.config_files_path();
    if !config_dir.exists() {
        info!("No cache for '{}' at {}", config.mode, normalize_path(&config_dir));
        return Ok(false);
    }
    info!("Deleting project cache for '{}'", config.mode);
    remove_dir(&config_dir)?;
    Ok(true)
}

fn clear_built_marker(config: &BuildConfig) -> Result<()> {
    let marker = config.config_files_path().join(BUILT_MARKER);
    match fs::remove_file(&marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(format!("Failed to remove build marker {:?}", marker), e)),
    }
}

fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path)
        .map_err(|e| Error::io(format!("Failed to remove directory {:?}", path), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn config(temp: &TempDir, mode: BuildMode) -> BuildConfig {
        BuildConfig::new(temp.path().join("src"), temp.path().join("build"), mode)
    }

    #[test]
    fn test_configure_command_minimal() {
        let runner = RecordingRunner::new();
        let configurator = Configurator::new("/tools/cmake", &runner);
        let config = BuildConfig::new("/app", "/app/.ws/build", BuildMode::Debug);

        let invocation = configurator.configure_command(
            &config,
            &ConfigureArgs::default(),
            &GeneratorChoice::default(),
        );

        assert_eq!(
            invocation.args,
            [
                "-B",
                "/app/.ws/build/Debug",
                "-S",
                "/app",
                "-DCMAKE_BUILD_TYPE=Debug"
            ]
        );
        assert_eq!(invocation.cwd, PathBuf::from("/app/.ws/build"));
    }

    #[test]
    fn test_configure_command_full() {
        let runner = RecordingRunner::new();
        let configurator = Configurator::new("/tools/cmake", &runner);
        let mut config = BuildConfig::new("/app", "/app/build", BuildMode::Release);
        config.extra_prefix_paths = vec!["/opt/qt6".to_string(), "/ws/share/fmt".to_string()];
        let manager_args = ConfigureArgs {
            toolchain_file: Some("/ws/conan_toolchain.cmake".to_string()),
            prefix_paths: vec!["/ws/share/fmt".to_string(), "/ws/share/\"odd\"".to_string()],
        };
        let generator = GeneratorChoice {
            name: None,
            ninja: Some(PathBuf::from("/tools/ninja")),
        };

        let invocation = configurator.configure_command(&config, &manager_args, &generator);
        let args = &invocation.args;

        assert_eq!(
            args.iter()
                .filter(|arg| arg.starts_with("-DCMAKE_TOOLCHAIN_FILE="))
                .count(),
            1
        );
        assert!(args.contains(&"-DCMAKE_PREFIX_PATH=/ws/share/fmt;/ws/share/\\\"odd\\\";/opt/qt6".to_string()));
        assert!(args.windows(2).any(|pair| pair == ["-G", "Ninja"]));
        assert!(args.contains(&"-DCMAKE_MAKE_PROGRAM=/tools/ninja".to_string()));
    }

    #[test]
    fn test_explicit_generator_without_ninja() {
        let generator = GeneratorChoice {
            name: Some("Visual Studio 17 2022".to_string()),
            ninja: Some(PathBuf::from("/tools/ninja")),
        };
        assert_eq!(generator.arguments(), ["-G", "Visual Studio 17 2022"]);
    }

    #[test]
    fn test_ninja_generator_follows_effective_name() {
        let ninja = Some(PathBuf::from("/tools/ninja"));
        let implicit = GeneratorChoice { name: None, ninja: ninja.clone() };
        let makefiles = GeneratorChoice {
            name: Some("Unix Makefiles".to_string()),
            ninja: ninja.clone(),
        };
        let multi = GeneratorChoice {
            name: Some("Ninja Multi-Config".to_string()),
            ninja: None,
        };

        assert!(implicit.is_ninja());
        assert!(!makefiles.is_ninja());
        assert!(multi.is_ninja());
        assert!(!GeneratorChoice::default().is_ninja());
        assert_eq!(makefiles.arguments(), ["-G", "Unix Makefiles"]);
        assert_eq!(multi.arguments(), ["-G", "Ninja Multi-Config"]);
    }

    #[test]
    fn test_build_requires_configuration() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let configurator = Configurator::new("cmake", &runner);

        let err = configurator
            .build(&config(&temp, BuildMode::Debug))
            .unwrap_err();

        assert!(matches!(err, Error::NotConfigured(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_build_runs_in_config_dir() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, BuildMode::MinSizeRel);
        fs::create_dir_all(config.config_files_path()).unwrap();
        let runner = RecordingRunner::new();

        Configurator::new("cmake", &runner).build(&config).unwrap();

        let call = &runner.calls()[0];
        assert_eq!(call.args, ["--build", ".", "--config", "MinSizeRel"]);
        assert_eq!(call.cwd, config.config_files_path());
    }

    #[test]
    fn test_delete_cache_is_noop_when_absent() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, BuildMode::Debug);

        assert!(!delete_cache(&config).unwrap());

        fs::create_dir_all(config.config_files_path().join("CMakeFiles")).unwrap();
        fs::write(config.config_files_path().join("CMakeCache.txt"), "").unwrap();
        assert_eq!(BuildState::detect(&config), BuildState::Configured);

        assert!(delete_cache(&config).unwrap());
        assert!(!config.config_files_path().exists());
        assert_eq!(BuildState::detect(&config), BuildState::Unconfigured);
    }

    #[test]
    fn test_delete_cache_rejects_path_like_mode() {
        let temp = TempDir::new().unwrap();
        let tools = temp.path().join("tools/cmake");
        fs::create_dir_all(&tools).unwrap();
        fs::create_dir_all(temp.path().join("build")).unwrap();

        for mode in ["..", "", "/"] {
            let err = delete_cache(&config(&temp, BuildMode::parse(mode))).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "mode {mode:?}");
        }
        assert!(tools.is_dir());
        assert!(temp.path().join("build").is_dir());
    }

    #[test]
    fn test_state_transitions() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, BuildMode::Debug);
        let config_dir = config.config_files_path();
        let runner = RecordingRunner::new().on_call(move |invocation| {
            if invocation.args.first().map(String::as_str) == Some("-B") {
                fs::create_dir_all(&config_dir).unwrap();
                fs::write(config_dir.join("CMakeCache.txt"), "").unwrap();
            }
        });
        let configurator = Configurator::new("cmake", &runner);
        let no_args = ConfigureArgs::default();
        let generator = GeneratorChoice::default();

        assert_eq!(BuildState::detect(&config), BuildState::Unconfigured);

        configurator.configure(&config, &no_args, &generator).unwrap();
        assert_eq!(BuildState::detect(&config), BuildState::Configured);

        configurator.build(&config).unwrap();
        assert_eq!(BuildState::detect(&config), BuildState::Built);
        assert_eq!(BuildState::Built.to_string(), "built");

        configurator.configure(&config, &no_args, &generator).unwrap();
        assert_eq!(BuildState::detect(&config), BuildState::Configured);

        configurator.build(&config).unwrap();
        assert!(delete_cache(&config).unwrap());
        assert_eq!(BuildState::detect(&config), BuildState::Unconfigured);
    }

    #[test]
    fn test_failed_build_is_not_marked_built() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, BuildMode::Release);
        fs::create_dir_all(config.config_files_path()).unwrap();
        fs::write(config.config_files_path().join("CMakeCache.txt"), "").unwrap();
        fs::write(config.config_files_path().join(BUILT_MARKER), "").unwrap();
        let runner = RecordingRunner::new().failing_with(2);

        let err = Configurator::new("cmake", &runner).build(&config).unwrap_err();

        assert!(matches!(err, Error::ProcessFailed { code: 2, .. }));
        assert_eq!(BuildState::detect(&config), BuildState::Configured);
    }

    #[test]
    fn test_rebuild_sequence() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, BuildMode::Debug);
        let stale = config.config_files_path().join("stale.txt");
        fs::create_dir_all(config.config_files_path()).unwrap();
        fs::write(&stale, "old").unwrap();

        // The fake configure step recreates the config directory like cmake would,
        // and records whether the stale file was already gone.
        let observed = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&observed);
        let config_dir = config.config_files_path();
        let stale_path = stale.clone();
        let runner = RecordingRunner::new().on_call(move |invocation| {
            if invocation.args.first().map(String::as_str) == Some("-B") {
                seen.borrow_mut().push(format!("configure stale={}", stale_path.exists()));
                fs::create_dir_all(&config_dir).unwrap();
            } else {
                seen.borrow_mut().push("build".to_string());
            }
        });

        Configurator::new("cmake", &runner)
            .rebuild(&config, &ConfigureArgs::default(), &GeneratorChoice::default())
            .unwrap();

        assert_eq!(*observed.borrow(), ["configure stale=false", "build"]);
    }

    #[test]
    fn test_rebuild_without_cache() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, BuildMode::Release);
        let config_dir = config.config_files_path();
        let runner = RecordingRunner::new().on_call(move |invocation| {
            if invocation.args.first().map(String::as_str) == Some("-B") {
                fs::create_dir_all(&config_dir).unwrap();
            }
        });

        Configurator::new("cmake", &runner)
            .rebuild(&config, &ConfigureArgs::default(), &GeneratorChoice::default())
            .unwrap();

        assert_eq!(runner.calls().len(), 2);
    }
}
