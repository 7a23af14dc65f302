//! Visual Studio compiler environment for Windows hosts.
//!
//! `vswhere` locates the newest Visual Studio instance, `vcvarsall.bat` from
//! that instance is run through `cmd`, and the variables it exports are
//! applied to this process and cached as JSON in the workspace. A cache hit
//! skips every subprocess. Delete the cache file to refresh it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::process::{Invocation, ProcessRunner};
use crate::tools::{catalog, Installer, Os};
use crate::workspace::{normalize_path, WorkspaceLayout, WorkspacePath};

const INSTANCE_PREFIX: &str = "instanceId:";
const SCRIPT_NAME: &str = "vcvarsall.bat";

/// Result of a harvesting attempt. Failing to find the pieces is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome {
    Applied { from_cache: bool, variables: usize },
    NotApplied(String),
}

impl HarvestOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, HarvestOutcome::Applied { .. })
    }
}

/// Dot-separated numeric build version, e.g. `17.10.35013.141`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersion(Vec<u64>);

impl BuildVersion {
    pub fn parse(value: &str) -> Option<Self> {
        value
            .trim()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
            .filter(|parts| !parts.is_empty())
            .map(BuildVersion)
    }
}

impl Ord for BuildVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let ours = self.0.get(i).copied().unwrap_or(0);
                let theirs = other.0.get(i).copied().unwrap_or(0);
                ours.cmp(&theirs)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for BuildVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One Visual Studio installation reported by vswhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub installation_path: PathBuf,
    pub build_version: BuildVersion,
}

fn field<'a>(section: &[&'a str], name: &str) -> Option<&'a str> {
    section.iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// Drop everything before the first `instanceId:` line.
pub fn strip_preamble(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .skip_while(|line| !line.starts_with(INSTANCE_PREFIX))
        .collect()
}

/// Group lines into blank-line separated sections.
pub fn split_sections<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    lines
        .split(|line| line.trim().is_empty())
        .filter(|section| !section.is_empty())
        .map(|section| section.to_vec())
        .collect()
}

/// Instances that report both an installation path and a build version.
pub fn parse_instances(output: &str) -> Vec<Instance> {
    split_sections(&strip_preamble(output))
        .iter()
        .filter_map(|section| {
            let path = field(section, "resolvedInstallationPath")?;
            let version = field(section, "catalog_buildVersion").and_then(BuildVersion::parse)?;
            Some(Instance {
                installation_path: PathBuf::from(path),
                build_version: version,
            })
        })
        .collect()
}

pub fn newest_instance(instances: Vec<Instance>) -> Option<Instance> {
    instances
        .into_iter()
        .max_by(|a, b| a.build_version.cmp(&b.build_version))
}

/// First `vcvarsall.bat` under `root`, in sorted walk order.
pub fn find_vcvarsall(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            entry.file_type().is_file()
                && entry.file_name().to_string_lossy().eq_ignore_ascii_case(SCRIPT_NAME)
        })
        .map(|entry| entry.into_path())
}

/// Parse `set` output. Lines without a name before `=` are skipped.
pub fn parse_environment(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.split_once('='))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn apply(variables: &BTreeMap<String, String>) -> usize {
    let mut applied = 0;
    for (name, value) in variables {
        if !is_valid_name(name) || value.contains('\0') {
            debug!("Skipping unrepresentable variable {name:?}");
            continue;
        }
        env::set_var(name, value);
        applied += 1;
    }
    applied
}

fn load_cache(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read environment cache {:?}", path), e))?;
    let corrupt = |reason: String| Error::CorruptEnvironmentCache {
        path: path.to_path_buf(),
        reason,
    };
    let variables: BTreeMap<String, String> =
        serde_json::from_str(&contents).map_err(|e| corrupt(e.to_string()))?;
    if let Some(name) = variables.keys().find(|name| !is_valid_name(name)) {
        return Err(corrupt(format!("invalid variable name {name:?}")));
    }
    Ok(variables)
}

/// Names `env::set_var` accepts: non-empty, without `=` or NUL.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['=', '\0'])
}

fn save_cache(path: &Path, variables: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("Failed to create directory {:?}", parent), e))?;
    }
    let contents = serde_json::to_string_pretty(variables).map_err(|e| {
        Error::Config(format!("failed to serialize environment cache: {e}"))
    })?;
    fs::write(path, contents)
        .map_err(|e| Error::io(format!("Failed to write environment cache {:?}", path), e))
}

pub struct Harvester<'a> {
    layout: &'a WorkspaceLayout,
    runner: &'a dyn ProcessRunner,
    arch: String,
    os: Os,
}

impl<'a> Harvester<'a> {
    pub fn new(
        layout: &'a WorkspaceLayout,
        runner: &'a dyn ProcessRunner,
        arch: impl Into<String>,
        os: Os,
    ) -> Self {
        Self {
            layout,
            runner,
            arch: arch.into(),
            os,
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.layout.path(WorkspacePath::EnvironmentCache)
    }

    /// Apply the compiler environment, installing vswhere when needed.
    pub fn harvest(&self, installer: &Installer<'_>) -> Result<HarvestOutcome> {
        self.harvest_with(|| Ok(installer.ensure(&catalog::vswhere(), None)?.executable))
    }

    /// Like [`Harvester::harvest`], with the vswhere lookup supplied by the caller.
    /// The lookup only runs on a cache miss.
    pub fn harvest_with<F>(&self, locate_vswhere: F) -> Result<HarvestOutcome>
    where
        F: FnOnce() -> Result<PathBuf>,
    {
        if self.os != Os::Windows {
            return Ok(not_applied("vcvarsall.bat only exists on Windows"));
        }

        let cache = self.cache_path();
        if cache.is_file() {
            info!(
                "Applying cached compiler environment from {}. Delete it to refresh.",
                normalize_path(&cache)
            );
            let variables = apply(&load_cache(&cache)?);
            return Ok(HarvestOutcome::Applied {
                from_cache: true,
                variables,
            });
        }

        let vswhere = locate_vswhere()?;
        let output = self
            .runner
            .capture(&Invocation::new(&vswhere, self.layout.path(WorkspacePath::Root)))?;
        if output.trim().is_empty() {
            return Ok(not_applied("vswhere printed nothing"));
        }

        let Some(instance) = newest_instance(parse_instances(&output)) else {
            return Ok(not_applied(
                "no Visual Studio instance with an installation path and build version",
            ));
        };
        info!(
            "Looking for {SCRIPT_NAME} of Visual Studio {} in {}",
            instance
                .build_version
                .0
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("."),
            normalize_path(&instance.installation_path)
        );

        let Some(script) = find_vcvarsall(&instance.installation_path) else {
            return Ok(not_applied(format!(
                "no {SCRIPT_NAME} under {}",
                normalize_path(&instance.installation_path)
            )));
        };

        let line = format!("\"{}\" {} > nul && set", script.display(), self.arch);
        let output = self
            .runner
            .capture(&Invocation::shell(line, self.layout.project_dir()))?;
        let variables = parse_environment(&output);
        if variables.is_empty() {
            return Ok(not_applied(format!("{SCRIPT_NAME} produced no environment")));
        }

        let applied = apply(&variables);
        save_cache(&cache, &variables)?;
        info!(
            "Applied {applied} variables from {SCRIPT_NAME}; cached in {}",
            normalize_path(&cache)
        );
        Ok(HarvestOutcome::Applied {
            from_cache: false,
            variables: applied,
        })
    }
}

fn not_applied(reason: impl Into<String>) -> HarvestOutcome {
    let reason = reason.into();
    warn!("Compiler environment not applied: {reason}");
    HarvestOutcome::NotApplied(reason)
}
