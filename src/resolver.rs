//! Maps a `vcpkg.json` dependency list to the directories holding each
//! dependency's generated CMake package-config file.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Declared dependency names, in manifest order, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyManifest {
    names: Vec<String>,
}

impl DependencyManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read manifest {:?}", path), e))?;
        Self::parse(&contents, path)
    }

    /// Parse manifest JSON. `path` is only used in error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidManifest {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let document: Value =
            serde_json::from_str(contents).map_err(|e| invalid(&e.to_string()))?;
        let entries = document
            .get("dependencies")
            .ok_or_else(|| invalid("'dependencies' is missing"))?
            .as_array()
            .ok_or_else(|| invalid("'dependencies' must be a list of objects"))?;

        let mut names: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let object = entry
                .as_object()
                .ok_or_else(|| invalid("'dependencies' must be a list of objects"))?;
            let name = object
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| invalid("every dependency needs a non-empty 'name' string"))?;
            if !names.iter().any(|known| known.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Declared name to the directory holding its config file.
    pub resolved: Vec<(String, PathBuf)>,
    /// Names with no config file under the search root.
    pub unresolved: Vec<String>,
}

impl Resolution {
    /// Deduplicated prefix directories.
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.resolved.iter().map(|(_, dir)| dir.clone()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn into_result(self, search_root: &Path) -> Result<BTreeSet<PathBuf>> {
        if self.is_complete() {
            Ok(self.directories())
        } else {
            Err(Error::UnresolvedDependencies {
                search_root: search_root.to_path_buf(),
                names: self.unresolved,
            })
        }
    }
}

/// Library name encoded in a package-config file name, lowercased.
///
/// Accepts both CMake spellings: `<Name>Config.cmake` and `<name>-config.cmake`.
pub fn config_file_library(file_name: &str) -> Option<String> {
    let lower = file_name.to_ascii_lowercase();
    let stem = lower
        .strip_suffix("-config.cmake")
        .or_else(|| lower.strip_suffix("config.cmake"))?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Match `names` against candidate files, stopping as soon as every name is
/// found. Matching is case-insensitive.
pub fn find_config_dirs<I>(names: &[String], files: I) -> Resolution
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut pending: HashMap<String, &String> = names
        .iter()
        .map(|name| (name.to_ascii_lowercase(), name))
        .collect();
    let mut resolved = Vec::new();

    if !pending.is_empty() {
        for file in files {
            let Some(library) = file
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(config_file_library)
            else {
                continue;
            };
            let Some(declared) = pending.remove(&library) else {
                continue;
            };
            let Some(dir) = file.parent() else {
                continue;
            };
            debug!("Resolved {declared} to {:?}", dir);
            resolved.push((declared.clone(), dir.to_path_buf()));
            if pending.is_empty() {
                break;
            }
        }
    }

    // Keep manifest order for both lists.
    resolved.sort_by_key(|(name, _)| names.iter().position(|n| n == name));
    let unresolved = names
        .iter()
        .filter(|name| pending.contains_key(&name.to_ascii_lowercase()))
        .cloned()
        .collect();

    Resolution {
        resolved,
        unresolved,
    }
}

/// Walk `search_root` for the config files of every dependency in the manifest.
pub fn resolve(manifest_path: &Path, search_root: &Path) -> Result<Resolution> {
    let manifest = DependencyManifest::load(manifest_path)?;
    Ok(resolve_manifest(&manifest, search_root))
}

pub fn resolve_manifest(manifest: &DependencyManifest, search_root: &Path) -> Resolution {
    let files = WalkDir::new(search_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path());
    find_config_dirs(manifest.names(), files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn manifest(json: &str) -> Result<DependencyManifest> {
        DependencyManifest::parse(json, Path::new("vcpkg.json"))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_manifest_dedupes_in_order() {
        let parsed = manifest(
            r#"{"name": "app", "dependencies": [{"name": "fmt"}, {"name": "ctre"}, {"name": "FMT"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.names(), ["fmt", "ctre"]);
    }

    #[rstest]
    #[case(r#"{"name": "app"}"#)]
    #[case(r#"{"dependencies": "fmt"}"#)]
    #[case(r#"{"dependencies": ["fmt"]}"#)]
    #[case(r#"{"dependencies": [{"version>=": "10.0"}]}"#)]
    #[case(r#"{"dependencies": [{"name": ""}]}"#)]
    #[case(r#"{"dependencies": [{"name": 42}]}"#)]
    #[case("not json")]
    fn test_malformed_manifest_is_rejected(#[case] json: &str) {
        assert!(matches!(manifest(json), Err(Error::InvalidManifest { .. })));
    }

    #[rstest]
    #[case("fmtConfig.cmake", Some("fmt"))]
    #[case("CTREConfig.cmake", Some("ctre"))]
    #[case("zlib-config.cmake", Some("zlib"))]
    #[case("fmt-config-version.cmake", None)]
    #[case("Config.cmake", None)]
    #[case("CMakeLists.txt", None)]
    fn test_config_file_library(#[case] file: &str, #[case] expected: Option<&str>) {
        assert_eq!(config_file_library(file).as_deref(), expected);
    }

    #[test]
    fn test_resolve_two_dependencies() {
        let temp = TempDir::new().unwrap();
        let share = temp.path().join("x64-linux/share");
        for (dir, file) in [
            ("fmt", "fmtConfig.cmake"),
            ("fmt", "fmt-config-version.cmake"),
            ("ctre", "ctreConfig.cmake"),
            ("spdlog", "spdlogConfig.cmake"),
        ] {
            fs::create_dir_all(share.join(dir)).unwrap();
            fs::write(share.join(dir).join(file), "").unwrap();
        }
        let manifest_path = temp.path().join("vcpkg.json");
        fs::write(
            &manifest_path,
            r#"{"dependencies": [{"name": "fmt"}, {"name": "ctre"}]}"#,
        )
        .unwrap();

        let resolution = resolve(&manifest_path, temp.path()).unwrap();

        assert!(resolution.is_complete());
        let dirs = resolution.directories();
        assert_eq!(dirs.len(), 2);
        assert!(dirs.contains(&share.join("fmt")));
        assert!(dirs.contains(&share.join("ctre")));
    }

    #[test]
    fn test_stops_once_everything_is_found() {
        let visited = Cell::new(0);
        let files = vec![
            PathBuf::from("/install/share/fmt/fmtConfig.cmake"),
            PathBuf::from("/install/share/ctre/ctreConfig.cmake"),
            PathBuf::from("/install/share/zlib/zlib-config.cmake"),
            PathBuf::from("/install/share/boost/BoostConfig.cmake"),
        ];
        let counted = files.into_iter().inspect(|_| visited.set(visited.get() + 1));

        let resolution = find_config_dirs(&names(&["ctre", "fmt"]), counted);

        assert!(resolution.is_complete());
        assert_eq!(visited.get(), 2);
        assert_eq!(resolution.resolved[0].0, "ctre");
    }

    #[test]
    fn test_first_match_wins_per_name() {
        let files = vec![
            PathBuf::from("/a/fmt/fmtConfig.cmake"),
            PathBuf::from("/b/fmt/fmtConfig.cmake"),
            PathBuf::from("/a/ctre/ctreConfig.cmake"),
        ];
        let resolution = find_config_dirs(&names(&["fmt", "ctre"]), files);
        assert_eq!(
            resolution.resolved,
            vec![
                ("fmt".to_string(), PathBuf::from("/a/fmt")),
                ("ctre".to_string(), PathBuf::from("/a/ctre")),
            ]
        );
    }

    #[test]
    fn test_unresolved_names_are_reported() {
        let files = vec![PathBuf::from("/share/fmt/FMTConfig.cmake")];
        let resolution = find_config_dirs(&names(&["fmt", "ctre"]), files);

        assert_eq!(resolution.unresolved, ["ctre"]);
        let err = resolution.into_result(Path::new("/share")).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependencies { ref names, .. } if names == &["ctre"]));
    }

    #[test]
    fn test_empty_manifest_skips_walk() {
        let visited = Cell::new(0);
        let files = vec![PathBuf::from("/share/fmt/fmtConfig.cmake")]
            .into_iter()
            .inspect(|_| visited.set(visited.get() + 1));
        let resolution = find_config_dirs(&[], files);
        assert!(resolution.is_complete());
        assert_eq!(visited.get(), 0);
    }
}
