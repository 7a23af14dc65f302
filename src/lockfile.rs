use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const FORMAT_VERSION: u32 = 1;

/// Receipts for every tool downloaded into the workspace (`tools.lock`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    /// Version of the lockfile format
    version: u32,
    /// Metadata about when this was last written
    pub metadata: Metadata,
    /// Tool installation receipts, one per tool name
    #[serde(default)]
    pub tool_receipts: Vec<ToolReceipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactDigest {
    pub url: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolReceipt {
    /// Tool name
    pub name: String,
    /// Pinned version that was downloaded
    pub version: String,
    /// Canonical executable inside the workspace
    pub executable: PathBuf,
    /// When this tool/version was installed
    pub installed_at: String,
    #[serde(default)]
    pub artifacts: Vec<ArtifactDigest>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            metadata: Metadata {
                updated_at: chrono::Utc::now().to_rfc3339(),
            },
            tool_receipts: Vec::new(),
        }
    }

    /// Load receipts from disk; a missing file yields an empty lockfile.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read lockfile from {:?}", path), e))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse lockfile {:?}: {e}", path)))
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create lockfile directory {:?}", parent), e)
            })?;
        }

        self.metadata.updated_at = chrono::Utc::now().to_rfc3339();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize lockfile: {e}")))?;

        fs::write(path, contents)
            .map_err(|e| Error::io(format!("Failed to write lockfile to {:?}", path), e))
    }

    /// Record a fresh download, replacing any earlier receipt for the same tool.
    pub fn record_tool_install(
        &mut self,
        name: &str,
        version: &str,
        executable: PathBuf,
        artifacts: Vec<ArtifactDigest>,
    ) {
        self.tool_receipts.retain(|receipt| receipt.name != name);
        self.tool_receipts.push(ToolReceipt {
            name: name.to_string(),
            version: version.to_string(),
            executable,
            installed_at: chrono::Utc::now().to_rfc3339(),
            artifacts,
        });
    }

    pub fn tool_receipts(&self) -> impl Iterator<Item = &ToolReceipt> {
        self.tool_receipts.iter()
    }

    pub fn receipt(&self, name: &str) -> Option<&ToolReceipt> {
        self.tool_receipts.iter().find(|receipt| receipt.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn digest(url: &str) -> ArtifactDigest {
        ArtifactDigest {
            url: url.to_string(),
            sha256: "00".repeat(32),
        }
    }

    #[test]
    fn test_lockfile_new() {
        let lockfile = Lockfile::new();
        assert_eq!(lockfile.version, FORMAT_VERSION);
        assert!(!lockfile.metadata.updated_at.is_empty());
        assert!(lockfile.tool_receipts.is_empty());
    }

    #[test]
    fn test_lockfile_save_load() {
        let temp = TempDir::new().unwrap();
        let lockfile_path = temp.path().join("workspace/tools.lock");

        let mut lockfile = Lockfile::new();
        lockfile.record_tool_install(
            "cmake",
            "4.2.0",
            PathBuf::from("/ws/cmake/cmake-4.2.0/bin/cmake"),
            vec![digest("https://example.invalid/cmake.tar.gz")],
        );
        lockfile.save(&lockfile_path).unwrap();

        let loaded = Lockfile::load(&lockfile_path).unwrap();
        let receipt = loaded.receipt("cmake").unwrap();
        assert_eq!(receipt.version, "4.2.0");
        assert_eq!(receipt.artifacts.len(), 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&receipt.installed_at).is_ok());
    }

    #[test]
    fn test_record_replaces_previous_receipt() {
        let mut lockfile = Lockfile::new();
        lockfile.record_tool_install("ninja", "1.13.1", PathBuf::from("/old"), Vec::new());
        lockfile.record_tool_install("conan", "2.23.0", PathBuf::from("/conan"), Vec::new());
        lockfile.record_tool_install("ninja", "1.13.2", PathBuf::from("/new"), Vec::new());

        let names: Vec<_> = lockfile.tool_receipts().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["conan", "ninja"]);
        assert_eq!(lockfile.receipt("ninja").unwrap().version, "1.13.2");
    }

    #[test]
    fn test_missing_lockfile_is_empty() {
        let temp = TempDir::new().unwrap();
        let lockfile = Lockfile::load_or_default(&temp.path().join("tools.lock")).unwrap();
        assert_eq!(lockfile.tool_receipts().count(), 0);
    }

    #[test]
    fn test_garbage_lockfile_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.lock");
        fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(Lockfile::load(&path), Err(Error::Config(_))));
    }
}
