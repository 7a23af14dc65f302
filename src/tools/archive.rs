use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use tar::{Archive, EntryType};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Container format of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    /// A bare executable, copied as-is.
    Executable,
}

/// Which archive entries are written, and where.
///
/// Rules are archive-relative paths with `/` separators, evaluated after the
/// root folder is stripped. A rule ending in `/` covers a whole directory;
/// any other rule matches one exact path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractPolicy {
    /// Drop the archive's top-level folder from every entry.
    pub strip_root: bool,
    /// When non-empty, only entries under one of these rules are written.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ExtractPolicy {
    pub fn strip_root() -> Self {
        Self {
            strip_root: true,
            ..Self::default()
        }
    }

    pub fn excluding<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn admits(&self, relative: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|rule| rule_matches(rule, relative));
        included && !self.exclude.iter().any(|rule| rule_matches(rule, relative))
    }

    /// Archive-relative path of an entry, or `None` when it must be skipped
    /// (the stripped root itself, or anything escaping the target).
    fn rebase(&self, entry_path: &Path) -> Option<String> {
        let mut parts = Vec::new();
        for component in entry_path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        if self.strip_root && !parts.is_empty() {
            parts.remove(0);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

fn rule_matches(rule: &str, relative: &str) -> bool {
    match rule.strip_suffix('/') {
        Some(dir) => relative == dir || relative.starts_with(rule),
        None => relative == rule,
    }
}

/// Unpack `archive_path` into `dest`, returning the number of entries written.
pub fn extract(
    archive_path: &Path,
    format: ArchiveFormat,
    dest: &Path,
    policy: &ExtractPolicy,
) -> Result<usize> {
    fs::create_dir_all(dest)
        .map_err(|e| Error::io(format!("Failed to create directory {:?}", dest), e))?;

    let written = match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest, policy)?,
        ArchiveFormat::Zip => extract_zip(archive_path, dest, policy)?,
        ArchiveFormat::Executable => {
            return Err(archive_error(
                archive_path,
                "bare executables are installed, not extracted",
            ))
        }
    };
    debug!("Extracted {written} entries from {:?} into {:?}", archive_path, dest);
    Ok(written)
}

/// Copy a downloaded executable to `target` and mark it executable.
pub fn install_executable(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("Failed to create directory {:?}", parent), e))?;
    }
    fs::copy(source, target).map_err(|e| {
        Error::io(
            format!("Failed to copy {:?} to {:?}", source, target),
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(target, fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io(format!("Failed to set permissions on {:?}", target), e))?;
    }
    Ok(())
}

fn archive_error(path: &Path, reason: impl ToString) -> Error {
    Error::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_tar_gz(archive_path: &Path, dest: &Path, policy: &ExtractPolicy) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| Error::io(format!("Failed to open archive {:?}", archive_path), e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    let mut written = 0;
    let entries = archive
        .entries()
        .map_err(|e| archive_error(archive_path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive_path, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| archive_error(archive_path, e))?
            .into_owned();

        let Some(relative) = policy.rebase(&entry_path) else {
            if entry_path.components().any(|c| c == Component::ParentDir) {
                warn!("Skipping unsafe archive entry {:?}", entry_path);
            }
            continue;
        };
        if !policy.admits(&relative) {
            continue;
        }

        let target = dest.join(&relative);
        if entry.header().entry_type() == EntryType::Directory {
            fs::create_dir_all(&target)
                .map_err(|e| Error::io(format!("Failed to create directory {:?}", target), e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create parent directory {:?}", parent), e)
            })?;
        }
        entry
            .unpack(&target)
            .map_err(|e| archive_error(archive_path, format!("{relative}: {e}")))?;
        written += 1;
    }
    Ok(written)
}

fn extract_zip(archive_path: &Path, dest: &Path, policy: &ExtractPolicy) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| Error::io(format!("Failed to open zip archive {:?}", archive_path), e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| archive_error(archive_path, format!("entry #{index}: {e}")))?;

        let Some(enclosed) = entry.enclosed_name().map(|path| path.to_path_buf()) else {
            warn!("Skipping unsafe archive entry {:?}", entry.name());
            continue;
        };
        let Some(relative) = policy.rebase(&enclosed) else {
            continue;
        };
        if !policy.admits(&relative) {
            continue;
        }

        let target = dest.join(&relative);
        if entry.name().ends_with('/') {
            fs::create_dir_all(&target)
                .map_err(|e| Error::io(format!("Failed to create directory {:?}", target), e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create parent directory {:?}", parent), e)
            })?;
        }

        let mut outfile = File::create(&target)
            .map_err(|e| Error::io(format!("Failed to create file {:?}", target), e))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| Error::io(format!("Failed to extract zip entry {:?}", target), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode)).map_err(|e| {
                    Error::io(format!("Failed to set permissions on {:?}", target), e)
                })?;
            }
        }
        written += 1;
    }
    Ok(written)
}


#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[rstest]
    #[case("doc/", "doc/manual.txt", true)]
    #[case("doc/", "doc", true)]
    #[case("doc/", "docs/readme", false)]
    #[case("bin/cmake-gui", "bin/cmake-gui", true)]
    #[case("bin/cmake-gui", "bin/cmake", false)]
    fn test_rule_matches(#[case] rule: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(rule_matches(rule, path), expected);
    }

    #[test]
    fn test_rebase_strips_root_and_rejects_traversal() {
        let policy = ExtractPolicy::strip_root();
        assert_eq!(
            policy.rebase(Path::new("cmake-4.2.0-linux-x86_64/bin/cmake")),
            Some("bin/cmake".to_string())
        );
        assert_eq!(policy.rebase(Path::new("cmake-4.2.0-linux-x86_64/")), None);
        assert_eq!(policy.rebase(Path::new("../evil")), None);

        let keep_root = ExtractPolicy::default();
        assert_eq!(
            keep_root.rebase(Path::new("./bin/conan")),
            Some("bin/conan".to_string())
        );
    }

    #[test]
    fn test_include_list_limits_entries() {
        let policy = ExtractPolicy {
            include: vec!["bin/".to_string()],
            ..ExtractPolicy::default()
        };
        assert!(policy.admits("bin/tool"));
        assert!(!policy.admits("share/tool/data"));
    }

    #[test]
    fn test_tar_gz_exclusion_and_root_strip() {
        let temp = TempDir::new().unwrap();
        let bytes = fixtures::tar_gz(&[
            ("tool-1.0/bin/tool", "#!/bin/sh\n"),
            ("tool-1.0/doc/manual.txt", "manual"),
            ("tool-1.0/share/data.txt", "data"),
        ]);
        let archive = write_fixture(temp.path(), "tool.tar.gz", &bytes);
        let dest = temp.path().join("out");

        let policy = ExtractPolicy::strip_root().excluding(["doc/"]);
        let written = extract(&archive, ArchiveFormat::TarGz, &dest, &policy).unwrap();

        assert_eq!(written, 2);
        assert!(dest.join("bin/tool").is_file());
        assert!(dest.join("share/data.txt").is_file());
        assert!(!dest.join("doc").exists());
        assert!(!dest.join("tool-1.0").exists());
    }

    #[test]
    fn test_zip_exclusion_and_root_strip() {
        let temp = TempDir::new().unwrap();
        let bytes = fixtures::zip(&[
            ("tool-1.0/bin/tool.exe", "MZ"),
            ("tool-1.0/bin/tool-gui.exe", "MZ"),
            ("tool-1.0/doc/manual.txt", "manual"),
        ]);
        let archive = write_fixture(temp.path(), "tool.zip", &bytes);
        let dest = temp.path().join("out");

        let policy = ExtractPolicy::strip_root().excluding(["doc/", "bin/tool-gui.exe"]);
        let written = extract(&archive, ArchiveFormat::Zip, &dest, &policy).unwrap();

        assert_eq!(written, 1);
        assert!(dest.join("bin/tool.exe").is_file());
        assert!(!dest.join("bin/tool-gui.exe").exists());
        assert!(!dest.join("doc").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_preserves_unix_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let bytes = fixtures::zip(&[("ninja", "binary")]);
        let archive = write_fixture(temp.path(), "ninja.zip", &bytes);
        let dest = temp.path().join("out");

        extract(&archive, ArchiveFormat::Zip, &dest, &ExtractPolicy::default()).unwrap();

        let mode = fs::metadata(dest.join("ninja")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn test_corrupt_archive_is_archive_error() {
        let temp = TempDir::new().unwrap();
        let archive = write_fixture(temp.path(), "broken.zip", b"not a zip");
        let err = extract(
            &archive,
            ArchiveFormat::Zip,
            &temp.path().join("out"),
            &ExtractPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }

    #[test]
    fn test_install_executable_copies_file() {
        let temp = TempDir::new().unwrap();
        let source = write_fixture(temp.path(), "vcpkg-glibc", b"elf");
        let target = temp.path().join("tool/vcpkg");

        install_executable(&source, &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"elf");
    }
}
