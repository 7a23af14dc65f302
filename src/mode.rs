use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result as CoreResult};

/// CMake build configuration.
///
/// Parsing never fails: unknown names are kept verbatim so custom
/// configurations defined by a project still reach CMake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Debug,
    Release,
    RelWithDebInfo,
    MinSizeRel,
    Other(String),
}

impl BuildMode {
    pub const CANONICAL: [BuildMode; 4] = [
        BuildMode::Debug,
        BuildMode::Release,
        BuildMode::RelWithDebInfo,
        BuildMode::MinSizeRel,
    ];

    /// Case-insensitive parse. Unknown values warn and pass through.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "debug" => BuildMode::Debug,
            "release" => BuildMode::Release,
            "relwithdebinfo" => BuildMode::RelWithDebInfo,
            "minsizerel" => BuildMode::MinSizeRel,
            _ => {
                warn!(
                    "Unknown build mode {:?}; passing it through unchanged (known: Debug, Release, RelWithDebInfo, MinSizeRel)",
                    value
                );
                BuildMode::Other(value.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildMode::Debug => "Debug",
            BuildMode::Release => "Release",
            BuildMode::RelWithDebInfo => "RelWithDebInfo",
            BuildMode::MinSizeRel => "MinSizeRel",
            BuildMode::Other(name) => name,
        }
    }

    /// Lowercase token used for Conan profile and output folder names.
    pub fn dir_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, BuildMode::Other(_))
    }

    /// Custom names become directory names, so they must be a single
    /// plain path segment.
    pub fn validate(&self) -> CoreResult<()> {
        let name = match self {
            BuildMode::Other(name) => name,
            _ => return Ok(()),
        };
        let reason = if name.trim().is_empty() {
            Some("must not be empty")
        } else if name == "." || name == ".." {
            Some("must not be a relative directory reference")
        } else if name.contains(['/', '\\', ':']) {
            Some("must not contain path separators or drive prefixes")
        } else if name.contains('\0') {
            Some("must not contain NUL")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(Error::Config(format!("build mode {name:?} {reason}"))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BuildMode::parse(s))
    }
}

impl Serialize for BuildMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BuildMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(BuildMode::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("debug", BuildMode::Debug)]
    #[case("Debug", BuildMode::Debug)]
    #[case("DEBUG", BuildMode::Debug)]
    #[case("release", BuildMode::Release)]
    #[case("relwithdebinfo", BuildMode::RelWithDebInfo)]
    #[case("MINSIZEREL", BuildMode::MinSizeRel)]
    fn test_parse_canonicalizes(#[case] input: &str, #[case] expected: BuildMode) {
        assert_eq!(BuildMode::parse(input), expected);
    }

    #[test]
    fn test_unknown_mode_passes_through() {
        let mode = BuildMode::parse("sanitize");
        assert_eq!(mode, BuildMode::Other("sanitize".to_string()));
        assert_eq!(mode.as_str(), "sanitize");
        assert!(!mode.is_canonical());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case(".")]
    #[case("..")]
    #[case("../outside")]
    #[case("/some/dir")]
    #[case("nested/mode")]
    #[case("..\\outside")]
    #[case("C:")]
    #[case("D:\\build")]
    fn test_validate_rejects_path_like_modes(#[case] input: &str) {
        let err = BuildMode::parse(input).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[rstest]
    #[case("Debug")]
    #[case("sanitize")]
    #[case("Coverage-ASan")]
    #[case("my.profile")]
    fn test_validate_accepts_plain_names(#[case] input: &str) {
        assert!(BuildMode::parse(input).validate().is_ok());
    }

    #[test]
    fn test_dir_name_is_lowercase() {
        assert_eq!(BuildMode::RelWithDebInfo.dir_name(), "relwithdebinfo");
    }

    #[test]
    fn test_toml_round_trip_uses_canonical_name() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            mode: BuildMode,
        }
        let holder: Holder = toml::from_str("mode = \"release\"").unwrap();
        assert_eq!(holder.mode, BuildMode::Release);
        assert_eq!(toml::to_string(&holder).unwrap().trim(), "mode = \"Release\"");
    }
}
