//! Pinned versions of every tool the workspace can download.

use super::archive::{ArchiveFormat, ExtractPolicy};
use super::{Artifact, Os, Release, ToolSpec};

/// Subdirectory of the vcpkg install holding the registry snapshot (`VCPKG_ROOT`).
pub const VCPKG_REGISTRY_DIR: &str = "registry";

pub const CMAKE_VERSION: &str = "4.2.0";
pub const CONAN_VERSION: &str = "2.23.0";
pub const VCPKG_TOOL_VERSION: &str = "2025-11-19";
pub const VCPKG_REGISTRY_VERSION: &str = "2025.10.17";
pub const NINJA_VERSION: &str = "1.13.2";
pub const VSWHERE_VERSION: &str = "3.1.7";

pub fn cmake() -> ToolSpec {
    let url = |system: &str, ext: &str| {
        format!(
            "https://github.com/Kitware/CMake/releases/download/v{v}/cmake-{v}-{system}-x86_64.{ext}",
            v = CMAKE_VERSION
        )
    };
    let policy = |gui: &str| {
        ExtractPolicy::strip_root().excluding(["doc/".to_string(), "man/".to_string(), gui.to_string()])
    };

    ToolSpec::new("cmake", CMAKE_VERSION)
        .release(
            Os::Windows,
            Release::new("bin/cmake.exe").artifact(
                Artifact::archive(url("windows", "zip"), ArchiveFormat::Zip)
                    .policy(policy("bin/cmake-gui.exe")),
            ),
        )
        .release(
            Os::Linux,
            Release::new("bin/cmake").artifact(
                Artifact::archive(url("linux", "tar.gz"), ArchiveFormat::TarGz)
                    .policy(policy("bin/cmake-gui")),
            ),
        )
}

pub fn conan() -> ToolSpec {
    let url = |system: &str, ext: &str| {
        format!(
            "https://github.com/conan-io/conan/releases/download/{v}/conan-{v}-{system}-x86_64.{ext}",
            v = CONAN_VERSION
        )
    };

    ToolSpec::new("conan", CONAN_VERSION)
        .release(
            Os::Windows,
            Release::new("conan.exe")
                .artifact(Artifact::archive(url("windows", "zip"), ArchiveFormat::Zip)),
        )
        .release(
            Os::Linux,
            Release::new("bin/conan")
                .artifact(Artifact::archive(url("linux", "tgz"), ArchiveFormat::TarGz)),
        )
}

/// The vcpkg executable plus the registry snapshot it resolves ports from.
pub fn vcpkg() -> ToolSpec {
    let tool_url = |asset: &str| {
        format!(
            "https://github.com/microsoft/vcpkg-tool/releases/download/{VCPKG_TOOL_VERSION}/{asset}"
        )
    };
    let registry = || {
        Artifact::archive(
            format!(
                "https://github.com/microsoft/vcpkg/archive/refs/tags/{VCPKG_REGISTRY_VERSION}.zip"
            ),
            ArchiveFormat::Zip,
        )
        .policy(ExtractPolicy::strip_root())
        .target(VCPKG_REGISTRY_DIR)
    };

    ToolSpec::new("vcpkg", VCPKG_TOOL_VERSION)
        .release(
            Os::Windows,
            Release::new("vcpkg.exe")
                .artifact(Artifact::executable(tool_url("vcpkg.exe"), "vcpkg.exe"))
                .artifact(registry()),
        )
        .release(
            Os::Linux,
            Release::new("vcpkg")
                .artifact(Artifact::executable(tool_url("vcpkg-glibc"), "vcpkg"))
                .artifact(registry()),
        )
}

pub fn ninja() -> ToolSpec {
    let url = |system: &str| {
        format!(
            "https://github.com/ninja-build/ninja/releases/download/v{NINJA_VERSION}/ninja-{system}.zip"
        )
    };

    ToolSpec::new("ninja", NINJA_VERSION)
        .release(
            Os::Windows,
            Release::new("ninja.exe").artifact(Artifact::archive(url("win"), ArchiveFormat::Zip)),
        )
        .release(
            Os::Linux,
            Release::new("ninja").artifact(Artifact::archive(url("linux"), ArchiveFormat::Zip)),
        )
}

/// Visual Studio locator. Windows only.
pub fn vswhere() -> ToolSpec {
    ToolSpec::new("vswhere", VSWHERE_VERSION).release(
        Os::Windows,
        Release::new("vswhere.exe").artifact(Artifact::executable(
            format!(
                "https://github.com/microsoft/vswhere/releases/download/{VSWHERE_VERSION}/vswhere.exe"
            ),
            "vswhere.exe",
        )),
    )
}
