// Public API
pub mod cli;
pub mod commands;
pub mod error;
pub mod ui;

// Core domain types
pub mod cmake;
pub mod config;
pub mod lockfile;
pub mod mode;
pub mod package;
pub mod process;
pub mod resolver;
pub mod tools;
pub mod vcvars;
pub mod workspace;

// Re-export main types
pub use cmake::{BuildConfig, BuildState, Configurator};
pub use config::{ProjectConfig, Settings};
pub use error::{Error, Result};
pub use lockfile::Lockfile;
pub use mode::BuildMode;
pub use package::{PackageManager, PackageManagerKind};
pub use process::{Invocation, ProcessRunner, SystemRunner};
pub use vcvars::HarvestOutcome;
pub use workspace::{WorkspaceLayout, WorkspacePath};
