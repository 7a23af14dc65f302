use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code reported for failures that did not come from a child process.
pub const INTERNAL_ERROR_EXIT_CODE: i32 = -1;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal failures raised by the core. Soft failures (environment harvesting,
/// unknown build modes) are reported through outcomes and warnings instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{tool} cannot be downloaded for {os}/{arch}")]
    UnsupportedPlatform {
        tool: String,
        os: String,
        arch: String,
    },

    #[error("command `{command}` failed with exit code {code}")]
    ProcessFailed { command: String, code: i32 },

    #[error("failed to launch `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to extract archive {path:?}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("invalid dependency manifest {path:?}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("dependencies not found under {search_root:?}: {}", names.join(", "))]
    UnresolvedDependencies {
        search_root: PathBuf,
        names: Vec<String>,
    },

    #[error("{manager} dependencies requested but {expected} is missing in {project_dir:?}")]
    MissingProjectFile {
        manager: &'static str,
        expected: &'static str,
        project_dir: PathBuf,
    },

    #[error("tool `{0}` was not found")]
    ToolNotFound(String),

    #[error("build directory {0:?} is not configured; run configure first")]
    NotConfigured(PathBuf),

    #[error("environment cache {path:?} is corrupted ({reason}); delete it to regenerate")]
    CorruptEnvironmentCache { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this failure: the child's own code when a
    /// subprocess failed, [`INTERNAL_ERROR_EXIT_CODE`] otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ProcessFailed { code, .. } => *code,
            _ => INTERNAL_ERROR_EXIT_CODE,
        }
    }
}

/// Map an error chain produced by the command layer to an exit code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::exit_code)
        .unwrap_or(INTERNAL_ERROR_EXIT_CODE)
}
