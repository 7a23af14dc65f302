use crate::error::{Error, Result};
use crate::workspace::normalize_path;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// A single blocking child-process call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, OsString)>,
    /// Pass `args` to the program verbatim (`cmd /C` lines on Windows).
    pub raw: bool,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            raw: false,
        }
    }

    /// Run `line` through the platform shell (`cmd /S /C` or `sh -c`).
    pub fn shell(line: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self::shell_for(cfg!(windows), line.into(), cwd.into())
    }

    /// `cmd /S /C` with the whole line in one extra pair of quotes, so
    /// quoted paths containing `(` or spaces survive cmd's quote stripping.
    fn shell_for(windows: bool, line: String, cwd: PathBuf) -> Self {
        if windows {
            let wrapped = format!("\"{line}\"");
            let mut invocation = Self::new("cmd", cwd).args(["/S".to_string(), "/C".to_string(), wrapped]);
            invocation.raw = true;
            invocation
        } else {
            Self::new("sh", cwd).args(["-c".to_string(), line])
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Put `dir` in front of the inherited `PATH`.
    pub fn prepend_path(self, dir: &Path) -> Self {
        let mut entries = vec![dir.to_path_buf()];
        if let Some(current) = env::var_os("PATH") {
            entries.extend(env::split_paths(&current));
        }
        match env::join_paths(entries) {
            Ok(joined) => self.env("PATH", joined),
            Err(_) => self,
        }
    }

    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.env
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if self.raw {
            push_raw_args(&mut command, &self.args);
        } else {
            command.args(&self.args);
        }
        command.current_dir(&self.cwd);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", normalize_path(&self.program))?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(windows)]
fn push_raw_args(command: &mut Command, args: &[String]) {
    use std::os::windows::process::CommandExt;
    for arg in args {
        command.raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn push_raw_args(command: &mut Command, args: &[String]) {
    command.args(args);
}

/// Executes invocations. Every nonzero exit is fatal.
pub trait ProcessRunner {
    /// Run with inherited stdio.
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Run and return captured stdout.
    fn capture(&self, invocation: &Invocation) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        info!(
            "Executing: {invocation} | CWD: {}",
            normalize_path(&invocation.cwd)
        );
        let status = invocation
            .command()
            .status()
            .map_err(|source| spawn_error(invocation, source))?;
        check_status(invocation, status)
    }

    fn capture(&self, invocation: &Invocation) -> Result<String> {
        info!(
            "Executing: {invocation} | CWD: {}",
            normalize_path(&invocation.cwd)
        );
        let output = invocation
            .command()
            .stdout(Stdio::piped())
            .output()
            .map_err(|source| spawn_error(invocation, source))?;
        check_status(invocation, output.status)?;
        debug!("Captured {} bytes from {}", output.stdout.len(), invocation);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn spawn_error(invocation: &Invocation, source: std::io::Error) -> Error {
    Error::Spawn {
        program: normalize_path(&invocation.program),
        source,
    }
}

fn check_status(invocation: &Invocation, status: std::process::ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    // Signal-terminated children have no code; report them as internal failures.
    let code = status.code().unwrap_or(crate::error::INTERNAL_ERROR_EXIT_CODE);
    info!("Command: {invocation} failed with code: {code}");
    Err(Error::ProcessFailed {
        command: invocation.to_string(),
        code,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    type Hook = Box<dyn Fn(&Invocation)>;

    /// Records invocations instead of spawning them.
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        pub calls: RefCell<Vec<Invocation>>,
        outputs: RefCell<VecDeque<String>>,
        hook: Option<Hook>,
        fail_code: Option<i32>,
    }

    impl RecordingRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_outputs<I: IntoIterator<Item = String>>(outputs: I) -> Self {
            Self {
                outputs: RefCell::new(outputs.into_iter().collect()),
                ..Self::default()
            }
        }

        pub(crate) fn on_call(mut self, hook: impl Fn(&Invocation) + 'static) -> Self {
            self.hook = Some(Box::new(hook));
            self
        }

        /// Every call is recorded, then fails with `code`.
        pub(crate) fn failing_with(mut self, code: i32) -> Self {
            self.fail_code = Some(code);
            self
        }

        pub(crate) fn calls(&self) -> Vec<Invocation> {
            self.calls.borrow().clone()
        }
    }

    impl ProcessRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<()> {
            if let Some(hook) = &self.hook {
                hook(invocation);
            }
            self.calls.borrow_mut().push(invocation.clone());
            match self.fail_code {
                Some(code) => Err(Error::ProcessFailed {
                    command: invocation.to_string(),
                    code,
                }),
                None => Ok(()),
            }
        }

        fn capture(&self, invocation: &Invocation) -> Result<String> {
            self.run(invocation)?;
            Ok(self.outputs.borrow_mut().pop_front().unwrap_or_default())
        }
    }
}
