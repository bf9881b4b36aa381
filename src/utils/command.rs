// dumpkeeper/src/utils/command.rs
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// A fully described external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, String)>,
    /// Discard the child's stdout.
    pub quiet: bool,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ExternalCommand {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            quiet: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// The value following `flag` in the argument list, if any.
    pub fn arg_after(&self, flag: &str) -> Option<&Path> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(Path::new)
    }

    /// Program and arguments for log output. Environment values are left out
    /// so credentials never reach the log.
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }
}

/// Runs external processes to completion and reports their exit code.
///
/// An `Err` means the process could not be started at all. A process killed
/// by a signal reports `-1`.
pub trait CommandRunner {
    async fn run(&self, command: &ExternalCommand) -> std::io::Result<i32>;
}

/// Spawns real child processes through tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ExternalCommand) -> std::io::Result<i32> {
        tracing::debug!(command = %command.display(), "Spawning external command");

        let mut child = tokio::process::Command::new(&command.program);
        child.args(&command.args).stdin(Stdio::null());
        for (key, value) in &command.envs {
            child.env(key, value);
        }
        if command.quiet {
            child.stdout(Stdio::null());
        }

        let status = child.status().await?;
        Ok(status.code().unwrap_or(-1))
    }
}
