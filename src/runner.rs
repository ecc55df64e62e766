//! Build tool execution
//!
//! `./configure`, `make`, `pear` and friends are run through the `ToolRunner`
//! trait. `ProcessRunner` spawns real processes and forwards their stdout to
//! the log line by line; `DryRunRunner` logs what would run and reports
//! success without touching the host.

use crate::error::{ForgeError, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};

/// One external command: program, arguments, working directory and extra env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `program arg1 arg2`, as written in logs and error messages
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output from a build step.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Standard error, kept for error reports
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the step exited successfully (exit code 0).
    pub success: bool,
}

impl StepOutput {
    pub fn succeeded() -> Self {
        Self {
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Check if the step succeeded and return an `ExternalTool` error if not.
    pub fn ensure_success(&self, step: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(ForgeError::external_tool(
                step,
                self.exit_code.unwrap_or(-1),
                self.stderr.trim(),
            ))
        }
    }
}

/// Build-tool invocation interface
pub trait ToolRunner {
    /// Run a command to completion. A non-zero exit is reported in the
    /// returned output, not as an error; spawn failures are errors.
    fn run(&self, invocation: &Invocation) -> Result<StepOutput>;

    /// Run a command and return its trimmed stdout. Non-zero exit is an error.
    fn capture(&self, invocation: &Invocation) -> Result<String>;

    /// Run a command and fail with `ExternalTool` on non-zero exit.
    fn run_checked(&self, invocation: &Invocation) -> Result<()> {
        self.run(invocation)?.ensure_success(&invocation.display_line())
    }
}

/// Runs commands as child processes of this one
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());
        if let Some(dir) = &invocation.dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<StepOutput> {
        info!("Running: {}", invocation.display_line());

        let mut child = Self::command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ForgeError::external_tool(
                    invocation.display_line(),
                    -1,
                    format!("failed to spawn {}: {}", invocation.program, e),
                )
            })?;

        // stderr is drained on its own thread so a chatty build cannot fill
        // the pipe while stdout is being streamed
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(std::result::Result::ok) {
                info!(target: "build", "{}", line);
            }
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            debug!("{} exited successfully", invocation.program);
        } else {
            warn!(
                "{} failed with exit code {}",
                invocation.program,
                status.code().unwrap_or(-1)
            );
        }

        Ok(StepOutput {
            stderr,
            exit_code: status.code(),
            success: status.success(),
        })
    }

    fn capture(&self, invocation: &Invocation) -> Result<String> {
        debug!("Capturing: {}", invocation.display_line());
        let output = Self::command(invocation).output().map_err(|e| {
            ForgeError::external_tool(
                invocation.display_line(),
                -1,
                format!("failed to spawn {}: {}", invocation.program, e),
            )
        })?;

        if !output.status.success() {
            return Err(ForgeError::external_tool(
                invocation.display_line(),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Logs each command instead of running it
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl ToolRunner for DryRunRunner {
    fn run(&self, invocation: &Invocation) -> Result<StepOutput> {
        info!("[DRY RUN] Would run: {}", invocation.display_line());
        Ok(StepOutput::succeeded())
    }

    fn capture(&self, invocation: &Invocation) -> Result<String> {
        info!("[DRY RUN] Would capture: {}", invocation.display_line());
        Ok(String::new())
    }
}
