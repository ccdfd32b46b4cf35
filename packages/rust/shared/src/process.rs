//! External process invocation.
//!
//! Every external program (converter, typesetting engine, git, gh, platform
//! automation) is run through a [`ProcessRunner`], so all call sites share one
//! translation from "nonzero exit" to [`PaperError::ToolFailed`].

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::error::{PaperError, Result};

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// External programs with a well-known name and an override variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Pandoc,
    Git,
    Gh,
}

impl Tool {
    /// Binary name looked up on `PATH`.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::Pandoc => "pandoc",
            Self::Git => "git",
            Self::Gh => "gh",
        }
    }

    /// Environment variable that overrides the binary location.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Pandoc => "PAPER_PANDOC",
            Self::Git => "PAPER_GIT",
            Self::Gh => "PAPER_GH",
        }
    }

    /// Program to execute: the override variable, then `PATH`, then the bare name.
    pub fn program(&self) -> String {
        if let Ok(path) = std::env::var(self.env_var()) {
            if !path.trim().is_empty() {
                return path;
            }
        }
        which::which(self.binary_name())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| self.binary_name().to_string())
    }

    /// Start an invocation of this tool.
    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.program())
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A fully described external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    /// Inherit the terminal instead of capturing output.
    pub interactive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Short program name for messages (`pandoc`, not `/usr/bin/pandoc`).
    pub fn program_name(&self) -> String {
        std::path::Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|a| {
            if a.contains(char::is_whitespace) {
                format!("\"{a}\"")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed output with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs external commands.
pub trait ProcessRunner {
    /// Run to completion, whatever the exit code.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run and translate a nonzero exit into [`PaperError::ToolFailed`].
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if output.success() {
            Ok(output)
        } else {
            Err(PaperError::ToolFailed {
                program: invocation.program_name(),
                code: output.code,
                stdout: output.stdout_string(),
                stderr: output.stderr_string(),
            })
        }
    }
}

/// Runs commands on the host with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(command = %invocation.display(), "running external command");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        if invocation.interactive {
            let status = command.status().map_err(|e| spawn_error(invocation, e))?;
            return Ok(CommandOutput {
                code: status.code().unwrap_or(-1),
                ..Default::default()
            });
        }

        command
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| spawn_error(invocation, e))?;

        if let Some(input) = &invocation.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input)
                    .map_err(|e| spawn_error(invocation, e))?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| spawn_error(invocation, e))?;

        let result = CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        };
        trace!(code = result.code, "external command finished");
        Ok(result)
    }
}

fn spawn_error(invocation: &Invocation, err: std::io::Error) -> PaperError {
    PaperError::ToolMissing {
        program: invocation.program_name(),
        reason: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scripted runner (tests)
// ---------------------------------------------------------------------------

/// A runner that records every invocation and answers from a closure.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedRunner {
    calls: std::cell::RefCell<Vec<Invocation>>,
    respond: Box<dyn Fn(&Invocation) -> Result<CommandOutput>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedRunner {
    pub fn new(respond: impl Fn(&Invocation) -> Result<CommandOutput> + 'static) -> Self {
        Self {
            calls: std::cell::RefCell::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// A runner where every command succeeds with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(CommandOutput::ok(Vec::new())))
    }

    /// Every invocation seen so far.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ProcessRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        (self.respond)(invocation)
    }
}
