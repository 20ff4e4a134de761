//! Subprocess invocation helpers.
//!
//! Every external tool the packager drives (7z, msiexec, pacman, editbin,
//! mt, makensis, reg) goes through [`Cmd`]. The wrapper logs the command
//! line before running it, captures output for diagnostics, and turns a
//! non-zero exit into an error that aborts the whole run.
//!
//! # Example
//!
//! ```rust,ignore
//! use mozbuild::process::Cmd;
//!
//! Cmd::new("7z")
//!     .args(["x", "-y"])
//!     .arg_path(&archive)
//!     .error_msg("7z extraction failed")
//!     .run_interactive()?;
//! ```

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct CmdOutput {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Captured standard output (UTF-8, lossy).
    pub stdout: String,
    /// Captured standard error (UTF-8, lossy).
    pub stderr: String,
}

impl CmdOutput {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Builder for a single external tool invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
            error_msg: None,
            allow_fail: false,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run the child in `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Message to use when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Treat a non-zero exit as a normal result instead of an error.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn log(&self) {
        println!("$ {} {}", self.program, self.args.join(" "));
    }

    fn failure(&self) -> String {
        self.error_msg
            .clone()
            .unwrap_or_else(|| format!("command failed: {}", self.program))
    }

    /// Run the command, capturing stdout/stderr.
    ///
    /// On a non-zero exit the captured output is printed (so the tool's
    /// own diagnostics are not lost) and an error is returned, unless
    /// [`allow_fail`](Self::allow_fail) was set.
    pub fn run(self) -> Result<CmdOutput> {
        self.log();
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        let result = CmdOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() && !self.allow_fail {
            if !result.stdout.is_empty() {
                println!("{}", result.stdout.trim_end());
            }
            if !result.stderr.is_empty() {
                eprintln!("{}", result.stderr.trim_end());
            }
            bail!("{} (exit: {:?})", self.failure(), result.code);
        }

        Ok(result)
    }

    /// Run the command with stdio inherited from the packager.
    ///
    /// Used for long-running tools whose progress output the user should
    /// see live (pacman, pip, makensis).
    pub fn run_interactive(self) -> Result<()> {
        self.log();
        let status = self
            .command()
            .status()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        if !status.success() && !self.allow_fail {
            bail!("{} (exit: {:?})", self.failure(), status.code());
        }
        Ok(())
    }
}

/// Find `tool` on PATH, returning its full path.
pub fn which(tool: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Some(candidate);
        }
        let with_exe = dir.join(format!("{}.exe", tool));
        if with_exe.is_file() {
            return Some(with_exe);
        }
    }
    None
}

/// Whether `tool` is available on PATH.
pub fn exists(tool: &str) -> bool {
    which(tool).is_some()
}
