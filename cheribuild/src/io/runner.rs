//! Command runner abstraction for build steps.
//!
//! The [`CommandRunner`] trait decouples lifecycle hooks from process
//! spawning. [`ProcessRunner`] executes for real (or only logs in pretend
//! mode); tests use recording runners that never spawn anything.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::options::EnvVars;
use crate::io::process::{append_log_line, run_command_logged};

/// One external command: program, arguments, working directory, extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// Project the command belongs to; selects the log file.
    pub label: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            label: None,
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

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn envs(mut self, vars: &EnvVars) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Shell-like rendering used for logs and pretend output.
    pub fn command_line(&self) -> String {
        let mut out = format!("cd {} && ", shell_quote(&self.cwd.display().to_string()));
        for (name, value) in &self.env {
            let _ = write!(out, "{name}={} ", shell_quote(value));
        }
        out.push_str(&shell_quote(&self.program));
        for arg in &self.args {
            out.push(' ');
            out.push_str(&shell_quote(arg));
        }
        out
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        for (name, value) in &self.env {
            cmd.env(name, value);
        }
        cmd
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Abstraction over external command execution.
pub trait CommandRunner {
    /// Run the command to completion; a non-zero exit is an error.
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// True when commands are only printed, never executed.
    fn pretend(&self) -> bool {
        false
    }
}

/// Runner that spawns real processes and tees their output to per-project logs.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    pub pretend: bool,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    /// Logs go to `<log_dir>/<label>.log`; unlabeled commands are not logged.
    pub log_dir: Option<PathBuf>,
}

impl ProcessRunner {
    fn log_path(&self, invocation: &Invocation) -> Option<PathBuf> {
        let dir = self.log_dir.as_ref()?;
        let label = invocation.label.as_ref()?;
        Some(dir.join(format!("{label}.log")))
    }
}

impl CommandRunner for ProcessRunner {
    #[instrument(skip_all, fields(program = %invocation.program, pretend = self.pretend))]
    fn run(&self, invocation: &Invocation) -> Result<()> {
        let line = invocation.command_line();
        if self.pretend {
            info!("would run: {line}");
            return Ok(());
        }
        info!("running: {line}");

        let log_path = self.log_path(invocation);
        if let Some(path) = &log_path {
            append_log_line(path, &format!("+ {line}"))?;
        }

        let output = run_command_logged(
            invocation.to_command(),
            self.timeout,
            self.output_limit_bytes,
            log_path.as_deref(),
        )
        .with_context(|| format!("run {}", invocation.program))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "command timed out");
            return Err(anyhow!(
                "{} timed out after {:?}: {line}",
                invocation.program,
                self.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "command failed");
            let mut msg = format!(
                "{} failed with status {:?}: {line}",
                invocation.program,
                output.status.code()
            );
            let stderr = output.stderr_tail_lossy();
            if !stderr.trim().is_empty() {
                let _ = write!(msg, "\n--- stderr (tail) ---\n{}", stderr.trim_end());
            }
            if let Some(path) = &log_path {
                let _ = write!(msg, "\nfull log: {}", path.display());
            }
            return Err(anyhow!(msg));
        }
        Ok(())
    }

    fn pretend(&self) -> bool {
        self.pretend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(log_dir: Option<PathBuf>, pretend: bool) -> ProcessRunner {
        ProcessRunner {
            pretend,
            timeout: Duration::from_secs(10),
            output_limit_bytes: 4096,
            log_dir,
        }
    }

    #[test]
    fn command_line_quotes_special_values() {
        let inv = Invocation::new("make", "/tmp/build dir")
            .env("LIBS", "")
            .arg("-j4")
            .arg("BOOST_EXCLUDE_LIBRARIES=function;container");
        assert_eq!(
            inv.command_line(),
            "cd '/tmp/build dir' && LIBS='' make -j4 'BOOST_EXCLUDE_LIBRARIES=function;container'"
        );
    }

    #[test]
    fn pretend_does_not_spawn() {
        let inv = Invocation::new("definitely-not-a-real-program", "/nonexistent");
        runner(None, true).run(&inv).expect("pretend run");
    }

    #[cfg(unix)]
    #[test]
    fn failure_reports_stderr_and_writes_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inv = Invocation::new("sh", temp.path())
            .arg("-c")
            .arg("echo compiling; echo 'error: nope' >&2; exit 2")
            .label("demo");
        let err = runner(Some(temp.path().join("logs")), false)
            .run(&inv)
            .expect_err("should fail");
        let msg = format!("{err:#}");
        assert!(msg.contains("error: nope"));

        let log = std::fs::read_to_string(temp.path().join("logs/demo.log")).expect("log");
        assert!(log.starts_with("+ cd "));
        assert!(log.contains("compiling\n"));
    }

    #[cfg(unix)]
    #[test]
    fn passes_environment_to_child() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inv = Invocation::new("sh", temp.path())
            .arg("-c")
            .arg("test \"$CFLAGS_FOR_BUILD\" = -g")
            .env("CFLAGS_FOR_BUILD", "-g");
        runner(None, false).run(&inv).expect("env visible");
    }
}
