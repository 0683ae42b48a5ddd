//! Helpers for running build commands with timeouts and a tee'd log file.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

type SharedLog = Arc<Option<Mutex<BufWriter<File>>>>;
type TailReceiver = Receiver<Result<Vec<u8>>>;

/// How long to wait for output pipes to close after a timed-out command is killed.
const KILLED_OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// Captured child process result.
///
/// Only the last `output_limit_bytes` of each stream are kept in memory; the
/// full output goes to the log file when one is given.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout_tail: Vec<u8>,
    pub stderr_tail: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_tail_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr_tail).into_owned()
    }
}

/// Run a command with a timeout, draining stdout/stderr on reader threads.
///
/// When `log_path` is `Some`, all output from both streams is appended to that
/// file (flushed per read) so long builds can be followed live.
///
/// On unix the command runs in its own process group, and a timeout kills the
/// whole group so that jobs forked by `make` or `configure` die with it.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes, logging = log_path.is_some()))]
pub fn run_command_logged(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
    log_path: Option<&Path>,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let log: SharedLog = Arc::new(match log_path {
        Some(path) => Some(Mutex::new(BufWriter::new(open_log(path)?))),
        None => None,
    });

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_log = log.clone();
    let stderr_log = log.clone();
    let stdout_rx = spawn_reader(stdout, output_limit_bytes, stdout_log);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes, stderr_log);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    let grace = timed_out.then_some(KILLED_OUTPUT_GRACE);
    let stdout_tail = collect_tail(&stdout_rx, grace).context("collect stdout")?;
    let stderr_tail = collect_tail(&stderr_rx, grace).context("collect stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout_tail,
        stderr_tail,
        timed_out,
    })
}

/// Append a line to the log file, creating parent directories as needed.
pub fn append_log_line(path: &Path, line: &str) -> Result<()> {
    let mut file = open_log(path)?;
    writeln!(file, "{line}").with_context(|| format!("write log {}", path.display()))?;
    Ok(())
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Kill the command's process group, falling back to the child alone.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Result<()> {
    let group = format!("-{}", child.id());
    match Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => {
            warn!(?status, "kill of process group failed, killing child only");
            child.kill().context("kill command")
        }
        Err(e) => {
            warn!(err = %e, "could not run kill, killing child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn spawn_reader<R>(reader: R, limit: usize, log: SharedLog) -> TailReceiver
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // the receiver is gone only if we stopped waiting for this stream
        let _ = tx.send(read_stream_tail(reader, limit, log));
    });
    rx
}

/// Wait for a reader thread's tail. With `grace`, give up after that long and
/// return an empty tail; a process that escaped the kill may still hold the pipe.
fn collect_tail(rx: &TailReceiver, grace: Option<Duration>) -> Result<Vec<u8>> {
    let Some(grace) = grace else {
        return rx
            .recv()
            .map_err(|_| anyhow!("output reader thread panicked"))?;
    };
    match rx.recv_timeout(grace) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!("output still open after kill, abandoning reader");
            Ok(Vec::new())
        }
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read a stream in fixed-size chunks, keeping the last `limit` bytes and
/// tee-ing everything to the log.
fn read_stream_tail<R: Read>(mut reader: R, limit: usize, log: SharedLog) -> Result<Vec<u8>> {
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(limit.min(64 * 1024));
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let data = &chunk[..n];

        if let Some(ref mutex) = *log
            && let Ok(mut writer) = mutex.lock()
        {
            if let Err(e) = writer.write_all(data) {
                warn!(err = %e, "failed to write to build log");
            } else if let Err(e) = writer.flush() {
                warn!(err = %e, "failed to flush build log");
            }
        }

        let keep = &data[n.saturating_sub(limit)..];
        tail.extend(keep);
        let excess = tail.len().saturating_sub(limit);
        tail.drain(..excess);
    }

    Ok(tail.into_iter().collect())
}
