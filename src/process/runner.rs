//! Child process runner with concurrent stream draining
//!
//! Both pipes are read on their own thread so the child can never block on a
//! full stdout pipe while we are still waiting on stderr (or vice versa).
//! Lines are delivered to the caller as they arrive; `\r` counts as a line
//! terminator because progress bars redraw in place.

use super::cancel::CancellationToken;
use std::ffi::OsString;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// How often the child is polled for exit, deadline and cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long descendants may keep the pipes open after the tool itself exits
const STRAGGLER_GRACE: Duration = Duration::from_secs(2);

/// Read buffer size for each pipe
const READ_CHUNK: usize = 8 * 1024;

/// Limits applied to one invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the process tree once this much time has passed
    pub timeout: Option<Duration>,
    /// Kill the process tree when this token is cancelled
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }
}

/// Record of a finished invocation
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    /// Arguments rendered as a single shell-like string
    pub args: String,
    /// `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolInvocation {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Failures of the runner itself (a nonzero exit is not one of them)
#[derive(Debug, Error)]
pub enum RunError {
    #[error("executable '{program}' not found")]
    NotFound { program: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {}s", .after.as_secs_f64())]
    Timeout {
        program: String,
        after: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("'{program}' was cancelled")]
    Cancelled { program: String },
}

/// How the wait loop ended
enum Exit {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
    WaitFailed(std::io::Error),
}

/// Run `program` with `args`, streaming output lines to the handlers
///
/// `on_stdout` and `on_stderr` run on separate reader threads, each seeing its
/// stream's lines in order. Returns once the process has exited and both
/// streams have been drained.
pub fn run<O, E>(
    program: &str,
    args: &[OsString],
    options: &RunOptions,
    on_stdout: O,
    on_stderr: E,
) -> Result<ToolInvocation, RunError>
where
    O: FnMut(&str) + Send,
    E: FnMut(&str) + Send,
{
    let rendered_args = render_args(args);
    debug!("Spawning: {} {}", program, rendered_args);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    isolate_process_group(&mut command);

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RunError::NotFound {
                program: program.to_string(),
            }
        } else {
            RunError::Spawn {
                program: program.to_string(),
                source: e,
            }
        }
    })?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let started = Instant::now();

    let (exit, stdout, stderr) = thread::scope(|scope| {
        let stdout_reader = stdout_pipe.map(|pipe| scope.spawn(move || drain_lines(pipe, on_stdout)));
        let stderr_reader = stderr_pipe.map(|pipe| scope.spawn(move || drain_lines(pipe, on_stderr)));

        let exit = wait_for_exit(&mut child, options, started);
        if matches!(exit, Exit::Exited(_)) {
            let readers_done = || {
                stdout_reader.as_ref().map_or(true, |h| h.is_finished())
                    && stderr_reader.as_ref().map_or(true, |h| h.is_finished())
            };
            reap_stragglers(&mut child, options, started, readers_done);
        }

        (
            exit,
            join_reader(stdout_reader, "stdout"),
            join_reader(stderr_reader, "stderr"),
        )
    });

    match exit {
        Exit::Exited(status) => {
            debug!(
                "{} exited with {:?} after {:.2}s",
                program,
                status.code(),
                started.elapsed().as_secs_f64()
            );
            Ok(ToolInvocation {
                program: program.to_string(),
                args: rendered_args,
                exit_code: status.code(),
                stdout,
                stderr,
            })
        }
        Exit::TimedOut(after) => {
            warn!("{} timed out after {:.1}s, process tree killed", program, after.as_secs_f64());
            Err(RunError::Timeout {
                program: program.to_string(),
                after,
                stdout,
                stderr,
            })
        }
        Exit::Cancelled => {
            warn!("{} cancelled, process tree killed", program);
            Err(RunError::Cancelled {
                program: program.to_string(),
            })
        }
        Exit::WaitFailed(source) => Err(RunError::Wait {
            program: program.to_string(),
            source,
        }),
    }
}

/// Run a short command without line handlers (probes)
pub fn run_captured(
    program: &str,
    args: &[OsString],
    timeout: Duration,
) -> Result<ToolInvocation, RunError> {
    run(program, args, &RunOptions::with_timeout(timeout), |_| {}, |_| {})
}

/// Poll the child until it exits, the deadline passes or we are cancelled
fn wait_for_exit(child: &mut Child, options: &RunOptions, started: Instant) -> Exit {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Exit::Exited(status),
            Ok(None) => {}
            Err(e) => {
                kill_tree(child);
                let _ = child.wait();
                return Exit::WaitFailed(e);
            }
        }

        if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            kill_tree(child);
            let _ = child.wait();
            return Exit::Cancelled;
        }

        if let Some(timeout) = options.timeout {
            if started.elapsed() >= timeout {
                kill_tree(child);
                let _ = child.wait();
                return Exit::TimedOut(timeout);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Bound the wait for the readers once the tool itself has exited
///
/// A background descendant that inherited the pipes keeps them open after
/// the leader is gone. It gets a short grace period, cut short by the
/// deadline or cancellation, before the process group is killed.
fn reap_stragglers<F: Fn() -> bool>(
    child: &mut Child,
    options: &RunOptions,
    started: Instant,
    readers_done: F,
) {
    let exited = Instant::now();
    while !readers_done() {
        let cancelled = options.cancel.as_ref().is_some_and(|c| c.is_cancelled());
        let past_deadline = options.timeout.is_some_and(|t| started.elapsed() >= t);
        if cancelled || past_deadline || exited.elapsed() >= STRAGGLER_GRACE {
            debug!("Output pipes still open after exit, killing process group");
            kill_tree(child);
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to EOF, calling `on_line` for every non-blank line
///
/// Returns the full captured text (lossy UTF-8).
fn drain_lines<R: Read, F: FnMut(&str)>(mut reader: R, mut on_line: F) -> String {
    let mut captured = Vec::new();
    let mut pending = Vec::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Pipe read failed: {}", e);
                break;
            }
        };

        captured.extend_from_slice(&buf[..n]);
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, &mut on_line);
            } else {
                pending.push(byte);
            }
        }
    }
    flush_line(&mut pending, &mut on_line);

    String::from_utf8_lossy(&captured).into_owned()
}

fn flush_line<F: FnMut(&str)>(pending: &mut Vec<u8>, on_line: &mut F) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending);
    if !line.trim().is_empty() {
        on_line(&line);
    }
    pending.clear();
}

fn join_reader(handle: Option<ScopedJoinHandle<'_, String>>, stream: &str) -> String {
    match handle.map(|h| h.join()) {
        Some(Ok(text)) => text,
        Some(Err(_)) => {
            warn!("{} reader thread panicked; output for that stream is incomplete", stream);
            String::new()
        }
        None => String::new(),
    }
}

/// Render arguments for logs and error messages, quoting ones with spaces
fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| {
            let s = a.to_string_lossy();
            if s.is_empty() || s.contains(char::is_whitespace) {
                format!("\"{}\"", s)
            } else {
                s.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Start the child in its own process group so the whole tree can be killed
#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // SAFETY: kill(2) only sends a signal; the group id is the child's own pid
    // because it was spawned with process_group(0).
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(windows)]
fn kill_tree(child: &mut Child) {
    let killed = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &child.id().to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !killed {
        let _ = child.kill();
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}
