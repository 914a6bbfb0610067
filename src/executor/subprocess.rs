//! Bounded subprocess execution.
//!
//! Runs an external program directly (no shell) with:
//! - A hard timeout, after which the child is killed and reaped
//! - Captured stdout/stderr
//! - A controlled environment
//!
//! Every outcome is a value: see [`Invocation`].

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a killed child gets to exit before reaping moves to a
/// background thread.
const REAP_GRACE: Duration = Duration::from_millis(250);

/// Outcome of running a subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// The process ran to completion.
    Completed {
        /// Exit code, `None` if the process was terminated by a signal.
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The process exceeded its timeout and was killed.
    TimedOut { after: Duration },
    /// The process could not be started or waited on.
    SpawnFailed { reason: String },
}

impl Invocation {
    /// Whether the process completed with exit code 0.
    pub fn succeeded(&self) -> bool {
        matches!(self, Invocation::Completed { exit_code: Some(0), .. })
    }
}

/// A subprocess to run: program, arguments, timeout and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subprocess {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
    clear_env: bool,
}

impl Subprocess {
    /// Create a new subprocess description.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(30),
            clear_env: false,
        }
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Set the timeout for the command.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clear the environment before running (then add only specified env vars).
    pub fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the command and wait for it, enforcing the timeout.
    ///
    /// The child runs in its own process group; on timeout the whole group
    /// is killed, then the child is reaped. Never blocks past the timeout
    /// plus [`REAP_GRACE`], even when the kill is refused.
    pub fn run(&self) -> Invocation {
        debug!(
            program = %self.program.display(),
            args = ?self.args,
            timeout_ms = self.timeout.as_millis() as u64,
            "Executing subprocess"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        if self.clear_env {
            cmd.env_clear();
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program.display(), error = %e, "Failed to spawn subprocess");
                return Invocation::SpawnFailed {
                    reason: format!("Failed to spawn {}: {}", self.program.display(), e),
                };
            }
        };

        // Drain both pipes concurrently so a chatty child cannot block on a
        // full pipe while we poll for its exit.
        let stdout_rx = child.stdout.take().map(spawn_reader);
        let stderr_rx = child.stderr.take().map(spawn_reader);

        let start = Instant::now();
        let deadline = start + self.timeout;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let stdout = collect_output(stdout_rx, deadline);
                    let stderr = collect_output(stderr_rx, deadline);
                    debug!(
                        program = %self.program.display(),
                        exit_code = ?status.code(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Subprocess completed"
                    );
                    return Invocation::Completed {
                        exit_code: status.code(),
                        stdout,
                        stderr,
                    };
                }
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            program = %self.program.display(),
                            timeout_ms = self.timeout.as_millis() as u64,
                            "Process timed out, killing"
                        );
                        terminate(child);
                        return Invocation::TimedOut {
                            after: self.timeout,
                        };
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => {
                    terminate(child);
                    return Invocation::SpawnFailed {
                        reason: format!(
                            "Failed to check status of {}: {}",
                            self.program.display(),
                            e
                        ),
                    };
                }
            }
        }
    }
}

/// Read a pipe to the end on a background thread.
fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        // Receiver may be gone if the caller gave up waiting.
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Wait for a reader until the deadline.
///
/// A grandchild that inherited the pipe can keep it open after the helper
/// exits; in that case the output is abandoned rather than waited for.
fn collect_output(rx: Option<mpsc::Receiver<String>>, deadline: Instant) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(POLL_INTERVAL);
    match rx.recv_timeout(wait) {
        Ok(output) => output,
        Err(_) => {
            warn!("Subprocess output pipe still open after exit, output discarded");
            String::new()
        }
    }
}

/// Kill the child's process group and reap it.
fn terminate(child: Child) {
    terminate_with(child, kill_process_group);
}

/// SIGKILL the child's process group, falling back to the child alone.
///
/// Both fail with EPERM when the helper runs as root under sudo and the
/// daemon does not.
fn kill_process_group(child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        debug!(error = %e, "Failed to kill process group, killing child only");
        if let Err(e) = child.kill() {
            warn!(error = %e, pid = child.id(), "Failed to kill timed-out process");
        }
    }
}

/// Kill `child` with `kill`, then reap it within [`REAP_GRACE`].
///
/// A child still running after the grace period is handed to a detached
/// thread that reaps it whenever it exits.
fn terminate_with<K>(mut child: Child, kill: K)
where
    K: FnOnce(&mut Child),
{
    kill(&mut child);

    let deadline = Instant::now() + REAP_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) | Err(_) => break,
        }
    }

    warn!(
        pid = child.id(),
        "Timed-out process survived kill, reaping in background"
    );
    thread::spawn(move || {
        let _ = child.wait();
    });
}

/// Something that can run a [`Subprocess`].
///
/// The executor is written against this trait so the process boundary can be
/// replaced in tests.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: &Subprocess) -> Invocation;
}

/// Runs subprocesses on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &Subprocess) -> Invocation {
        command.run()
    }
}
