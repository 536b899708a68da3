//! Measured execution of external commands
//!
//! Each repetition spawns the target with inherited stdin/stdout and a piped
//! stderr that is forwarded to the terminal while its tail is captured. The
//! child is observed with `waitid(WNOWAIT)` (wall clock stops here), then
//! reaped with `wait4(2)` to collect its own `rusage`.
//!
//! A nonzero exit or a fatal signal is data, not an error. Only failing to
//! start or wait on the process, or cancellation, aborts the measurement.

use crate::cancel::CancelToken;
use crate::model::{RunResult, Sample};
use crate::platform::PlatformProfile;
use crate::rusage::{adapter_for, RawUsage, UsageAdapter};
use crate::stats;
use crate::tail::{TailBuffer, TeeWriter, STDERR_TAIL_LIMIT};
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often the watcher looks at the cancel token while a child runs
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on the sample vector reserved before the first repetition
const MAX_PREALLOCATED_SAMPLES: usize = 1024;

/// Errors that abort a measurement
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no command provided")]
    EmptyCommand,

    #[error("invalid working directory {}: {source}", .path.display())]
    WorkingDirectory { path: PathBuf, source: io::Error },

    #[error("failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to wait for {program}: {source}")]
    Wait { program: String, source: io::Error },

    #[error("measurement cancelled")]
    Cancelled,
}

/// What to run and how often
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Working directory; `None` means the current one
    pub cwd: Option<PathBuf>,
    /// Number of sequential repetitions, coerced to at least 1
    pub repeat: usize,
}

impl ExecOptions {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            cwd: None,
            repeat: 1,
        }
    }

    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Runs commands and turns each execution into a `Sample`
pub struct Executor {
    platform: PlatformProfile,
    adapter: Box<dyn UsageAdapter>,
    tail_limit: usize,
    forward_stderr: bool,
}

impl Executor {
    pub fn new(platform: PlatformProfile) -> Self {
        let adapter = adapter_for(&platform);
        Self {
            platform,
            adapter,
            tail_limit: STDERR_TAIL_LIMIT,
            forward_stderr: true,
        }
    }

    /// Replace the resource usage adapter
    pub fn with_adapter(mut self, adapter: Box<dyn UsageAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_tail_limit(mut self, limit: usize) -> Self {
        self.tail_limit = limit.max(1);
        self
    }

    /// Whether the child's stderr is also copied to our stderr
    pub fn with_stderr_forwarding(mut self, forward: bool) -> Self {
        self.forward_stderr = forward;
        self
    }

    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    /// Run `opts.command` `opts.repeat` times, strictly one after another
    pub fn execute(&self, opts: &ExecOptions, cancel: &CancelToken) -> Result<RunResult, ExecError> {
        if opts.command.is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        let cwd = resolve_cwd(opts.cwd.as_deref())?;
        let repeat = opts.repeat.max(1);

        // large counts are valid input; grow as repetitions actually run
        let mut samples = Vec::with_capacity(repeat.min(MAX_PREALLOCATED_SAMPLES));
        let mut stderr_tail = String::new();

        for i in 0..repeat {
            if cancel.is_cancelled() {
                return Err(ExecError::Cancelled);
            }

            let (sample, tail) = self.run_once(&opts.command, &cwd, cancel)?;
            if cancel.is_cancelled() {
                return Err(ExecError::Cancelled);
            }

            tracing::debug!(
                repetition = i + 1,
                wall_ms = sample.wall_ms,
                cpu_ratio = sample.cpu_ratio,
                exit_code = sample.exit_code,
                "sample recorded"
            );

            if !tail.is_empty() {
                stderr_tail = tail;
            }
            samples.push(sample);
        }

        let outcome = stats::fold_outcome(&samples);
        let now = Utc::now();
        let mut run = RunResult {
            id: run_id_at(now),
            timestamp: now,
            command: opts.command.clone(),
            cwd: cwd.display().to_string(),
            platform: self.platform.tag(),
            wall_ms: 0.0,
            user_ms: 0.0,
            sys_ms: 0.0,
            cpu_ratio: 0.0,
            max_rss_raw: outcome.max_rss,
            max_rss_unit: outcome.max_rss_unit,
            exit_code: outcome.exit_code,
            signal: outcome.signal,
            stderr_tail,
            repeat: None,
            raw_samples: Vec::new(),
            storage_path: None,
        };

        if let [single] = samples.as_slice() {
            // one measurement stays raw rather than a median of one
            run.wall_ms = single.wall_ms;
            run.user_ms = single.user_ms;
            run.sys_ms = single.sys_ms;
            run.cpu_ratio = single.cpu_ratio;
        } else {
            let medians = stats::summarize_samples(&samples);
            run.wall_ms = medians.wall_ms;
            run.user_ms = medians.user_ms;
            run.sys_ms = medians.sys_ms;
            run.cpu_ratio = medians.cpu_ratio;
            run.repeat = Some(stats::repeat_summary(&medians, samples.clone()));
        }
        run.raw_samples = samples;

        Ok(run)
    }

    // the std handle is never waited on; `reap` collects the child via wait4
    #[allow(clippy::zombie_processes)]
    fn run_once(
        &self,
        command: &[String],
        cwd: &Path,
        cancel: &CancelToken,
    ) -> Result<(Sample, String), ExecError> {
        let program = &command[0];
        let tail = TailBuffer::new(self.tail_limit);

        let start = Instant::now();
        let mut child = Command::new(program)
            .args(&command[1..])
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;
        let pid = child.id() as libc::pid_t;
        let stderr = child.stderr.take();
        tracing::trace!(pid, program = %program, "spawned");

        let done = AtomicBool::new(false);
        let outcome = thread::scope(|s| {
            let forwarder = stderr.map(|pipe| {
                let tail = tail.clone();
                let forward = self.forward_stderr;
                s.spawn(move || pump_stderr(pipe, tail, forward))
            });
            let watcher = s.spawn(|| watch_for_cancel(pid, cancel, &done));

            let exited = wait_exited(pid);
            let elapsed = start.elapsed();

            done.store(true, Ordering::SeqCst);
            watcher.thread().unpark();
            let _ = watcher.join();

            let reaped = exited.and_then(|()| reap(pid));
            if reaped.is_err() {
                let _ = child.kill();
            }
            if let Some(handle) = forwarder {
                let _ = handle.join();
            }
            reaped.map(|(status, usage)| (status, usage, elapsed))
        });

        let (status, usage, elapsed) = outcome.map_err(|source| ExecError::Wait {
            program: program.clone(),
            source,
        })?;

        let usage = self.adapter.extract(Some(&RawUsage::from(&usage)));
        if !usage.ok {
            tracing::debug!(pid, "no resource usage available, reporting unknown");
        }
        let (exit_code, signal) = decode_status(pid, status);
        let wall_ms = elapsed.as_secs_f64() * 1000.0;

        let sample = Sample {
            wall_ms,
            user_ms: usage.user_ms,
            sys_ms: usage.sys_ms,
            cpu_ratio: cpu_ratio(usage.user_ms, usage.sys_ms, wall_ms),
            max_rss: usage.max_rss,
            max_rss_unit: usage.unit,
            exit_code,
            signal,
        };
        Ok((sample, tail.to_string_lossy()))
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(PlatformProfile::detect())
    }
}

/// Measure on the current platform with default settings
pub fn execute(opts: &ExecOptions, cancel: &CancelToken) -> Result<RunResult, ExecError> {
    Executor::default().execute(opts, cancel)
}

/// `(user + sys) / wall`, 0 when wall is 0
pub fn cpu_ratio(user_ms: f64, sys_ms: f64, wall_ms: f64) -> f64 {
    if wall_ms > 0.0 {
        (user_ms + sys_ms) / wall_ms
    } else {
        0.0
    }
}

/// Fresh run identifier, e.g. `20240102T150405Z-1a2b3c4d`
pub fn new_run_id() -> String {
    run_id_at(Utc::now())
}

fn run_id_at(ts: DateTime<Utc>) -> String {
    let suffix: [u8; 4] = rand::random();
    format!("{}-{}", ts.format("%Y%m%dT%H%M%SZ"), hex::encode(suffix))
}

/// Exit code and signal name; signals map to `128 + signo`
fn decode_status(pid: libc::pid_t, status: libc::c_int) -> (i32, Option<String>) {
    match WaitStatus::from_raw(Pid::from_raw(pid), status) {
        Ok(WaitStatus::Exited(_, code)) => (code, None),
        Ok(WaitStatus::Signaled(_, sig, _)) => (128 + sig as i32, Some(sig.as_str().to_string())),
        other => {
            tracing::warn!("unexpected wait status for pid {}: {:?}", pid, other);
            (1, None)
        }
    }
}

fn resolve_cwd(cwd: Option<&Path>) -> Result<PathBuf, ExecError> {
    let requested = cwd.filter(|p| !p.as_os_str().is_empty());
    let path = match requested {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().map_err(|source| ExecError::WorkingDirectory {
            path: PathBuf::from("."),
            source,
        })?,
    };
    if !path.is_dir() {
        return Err(ExecError::WorkingDirectory {
            source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
            path,
        });
    }
    Ok(path)
}

fn pump_stderr(mut pipe: ChildStderr, mut tail: TailBuffer, forward: bool) {
    let copied = if forward {
        io::copy(&mut pipe, &mut TeeWriter::new(io::stderr(), tail))
    } else {
        io::copy(&mut pipe, &mut tail)
    };
    if let Err(e) = copied {
        tracing::warn!("stderr capture stopped early: {}", e);
    }
}

fn watch_for_cancel(pid: libc::pid_t, cancel: &CancelToken, done: &AtomicBool) {
    while !done.load(Ordering::SeqCst) {
        if cancel.is_cancelled() {
            // child is not reaped before this thread is joined: pid cannot be recycled
            if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGKILL) {
                tracing::debug!("kill on cancel failed for pid {}: {}", pid, e);
            }
            return;
        }
        thread::park_timeout(CANCEL_POLL_INTERVAL);
    }
}

/// Block until the child has exited, leaving it waitable
fn wait_exited(pid: libc::pid_t) -> io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data; waitid fills it in
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Reap the child and collect its resource usage
fn reap(pid: libc::pid_t) -> io::Result<(libc::c_int, libc::rusage)> {
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: rusage is plain data; wait4 fills it in
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        if rc == pid {
            return Ok((status, usage));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
