//! Process Supervisor: spawns the child, feeds stdin, drains stdout/stderr
//! concurrently under byte caps, enforces the wall-clock deadline with
//! escalating termination, and reports exit status and resource usage.
//!
//! The wait loop polls `Child::try_wait` on a fixed interval rather than
//! blocking on `waitpid`, since it only needs to detect "has it exited yet",
//! not apply CPU/memory limits itself — those are enforced by the kernel via
//! `ResourceLimiter`.

use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::jail::SandboxInvocation;
use crate::limiter::ResourceLimiter;
use crate::{Error, ErrorKind, Result};

/// Interval between consecutive `try_wait` polls.
const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Extra time granted to the child beyond its requested time limit before
/// the supervisor gives up waiting for a natural exit.
const TIMEOUT_MARGIN: Duration = Duration::from_millis(500);

/// Extra time granted to pipe drains after the child has been killed.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Trailer appended to a captured stream when it hits its byte cap.
fn truncation_trailer(stream_name: &str, cap: usize) -> String {
    format!(
        "\n[TRUNCATED: {} exceeded {} bytes ({} KB)]\n",
        stream_name, cap, cap / 1024
    )
}

/// Inputs to a single supervised run.
pub struct SupervisorRequest<'a> {
    pub invocation: &'a SandboxInvocation,
    pub limiter: ResourceLimiter,
    /// Wall-clock budget before the deadline fires. Kept distinct from
    /// `limiter.time_limit_secs`, which is the *floored*
    /// whole-second value the CPU rlimit derives from; the wall-clock
    /// deadline uses the request's exact (possibly fractional) time limit.
    pub wall_clock_limit: Duration,
    pub stdin: Vec<u8>,
    pub max_stdout: usize,
    pub max_stderr: usize,
}

/// Outcome of a supervised run, independent of how the job is classified by
/// the orchestrator.
pub struct RunOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub signal: Option<String>,
    pub timed_out: bool,
    pub wall_time: Duration,
    pub cpu_time: Duration,
    pub max_rss_bytes: Option<u64>,
}

/// Read from `stream` into a `Vec<u8>` capped at `max_size` bytes. Reading
/// continues past the cap (so the pipe keeps draining and the child does not
/// block on a full pipe buffer) but the excess is discarded; the returned
/// buffer is the first `max_size` bytes worth of kept data (minus headroom
/// for the trailer) plus the trailer.
fn drain_capped<R: Read>(mut stream: R, max_size: usize, label: &str) -> Vec<u8> {
    let trailer = truncation_trailer(label, max_size);
    let keep_budget = max_size.saturating_sub(trailer.len());

    let mut buf = Vec::new();
    let mut truncated = false;
    let mut scratch = [0u8; 8192];
    loop {
        match stream.read(&mut scratch) {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < keep_budget {
                    let take = (keep_budget - buf.len()).min(n);
                    buf.extend_from_slice(&scratch[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else if n > 0 {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    if truncated {
        buf.extend_from_slice(trailer.as_bytes());
    }
    buf
}

/// Build the child `Command`, installing the resource limiter and placing
/// the child in its own process group so the supervisor can kill the whole
/// group (and any fork-bombed descendants) on timeout.
fn build_command(invocation: &SandboxInvocation, limiter: ResourceLimiter) -> Command {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);
    if let Some(cwd) = &invocation.cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    unsafe {
        cmd.pre_exec(move || {
            nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
            limiter.apply()?;
            Ok(())
        });
    }

    cmd
}

/// Poll `child` until it exits or `deadline` passes, sleeping `WAIT_INTERVAL`
/// between polls. Returns `Some(status)` on natural exit, `None` on deadline.
fn wait_with_deadline(child: &mut Child, deadline: Instant) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_INTERVAL);
    }
}

/// Get cumulative CPU time and peak RSS across all reaped children of the
/// calling process. This is best-effort and reports the
/// cumulative peak across every child the process has ever reaped, not a
/// per-job figure.
fn rusage_children() -> (Duration, Option<u64>) {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) };
    if ret != 0 {
        return (Duration::ZERO, None);
    }

    let user = Duration::new(usage.ru_utime.tv_sec as u64, (usage.ru_utime.tv_usec as u32) * 1000);
    let sys = Duration::new(usage.ru_stime.tv_sec as u64, (usage.ru_stime.tv_usec as u32) * 1000);
    let rss_bytes = (usage.ru_maxrss as u64) * 1024;

    (user + sys, Some(rss_bytes))
}

/// Run the supervised job to completion.
pub fn run(req: SupervisorRequest) -> Result<RunOutcome> {
    let mut cmd = build_command(req.invocation, req.limiter);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|_| Error::from(ErrorKind::ChildStartupFailed))?;
    let pid = Pid::from_raw(child.id() as i32);

    let mut stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");

    let stdin_data = req.stdin;
    let stdin_writer = thread::spawn(move || {
        if let Some(pipe) = stdin_pipe.as_mut() {
            let _ = pipe.write_all(&stdin_data);
        }
        // Dropping `stdin_pipe` closes the write end so the child sees EOF.
    });

    let max_stdout = req.max_stdout;
    let stdout_reader = thread::spawn(move || drain_capped(stdout_pipe, max_stdout, "stdout"));
    let max_stderr = req.max_stderr;
    let stderr_reader = thread::spawn(move || drain_capped(stderr_pipe, max_stderr, "stderr"));

    let deadline = start + req.wall_clock_limit + TIMEOUT_MARGIN;
    let wait_result = wait_with_deadline(&mut child, deadline)
        .map_err(|_| Error::from(ErrorKind::ChildStartupFailed))?;

    let (exit_code, signal, timed_out) = match wait_result {
        Some(status) => (exit_code_of(status), signal_of(status), false),
        None => {
            let _ = signal::killpg(pid, Signal::SIGKILL);
            let grace_deadline = Instant::now() + DRAIN_GRACE;
            let _ = wait_with_deadline(&mut child, grace_deadline);
            (124, Some("SIGKILL".to_owned()), true)
        }
    };

    let _ = stdin_writer.join();
    let mut stdout = stdout_reader.join().unwrap_or_default();
    let mut stderr = stderr_reader.join().unwrap_or_default();

    if timed_out {
        let prefix = b"TIMEOUT: Execution exceeded time limit\n";
        let mut combined = Vec::with_capacity(prefix.len() + stderr.len());
        combined.extend_from_slice(prefix);
        combined.extend_from_slice(&stderr);
        stderr = combined;
        stdout.shrink_to_fit();
    }

    let wall_time = start.elapsed();
    let (cpu_time, max_rss_bytes) = rusage_children();

    Ok(RunOutcome {
        stdout,
        stderr,
        exit_code,
        signal,
        timed_out,
        wall_time,
        cpu_time,
        max_rss_bytes,
    })
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.code().unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

fn signal_of(status: std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().and_then(|s| Signal::try_from(s).ok()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_trailer_reports_kb() {
        let trailer = truncation_trailer("stdout", 4096);
        assert!(trailer.contains("4096 bytes"));
        assert!(trailer.contains("4 KB"));
    }

    #[test]
    fn drain_capped_passes_through_short_output() {
        let data = b"hello\n".to_vec();
        let out = drain_capped(std::io::Cursor::new(data.clone()), 4096, "stdout");
        assert_eq!(out, data);
    }

    #[test]
    fn drain_capped_truncates_long_output() {
        let data = vec![b'x'; 200_000];
        let out = drain_capped(std::io::Cursor::new(data), 4096, "stdout");
        assert_eq!(out.len(), 4096);
        let tail = String::from_utf8_lossy(&out);
        assert!(tail.contains("TRUNCATED"));
    }

    #[test]
    fn drain_capped_exact_budget_is_not_truncated() {
        let keep_budget = 4096 - truncation_trailer("stdout", 4096).len();
        let data = vec![b'x'; keep_budget];
        let out = drain_capped(std::io::Cursor::new(data.clone()), 4096, "stdout");
        assert_eq!(out, data);
        assert!(!String::from_utf8_lossy(&out).contains("TRUNCATED"));
    }
}
