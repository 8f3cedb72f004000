//! Child processes with a deadline and bounded captured output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Default cap on captured bytes per stream.
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;

/// Captured output of a finished (or killed) child.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Bytes dropped across both streams because of the output limit.
    pub truncated: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Stdout when the process exited cleanly, otherwise an error describing
    /// how it failed.
    pub fn into_stdout(self, label: &str) -> Result<String> {
        if self.timed_out {
            return Err(anyhow!("{label} timed out"));
        }
        if !self.status.success() {
            return Err(anyhow!(
                "{label} exited with {}: {}",
                self.status,
                self.stderr.trim()
            ));
        }
        Ok(self.stdout)
    }
}

/// Run `cmd` with stdin closed, killing it once `timeout` elapses.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// chatty child cannot block on a full pipe.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_ms = timeout.as_millis()))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn {:?}", cmd.get_program()))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || read_limited(stdout, output_limit));
    let stderr_reader = thread::spawn(move || read_limited(stderr, output_limit));

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for child")? {
        Some(status) => (status, false),
        None => {
            warn!("child exceeded its deadline, killing");
            child.kill().context("kill child")?;
            (child.wait().context("reap killed child")?, true)
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("collect stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("collect stderr")?;
    let truncated = stdout_dropped + stderr_dropped;
    if truncated > 0 {
        debug!(truncated, "child output truncated");
    }
    debug!(exit_code = ?status.code(), timed_out, "child finished");

    Ok(ProcessOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        truncated,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

/// Keep the first `limit` bytes, count the rest, and always read to EOF.
fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let room = limit.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&chunk[..room]);
        dropped += n - room;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let out = run_with_timeout(
            sh("echo out; echo err >&2"),
            Duration::from_secs(5),
            DEFAULT_OUTPUT_LIMIT,
        )
        .expect("run");
        assert!(out.succeeded());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[test]
    fn slow_child_is_killed() {
        let out = run_with_timeout(sh("exec sleep 5"), Duration::from_millis(100), DEFAULT_OUTPUT_LIMIT)
            .expect("run");
        assert!(out.timed_out);
        assert!(!out.succeeded());
        let err = out.into_stdout("sleeper").expect_err("timed out");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn output_beyond_limit_is_counted() {
        let out = run_with_timeout(sh("printf 0123456789"), Duration::from_secs(5), 4)
            .expect("run");
        assert_eq!(out.stdout, "0123");
        assert_eq!(out.truncated, 6);
    }

    #[test]
    fn failing_exit_reports_stderr() {
        let out = run_with_timeout(sh("echo nope >&2; exit 3"), Duration::from_secs(5), 1024)
            .expect("run");
        let err = out.into_stdout("sample").expect_err("failure");
        assert!(err.to_string().contains("nope"));
    }
}
