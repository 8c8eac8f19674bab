//! Shell process runner shared by scans, enrichment, and local mail.
//!
//! Commands run through the platform shell under `tokio::process` with a
//! hard deadline. On Unix the shell gets its own process group so a
//! timeout kills everything it spawned, not just the shell itself.

use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Whether the command finished or hit its deadline.
#[derive(Debug, Clone)]
pub enum ShellOutcome {
    Finished(CommandOutput),
    TimedOut,
}

/// Run `command` through the shell, killing it after `timeout`.
///
/// `stdin` is written to the child and then closed; without it the child
/// reads from `/dev/null`. Output is decoded as lossy UTF-8.
pub async fn run_shell(
    command: &str,
    timeout: Duration,
    stdin: Option<&str>,
) -> io::Result<ShellOutcome> {
    let start = Instant::now();
    let mut cmd = shell_command(command);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let pipe = child.stdin.take();

    // Stdin is fed alongside the wait so a child that never reads it is
    // still bounded by the deadline.
    let run = async move {
        let feed = async move {
            match (stdin, pipe) {
                (Some(input), Some(pipe)) => feed_stdin(pipe, input).await,
                _ => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed?;
        output
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(output) => {
            let output = output?;
            Ok(ShellOutcome::Finished(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration: start.elapsed(),
            }))
        }
        Err(_) => {
            kill_process_group(pid);
            tracing::debug!(
                command,
                timeout_secs = timeout.as_secs(),
                "Command killed at deadline"
            );
            Ok(ShellOutcome::TimedOut)
        }
    }
}

/// Write `input` and close the pipe. A child that exits without reading
/// all of it is not an error; its exit status tells the story.
async fn feed_stdin(mut pipe: ChildStdin, input: &str) -> io::Result<()> {
    let written = match pipe.write_all(input.as_bytes()).await {
        Ok(()) => pipe.shutdown().await,
        Err(e) => Err(e),
    };
    match written {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Quote `value` as a single shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this
    // child by `process_group(0)`, and a vanished group yields ESRCH.
    unsafe {
        libc::killpg(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let outcome = run_shell("printf 'a\\nb\\n'; exit 0", Duration::from_secs(5), None)
            .await
            .unwrap();
        let ShellOutcome::Finished(output) = outcome else {
            panic!("expected command to finish");
        };
        assert!(output.success());
        assert_eq!(output.stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn reports_nonzero_exit_and_stderr() {
        let outcome = run_shell("echo boom >&2; exit 3", Duration::from_secs(5), None)
            .await
            .unwrap();
        let ShellOutcome::Finished(output) = outcome else {
            panic!("expected command to finish");
        };
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr.trim(), "boom");
    }

    #[tokio::test]
    async fn times_out_and_returns_promptly() {
        let start = Instant::now();
        let outcome = run_shell("sleep 5; echo late", Duration::from_millis(200), None)
            .await
            .unwrap();
        assert!(matches!(outcome, ShellOutcome::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn feeds_stdin() {
        let outcome = run_shell("cat", Duration::from_secs(5), Some("report body"))
            .await
            .unwrap();
        let ShellOutcome::Finished(output) = outcome else {
            panic!("expected command to finish");
        };
        assert_eq!(output.stdout, "report body");
    }

    #[tokio::test]
    async fn deadline_covers_unread_stdin() {
        let body = "x".repeat(1 << 20);
        let start = Instant::now();
        let outcome = run_shell("sleep 5", Duration::from_millis(200), Some(&body))
            .await
            .unwrap();
        assert!(matches!(outcome, ShellOutcome::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn early_exit_with_pending_stdin_reports_status() {
        let body = "x".repeat(1 << 20);
        let outcome = run_shell(
            "echo spool locked >&2; exit 3",
            Duration::from_secs(5),
            Some(&body),
        )
        .await
        .unwrap();
        let ShellOutcome::Finished(output) = outcome else {
            panic!("expected command to finish");
        };
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr.trim(), "spool locked");
    }

    #[tokio::test]
    async fn quoted_word_is_not_expanded() {
        let raw = "it's $HOME `id` \\n \"x\"";
        let command = format!("printf '%s' {}", shell_quote(raw));
        let outcome = run_shell(&command, Duration::from_secs(5), None)
            .await
            .unwrap();
        let ShellOutcome::Finished(output) = outcome else {
            panic!("expected command to finish");
        };
        assert_eq!(output.stdout, raw);
    }

    #[tokio::test]
    async fn undecodable_bytes_are_replaced() {
        let outcome = run_shell("printf '\\377ok'", Duration::from_secs(5), None)
            .await
            .unwrap();
        let ShellOutcome::Finished(output) = outcome else {
            panic!("expected command to finish");
        };
        assert!(output.stdout.ends_with("ok"));
        assert!(output.stdout.contains('\u{FFFD}'));
    }
}
