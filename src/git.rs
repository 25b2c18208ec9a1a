//! Git command runner for promote.
//!
//! Provides a wrapper around the system `git` binary with captured
//! stdout/stderr, structured error handling, extra environment (used to hand
//! credentials to git without touching argv or config files) and an optional
//! timeout after which the child is killed. All git operations should go
//! through this module.

use crate::error::{PromoteError, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    /// Returns true if stdout is empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }
}

/// Extra settings for a git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitOptions {
    /// Environment variables added to the child.
    pub env: Vec<(String, String)>,
    /// Kill the child when it runs longer than this.
    pub timeout: Option<Duration>,
}

impl GitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            env: Vec::new(),
            timeout: Some(timeout),
        }
    }

    /// Add a config entry through `GIT_CONFIG_COUNT`/`GIT_CONFIG_KEY_n`/`GIT_CONFIG_VALUE_n`.
    pub fn config_entry(mut self, key: &str, value: &str) -> Self {
        let index = self
            .env
            .iter()
            .filter(|(k, _)| k.starts_with("GIT_CONFIG_KEY_"))
            .count();
        self.env.retain(|(k, _)| k != "GIT_CONFIG_COUNT");
        self.env
            .push((format!("GIT_CONFIG_KEY_{}", index), key.to_string()));
        self.env
            .push((format!("GIT_CONFIG_VALUE_{}", index), value.to_string()));
        self.env
            .push(("GIT_CONFIG_COUNT".to_string(), (index + 1).to_string()));
        self
    }
}

/// Run a git command with extra environment and an optional timeout.
///
/// Interactive credential prompts are always disabled. On expiry the child
/// and every process it started are killed.
///
/// # Returns
///
/// * `Ok(GitOutput)` - On successful execution (exit code 0)
/// * `Err(PromoteError::Git)` - On non-zero exit code, spawn failure, or timeout
pub fn run_git_with<P: AsRef<Path>>(cwd: P, args: &[&str], opts: &GitOptions) -> Result<GitOutput> {
    let cwd = cwd.as_ref();
    let subcommand = args.first().copied().unwrap_or("");

    tracing::debug!(cwd = %cwd.display(), "git {}", args.join(" "));

    let mut command = Command::new("git");
    command
        .current_dir(cwd)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &opts.env {
        command.env(key, value);
    }
    if opts.timeout.is_some() {
        isolate_process_group(&mut command);
    }

    let mut child = command.spawn().map_err(|e| {
        PromoteError::Git(format!("failed to execute git {}: {}", subcommand, e))
    })?;

    // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = match opts.timeout {
        Some(timeout) => wait_with_timeout(&mut child, timeout)?,
        None => Some(child.wait().map_err(|e| {
            PromoteError::Git(format!("failed to wait for git {}: {}", subcommand, e))
        })?),
    };

    // A timed-out call does not wait for the pipes; a straggler may still hold them.
    let Some(status) = status else {
        return Err(PromoteError::Git(format!(
            "git {} timed out after {:?}",
            subcommand,
            opts.timeout.unwrap_or_default()
        )));
    };

    let git_output = GitOutput::from_bytes(&join_reader(stdout_reader), &join_reader(stderr_reader));

    if status.success() {
        Ok(git_output)
    } else {
        let exit_code = status.code().unwrap_or(-1);
        let error_msg = if git_output.stderr.is_empty() {
            git_output.stdout.clone()
        } else {
            git_output.stderr.clone()
        };

        Err(PromoteError::Git(format!(
            "git {} failed (exit code {}): {}",
            subcommand, exit_code, error_msg
        )))
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Wait for a child process with timeout.
///
/// Returns `None` when the child was killed because it timed out.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(20);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    kill_process_tree(child);
                    return Ok(None);
                }
                std::thread::sleep(poll_interval);
            }
            Err(e) => {
                return Err(PromoteError::Git(format!(
                    "failed to check git process status: {}",
                    e
                )));
            }
        }
    }
}

/// Put the child in its own process group so a timeout also reaches the
/// remote helpers git spawns.
#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

/// Kill `child` together with its process group.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    if let Ok(pid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) takes no pointers; a negative pid targets the
        // group the child leads.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
