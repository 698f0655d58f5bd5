use std::fmt;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{ReleaseError, ReleaseResult};

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Pass the output through on exit code 0, otherwise build the caller's error from it.
    pub fn ensure_success<F>(self, err: F) -> ReleaseResult<Self>
    where
        F: FnOnce(CommandOutput) -> ReleaseError,
    {
        if self.success() {
            Ok(self)
        } else {
            Err(err(self))
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        }
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.timed_out {
            parts.push(String::from("status: timed out"));
        } else {
            match self.code {
                Some(code) => parts.push(format!("status: exit code {}", code)),
                None => parts.push(String::from("status: terminated by signal")),
            }
        }
        let stdout = self.stdout.trim_end();
        if !stdout.is_empty() {
            parts.push(format!("stdout:\n{}", stdout));
        }
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            parts.push(format!("stderr:\n{}", stderr));
        }
        f.write_str(&parts.join("\n"))
    }
}

/// Runs git subcommands inside a directory.
pub trait GitRunner {
    async fn git(&self, dir: &Path, args: &[&str]) -> ReleaseResult<CommandOutput>;
}

/// Invokes the system `git` binary, killing it once the timeout elapses.
pub struct SystemGit {
    timeout: Duration,
}

impl SystemGit {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GitRunner for SystemGit {
    async fn git(&self, dir: &Path, args: &[&str]) -> ReleaseResult<CommandOutput> {
        tracing::debug!("git: {} (in {})", args.join(" "), dir.display());
        let child = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(CommandOutput::from(output?)),
            Err(_) => {
                tracing::warn!(
                    "git: {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                );
                Ok(CommandOutput {
                    code: None,
                    stdout: String::new(),
                    stderr: format!(
                        "git {} timed out after {}s",
                        args.join(" "),
                        self.timeout.as_secs()
                    ),
                    timed_out: true,
                })
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_success_maps_non_zero_exit() {
        let output = fake::failed(128, "fatal: no upstream");
        let err = output
            .ensure_success(|output| ReleaseError::GitCommand {
                command: "pull".into(),
                output,
            })
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("git pull failed"));
        assert!(msg.contains("exit code 128"));
        assert!(msg.contains("fatal: no upstream"));
    }

    #[test]
    fn timed_out_output_is_not_success() {
        let output = CommandOutput {
            code: Some(0),
            timed_out: true,
            ..CommandOutput::default()
        };
        assert!(!output.success());
        assert!(output.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn system_git_captures_output() {
        let td = tempfile::tempdir().unwrap();
        let git = SystemGit::new(Duration::from_secs(20));
        let output = git.git(td.path(), &["--version"]).await.unwrap();
        assert!(output.success());
        assert!(output.stdout.starts_with("git version"));
    }

    #[tokio::test]
    async fn system_git_times_out_hung_command() {
        let td = tempfile::tempdir().unwrap();
        let git = SystemGit::new(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let output = git
            .git(td.path(), &["-c", "alias.hang=!sleep 5", "hang"])
            .await
            .unwrap();
        assert!(output.timed_out);
        assert!(!output.success());
        assert!(output.stderr.contains("git -c alias.hang=!sleep 5 hang timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
