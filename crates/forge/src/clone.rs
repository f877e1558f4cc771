//! `git clone` provisioning of dispatch workspaces.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use command_group::AsyncCommandGroup;
use pipeline::{redact, CloneUrl, ForgebotError, RepositoryProvisioner, RetryPolicy};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::credentials::authenticated_clone_url;

/// Fragments of `git` stderr (lower-cased) that indicate a network failure
/// worth retrying.
const TRANSIENT_GIT_MARKERS: &[&str] = &[
    "could not resolve host",
    "connection timed out",
    "connection reset",
    "connection refused",
    "failed to connect",
    "operation timed out",
    "temporary failure in name resolution",
    "the remote end hung up unexpectedly",
    "early eof",
    "http 502",
    "http 503",
];

/// Longest slice of `git` output kept in an error message.
const MAX_ERROR_OUTPUT: usize = 2_000;

/// Clones repositories with the `git` CLI.
///
/// Clones are shallow and never prompt for credentials. A clone that exceeds
/// the configured timeout is killed along with every process it started.
#[derive(Clone)]
pub struct GitCloneProvisioner {
    access_token: String,
    git_program: PathBuf,
    depth: u32,
    timeout: Duration,
    attempts: u32,
}

impl GitCloneProvisioner {
    /// Creates a provisioner that authenticates with `access_token`.
    ///
    /// Defaults: `git` from `PATH`, depth 1, 5 minute timeout, a single attempt.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            git_program: PathBuf::from("git"),
            depth: 1,
            timeout: Duration::from_secs(300),
            attempts: 1,
        }
    }

    /// Overrides the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the number of attempts made for transient failures.
    ///
    /// Values below 1 are treated as 1.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Overrides the `git` executable.
    pub fn with_git_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.git_program = program.into();
        self
    }

    async fn clone_once(&self, url: &CloneUrl, destination: &Path) -> Result<(), ForgebotError> {
        let authenticated = authenticated_clone_url(url.as_str(), &self.access_token);

        let mut command = Command::new(&self.git_program);
        command
            .arg("clone")
            .arg("--depth")
            .arg(self.depth.to_string())
            .arg("--")
            .arg(&authenticated)
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(url = %url, destination = %destination.display(), "running git clone");

        // git runs its transport helpers as children; the group lets a
        // timeout take all of them down.
        let mut child = command.group_spawn().map_err(|e| ForgebotError::Provisioning {
            message: format!("failed to run {}: {e}", self.git_program.display()),
            transient: false,
        })?;
        let stdout = child.inner().stdout.take();
        let stderr = child.inner().stderr.take();

        let finished = tokio::time::timeout(self.timeout, async {
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok((Ok(status), stdout, stderr)) => (status, stdout, stderr),
            Ok((Err(e), _, _)) => {
                return Err(ForgebotError::Provisioning {
                    message: format!("failed to wait for git clone of {url}: {e}"),
                    transient: false,
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(url = %url, error = %e, "Failed to kill git process group");
                }
                return Err(ForgebotError::Provisioning {
                    message: format!("git clone of {url} timed out after {:?}", self.timeout),
                    transient: false,
                });
            }
        };

        if status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&stderr));

        // Classified on the raw output: the token may be a substring of a marker.
        let transient = is_transient(&combined);
        let combined = redact(combined.trim(), &[self.access_token.as_str()]);

        Err(ForgebotError::Provisioning {
            message: format!(
                "git clone of {url} failed ({status}): {}",
                truncate(&combined, MAX_ERROR_OUTPUT)
            ),
            transient,
        })
    }
}

impl std::fmt::Debug for GitCloneProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCloneProvisioner")
            .field("git_program", &self.git_program)
            .field("depth", &self.depth)
            .field("timeout", &self.timeout)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RepositoryProvisioner for GitCloneProvisioner {
    async fn clone_repository(
        &self,
        url: &CloneUrl,
        destination: &Path,
    ) -> Result<(), ForgebotError> {
        let mut attempt = 1;
        loop {
            let err = match self.clone_once(url, destination).await {
                Ok(()) => {
                    info!(url = %url, destination = %destination.display(), attempt, "Cloned repository");
                    return Ok(());
                }
                Err(err) => err,
            };

            let RetryPolicy::Retryable { after } = err.retry_policy() else {
                return Err(err);
            };
            if attempt >= self.attempts {
                return Err(err);
            }

            warn!(url = %url, attempt, error = %err, "Transient clone failure, retrying");
            if let Err(e) = tokio::fs::remove_dir_all(destination).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(destination = %destination.display(), error = %e, "Failed to remove partial clone");
                }
            }
            if let Some(delay) = after {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

fn is_transient(output: &str) -> bool {
    let lowered = output.to_lowercase();
    TRANSIENT_GIT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "failed to read git output");
        }
    }
    buf
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
