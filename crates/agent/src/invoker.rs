//! Subprocess adapter for the external coding agent.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use command_group::AsyncCommandGroup;
use pipeline::{redact, AgentInvocation, AgentInvoker, AgentReport, BotIdentity, ForgebotError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::instructions::render_instructions;

/// Longest tail of agent output kept in an error message.
const MAX_ERROR_OUTPUT: usize = 4_000;

/// Program and arguments used to launch the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    program: String,
    args: Vec<String>,
}

impl AgentCommand {
    /// The Claude Code CLI, run through `npx` with permission prompts disabled.
    pub fn claude_code() -> Self {
        Self::new(
            "npx",
            ["@anthropic-ai/claude-code", "--dangerously-skip-permissions"],
        )
    }

    /// Creates a command from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a whitespace-separated command line. Returns `None` when it is
    /// blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    /// The executable.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Runs the agent as a local subprocess.
#[derive(Clone)]
pub struct CliAgentInvoker {
    command: AgentCommand,
    access_token: String,
    ai_api_key: String,
    identity: BotIdentity,
    timeout: Duration,
}

impl CliAgentInvoker {
    /// Creates an invoker that passes `access_token` and `ai_api_key` to the
    /// agent and tells it to commit as `identity`.
    ///
    /// The default timeout is 30 minutes.
    pub fn new(
        command: AgentCommand,
        access_token: impl Into<String>,
        ai_api_key: impl Into<String>,
        identity: BotIdentity,
    ) -> Self {
        Self {
            command,
            access_token: access_token.into(),
            ai_api_key: ai_api_key.into(),
            identity,
            timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Overrides the timeout after which the agent process is killed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, invocation: &AgentInvocation) -> Command {
        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .current_dir(&invocation.working_directory)
            .env("GITHUB_TOKEN", &self.access_token)
            .env("ANTHROPIC_API_KEY", &self.ai_api_key)
            .env("CLAUDE_WORKSPACE", &invocation.workspace)
            .env("CLAUDE_MODE", "autonomous")
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl std::fmt::Debug for CliAgentInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliAgentInvoker")
            .field("command", &self.command)
            .field("identity", &self.identity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AgentInvoker for CliAgentInvoker {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<AgentReport, ForgebotError> {
        let started = Instant::now();
        let prompt = render_instructions(&invocation.context_file, &self.identity);

        info!(
            dispatch_id = %invocation.dispatch_id,
            working_directory = %invocation.working_directory.display(),
            program = %self.command.program,
            "Invoking agent in autonomous mode"
        );

        // The configured program is usually a launcher (`npx`) whose child is
        // the real agent; a timeout must kill the whole group.
        let mut child = self
            .build_command(invocation)
            .group_spawn()
            .map_err(|e| ForgebotError::Agent {
                message: format!("failed to launch {}: {e}", self.command.program),
                exit_code: None,
            })?;

        // Written from a separate task: the agent may fill stdout before it
        // reads stdin.
        if let Some(mut stdin) = child.inner().stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(error = %e, "agent closed stdin before reading the instructions");
                }
            });
        }
        let stdout = child.inner().stdout.take();
        let stderr = child.inner().stderr.take();

        let finished = tokio::time::timeout(self.timeout, async {
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok((Ok(status), stdout, stderr)) => (status, stdout, stderr),
            Ok((Err(e), _, _)) => {
                return Err(ForgebotError::Agent {
                    message: format!("failed to wait for agent: {e}"),
                    exit_code: None,
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(dispatch_id = %invocation.dispatch_id, error = %e, "Failed to kill agent process group");
                }
                warn!(dispatch_id = %invocation.dispatch_id, timeout = ?self.timeout, "Agent timed out and was killed");
                return Err(ForgebotError::Agent {
                    message: format!("agent timed out after {:?}", self.timeout),
                    exit_code: None,
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&stderr));
        let combined = redact(&combined, &[self.access_token.as_str(), self.ai_api_key.as_str()]);
        let duration = started.elapsed();

        if !status.success() {
            warn!(
                dispatch_id = %invocation.dispatch_id,
                %status,
                output = %combined,
                "Agent exited unsuccessfully"
            );
            return Err(ForgebotError::Agent {
                message: format!(
                    "agent exited with {status}: {}",
                    tail(combined.trim(), MAX_ERROR_OUTPUT)
                ),
                exit_code: status.code(),
            });
        }

        info!(
            dispatch_id = %invocation.dispatch_id,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            output = %combined,
            "Agent completed successfully"
        );
        Ok(AgentReport {
            output: combined,
            duration,
        })
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "failed to read agent output");
        }
    }
    buf
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
