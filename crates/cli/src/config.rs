//! Process configuration read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use agent::AgentCommand;
use pipeline::{BotIdentity, ForgebotError};

const DEFAULT_BOT_NAME: &str = "agent-auto-coding";
const DEFAULT_BOT_EMAIL: &str = "bot@users.noreply.github.com";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 5 * 60;
const DEFAULT_SHUTDOWN_DRAIN_SECS: u64 = 30;

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Compact human-readable text.
    Text,
}

impl FromStr for LogFormat {
    type Err = ForgebotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "compact" => Ok(Self::Text),
            other => Err(ForgebotError::configuration(format!(
                "LOG_FORMAT must be `json` or `text`, got `{other}`"
            ))),
        }
    }
}

/// Everything the process needs, validated once at startup.
#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub webhook_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub anthropic_api_key: String,
    pub bot: BotIdentity,
    pub agent_command: AgentCommand,
    pub agent_timeout: Duration,
    pub clone_timeout: Duration,
    pub clone_attempts: u32,
    /// `None` means the system temp directory.
    pub workspace_root: Option<PathBuf>,
    pub shutdown_drain: Duration,
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ForgebotError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ForgebotError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            get(name).ok_or_else(|| ForgebotError::configuration(format!("{name} is required")))
        };

        let agent_command = match get("AGENT_COMMAND") {
            Some(line) => AgentCommand::parse(&line).ok_or_else(|| {
                ForgebotError::configuration("AGENT_COMMAND must name a program")
            })?,
            None => AgentCommand::claude_code(),
        };

        let clone_attempts: u32 = parse_or(get("CLONE_ATTEMPTS"), "CLONE_ATTEMPTS", 1)?;
        if clone_attempts == 0 {
            return Err(ForgebotError::configuration("CLONE_ATTEMPTS must be at least 1"));
        }

        Ok(Self {
            github_token: required("GITHUB_TOKEN")?,
            webhook_secret: required("WEBHOOK_SECRET")?,
            host: parse_or(get("HOST"), "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            anthropic_api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            bot: BotIdentity::new(
                get("BOT_NAME").unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
                get("BOT_EMAIL").unwrap_or_else(|| DEFAULT_BOT_EMAIL.to_string()),
            ),
            agent_command,
            agent_timeout: seconds(
                get("AGENT_TIMEOUT_SECS"),
                "AGENT_TIMEOUT_SECS",
                DEFAULT_AGENT_TIMEOUT_SECS,
            )?,
            clone_timeout: seconds(
                get("CLONE_TIMEOUT_SECS"),
                "CLONE_TIMEOUT_SECS",
                DEFAULT_CLONE_TIMEOUT_SECS,
            )?,
            clone_attempts,
            workspace_root: get("WORKSPACE_ROOT").map(PathBuf::from),
            shutdown_drain: seconds(
                get("SHUTDOWN_DRAIN_SECS"),
                "SHUTDOWN_DRAIN_SECS",
                DEFAULT_SHUTDOWN_DRAIN_SECS,
            )?,
            max_body_bytes: parse_or(
                get("MAX_BODY_BYTES"),
                "MAX_BODY_BYTES",
                listener::DEFAULT_MAX_BODY_BYTES,
            )?,
            log_format: match get("LOG_FORMAT") {
                Some(v) => v.parse()?,
                None => LogFormat::default(),
            },
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr())
            .field("bot", &self.bot)
            .field("agent_command", &self.agent_command)
            .field("agent_timeout", &self.agent_timeout)
            .field("clone_timeout", &self.clone_timeout)
            .field("clone_attempts", &self.clone_attempts)
            .field("workspace_root", &self.workspace_root)
            .field("shutdown_drain", &self.shutdown_drain)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("log_format", &self.log_format)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .finish_non_exhaustive()
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T, ForgebotError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| ForgebotError::configuration(format!("invalid {name} `{raw}`: {e}"))),
        None => Ok(default),
    }
}

fn seconds(value: Option<String>, name: &str, default: u64) -> Result<Duration, ForgebotError> {
    let secs: u64 = parse_or(value, name, default)?;
    if secs == 0 {
        return Err(ForgebotError::configuration(format!("{name} must be positive")));
    }
    Ok(Duration::from_secs(secs))
}
