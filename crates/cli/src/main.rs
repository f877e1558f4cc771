//! forgebot entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Load configuration** from the environment (and an optional `.env`).
//! 2. **Wire observability**: JSON or text logs, plus OTLP span export when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Construct infrastructure**: workspace manager, git clone provisioner and
//!    agent invoker, injected into a [`dispatch::DispatchOrchestrator`].
//! 4. **Serve** the webhook router until SIGINT/SIGTERM, then give in-flight
//!    dispatches a bounded time to finish.

mod config;
mod telemetry;

use std::sync::Arc;

use agent::CliAgentInvoker;
use anyhow::Context;
use dispatch::{BackgroundDispatcher, DispatchOrchestrator, TempWorkspaceManager};
use forge::GitCloneProvisioner;
use listener::{WebhookState, WebhookVerifier};
use tracing::{error, info};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;
    let telemetry = telemetry::init(config.log_format, config.otlp_endpoint.as_deref())?;

    let result = run(config).await;
    if let Err(e) = &result {
        error!(error = %e, "forgebot stopped with an error");
    }

    telemetry.shutdown();
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(?config, "Starting forgebot");

    let workspaces = match &config.workspace_root {
        Some(root) => {
            std::fs::create_dir_all(root).with_context(|| {
                format!("failed to create workspace root {}", root.display())
            })?;
            TempWorkspaceManager::new(root)
        }
        None => TempWorkspaceManager::in_system_temp(),
    };

    let provisioner = GitCloneProvisioner::new(&config.github_token)
        .with_timeout(config.clone_timeout)
        .with_attempts(config.clone_attempts);

    let agent = CliAgentInvoker::new(
        config.agent_command.clone(),
        &config.github_token,
        &config.anthropic_api_key,
        config.bot.clone(),
    )
    .with_timeout(config.agent_timeout);

    let dispatcher = BackgroundDispatcher::new(DispatchOrchestrator::new(
        Arc::new(workspaces),
        Arc::new(provisioner),
        Arc::new(agent),
    ));

    let verifier = WebhookVerifier::new(&config.webhook_secret)?;
    let state = WebhookState::new(verifier, Arc::new(dispatcher.clone()));
    let app = listener::router(state, config.max_body_bytes);

    let addr = config.listen_addr();
    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Webhook server listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server failed")?;

    info!("Server stopped accepting requests");
    if dispatcher.drain(config.shutdown_drain).await {
        info!("All dispatches finished");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }

    info!("Shutdown signal received");
}
