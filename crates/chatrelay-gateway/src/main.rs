//! chatrelay gateway
//!
//! - WebSocket endpoint: /v1/chat (ChatMessage JSON text frames)
//! - One fan-out dispatcher task, one session per connection
//! - Ops: /healthz, /readyz, /metrics
//! - Graceful shutdown on Ctrl-C / SIGTERM

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay_core::error::{RelayError, Result};
use chatrelay_gateway::{app_state::AppState, config, router};

#[derive(Debug, Parser)]
#[command(name = "chatrelay-gateway", about = "Broadcast chat relay over WebSocket")]
struct Args {
    /// Path to a YAML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides `gateway.listen`.
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => config::load_from_file(path)?,
        None => config::GatewayConfig::default(),
    };
    if let Some(listen) = args.listen {
        cfg.gateway.listen = listen;
    }

    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| RelayError::Config(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let (state, dispatcher) = AppState::build(cfg)?;
    let dispatcher_task = tokio::spawn(dispatcher.run(state.shutdown_token()));

    let app = router::build_router(state.clone());

    tracing::info!(%listen, "chatrelay-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|e| RelayError::Internal(format!("server failed: {e}")))?;

    let _ = dispatcher_task.await;
    tracing::info!("chatrelay-gateway stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
    state.begin_shutdown();
}
