//! keygate node binary - serves `POST /v1/keys.verifyKey`.
//!
//! Runs the verifier over the in-memory credential and window stores,
//! optionally seeded from a JSON fixtures file. Verification events are
//! batched and written to the log.
//!
//! # Tiger Style
//!
//! - Fail fast: configuration is validated before the listener binds
//! - Graceful shutdown: SIGTERM/SIGINT cancel the server and flush pending events
//! - Error handling: Anyhow for application errors
//!
//! # Usage
//!
//! ```bash
//! keygate-node --config /etc/keygate/node.toml --fixtures demos/fixtures.json
//!
//! # Environment variables
//! export KEYGATE_BIND_ADDR=127.0.0.1:8080
//! keygate-node
//! ```

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use keygate::AppConfig;
use keygate::AppState;
use keygate_core::DeterministicCredentialStore;
use keygate_core::DeterministicKeyValueStore;
use keygate_core::StoreFixtures;
use keygate_time::SystemClock;
use keygate_verify::BatchedEventSink;
use keygate_verify::TracingEventFlusher;
use keygate_verify::VerificationEventSink;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keygate-node")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(long, env = "KEYGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Socket address to listen on (overrides configuration).
    #[arg(long)]
    bind: Option<String>,

    /// JSON file with workspaces, apis, credentials, permissions and grants.
    #[arg(long)]
    fixtures: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = &args.bind {
        config.server.bind_addr = bind.clone();
        config.validate().context("invalid --bind address")?;
    }
    Ok(config)
}

fn read_fixtures(path: &Path) -> Result<StoreFixtures> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read fixtures {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse fixtures {}", path.display()))
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;

    let store = DeterministicCredentialStore::new();
    if let Some(path) = &args.fixtures {
        let fixtures = read_fixtures(path)?;
        let credentials = fixtures.credentials.len();
        store.load_fixtures(fixtures).await.context("failed to load fixtures")?;
        info!(path = %path.display(), credentials, "fixtures loaded");
    }

    let cancel = CancellationToken::new();
    let events = if config.events.enabled {
        let (sink, handle) =
            BatchedEventSink::spawn(config.events.batch_config(), Arc::new(TracingEventFlusher), cancel.child_token());
        Some((sink as Arc<dyn VerificationEventSink>, handle))
    } else {
        None
    };

    let verifier = keygate::build_verifier(
        &config,
        store,
        DeterministicKeyValueStore::new(),
        Arc::new(SystemClock),
        events.as_ref().map(|(sink, _)| Arc::clone(sink)),
    );
    let state = AppState::new(verifier, &config.verify);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind {}", addr))?;
    info!(
        addr = %addr,
        verify_timeout_ms = config.verify.timeout_ms,
        events = config.events.enabled,
        "keygate node listening"
    );

    let server_cancel = cancel.clone();
    let server = tokio::spawn(keygate::server::serve(listener, state, server_cancel));

    shutdown_signal().await;
    cancel.cancel();

    server.await.context("server task panicked")?.context("server failed")?;
    if let Some((_, handle)) = events {
        handle.await.context("event flush task panicked")?;
    }
    info!("keygate node stopped");
    Ok(())
}
