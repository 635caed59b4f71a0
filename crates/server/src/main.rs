use std::sync::Arc;

use tokio::sync::watch;
use x402_jobs::JobRegistry;
use x402_payments::OnChainVerifier;
use x402_server::config::ServerConfig;
use x402_server::{api, store, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = ServerConfig::from_env()?;

    let chain = match OnChainVerifier::connect(
        &config.rpc_url,
        config.token_address,
        config.recipient_address,
        config.chain_poll_interval,
    ) {
        Ok(chain) => {
            if chain.is_connected().await {
                tracing::info!(rpc = %config.rpc_url, chain_id = config.chain_id, "connected to chain");
            } else {
                tracing::warn!(rpc = %config.rpc_url, "chain RPC not reachable at startup");
            }
            Some(chain)
        }
        Err(e) => {
            tracing::warn!(error = %e, "on-chain payment verification disabled");
            None
        }
    };

    let state = AppState::new(config.clone(), JobRegistry::with_builtin(), chain);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(store::run_sweeper(
        Arc::clone(&state.store),
        config.sweep_interval,
        shutdown_rx,
    ));

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "x402 gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
    }
}

/// Resolves on ctrl-c. Stops the sweeper and new admissions; in-flight
/// streaming responses are allowed to finish.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install signal handler");
    }
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
}
