pub mod api;
pub mod config;
pub mod store;
pub mod stream;

use std::sync::Arc;

use alloy::providers::DynProvider;
use x402_jobs::JobRegistry;
use x402_payments::{AuthVerifier, OnChainVerifier};

use crate::config::ServerConfig;
use crate::store::JobStore;

pub struct AppState {
    pub store: Arc<JobStore>,
    pub registry: JobRegistry,
    pub auth: AuthVerifier,
    /// Absent when the gateway runs without an RPC endpoint; the off-chain
    /// authorization path still works.
    pub chain: Option<OnChainVerifier<DynProvider>>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        registry: JobRegistry,
        chain: Option<OnChainVerifier<DynProvider>>,
    ) -> Arc<Self> {
        let store = Arc::new(JobStore::new(
            config.payment_window,
            config.eviction_grace,
            config.token_decimals,
        ));
        let auth = AuthVerifier::new(
            config.chain_id,
            config.recipient_address,
            config.token_address,
        );
        Arc::new(Self {
            store,
            registry,
            auth,
            chain,
            config,
        })
    }
}

/// State wired for router tests: built-in registry plus any extra handlers,
/// no RPC connection.
pub fn setup_test_state(registry: JobRegistry) -> Arc<AppState> {
    let config = ServerConfig {
        http_addr: "127.0.0.1:0".parse().expect("literal addr"),
        rpc_url: String::new(),
        chain_id: 84532,
        token_address: alloy::primitives::Address::repeat_byte(0x22),
        token_decimals: 18,
        recipient_address: alloy::primitives::Address::repeat_byte(0x11),
        payment_window: std::time::Duration::from_secs(300),
        sweep_interval: std::time::Duration::from_secs(60),
        eviction_grace: std::time::Duration::from_secs(60),
        onchain_check_timeout: std::time::Duration::from_secs(1),
        chain_poll_interval: std::time::Duration::from_millis(100),
    };
    AppState::new(config, registry, None)
}
