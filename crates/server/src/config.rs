use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub rpc_url: String,
    pub chain_id: u64,
    pub token_address: Address,
    pub token_decimals: u8,
    pub recipient_address: Address,
    /// Time a client has to pay after admission.
    pub payment_window: Duration,
    /// Cadence of the background expiry sweep.
    pub sweep_interval: Duration,
    /// How long an executed job's record stays visible to status queries.
    pub eviction_grace: Duration,
    /// Budget for one on-chain verification attempt.
    pub onchain_check_timeout: Duration,
    /// Sleep between chain polls when no new blocks arrived.
    pub chain_poll_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host: IpAddr = env_parse("HOST", "0.0.0.0")?;
        let port: u16 = env_parse("PORT", "8989")?;

        Ok(Self {
            http_addr: SocketAddr::new(host, port),
            rpc_url: env_string("BASE_RPC", "https://base-sepolia-rpc.publicnode.com"),
            chain_id: env_parse("CHAIN_ID", "84532")?,
            token_address: env_parse("TOKEN_ADDRESS", "0x7143401013282067926d25e316f055fF3bc6c3FD")?,
            token_decimals: env_parse("TOKEN_DECIMALS", "18")?,
            recipient_address: env_parse(
                "RECIPIENT_ADDRESS",
                "0x6b27b7af171b6042238f1034ef1815037ab9bfa5",
            )?,
            payment_window: Duration::from_secs(env_parse("PAYMENT_TIMEOUT", "300")?),
            sweep_interval: Duration::from_secs(env_parse("SWEEP_INTERVAL", "60")?),
            eviction_grace: Duration::from_secs(env_parse("EVICTION_GRACE", "60")?),
            onchain_check_timeout: Duration::from_secs(env_parse("ONCHAIN_CHECK_TIMEOUT", "30")?),
            chain_poll_interval: Duration::from_secs(env_parse("CHAIN_POLL_INTERVAL", "2")?),
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_string(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_base_sepolia() {
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.chain_id, 84532);
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.payment_window, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.eviction_grace, Duration::from_secs(60));
    }
}
