use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;

sol! {
    #[sol(rpc)]
    contract Erc20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid rpc url: {0}")]
    InvalidRpcUrl(String),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Confirms ERC-20 transfers to a fixed recipient by scanning `Transfer`
/// event logs in strictly increasing, non-overlapping block ranges.
pub struct OnChainVerifier<P> {
    provider: P,
    token: Address,
    recipient: Address,
    poll_interval: Duration,
}

impl OnChainVerifier<DynProvider> {
    pub fn connect(
        rpc_url: &str,
        token: Address,
        recipient: Address,
        poll_interval: Duration,
    ) -> Result<Self, ChainError> {
        let url: alloy::transports::http::reqwest::Url = rpc_url
            .parse()
            .map_err(|e| ChainError::InvalidRpcUrl(format!("{e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self::new(provider, token, recipient, poll_interval))
    }
}

impl<P: Provider + Clone> OnChainVerifier<P> {
    pub fn new(provider: P, token: Address, recipient: Address, poll_interval: Duration) -> Self {
        Self {
            provider,
            token,
            recipient,
            poll_interval,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }

    /// Waits for a transfer of at least `expected` base units from `from`
    /// to the configured recipient and returns its transaction hash.
    ///
    /// `timeout` is a hard bound measured from call entry; a slow RPC call
    /// cannot exceed it. `None` means the payment has not landed within the
    /// budget, which is an expected outcome, not a failure. Transient RPC
    /// errors are retried silently until the budget runs out.
    pub async fn verify_payment(
        &self,
        from: Address,
        expected: U256,
        timeout: Duration,
    ) -> Option<TxHash> {
        match tokio::time::timeout(timeout, self.scan(from, expected)).await {
            Ok(tx_hash) => Some(tx_hash),
            Err(_) => {
                tracing::debug!(%from, "no matching transfer before timeout");
                None
            }
        }
    }

    async fn scan(&self, from: Address, expected: U256) -> TxHash {
        let mut last_scanned = loop {
            match self.provider.get_block_number().await {
                Ok(head) => break head,
                Err(e) => {
                    tracing::warn!(error = %e, "error reading chain head");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        };

        loop {
            match self.poll_range(&mut last_scanned, from, expected).await {
                Ok(Some(tx_hash)) => return tx_hash,
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "error checking payment"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Scans `[last_scanned + 1, head]` once. `last_scanned` advances to the
    /// head whether or not a match was found, so no range is scanned twice.
    async fn poll_range(
        &self,
        last_scanned: &mut u64,
        from: Address,
        expected: U256,
    ) -> Result<Option<TxHash>, ChainError> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Provider(e.to_string()))?;

        if head <= *last_scanned {
            return Ok(None);
        }

        let contract = Erc20::new(self.token, &self.provider);
        let logs = contract
            .Transfer_filter()
            .from_block(*last_scanned + 1)
            .to_block(head)
            .topic1(from.into_word())
            .topic2(self.recipient.into_word())
            .query()
            .await
            .map_err(|e| ChainError::Provider(e.to_string()))?;

        *last_scanned = head;

        Ok(first_sufficient_transfer(
            logs.into_iter()
                .map(|(event, log)| (event.value, log.transaction_hash)),
            expected,
        ))
    }
}

/// First event in chain order whose transferred value meets the threshold.
pub fn first_sufficient_transfer(
    events: impl IntoIterator<Item = (U256, Option<TxHash>)>,
    expected: U256,
) -> Option<TxHash> {
    events
        .into_iter()
        .find(|(value, _)| *value >= expected)
        .and_then(|(_, tx_hash)| tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u8) -> TxHash {
        TxHash::repeat_byte(n)
    }

    #[test]
    fn picks_first_event_meeting_threshold() {
        let events = [
            (U256::from(5), Some(tx(1))),
            (U256::from(20), Some(tx(2))),
        ];
        assert_eq!(
            first_sufficient_transfer(events, U256::from(10)),
            Some(tx(2))
        );
    }

    #[test]
    fn exact_amount_matches() {
        let events = [(U256::from(10), Some(tx(1)))];
        assert_eq!(
            first_sufficient_transfer(events, U256::from(10)),
            Some(tx(1))
        );
    }

    #[test]
    fn no_event_meets_threshold() {
        let events = [
            (U256::from(1), Some(tx(1))),
            (U256::from(9), Some(tx(2))),
        ];
        assert_eq!(first_sufficient_transfer(events, U256::from(10)), None);
    }

    #[test]
    fn preserves_chain_order_over_amount() {
        // Both qualify; the earlier event wins even though the later is larger.
        let events = [
            (U256::from(15), Some(tx(1))),
            (U256::from(50), Some(tx(2))),
        ];
        assert_eq!(
            first_sufficient_transfer(events, U256::from(10)),
            Some(tx(1))
        );
    }
}
