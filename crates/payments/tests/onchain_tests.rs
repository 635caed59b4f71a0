use std::time::{Duration, Instant};

use alloy::primitives::{Address, U256};
use x402_payments::OnChainVerifier;

// The RPC endpoint refuses connections, so every poll fails and is retried
// until the caller's budget runs out.
#[tokio::test]
async fn timeout_is_a_hard_bound_under_rpc_failure() {
    let verifier = OnChainVerifier::connect(
        "http://127.0.0.1:1",
        Address::repeat_byte(0x22),
        Address::repeat_byte(0x11),
        Duration::from_millis(20),
    )
    .unwrap();

    let started = Instant::now();
    let result = verifier
        .verify_payment(
            Address::repeat_byte(0x33),
            U256::from(1u64),
            Duration::from_millis(200),
        )
        .await;

    assert_eq!(result, None);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn rejects_malformed_rpc_url() {
    let err = OnChainVerifier::connect(
        "not a url",
        Address::ZERO,
        Address::ZERO,
        Duration::from_secs(2),
    );
    assert!(err.is_err());
}
