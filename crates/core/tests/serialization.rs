use std::str::FromStr;

use alloy_primitives::{Address, TxHash, U256};
use serde_json::json;
use x402_core::{JobId, JobPhase, PaymentProof, PendingJob};

fn sample_job() -> PendingJob {
    PendingJob {
        id: JobId::fresh(),
        job_type: "ping".to_string(),
        params: json!({"host": "google.com", "count": 4}),
        wallet_address: Address::ZERO,
        price: U256::from(10_000_000_000_000_000u64),
        created_at: 1_700_000_000,
        expires_at: 1_700_000_300,
        paid: false,
        proof: None,
    }
}

#[test]
fn pending_job_round_trips_through_json() {
    let job = sample_job();
    let encoded = serde_json::to_string(&job).unwrap();
    let decoded: PendingJob = serde_json::from_str(&encoded).unwrap();
    assert_eq!(job, decoded);
}

#[test]
fn job_id_serializes_as_uuid_string() {
    let id = JobId::fresh();
    let encoded = serde_json::to_value(id).unwrap();
    let text = encoded.as_str().unwrap();
    assert_eq!(JobId::from_str(text).unwrap(), id);
}

#[test]
fn job_phase_uses_snake_case_strings() {
    assert_eq!(serde_json::to_value(JobPhase::NotFound).unwrap(), "not_found");
    assert_eq!(JobPhase::Paid.as_str(), "paid");
}

#[test]
fn proof_tx_hash_only_set_for_onchain_payments() {
    let onchain = PaymentProof::OnChain { tx_hash: TxHash::ZERO };
    assert_eq!(onchain.tx_hash(), Some(TxHash::ZERO));

    let offchain = PaymentProof::Authorization { signer: Address::ZERO };
    assert_eq!(offchain.tx_hash(), None);
}
