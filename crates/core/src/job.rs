use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::JobId;

/// One admitted job request, owned exclusively by the lifecycle store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingJob {
    pub id: JobId,
    pub job_type: String,
    pub params: Value,
    pub wallet_address: Address,
    /// Price in token base units, fixed at admission and never recomputed.
    pub price: U256,
    pub created_at: u64,
    pub expires_at: u64,
    pub paid: bool,
    pub proof: Option<PaymentProof>,
}

impl PendingJob {
    pub fn expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.proof.as_ref().and_then(PaymentProof::tx_hash)
    }
}

/// How a job's payment was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentProof {
    /// Token transfer observed on chain.
    OnChain { tx_hash: TxHash },
    /// Signed payment authorization accepted without chain confirmation.
    Authorization { signer: Address },
}

impl PaymentProof {
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::OnChain { tx_hash } => Some(*tx_hash),
            Self::Authorization { .. } => None,
        }
    }
}
