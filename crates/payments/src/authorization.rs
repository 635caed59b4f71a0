use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, Signature, U256};
use alloy::sol;
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use serde::Deserialize;

sol! {
    /// Typed payment authorization signed by the payer. Field order is part
    /// of the signature and must match the client exactly.
    struct PaymentAuthorization {
        address recipient;
        address token;
        uint256 amount;
        string jobId;
        uint256 timestamp;
        uint256 validUntil;
    }
}

/// Maximum age of a claim's `timestamp` before it is considered stale.
pub const SIGNATURE_MAX_AGE_SECS: u64 = 300;

/// EIP-712 domain the client must sign under. A mismatching domain does not
/// fail recovery loudly, it just yields an unrelated signer address.
pub fn payment_domain(chain_id: u64) -> Eip712Domain {
    eip712_domain! {
        name: "x402 Payment",
        version: "1",
        chain_id: chain_id,
    }
}

/// Wire form of the `X-PAYMENT` header. Fields are optional so that missing
/// ones can be reported by name instead of failing deserialization wholesale.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentClaim {
    pub recipient: Option<String>,
    pub token: Option<String>,
    /// Amount in token base units, as a decimal string.
    pub amount: Option<String>,
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
    pub timestamp: Option<u64>,
    #[serde(rename = "validUntil")]
    pub valid_until: Option<u64>,
    pub signature: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("job id mismatch: got {got}, expected {expected}")]
    JobIdMismatch { got: String, expected: String },

    #[error("amount mismatch: got {got}, expected {expected}")]
    AmountMismatch { got: String, expected: String },

    #[error("recipient mismatch")]
    RecipientMismatch,

    #[error("token address mismatch")]
    TokenMismatch,

    #[error("signature too old")]
    SignatureStale,

    #[error("signature expired")]
    SignatureExpired,

    #[error("signature verification failed: {0}")]
    BadSignature(String),
}

impl RejectReason {
    /// Stable machine-checkable status string for client branching.
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::JobIdMismatch { .. } => "job_id_mismatch",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::TokenMismatch => "token_mismatch",
            Self::SignatureStale => "signature_stale",
            Self::SignatureExpired => "signature_expired",
            Self::BadSignature(_) => "bad_signature",
        }
    }
}

/// Stateless verifier for off-chain payment authorization claims.
pub struct AuthVerifier {
    domain: Eip712Domain,
    recipient: Address,
    token: Address,
}

impl AuthVerifier {
    pub fn new(chain_id: u64, recipient: Address, token: Address) -> Self {
        Self {
            domain: payment_domain(chain_id),
            recipient,
            token,
        }
    }

    /// Verifies a claim against the job it is supposed to pay for and
    /// returns the recovered signer address. Callers that require a
    /// specific payer must compare the signer themselves.
    pub fn verify(
        &self,
        claim: &PaymentClaim,
        expected_job_id: &str,
        expected_amount: U256,
    ) -> Result<Address, RejectReason> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(claim, expected_job_id, expected_amount, now)
    }

    /// Same as [`verify`](Self::verify) with an explicit clock. The cheap
    /// field checks run first, in a fixed order, so every rejection carries
    /// the earliest applicable reason; ECDSA recovery happens last.
    pub fn verify_at(
        &self,
        claim: &PaymentClaim,
        expected_job_id: &str,
        expected_amount: U256,
        now: u64,
    ) -> Result<Address, RejectReason> {
        let signature = require(&claim.signature, "signature")?;
        let recipient = require(&claim.recipient, "recipient")?;
        let token = require(&claim.token, "token")?;
        let amount = require(&claim.amount, "amount")?;
        let job_id = require(&claim.job_id, "jobId")?;
        let timestamp = claim
            .timestamp
            .ok_or(RejectReason::MissingField("timestamp"))?;
        let valid_until = claim
            .valid_until
            .ok_or(RejectReason::MissingField("validUntil"))?;

        if job_id != expected_job_id {
            return Err(RejectReason::JobIdMismatch {
                got: job_id.to_string(),
                expected: expected_job_id.to_string(),
            });
        }

        let claimed_amount = amount.parse::<U256>().map_err(|_| {
            RejectReason::AmountMismatch {
                got: amount.to_string(),
                expected: expected_amount.to_string(),
            }
        })?;
        if claimed_amount != expected_amount {
            return Err(RejectReason::AmountMismatch {
                got: amount.to_string(),
                expected: expected_amount.to_string(),
            });
        }

        let recipient_addr = parse_address(recipient).ok_or(RejectReason::RecipientMismatch)?;
        if recipient_addr != self.recipient {
            return Err(RejectReason::RecipientMismatch);
        }

        let token_addr = parse_address(token).ok_or(RejectReason::TokenMismatch)?;
        if token_addr != self.token {
            return Err(RejectReason::TokenMismatch);
        }

        if now.saturating_sub(timestamp) > SIGNATURE_MAX_AGE_SECS {
            return Err(RejectReason::SignatureStale);
        }
        if now > valid_until {
            return Err(RejectReason::SignatureExpired);
        }

        let message = PaymentAuthorization {
            recipient: recipient_addr,
            token: token_addr,
            amount: claimed_amount,
            jobId: job_id.to_string(),
            timestamp: U256::from(timestamp),
            validUntil: U256::from(valid_until),
        };
        let digest = message.eip712_signing_hash(&self.domain);

        let sig_bytes = hex::decode(signature.trim_start_matches("0x"))
            .map_err(|e| RejectReason::BadSignature(e.to_string()))?;
        let signature = Signature::try_from(sig_bytes.as_slice())
            .map_err(|e| RejectReason::BadSignature(e.to_string()))?;
        signature
            .recover_address_from_prehash(&digest)
            .map_err(|e| RejectReason::BadSignature(e.to_string()))
    }
}

fn require<'a>(
    field: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, RejectReason> {
    field
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(RejectReason::MissingField(name))
}

fn parse_address(raw: &str) -> Option<Address> {
    raw.trim_start_matches("0x").parse::<Address>().ok()
}
