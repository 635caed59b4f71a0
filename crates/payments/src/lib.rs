pub mod authorization;
pub mod onchain;
pub mod units;

pub use authorization::{AuthVerifier, PaymentClaim, RejectReason};
pub use onchain::{ChainError, OnChainVerifier};
