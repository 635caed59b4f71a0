/// Every lifecycle store operation is total over this set of outcomes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("job not found")]
    NotFound,

    #[error("payment window expired")]
    Expired,

    #[error("payment required")]
    PaymentRequired,

    #[error("invalid job spec: {0}")]
    InvalidJobSpec(String),
}

impl StoreError {
    /// Stable machine-checkable status string for client branching.
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::PaymentRequired => "payment_required",
            Self::InvalidJobSpec(_) => "invalid_job_spec",
        }
    }
}
