pub mod enums;
pub mod error;
pub mod ids;
pub mod job;

pub use enums::JobPhase;
pub use error::StoreError;
pub use ids::JobId;
pub use job::{PaymentProof, PendingJob};
