use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::U256;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use x402_core::{JobId, JobPhase, PaymentProof, PendingJob, StoreError};
use x402_jobs::JobRegistry;
use x402_payments::units;

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Clone, Debug, PartialEq)]
pub enum MarkPaidOutcome {
    Verified(PendingJob),
    /// The record was already paid; the original proof is untouched.
    AlreadyPaid(PendingJob),
}

#[derive(Clone, Debug, PartialEq)]
pub struct JobStatusView {
    pub phase: JobPhase,
    pub paid: bool,
    pub expires_at: Option<u64>,
    pub price: Option<U256>,
}

impl JobStatusView {
    fn bare(phase: JobPhase) -> Self {
        Self {
            phase,
            paid: false,
            expires_at: None,
            price: None,
        }
    }
}

/// Single source of truth for which jobs exist, are paid, and may execute.
///
/// All state lives in one shared map; lock scope never spans an await
/// point, so the store is safe to use from handlers and background tasks
/// alike.
pub struct JobStore {
    jobs: DashMap<JobId, PendingJob>,
    payment_window: Duration,
    eviction_grace: Duration,
    token_decimals: u8,
}

impl JobStore {
    pub fn new(payment_window: Duration, eviction_grace: Duration, token_decimals: u8) -> Self {
        Self {
            jobs: DashMap::new(),
            payment_window,
            eviction_grace,
            token_decimals,
        }
    }

    /// Validates the request against the job registry, fixes the price and
    /// payment window, and inserts a fresh unpaid record.
    ///
    /// `job_id` is normally generated here; the signature-based admission
    /// path supplies the client-side id the payment claim was signed over.
    /// Either way an id is never accepted twice.
    pub fn admit(
        &self,
        registry: &JobRegistry,
        job_type: &str,
        params: Value,
        wallet_address: &str,
        job_id: Option<JobId>,
    ) -> Result<PendingJob, StoreError> {
        self.admit_at(registry, job_type, params, wallet_address, job_id, unix_now())
    }

    pub fn admit_at(
        &self,
        registry: &JobRegistry,
        job_type: &str,
        params: Value,
        wallet_address: &str,
        job_id: Option<JobId>,
        now: u64,
    ) -> Result<PendingJob, StoreError> {
        let handler = registry.get(job_type).ok_or_else(|| {
            StoreError::InvalidJobSpec(format!("unknown job type: {job_type}"))
        })?;
        handler.validate(&params).map_err(StoreError::InvalidJobSpec)?;

        let wallet = wallet_address
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| StoreError::InvalidJobSpec(format!("invalid wallet address: {e}")))?;

        let price = units::to_base_units(handler.price(), self.token_decimals)
            .map_err(|e| StoreError::InvalidJobSpec(e.to_string()))?;

        let job = PendingJob {
            id: job_id.unwrap_or_else(JobId::fresh),
            job_type: job_type.to_string(),
            params,
            wallet_address: wallet,
            price,
            created_at: now,
            expires_at: now + self.payment_window.as_secs(),
            paid: false,
            proof: None,
        };

        match self.jobs.entry(job.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::InvalidJobSpec(format!(
                    "job id already in use: {}",
                    job.id
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(job.clone());
            }
        }

        tracing::debug!(job_id = %job.id, job_type, "job admitted");
        Ok(job)
    }

    /// Looks a record up, evicting it if the payment window has lapsed.
    pub fn lookup(&self, id: JobId) -> Result<PendingJob, StoreError> {
        self.lookup_at(id, unix_now())
    }

    pub fn lookup_at(&self, id: JobId, now: u64) -> Result<PendingJob, StoreError> {
        let Some(job) = self.jobs.get(&id).map(|entry| entry.clone()) else {
            return Err(StoreError::NotFound);
        };
        if job.expired_at(now) {
            self.jobs.remove(&id);
            return Err(StoreError::Expired);
        }
        Ok(job)
    }

    /// Applies a verification verdict. Idempotent: a second call on a paid
    /// record reports `AlreadyPaid` without touching the stored proof.
    pub fn mark_paid(&self, id: JobId, proof: PaymentProof) -> Result<MarkPaidOutcome, StoreError> {
        self.mark_paid_at(id, proof, unix_now())
    }

    pub fn mark_paid_at(
        &self,
        id: JobId,
        proof: PaymentProof,
        now: u64,
    ) -> Result<MarkPaidOutcome, StoreError> {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Err(StoreError::NotFound);
        };
        if entry.expired_at(now) {
            drop(entry);
            self.jobs.remove(&id);
            return Err(StoreError::Expired);
        }
        if entry.paid {
            return Ok(MarkPaidOutcome::AlreadyPaid(entry.clone()));
        }

        entry.paid = true;
        entry.proof = Some(proof);
        tracing::info!(job_id = %id, "payment recorded");
        Ok(MarkPaidOutcome::Verified(entry.clone()))
    }

    /// The single admission gate for execution. On success the record is
    /// scheduled for eviction after the grace period; until that timer
    /// fires, status queries can still observe the job, and a repeated call
    /// hands the job out again. Guarding against re-running an
    /// already-started job is the execution layer's responsibility.
    pub fn begin_execution(self: &Arc<Self>, id: JobId) -> Result<PendingJob, StoreError> {
        let job = self.begin_execution_at(id, unix_now())?;

        let store = Arc::clone(self);
        let grace = self.eviction_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            store.evict(id);
        });

        Ok(job)
    }

    pub fn begin_execution_at(&self, id: JobId, now: u64) -> Result<PendingJob, StoreError> {
        let Some(job) = self.jobs.get(&id).map(|entry| entry.clone()) else {
            return Err(StoreError::NotFound);
        };
        if job.expired_at(now) {
            self.jobs.remove(&id);
            return Err(StoreError::Expired);
        }
        if !job.paid {
            return Err(StoreError::PaymentRequired);
        }
        tracing::info!(job_id = %id, job_type = %job.job_type, "execution started");
        Ok(job)
    }

    /// Read-only status; never mutates, even for expired records.
    pub fn status(&self, id: JobId) -> JobStatusView {
        self.status_at(id, unix_now())
    }

    pub fn status_at(&self, id: JobId, now: u64) -> JobStatusView {
        let Some(job) = self.jobs.get(&id) else {
            return JobStatusView::bare(JobPhase::NotFound);
        };
        if job.expired_at(now) {
            return JobStatusView::bare(JobPhase::Expired);
        }
        JobStatusView {
            phase: if job.paid { JobPhase::Paid } else { JobPhase::Pending },
            paid: job.paid,
            expires_at: Some(job.expires_at),
            price: Some(job.price),
        }
    }

    /// Removes every record past its payment window. Safe to run
    /// concurrently with all other operations.
    pub fn sweep_expired(&self, now: u64) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.expired_at(now));
        before.saturating_sub(self.jobs.len())
    }

    /// Removing an already-removed record is a no-op, never an error.
    pub fn evict(&self, id: JobId) -> bool {
        self.jobs.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Periodic expiry sweep; runs until shutdown is signalled.
pub async fn run_sweeper(
    store: Arc<JobStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let removed = store.sweep_expired(unix_now());
                if removed > 0 {
                    tracing::info!(removed, "cleaned up expired jobs");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
