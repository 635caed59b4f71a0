pub mod ping;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

pub use ping::PingJob;

/// Channel depth for buffered job output lines.
pub const OUTPUT_BUFFER: usize = 64;

/// One executable job type. The registry owns the schema for its params;
/// the lifecycle core treats them as an opaque blob plus a pass/fail
/// validation result.
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Price per call in whole-token decimal units, e.g. "0.01".
    fn price(&self) -> &'static str;

    fn validate(&self, params: &Value) -> Result<(), String>;

    /// Starts the job and returns the receiving end of its line-by-line
    /// output. The sender side closes when the job finishes; a job that
    /// faults mid-run stops producing lines rather than retrying, since
    /// partial execution may already have taken effect.
    fn start(&self, params: Value) -> mpsc::Receiver<String>;
}

#[derive(Clone, Debug, Serialize)]
pub struct JobInfo {
    pub job_type: &'static str,
    pub description: &'static str,
    pub price: &'static str,
}

/// Catalogue of executable job types, keyed by the job-type string.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in job type.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PingJob));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .handlers
            .values()
            .map(|h| JobInfo {
                job_type: h.job_type(),
                description: h.description(),
                price: h.price(),
            })
            .collect();
        jobs.sort_by_key(|info| info.job_type);
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_ping() {
        let registry = JobRegistry::with_builtin();
        let jobs = registry.list();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, "ping");
        assert_eq!(jobs[0].price, "0.01");
    }

    #[test]
    fn unknown_job_type_is_absent() {
        let registry = JobRegistry::with_builtin();
        assert!(registry.get("mine-bitcoin").is_none());
    }
}
