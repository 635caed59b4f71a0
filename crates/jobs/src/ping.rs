use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::{JobHandler, OUTPUT_BUFFER};

pub const MAX_PING_COUNT: u64 = 10;
const PER_PING_TIMEOUT_SECS: u64 = 5;

fn default_count() -> u64 {
    4
}

#[derive(Debug, Deserialize)]
struct PingParams {
    host: String,
    #[serde(default = "default_count")]
    count: u64,
}

/// Pings a host and streams the raw `ping` output line by line.
pub struct PingJob;

impl PingJob {
    fn parse(params: &Value) -> Result<PingParams, String> {
        let parsed: PingParams = serde_json::from_value(params.clone())
            .map_err(|e| format!("invalid ping params: {e}"))?;

        if parsed.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        // Hostname goes straight to a subprocess argument; restrict it to a
        // safe charset.
        if !parsed
            .host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        {
            return Err(format!("invalid host: {}", parsed.host));
        }
        if parsed.count == 0 || parsed.count > MAX_PING_COUNT {
            return Err(format!("count must be between 1 and {MAX_PING_COUNT}"));
        }

        Ok(parsed)
    }
}

impl JobHandler for PingJob {
    fn job_type(&self) -> &'static str {
        "ping"
    }

    fn description(&self) -> &'static str {
        "Ping a host and stream the raw output"
    }

    fn price(&self) -> &'static str {
        "0.01"
    }

    fn validate(&self, params: &Value) -> Result<(), String> {
        Self::parse(params).map(|_| ())
    }

    fn start(&self, params: Value) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        tokio::spawn(async move {
            // Params were validated at admission; a failure here still ends
            // the stream cleanly instead of panicking the task.
            match PingJob::parse(&params) {
                Ok(parsed) => run_ping(parsed, tx).await,
                Err(e) => {
                    let _ = tx.send(format!("error: {e}")).await;
                }
            }
        });
        rx
    }
}

async fn run_ping(params: PingParams, tx: mpsc::Sender<String>) {
    let spawned = Command::new("ping")
        .arg("-c")
        .arg(params.count.to_string())
        .arg("-W")
        .arg(PER_PING_TIMEOUT_SECS.to_string())
        .arg(&params.host)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(error = %e, "failed to spawn ping");
            let _ = tx.send(format!("failed to start ping: {e}")).await;
            return;
        }
    };

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                // Receiver went away; the child is killed on drop.
                return;
            }
        }
    }

    match child.wait().await {
        Ok(status) if !status.success() => {
            let _ = tx.send(format!("ping exited with {status}")).await;
        }
        Err(e) => {
            let _ = tx.send(format!("ping failed: {e}")).await;
        }
        _ => {}
    }
}
