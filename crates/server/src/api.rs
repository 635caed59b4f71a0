use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use x402_core::{JobId, JobPhase, PaymentProof, PendingJob, StoreError};
use x402_payments::authorization::PaymentClaim;
use x402_payments::units;

use crate::store::MarkPaidOutcome;
use crate::{stream, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/request", post(request_job))
        .route("/api/jobs/verify-payment", post(verify_payment))
        .route("/api/jobs/execute/{job_id}", get(execute_job))
        .route("/api/jobs/status/{job_id}", get(job_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Client-facing failure: a status code plus a stable machine-checkable
/// status string, so callers can branch without parsing prose.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn payment_rejected(code: &'static str, message: String) -> Self {
        Self {
            status: StatusCode::PAYMENT_REQUIRED,
            code,
            message,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Expired => StatusCode::REQUEST_TIMEOUT,
            StoreError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            StoreError::InvalidJobSpec(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            code: err.status_str(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"status": self.code, "message": self.message})),
        )
            .into_response()
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let connected = match &state.chain {
        Some(chain) => chain.is_connected().await,
        None => false,
    };
    Json(json!({
        "service": "x402 gateway",
        "status": "running",
        "chain_id": state.config.chain_id,
        "connected": connected,
    }))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "jobs": state.registry.list(),
        "token_address": state.config.token_address.to_checksum(None),
        "recipient_address": state.config.recipient_address.to_checksum(None),
    }))
}

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub job_type: String,
    pub params: Value,
    pub wallet_address: String,
    /// Client-generated id for the signature-based path; the payment claim
    /// is signed over it before the request is made.
    #[serde(default)]
    pub job_id: Option<JobId>,
}

/// Admits a job and answers 402 with the payment target. If the request
/// carries an `X-PAYMENT` authorization that verifies against the admitted
/// job, payment is recorded immediately and no verify round trip is needed.
async fn request_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<JobRequest>,
) -> Result<Response, ApiError> {
    let job = state.store.admit(
        &state.registry,
        &req.job_type,
        req.params,
        &req.wallet_address,
        req.job_id,
    )?;

    if let Some(raw) = headers.get("x-payment") {
        return authorize_with_header(&state, &job, raw).map(IntoResponse::into_response);
    }

    Ok((
        StatusCode::PAYMENT_REQUIRED,
        Json(json!({
            "job_id": job.id,
            "message": "Payment Required",
            "payment": {
                "amount": units::from_base_units(job.price, state.config.token_decimals),
                "token_address": state.config.token_address.to_checksum(None),
                "recipient_address": state.config.recipient_address.to_checksum(None),
                "chain_id": state.config.chain_id,
            },
            "expires_at": rfc3339(job.expires_at),
            "timeout_seconds": state.config.payment_window.as_secs(),
        })),
    )
        .into_response())
}

fn authorize_with_header(
    state: &AppState,
    job: &PendingJob,
    raw: &HeaderValue,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let claim: PaymentClaim = raw
        .to_str()
        .ok()
        .and_then(|text| serde_json::from_str(text).ok())
        .ok_or_else(|| {
            ApiError::payment_rejected(
                "invalid_payment_header",
                "X-PAYMENT header is not valid JSON".to_string(),
            )
        })?;

    let signer = state
        .auth
        .verify(&claim, &job.id.to_string(), job.price)
        .map_err(|reason| {
            tracing::debug!(job_id = %job.id, reason = %reason, "payment authorization rejected");
            ApiError::payment_rejected(reason.status_str(), reason.to_string())
        })?;

    state
        .store
        .mark_paid(job.id, PaymentProof::Authorization { signer })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "authorized",
            "job_id": job.id,
            "signer": signer.to_checksum(None),
            "execution_url": format!("/api/jobs/execute/{}", job.id),
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PaymentConfirmation {
    pub job_id: JobId,
    /// Reported by the client but never trusted; the chain scan decides.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentConfirmation>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let job = state.store.lookup(req.job_id)?;

    if job.paid {
        return Ok((StatusCode::OK, Json(already_paid_body(&job))));
    }

    let Some(chain) = &state.chain else {
        return Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "status": "payment_not_found",
                "message": "On-chain verification is unavailable",
            })),
        ));
    };

    let found = chain
        .verify_payment(
            job.wallet_address,
            job.price,
            state.config.onchain_check_timeout,
        )
        .await;

    match found {
        Some(tx_hash) => {
            match state
                .store
                .mark_paid(job.id, PaymentProof::OnChain { tx_hash })?
            {
                MarkPaidOutcome::Verified(_) => Ok((
                    StatusCode::OK,
                    Json(json!({
                        "status": "verified",
                        "tx_hash": format!("{tx_hash:#x}"),
                        "execution_url": format!("/api/jobs/execute/{}", job.id),
                    })),
                )),
                MarkPaidOutcome::AlreadyPaid(job) => {
                    Ok((StatusCode::OK, Json(already_paid_body(&job))))
                }
            }
        }
        None => Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "status": "payment_not_found",
                "message": "Payment not yet detected on blockchain",
            })),
        )),
    }
}

fn already_paid_body(job: &PendingJob) -> Value {
    json!({
        "status": "already_paid",
        "tx_hash": job.tx_hash().map(|hash| format!("{hash:#x}")),
        "execution_url": format!("/api/jobs/execute/{}", job.id),
    })
}

async fn execute_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let id: JobId = job_id.parse().map_err(|_| StoreError::NotFound)?;
    let job = state.store.begin_execution(id)?;

    // Registry contents are fixed at startup, so the handler that admitted
    // this job type is still there.
    let handler = state
        .registry
        .get(&job.job_type)
        .ok_or(StoreError::NotFound)?;

    let output = handler.start(job.params.clone());
    Ok(stream::sse_response(output).into_response())
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Json<Value> {
    let Ok(id) = job_id.parse::<JobId>() else {
        return Json(json!({"status": JobPhase::NotFound.as_str()}));
    };

    let view = state.store.status(id);
    match view.phase {
        JobPhase::NotFound | JobPhase::Expired => {
            Json(json!({"status": view.phase.as_str()}))
        }
        JobPhase::Pending | JobPhase::Paid => Json(json!({
            "status": view.phase.as_str(),
            "paid": view.paid,
            "expires_at": view.expires_at.map(rfc3339),
            "price": view
                .price
                .map(|price| units::from_base_units(price, state.config.token_decimals)),
        })),
    }
}

fn rfc3339(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
