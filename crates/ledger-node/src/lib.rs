//! HTTP surface of the ledger: thin handlers over a shared [`MiningCoordinator`].

pub mod constants;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use constants::{STATUS_MINED, STATUS_OK};
use ledger_core::{Block, LedgerError, MineParams, MiningCoordinator, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<MiningCoordinator>,
}

impl AppState {
    pub fn new(coordinator: MiningCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ledger(e) => match e {
                LedgerError::InvalidTransaction(_) => StatusCode::BAD_REQUEST,
                LedgerError::StaleTip { .. } => StatusCode::CONFLICT,
                LedgerError::MiningCancelled => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::ChainIntegrityViolation { .. }
                | LedgerError::HashComputation(_)
                | LedgerError::NonceSpaceExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
struct TxIn {
    from: String,
    to: String,
    amount: f64,
}

#[derive(Serialize)]
struct TxAccepted {
    status: &'static str,
    tx: Transaction,
}

#[derive(Serialize)]
struct Pending {
    count: usize,
    pending: Vec<Transaction>,
}

#[derive(Serialize)]
struct Mined {
    status: &'static str,
    block: Block,
}

#[derive(Serialize)]
struct ChainView {
    length: usize,
    chain: Vec<Block>,
}

#[derive(Serialize)]
struct Head {
    height: u64,
    hash: String,
}

#[derive(Serialize)]
struct Validity {
    valid: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct Balance {
    address: String,
    balance: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(health))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/transactions", post(submit_tx))
        .route("/mempool", get(list_pending))
        .route("/mine", post(mine))
        .route("/chain", get(list_chain))
        .route("/chain/head", get(chain_head))
        .route("/chain/validate", get(validate_chain))
        .route("/balance/{address}", get(balance))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Health> {
    Json(Health { status: STATUS_OK })
}

async fn submit_tx(
    State(state): State<AppState>,
    payload: Result<Json<TxIn>, JsonRejection>,
) -> Result<(StatusCode, Json<TxAccepted>), ApiError> {
    let Json(body) = payload?;
    let tx = state
        .coordinator
        .submit(&body.from, &body.to, body.amount)?;
    Ok((
        StatusCode::CREATED,
        Json(TxAccepted {
            status: STATUS_OK,
            tx,
        }),
    ))
}

async fn list_pending(State(state): State<AppState>) -> Json<Pending> {
    let pending = state.coordinator.mempool().snapshot();
    Json(Pending {
        count: pending.len(),
        pending,
    })
}

/// The body is optional: empty means "use the configured defaults". A body
/// that is present must be a valid [`MineParams`] object; `null` or fields of
/// the wrong type are rejected with 400 rather than silently mining with
/// defaults.
async fn mine(State(state): State<AppState>, body: Bytes) -> Result<Json<Mined>, ApiError> {
    let params: MineParams = if body.iter().all(u8::is_ascii_whitespace) {
        MineParams::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let coordinator = Arc::clone(&state.coordinator);
    let block = tokio::task::spawn_blocking(move || coordinator.mine(&params))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(Mined {
        status: STATUS_MINED,
        block,
    }))
}

async fn list_chain(State(state): State<AppState>) -> Json<ChainView> {
    let chain = state.coordinator.ledger().blocks();
    Json(ChainView {
        length: chain.len(),
        chain,
    })
}

async fn chain_head(State(state): State<AppState>) -> Json<Head> {
    let tip = state.coordinator.ledger().tip();
    Json(Head {
        height: tip.header.index,
        hash: tip.hash_hex(),
    })
}

async fn validate_chain(State(state): State<AppState>) -> Json<Validity> {
    let result = state.coordinator.ledger().validate_chain();
    Json(Validity {
        valid: result.is_ok(),
        error: result.err().map(|e| e.to_string()),
    })
}

async fn balance(State(state): State<AppState>, Path(address): Path<String>) -> Json<Balance> {
    let balance = state.coordinator.balance(&address);
    Json(Balance { address, balance })
}
