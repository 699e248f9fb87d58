use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use mint_policy::Blueprint;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{info, warn};

use crate::ledger::TxId;
use crate::minter::Minter;
use crate::provider::ProviderError;
use crate::rpc::AUTH_HEADER;
use crate::submit::{MintError, SubmitError};
use crate::tx_builder::BuildError;

pub async fn serve_mint_api(addr: SocketAddr, state: ApiState) -> anyhow::Result<()> {
    let app = mint_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "mint http api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

pub fn mint_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/policy", get(policy))
        .route("/mint", post(mint))
        .route("/burn", post(burn))
        .with_state(state)
}

#[derive(Clone)]
pub struct ApiState {
    pub minter: Arc<Minter>,
    /// Held for the whole build-and-submit so two requests never select the same outputs.
    pub build_lock: Arc<Mutex<()>>,
    pub auth_token: Option<String>,
}

impl ApiState {
    pub fn new(minter: Arc<Minter>, auth_token: Option<String>) -> Self {
        Self {
            minter,
            build_lock: Arc::new(Mutex::new(())),
            auth_token,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxResponse {
    pub tx_id: TxId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub address: String,
    pub policy_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        let status = match &err {
            MintError::Build(BuildError::InvalidQuantity(_)) => StatusCode::BAD_REQUEST,
            MintError::Build(BuildError::ScriptRejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            MintError::Build(
                BuildError::NoSpendableInputs
                | BuildError::InvalidCollateral(_)
                | BuildError::Balancing(_),
            ) => StatusCode::CONFLICT,
            MintError::Build(BuildError::SigningFailed(_)) => StatusCode::FORBIDDEN,
            MintError::Build(BuildError::Provider(ProviderError::Unreachable(_)))
            | MintError::Submit(SubmitError::Unreachable(_)) => StatusCode::GATEWAY_TIMEOUT,
            MintError::Build(BuildError::Provider(_)) => StatusCode::BAD_GATEWAY,
            MintError::Build(BuildError::Policy(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            MintError::Submit(SubmitError::Rejected(_)) => StatusCode::CONFLICT,
        };
        ApiError::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, ApiError> {
    let address = state
        .minter
        .address()
        .encode()
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(HealthResponse {
        status: "ok".into(),
        address,
        policy_id: state.minter.policy().policy_id().to_hex(),
    }))
}

async fn policy(State(state): State<ApiState>) -> Result<Json<Blueprint>, ApiError> {
    let blueprint = state
        .minter
        .blueprint()
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(blueprint))
}

async fn mint(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<AmountRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    require_auth(&headers, &state.auth_token)?;
    run_serialized(state, move |minter| minter.mint(request.amount)).await
}

async fn burn(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<AmountRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    require_auth(&headers, &state.auth_token)?;
    run_serialized(state, move |minter| minter.burn(request.amount)).await
}

async fn run_serialized<F>(state: ApiState, op: F) -> Result<Json<TxResponse>, ApiError>
where
    F: FnOnce(&Minter) -> Result<TxId, MintError> + Send + 'static,
{
    let _guard = state.build_lock.lock().await;
    let minter = Arc::clone(&state.minter);
    let result = task::spawn_blocking(move || op(&minter))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    match result {
        Ok(tx_id) => Ok(Json(TxResponse { tx_id })),
        Err(err) => {
            warn!(%err, "mint request failed");
            Err(err.into())
        }
    }
}

fn require_auth(headers: &HeaderMap, token: &Option<String>) -> Result<(), ApiError> {
    let Some(expected) = token else {
        return Ok(());
    };
    let direct = headers
        .get(AUTH_HEADER)
        .is_some_and(|value| value == expected);
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|as_str| as_str.strip_prefix("Bearer "))
        .is_some_and(|auth_token| auth_token == expected);
    if direct || bearer {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "missing or invalid auth token",
        ))
    }
}
