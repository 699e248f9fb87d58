//! Shared harness: axum servers on their own runtime thread, and a provider
//! node that serves the chain-data routes from an in-memory ledger.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wallet::ledger::{ProtocolParams, SignedTransaction, TransactionDraft, UtxoEntry};
use wallet::provider::ErrorBody;
use wallet::rpc::{SubmitResponse, AUTH_HEADER};
use wallet::{Address, ChainProvider, MemoryLedger, ProviderError};

pub const TOKEN: &str = "test-token";

pub struct TestServer {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    addr: SocketAddr,
}

impl TestServer {
    pub fn spawn(app: Router) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let thread = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("runtime");
            rt.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .unwrap();
            });
        });
        let addr = addr_rx.recv().expect("addr");
        Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
            addr,
        }
    }

    pub fn url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

pub struct NodeState {
    pub ledger: MemoryLedger,
    delay: Mutex<Duration>,
}

/// Chain-data provider backed by a [`MemoryLedger`].
pub struct TestNode {
    pub state: Arc<NodeState>,
    server: TestServer,
}

impl TestNode {
    pub fn spawn() -> Self {
        let state = Arc::new(NodeState {
            ledger: MemoryLedger::default(),
            delay: Mutex::new(Duration::ZERO),
        });
        let app = Router::new()
            .route("/utxos/:address", get(handle_utxos))
            .route("/protocol-params", get(handle_params))
            .route("/tx/complete", post(handle_complete))
            .route("/tx/submit", post(handle_submit))
            .with_state(state.clone());
        Self {
            state,
            server: TestServer::spawn(app),
        }
    }

    pub fn url(&self) -> url::Url {
        self.server.url()
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.state.ledger
    }

    /// Every response is held back by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }
}

struct NodeError {
    status: StatusCode,
    body: ErrorBody,
}

impl NodeError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                script: None,
            },
        }
    }
}

impl From<ProviderError> for NodeError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Script { reason } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: ErrorBody {
                    error: reason.to_string(),
                    script: Some(reason),
                },
            },
            ProviderError::Balancing(message) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            ProviderError::Rejected(message) => Self::new(StatusCode::CONFLICT, message),
            ProviderError::Decode(message) => Self::new(StatusCode::BAD_REQUEST, message),
            ProviderError::Unreachable(message) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
            }
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl NodeState {
    async fn gate(&self, headers: &HeaderMap) -> Result<(), NodeError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if headers
            .get(AUTH_HEADER)
            .is_some_and(|value| value == TOKEN)
        {
            Ok(())
        } else {
            Err(NodeError::new(StatusCode::UNAUTHORIZED, "missing or invalid auth token"))
        }
    }
}

async fn handle_utxos(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Path(address): Path<String>,
) -> Result<Json<Vec<UtxoEntry>>, NodeError> {
    state.gate(&headers).await?;
    let address = Address::decode(&address)
        .map_err(|err| NodeError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    Ok(Json(state.ledger.find_utxos(&address)?))
}

async fn handle_params(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
) -> Result<Json<ProtocolParams>, NodeError> {
    state.gate(&headers).await?;
    Ok(Json(state.ledger.fetch_protocol_params()?))
}

async fn handle_complete(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(draft): Json<TransactionDraft>,
) -> Result<Json<TransactionDraft>, NodeError> {
    state.gate(&headers).await?;
    Ok(Json(state.ledger.complete_and_balance(draft)?))
}

async fn handle_submit(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(tx): Json<SignedTransaction>,
) -> Result<Json<SubmitResponse>, NodeError> {
    state.gate(&headers).await?;
    let tx_id = state.ledger.submit(&tx)?;
    Ok(Json(SubmitResponse { tx_id }))
}
