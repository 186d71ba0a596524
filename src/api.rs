//! HTTP surface for a ledger node
//!
//! Thin adapter over [`Node`]: it parses requests, calls the node and maps
//! [`LedgerError`] kinds onto status codes. The `/chain` response is the wire
//! format peers consume during conflict resolution.

use axum::{
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::blockchain::{Block, ChainResponse};
use crate::consensus::ChainSource;
use crate::crypto::KeyPair;
use crate::error::LedgerError;
use crate::network::normalize_peer_address;
use crate::node::{MinedBlockSummary, Node};

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(err) => {
                let status = match err {
                    LedgerError::Validation(_)
                    | LedgerError::Signature(_)
                    | LedgerError::Crypto(_)
                    | LedgerError::Codec(_) => StatusCode::BAD_REQUEST,
                    LedgerError::MiningInProgress
                    | LedgerError::MiningCancelled
                    | LedgerError::StaleTip => StatusCode::CONFLICT,
                    LedgerError::Network(_) => StatusCode::BAD_GATEWAY,
                    LedgerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct MinedResponse {
    message: String,
    #[serde(flatten)]
    block: MinedBlockSummary,
}

/// Body of `POST /transactions/new`.
///
/// `signature` carries the signer's secret key (hex) and `sender_key` the
/// identity the signer claims; the node signs on the client's behalf.
#[derive(Deserialize)]
pub struct NewTransactionRequest {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub amount: Option<u64>,
    pub signature: Option<String>,
    pub sender_key: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Option<Vec<String>>,
}

#[derive(Serialize)]
struct RegisterNodesResponse {
    message: String,
    total_nodes: Vec<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResolveResponse {
    Replaced { message: String, new_chain: Vec<Block> },
    Authoritative { message: String, chain: Vec<Block> },
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (for testing)
pub fn build_api_router<S: ChainSource>(node: Arc<Node<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/mine", get(mine::<S>))
        .route("/transactions/new", post(new_transaction::<S>))
        .route("/chain", get(full_chain::<S>))
        .route("/nodes/register", post(register_nodes::<S>))
        .route("/nodes/resolve", get(consensus::<S>))
        .route("/health", get(health_check::<S>))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the router on `0.0.0.0:port` until the process stops.
pub async fn run_api_server<S: ChainSource>(
    node: Arc<Node<S>>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, node = %node.identifier(), "API server listening");

    axum::serve(listener, build_api_router(node)).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check<S: ChainSource>(State(node): State<Arc<Node<S>>>) -> impl IntoResponse {
    let shared = node.ledger();
    let ledger = shared.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "node": node.identifier(),
        "length": ledger.len(),
        "pending": ledger.pending_transactions().len(),
        "difficulty": ledger.difficulty(),
        "block_size": ledger.block_size(),
        "miner_reward": ledger.miner_reward(),
        "peers": ledger.peers().len(),
        "is_mining": node.is_mining(),
        "blocks_mined": node.blocks_mined(),
    }))
}

async fn mine<S: ChainSource>(State(node): State<Arc<Node<S>>>) -> Result<impl IntoResponse, ApiError> {
    let summary = node.mine(node.identifier()).await?;
    Ok(Json(MinedResponse {
        message: "New block mined".to_string(),
        block: summary,
    }))
}

async fn new_transaction<S: ChainSource>(
    State(node): State<Arc<Node<S>>>,
    Json(req): Json<NewTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(sender), Some(receiver), Some(amount), Some(secret_key), Some(sender_key)) =
        (req.sender, req.receiver, req.amount, req.signature, req.sender_key)
    else {
        return Err(ApiError::InvalidInput(
            "Missing fields in transaction".to_string(),
        ));
    };

    let credential = KeyPair::from_secret_hex(&secret_key)?;
    let index = node
        .add_transaction(&sender, &receiver, amount, &credential, &sender_key)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {}", index),
        }),
    ))
}

async fn full_chain<S: ChainSource>(State(node): State<Arc<Node<S>>>) -> Json<ChainResponse> {
    Json(node.get_chain().await)
}

async fn register_nodes<S: ChainSource>(
    State(node): State<Arc<Node<S>>>,
    Json(req): Json<RegisterNodesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = req
        .nodes
        .ok_or_else(|| ApiError::InvalidInput("Invalid node list".to_string()))?;

    // Reject the whole list before registering any of it.
    for address in &nodes {
        normalize_peer_address(address)?;
    }
    for address in &nodes {
        node.register_peer(address).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: "Nodes have been added".to_string(),
            total_nodes: node.peers().await,
        }),
    ))
}

async fn consensus<S: ChainSource>(State(node): State<Arc<Node<S>>>) -> impl IntoResponse {
    let resolution = node.resolve_conflicts().await;
    let body = if resolution.replaced {
        ResolveResponse::Replaced {
            message: "Our chain was replaced".to_string(),
            new_chain: resolution.chain,
        }
    } else {
        ResolveResponse::Authoritative {
            message: "Our chain is authoritative".to_string(),
            chain: resolution.chain,
        }
    };
    Json(body)
}
