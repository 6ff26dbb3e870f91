//! HTTP and WebSocket front end for a browser page.
//!
//! Every route forwards to the session controller; the server keeps no state
//! of its own besides the handle.
//!
//! Endpoints:
//! - GET /api/session - Current session view
//! - POST /api/connect - Open a wallet connection
//! - POST /api/disconnect - Close it
//! - POST /api/purchase - Approve and swap `{ "amount": "100" }`
//! - GET /api/balances - Token balances of the connected account
//! - WS /ws - Status messages as they happen

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::controller::{ActionError, ControllerHandle};
use crate::error::{ConnectError, PurchaseError};
use crate::models::{PurchaseReceipt, SessionView};
use crate::swap::Balances;

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub amount: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error returned from a route, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ActionError> for ApiError {
    fn from(err: ActionError) -> Self {
        let status = match &err {
            ActionError::Connect(ConnectError::NoProviderAvailable(_))
            | ActionError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
            ActionError::Connect(ConnectError::ConnectionRejected)
            | ActionError::Purchase(PurchaseError::ApprovalRejected | PurchaseError::SwapRejected) => {
                StatusCode::FORBIDDEN
            }
            ActionError::PurchaseInFlight
            | ActionError::Purchase(
                PurchaseError::NotConnected | PurchaseError::WrongNetwork { .. },
            ) => StatusCode::CONFLICT,
            ActionError::Purchase(PurchaseError::InvalidAmount(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ActionError::Purchase(
                PurchaseError::ApprovalTimedOut(_) | PurchaseError::SwapTimedOut(_),
            ) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Routes over a running controller.
pub fn router(handle: ControllerHandle) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/connect", post(connect))
        .route("/api/disconnect", post(disconnect))
        .route("/api/purchase", post(purchase))
        .route("/api/balances", get(balances))
        .route("/ws", get(websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

/// Serve on localhost until the process is stopped.
pub async fn start_server(port: u16, handle: ControllerHandle) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "serving wallet session");
    println!("walletswap listening on http://{addr}");

    axum::serve(listener, router(handle))
        .await
        .context("Server error")
}

async fn get_session(State(handle): State<ControllerHandle>) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(handle.snapshot().await?))
}

async fn connect(State(handle): State<ControllerHandle>) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(handle.connect().await?))
}

async fn disconnect(State(handle): State<ControllerHandle>) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(handle.disconnect().await?))
}

async fn purchase(
    State(handle): State<ControllerHandle>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseReceipt>, ApiError> {
    // Stands in for a disabled buy button.
    Ok(Json(handle.submit_exclusive_purchase(&req.amount).await?))
}

async fn balances(State(handle): State<ControllerHandle>) -> Result<Json<Balances>, ApiError> {
    Ok(Json(handle.balances().await?))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(handle): State<ControllerHandle>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, handle))
}

async fn handle_websocket(mut socket: WebSocket, handle: ControllerHandle) {
    let mut rx = handle.subscribe();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "websocket client fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if socket.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }
}
