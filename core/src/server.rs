//! Dashboard service: the HTTP surface.
//!
//! Two groups of routes:
//!   - `/api/agent-summary`: write/read pair over the `AgentSummaryStore`.
//!   - `/api/stats`, `/api/partners…`, `/api/alerts`, `/api/roi`: read-only
//!     JSON views of the reconciler. These inherit its totality, so apart
//!     from single-record lookups they always answer 200.

use crate::{
    error::{WatchError, WatchResult},
    reconciliation::Reconciler,
    summary_store::AgentSummaryStore,
    types::Lookup,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub summaries:  Arc<AgentSummaryStore>,
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    pub fn new(summaries: Arc<AgentSummaryStore>, reconciler: Arc<Reconciler>) -> Self {
        Self { summaries, reconciler }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/api/agent-summary",
            post(submit_summary_handler).get(read_summary_handler),
        )
        .route("/api/stats", get(stats_handler))
        .route("/api/partners", get(partners_handler))
        .route("/api/partners/:id", get(partner_handler))
        .route("/api/partners/:id/summary", get(partner_summary_handler))
        .route("/api/partners/:id/trigger", post(trigger_handler))
        .route("/api/interventions", get(interventions_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/roi", get(roi_handler))
        .with_state(state)
}

pub async fn bind(addr: &str) -> WatchResult<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|_| WatchError::InvalidBindAddr { addr: addr.to_string() })?;
    Ok(TcpListener::bind(addr).await?)
}

/// Serve until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, state: AppState, shutdown: S) -> WatchResult<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("dashboard service listening on {addr}");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("dashboard service stopped");
    Ok(())
}

// ── Agent summary ────────────────────────────────────────────────────────────

async fn submit_summary_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.summaries.submit(&body) {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            log::warn!("agent summary rejected: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn read_summary_handler(State(state): State<AppState>) -> Response {
    match state.summaries.read() {
        Some(summary) => Json(summary).into_response(),
        None => Json(json!({})).into_response(),
    }
}

// ── Reconciled views ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PartnersQuery {
    limit: Option<usize>,
}

async fn healthz_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.reconciler.fetch_stats().await)
}

async fn partners_handler(
    State(state): State<AppState>,
    Query(query): Query<PartnersQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(state.reconciler.config().partner_fetch_limit);
    Json(state.reconciler.fetch_high_risk_partners(limit).await)
}

async fn partner_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    lookup_response(state.reconciler.lookup_partner(&id).await)
}

async fn partner_summary_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    lookup_response(state.reconciler.lookup_partner_summary(&id).await)
}

async fn trigger_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.reconciler.trigger_intervention(&id).await {
        Some(receipt) => Json(receipt).into_response(),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "status": "error", "message": "intervention not confirmed" })),
        )
            .into_response(),
    }
}

async fn interventions_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.reconciler.fetch_interventions().await)
}

async fn alerts_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.reconciler.fetch_alert_board().await)
}

async fn roi_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.reconciler.fetch_roi().await)
}

fn lookup_response<T: serde::Serialize>(lookup: Lookup<T>) -> Response {
    match lookup {
        Lookup::Found(v) => Json(v).into_response(),
        Lookup::NotFound => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
        Lookup::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
            .into_response(),
    }
}
