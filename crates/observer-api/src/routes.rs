//! HTTP handlers for the four semantic endpoints of §4.12: stream events
//! forward, fetch a chain proof, fetch the current head, and manage webhook
//! subscriptions. Unauthenticated by design — this is the public read
//! surface, nothing here can mutate the witnessed log.

use crate::gap::{GapError, GapOutcome, GapReconciler};
use crate::proof::{ChainProof, ProofError, ProofService};
use crate::subscriptions::WebhookRegistry;
use archon_types::{ContentHash, EventType};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// The SLA in §4.12 is stated for ranges under this size; a single request
/// is capped here rather than trusting callers to stay under it themselves.
pub const MAX_RANGE: u64 = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub proof_service: Arc<ProofService>,
    pub subscriptions: Arc<WebhookRegistry>,
    pub gap_reconciler: Arc<GapReconciler>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(stream_events))
        .route("/proof/:sequence", get(fetch_proof))
        .route("/head", get(fetch_head))
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/:id", delete(remove_subscription))
        .route("/gaps", post(report_gap))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub from: u64,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub events: Vec<archon_types::Event>,
    pub truncated: bool,
}

async fn stream_events(State(state): State<AppState>, Query(query): Query<StreamQuery>) -> Json<StreamResponse> {
    let requested = query.limit.unwrap_or(MAX_RANGE).min(MAX_RANGE);
    let to = query.from.saturating_add(requested.saturating_sub(1));
    let events = state.store.range(query.from, to).await;
    let head = state.store.head().await.map(|e| e.sequence).unwrap_or(0);
    Json(StreamResponse {
        truncated: to < head,
        events,
    })
}

async fn fetch_proof(State(state): State<AppState>, Path(sequence): Path<u64>) -> Result<Json<ChainProof>, ApiError> {
    Ok(Json(state.proof_service.prove(sequence).await?))
}

#[derive(Debug, Serialize)]
pub struct HeadResponse {
    pub sequence: u64,
    pub content_hash: ContentHash,
}

async fn fetch_head(State(state): State<AppState>) -> Json<Option<HeadResponse>> {
    Json(state.store.head().await.map(|e| HeadResponse {
        sequence: e.sequence,
        content_hash: e.content_hash,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub url: String,
    #[serde(default)]
    pub event_types: Vec<EventType>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub subscription_id: Uuid,
}

async fn create_subscription(State(state): State<AppState>, Json(request): Json<SubscribeRequest>) -> Json<SubscribeResponse> {
    let subscription_id = state.subscriptions.subscribe(request.url, request.event_types);
    Json(SubscribeResponse { subscription_id })
}

async fn remove_subscription(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.subscriptions.unsubscribe(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize)]
pub struct GapReport {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Serialize)]
pub struct GapResponse {
    pub confirmed: bool,
}

async fn report_gap(State(state): State<AppState>, Json(report): Json<GapReport>) -> Result<Json<GapResponse>, ApiError> {
    let outcome = state.gap_reconciler.report_observed_gap(report.from, report.to, Utc::now()).await?;
    Ok(Json(GapResponse {
        confirmed: matches!(outcome, GapOutcome::ConfirmedAndHalted),
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Gap(#[from] GapError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Proof(ProofError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Gap(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_query_is_capped_to_max_range() {
        let requested = Some(50_000u64).unwrap_or(MAX_RANGE).min(MAX_RANGE);
        assert_eq!(requested, MAX_RANGE);
    }
}
