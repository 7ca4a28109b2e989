//! Media request intake and inspection.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use courier_core::{delivery::DeliveryTarget, Request, RequestKind, Requester, TaskPhase};

use crate::registry::RequestEntry;
use crate::state::AppState;

/// Maximum allowed limit for list queries
const MAX_LIMIT: usize = 500;

/// Default limit for list queries
const DEFAULT_LIMIT: usize = 50;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a media request
#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub kind: RequestKind,
    /// Search phrase, locator, or image prompt
    pub query: String,
    pub requester: Requester,
    /// Chat the result goes to
    pub chat_id: i64,
    /// Message the result replies to
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub private_chat: bool,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: String,
    pub phase: TaskPhase,
}

/// Query parameters for listing requests
#[derive(Debug, Deserialize)]
pub struct ListRequestsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListRequestsResponse {
    pub requests: Vec<RequestEntry>,
    pub in_flight: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept a request and start processing it in the background
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let mut target = DeliveryTarget::new(body.chat_id);
    if let Some(message_id) = body.reply_to {
        target = target.replying_to(message_id);
    }
    let mut request = Request::new(body.kind, body.query, body.requester, target);
    if body.private_chat {
        request = request.in_private_chat();
    }

    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(
        request_id = %request.id,
        kind = %request.kind,
        chat_id = request.target.chat_id,
        "Accepted request"
    );

    let id = request.id.clone();
    state.submit(request);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            id,
            phase: TaskPhase::Received,
        }),
    ))
}

/// Get a request by ID
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequestEntry>, ApiError> {
    state
        .registry()
        .get(&id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Request not found: {}", id)))
}

/// List recent requests, newest first
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListRequestsParams>,
) -> Json<ListRequestsResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Json(ListRequestsResponse {
        requests: state.registry().recent(limit),
        in_flight: state.registry().in_flight(),
    })
}
