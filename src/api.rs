//! HTTP front door: subscriber registration and token-gated message relay.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Error;
use crate::platform::MessagingApi;
use crate::store::Store;

/// Header carrying the subscriber token on `/api/send/message`.
pub const TOKEN_HEADER: &str = "X-API-Key";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub api: Arc<dyn MessagingApi>,
}

// ── Request / response types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct SubscribeRequest {
    #[serde(default)]
    telegram_user_id: String,
    #[serde(default)]
    username: String,
}

#[derive(Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub token: String,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    text_message: String,
}

// ── Errors ─────────────────────────────────────────────────────────────────────

/// Every failure a handler can return, mapped to a status code in one place.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Conflict,
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Conflict => ApiError::Conflict,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Conflict => (StatusCode::CONFLICT, "already subscribed".to_string()),
            ApiError::Internal(message) => {
                error!("Request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error {}", message))
            }
        };
        (status, message).into_response()
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty request body".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {}", e)))
}

fn request_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

// ── Middleware ─────────────────────────────────────────────────────────────────

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    info!(%method, %path, status = response.status().as_u16(), "HTTP request");
    response
}

/// Reject requests whose token does not belong to a subscriber.
async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request_token(request.headers()).ok_or(ApiError::Unauthorized)?;
    if !state.store.authorize_token(&token).await? {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

// ── Handlers ───────────────────────────────────────────────────────────────────

async fn subscribe(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SubscribeResponse>), ApiError> {
    let request: SubscribeRequest = parse_body(&body)?;

    let user_id = request.telegram_user_id.trim();
    let username = request.username.trim();
    if user_id.is_empty() || username.is_empty() {
        return Err(ApiError::BadRequest(
            "telegram_user_id and username are required".to_string(),
        ));
    }
    if user_id.parse::<i64>().is_err() {
        return Err(ApiError::BadRequest(
            "telegram_user_id must be an integer".to_string(),
        ));
    }

    let token = state.store.insert_subscriber(user_id, username).await?;
    Ok((StatusCode::CREATED, Json(SubscribeResponse { token })))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: SendMessageRequest = parse_body(&body)?;
    if request.text_message.trim().is_empty() {
        return Err(ApiError::BadRequest("text_message is required".to_string()));
    }

    let token = request_token(&headers).ok_or(ApiError::Unauthorized)?;
    let subscriber = state
        .store
        .subscriber_by_token(&token)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let chat_id = subscriber.chat_id().map_err(|e| {
        ApiError::Internal(format!("bad user id {:?}: {}", subscriber.user_id, e))
    })?;

    state
        .store
        .insert_message(&subscriber.user_id, &request.text_message)
        .await?;
    state.api.send_message(chat_id, &request.text_message).await?;

    Ok(StatusCode::OK)
}

// ── Server ─────────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    let authorized = middleware::from_fn_with_state(state.clone(), authorize);

    Router::new()
        .route("/api/subscribe", post(subscribe))
        .route("/api/send/message", post(send_message).route_layer(authorized))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Serve until `cancel` fires, then shut down gracefully.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("HTTP server error")
}
