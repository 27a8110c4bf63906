//! HTTP routes

use crate::response::{add_default_headers, ApiError, ApiResponse};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mailgate_auth::ApiKeyAuthorizer;
use mailgate_core::{ComposeRequest, CoreError, MailGateway, Source, SubmitOutcome, DEFAULT_LIMIT};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<MailGateway>,
    pub authorizer: Arc<ApiKeyAuthorizer>,
}

type ApiResult = Result<ApiResponse, ApiError>;

/// Build the router. Mail routes require an API key; `/authorize` and
/// `/healthz` are open.
pub fn app(state: AppState) -> Router {
    let mail_routes = Router::new()
        .route("/unread", get(list_unread))
        .route("/drafts", get(list_drafts))
        .route("/email", post(submit_email))
        .route("/email/:id/read", post(mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .merge(mail_routes)
        .route("/authorize", post(authorize))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(middleware::map_response(add_default_headers))
        .with_state(state)
}

fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let resource = format!("{} {}", request.method(), request.uri().path());
    let policy = state
        .authorizer
        .authorize(bearer_header(request.headers()), &resource)
        .await;

    if policy.is_allowed() {
        next.run(request).await
    } else {
        warn!("Rejected unauthorized request to {}", resource);
        ApiResponse::error(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

fn query_params(
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<HashMap<String, String>, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|e| CoreError::Validation(format!("Invalid query string: {}", e)).into())
}

/// A non-negative integer parameter; `positive` additionally rejects zero
fn count_param(
    params: &HashMap<String, String>,
    name: &str,
    default: u32,
    positive: bool,
) -> Result<u32, ApiError> {
    let Some(raw) = params.get(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) if positive => Err(CoreError::Validation(format!("{} must be greater than zero", name)).into()),
        Ok(value) => Ok(value),
        Err(_) => Err(CoreError::Validation(format!("{} must be a non-negative integer, got {:?}", name, raw)).into()),
    }
}

async fn list_unread(
    State(state): State<AppState>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult {
    let params = query_params(params)?;
    let limit = count_param(&params, "limit", DEFAULT_LIMIT, true)?;
    let with_content = params.get("content").map(String::as_str) == Some("true");

    let listing = state.gateway.list_unread(limit, with_content).await?;
    Ok(ApiResponse::ok(listing))
}

async fn list_drafts(
    State(state): State<AppState>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult {
    let params = query_params(params)?;
    let source: Source = params
        .get("source")
        .map(|s| s.parse::<Source>())
        .transpose()?
        .unwrap_or(Source::Local);
    let limit = count_param(&params, "limit", DEFAULT_LIMIT, true)?;
    let offset = count_param(&params, "offset", 0, false)?;

    let listing = state.gateway.list_drafts(source, limit, offset).await?;
    Ok(ApiResponse::ok(listing))
}

async fn submit_email(
    State(state): State<AppState>,
    body: Result<Json<ComposeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) =
        body.map_err(|e| CoreError::Validation(format!("Invalid request body: {}", e.body_text())))?;

    match state.gateway.submit(request).await? {
        SubmitOutcome::Sent { email_id, message_id } => Ok(ApiResponse::ok(json!({
            "message": "Email sent successfully",
            "emailId": email_id,
            "messageId": message_id,
        }))),
        SubmitOutcome::Draft { draft_id } => Ok(ApiResponse::created(json!({
            "message": "Email draft saved successfully",
            "draftId": draft_id,
        }))),
    }
}

async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.gateway.mark_read(&id).await?;
    Ok(ApiResponse::ok(json!({ "message": "Email marked as read", "id": id })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest {
    #[serde(default)]
    authorization_token: Option<String>,
    #[serde(default)]
    method_arn: Option<String>,
}

/// Always answers 200 with a policy; anything unexpected becomes a Deny
async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> ApiResponse {
    let request = match body {
        Ok(Json(request)) => request,
        Err(e) => {
            debug!("Unreadable authorize request: {}", e.body_text());
            AuthorizeRequest::default()
        }
    };

    let token = request
        .authorization_token
        .as_deref()
        .or_else(|| bearer_header(&headers));
    let resource = request.method_arn.as_deref().unwrap_or("*");

    ApiResponse::ok(state.authorizer.authorize(token, resource).await)
}

async fn not_found() -> ApiResponse {
    ApiResponse::error(StatusCode::NOT_FOUND, "Resource not found")
}

async fn healthz() -> ApiResponse {
    ApiResponse::ok(json!({ "status": "ok" }))
}
