//! Request middleware: gateway secret check and caller resolution.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::access::resolve_caller;
use crate::database::AppState;

/// Header carrying the authenticated caller id, set by the fronting gateway
pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Checks the shared `Authorization` secret.
///
/// When no secret is configured the check is skipped.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if let Some(secret) = state.auth_secret.as_deref() {
        let presented = headers.get("Authorization").and_then(|value| value.to_str().ok());
        if presented != Some(secret) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "code": "UNAUTHORIZED",
                    "message": "Invalid or missing authorization header"
                })),
            )
                .into_response());
        }
    }

    Ok(next.run(request).await)
}

/// Resolves the caller from `X-Caller-Id` and stores it as a request extension
pub async fn caller_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let caller_id = request
        .headers()
        .get(CALLER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let caller = resolve_caller(state.roles.as_ref(), caller_id.as_deref());
    tracing::debug!(caller = ?caller.id, role = ?caller.role, "Caller resolved");

    request.extensions_mut().insert(caller);
    next.run(request).await
}
